//! FTP/FTPS upload driver for the conveyor engine.

pub mod ftp;

pub use ftp::error::{FtpError, FtpErrorKind, FtpResult};
pub use ftp::task::FtpUploadTask;
pub use ftp::types::{
    DataChannelMode, FtpResponse, FtpSecurityMode, FtpTransferConfig, PROPERTY_PERMISSIONS,
    PROPERTY_REMOTE_PATH,
};
