//! # conveyor-http — multipart/form-data upload
//!
//! - `multipart` — boundary-framed body encoder with exact
//!   pre-transmission length
//! - `stack` — the `HttpStack` transport seam plus the default
//!   tokio-based implementation
//! - `task` — the HTTP upload orchestrator

pub mod multipart;
pub mod stack;
pub mod task;

pub use multipart::{
    BodyStatus, MultipartPayload, NameValue, PROPERTY_CONTENT_TYPE, PROPERTY_PARAM_NAME,
    PROPERTY_REMOTE_FILE_NAME,
};
pub use stack::{HttpRequest, HttpStack, TokioHttpStack};
pub use task::{HttpTransferConfig, MultipartUploadTask};
