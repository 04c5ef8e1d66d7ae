//! Shared error taxonomy for upload tasks.
//!
//! Only fatal conditions are modelled here: permission and cleanup
//! problems are logged at the site where they occur and never change an
//! attempt's outcome, and cancellation is a terminal outcome
//! (`UploadOutcome::Stopped`), not an error.

use thiserror::Error;

/// Fatal error that aborts the current upload attempt.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The remote endpoint could not be reached, or the connection died.
    #[error("cannot connect to {host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    /// The server rejected the configured credentials.
    #[error("login failed on {host}:{port} as {username}: {reason}")]
    Authentication {
        host: String,
        port: u16,
        username: String,
        reason: String,
    },

    /// A remote directory needed by a file could not be entered or created.
    #[error("cannot create remote directory {segment:?} for {file}: {reason}")]
    RemoteDirectory {
        segment: String,
        file: String,
        reason: String,
    },

    /// Storing a file's bytes on the remote side failed.
    #[error("error while uploading {file} to {destination}: {reason}")]
    FileStore {
        file: String,
        destination: String,
        reason: String,
    },

    /// The peer sent something the protocol layer cannot make sense of.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// Task parameters are unusable (empty host, malformed URL, missing
    /// required file property).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local I/O failure (reading a source file, socket I/O).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}
