//! FTP-specific error type.

use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
    /// Remote path or directory segment involved, if any.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FtpErrorKind {
    /// TCP / DNS resolution failure.
    ConnectionFailed,
    /// AUTH TLS / TLS handshake failure.
    TlsFailed,
    /// Wrong or rejected credentials.
    AuthFailed,
    /// Server returned a 4xx/5xx for a command.
    CommandRejected,
    /// Data channel could not be established (PASV/EPSV failed).
    DataChannelFailed,
    /// A remote directory could not be entered or created.
    RemoteDirectory,
    /// Storing a file failed or was not confirmed.
    StoreFailed,
    /// Server sent an un-parseable reply.
    ProtocolError,
    /// Local I/O error (file read, socket write).
    IoError,
    /// Operation timed out.
    Timeout,
    /// Server closed the control connection.
    Disconnected,
    /// Permission denied on the server.
    PermissionDenied,
    /// File or directory not found on the server.
    NotFound,
    /// Config / parameter validation error.
    InvalidConfig,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            path: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn tls_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::TlsFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn remote_directory(segment: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::RemoteDirectory, msg).with_path(segment)
    }

    pub fn store_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::StoreFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 | 532 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else if lower.contains("not found") || lower.contains("no such") {
                    FtpErrorKind::NotFound
                } else {
                    FtpErrorKind::CommandRejected
                }
            }
            451 | 452 | 552 | 553 => FtpErrorKind::StoreFailed,
            _ => FtpErrorKind::CommandRejected,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
            path: None,
        }
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::new(FtpErrorKind::IoError, e.to_string())
        }
    }
}

impl From<native_tls::Error> for FtpError {
    fn from(e: native_tls::Error) -> Self {
        Self::tls_failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_codes_classify_by_kind() {
        assert_eq!(
            FtpError::from_reply(530, "Login incorrect.").kind,
            FtpErrorKind::AuthFailed
        );
        assert_eq!(
            FtpError::from_reply(421, "Timeout.").kind,
            FtpErrorKind::Disconnected
        );
        assert_eq!(
            FtpError::from_reply(425, "Can't open data connection.").kind,
            FtpErrorKind::DataChannelFailed
        );
        assert_eq!(
            FtpError::from_reply(550, "Permission denied.").kind,
            FtpErrorKind::PermissionDenied
        );
        assert_eq!(
            FtpError::from_reply(550, "No such file or directory.").kind,
            FtpErrorKind::NotFound
        );
        assert_eq!(
            FtpError::from_reply(553, "Could not create file.").kind,
            FtpErrorKind::StoreFailed
        );
        assert_eq!(
            FtpError::from_reply(500, "Unknown command.").kind,
            FtpErrorKind::CommandRejected
        );
    }

    #[test]
    fn timed_out_io_becomes_timeout() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(FtpError::from(io).kind, FtpErrorKind::Timeout);
    }
}
