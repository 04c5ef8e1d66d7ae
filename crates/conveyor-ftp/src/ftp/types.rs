//! Shared types for the FTP crate.

use serde::{Deserialize, Serialize};

/// File property: remote destination path. A trailing `/` means the
/// path only names directories and the local file name is kept.
pub const PROPERTY_REMOTE_PATH: &str = "ftpRemotePath";
/// File property: UNIX permissions to apply to the stored file
/// (`SITE CHMOD`, best effort).
pub const PROPERTY_PERMISSIONS: &str = "ftpPermissions";

/// Security mode for the control channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FtpSecurityMode {
    /// Plain-text FTP (port 21).
    None,
    /// Explicit FTPS — starts plain then upgrades via AUTH TLS (port 21).
    Explicit,
    /// Implicit FTPS — TLS from the first byte (port 990).
    Implicit,
}

impl Default for FtpSecurityMode {
    fn default() -> Self {
        Self::None
    }
}

/// How the data connection is established.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum DataChannelMode {
    Passive,
    ExtendedPassive,
}

impl Default for DataChannelMode {
    fn default() -> Self {
        Self::Passive
    }
}

/// Configuration for one FTP upload task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpTransferConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login is skipped unless both username and password are set
    /// (anonymous / pre-authenticated servers).
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub security: FtpSecurityMode,
    #[serde(default)]
    pub data_channel_mode: DataChannelMode,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Socket read timeout in seconds. The control keepalive interval
    /// is derived as half of this.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_sec: u64,
    /// Use MODE C (compressed) for transfers instead of stream mode.
    #[serde(default)]
    pub compressed_transfer: bool,
    /// Accept self-signed / untrusted certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// UNIX permissions applied to directories this task creates. When
    /// unset the server defaults apply.
    #[serde(default)]
    pub created_directories_permissions: Option<String>,
}

fn default_port() -> u16 {
    21
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_socket_timeout() -> u64 {
    30
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: None,
            password: None,
            security: FtpSecurityMode::None,
            data_channel_mode: DataChannelMode::Passive,
            connect_timeout_sec: default_connect_timeout(),
            socket_timeout_sec: default_socket_timeout(),
            compressed_transfer: false,
            accept_invalid_certs: false,
            created_directories_permissions: None,
        }
    }
}

/// A single FTP reply (may be multi-line).
#[derive(Debug, Clone)]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full reply text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether the reply code indicates success (1xx–3xx).
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    /// Positive-preliminary reply (1xx) — more replies follow.
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive-intermediate reply (3xx) — another command is expected.
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

/// How a data-channel copy ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CopyStatus {
    /// All bytes went out and the server confirmed the transfer.
    Completed,
    /// Cancellation was observed mid-stream; the connection was
    /// abandoned and the session is no longer usable.
    Aborted,
}
