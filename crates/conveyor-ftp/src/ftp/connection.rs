//! TCP + TLS transport — establishes the FTP control connection.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls::build_tls_connector;
use crate::ftp::types::{FtpResponse, FtpSecurityMode, FtpTransferConfig};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Establish the control connection and return a ready-to-use codec
/// plus the server welcome banner.
///
/// For Explicit FTPS the caller must issue AUTH TLS afterwards
/// (handled in `session.rs`).
pub async fn connect(config: &FtpTransferConfig) -> FtpResult<(FtpCodec, FtpResponse)> {
    let addr = format!("{}:{}", config.host, config.port);
    let dur = Duration::from_secs(config.connect_timeout_sec);

    let tcp = timeout(dur, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();

    let mut codec = match config.security {
        FtpSecurityMode::Implicit => {
            // Implicit FTPS — TLS wraps the socket before the banner.
            let connector = build_tls_connector(config.accept_invalid_certs)?;
            let tls = connector
                .connect(&config.host, tcp)
                .await
                .map_err(|e| FtpError::tls_failed(format!("implicit TLS handshake: {}", e)))?;
            FtpCodec::from_tls(tls)
        }
        _ => FtpCodec::from_tcp(tcp),
    };

    let banner = timeout(dur, codec.read_response())
        .await
        .map_err(|_| FtpError::timeout(format!("no welcome banner from {}", addr)))??;
    if !banner.is_success() {
        return Err(FtpError::connection_failed(format!(
            "server {} refused the connection: {}",
            addr,
            banner.text()
        ))
        .with_code(banner.code));
    }

    Ok((codec, banner))
}
