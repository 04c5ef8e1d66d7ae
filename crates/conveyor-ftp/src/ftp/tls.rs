//! TLS helpers for Explicit and Implicit FTPS (RFC 4217).

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;

/// Build a `TlsConnector`, optionally accepting self-signed certs.
pub fn build_tls_connector(accept_invalid_certs: bool) -> FtpResult<TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder.build()?;
    Ok(TlsConnector::from(connector))
}

/// Upgrade an existing **plain** control connection to TLS.
///
/// Called after a successful `AUTH TLS` exchange. Consumes the plain
/// codec, performs the handshake, returns a TLS codec.
pub async fn upgrade_to_tls(
    codec: FtpCodec,
    host: &str,
    accept_invalid_certs: bool,
) -> FtpResult<FtpCodec> {
    let tcp = codec.into_tcp()?;
    let connector = build_tls_connector(accept_invalid_certs)?;
    let tls = connector
        .connect(host, tcp)
        .await
        .map_err(|e| FtpError::tls_failed(format!("explicit TLS handshake: {}", e)))?;
    Ok(FtpCodec::from_tls(tls))
}

/// TLS-wrap a freshly connected data channel (PROT P).
pub async fn wrap_data_stream(
    tcp: TcpStream,
    host: &str,
    accept_invalid_certs: bool,
) -> FtpResult<tokio_native_tls::TlsStream<TcpStream>> {
    let connector = build_tls_connector(accept_invalid_certs)?;
    connector
        .connect(host, tcp)
        .await
        .map_err(|e| FtpError::tls_failed(format!("data channel TLS: {}", e)))
}
