//! Passive data-channel setup (RFC 959 PASV, RFC 2428 EPSV) and reply
//! parsing. The session issues the commands; this module parses the
//! replies and opens the socket, optionally TLS-wrapped for PROT P.

use crate::ftp::error::{FtpError, FtpResult};
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// A plain or TLS-wrapped data stream.
pub enum DataStream {
    Plain(TcpStream),
    Tls(tokio_native_tls::TlsStream<TcpStream>),
}

impl DataStream {
    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            DataStream::Plain(s) => s.write_all(buf).await,
            DataStream::Tls(s) => s.write_all(buf).await,
        }
    }

    /// Flush and signal EOF so the server can finish the transfer.
    pub async fn finish(&mut self) -> std::io::Result<()> {
        match self {
            DataStream::Plain(s) => {
                s.flush().await?;
                s.shutdown().await
            }
            DataStream::Tls(s) => {
                s.flush().await?;
                s.shutdown().await
            }
        }
    }
}

/// Connect the data socket the server offered.
pub async fn connect_data(addr: &str, data_timeout: Duration) -> FtpResult<TcpStream> {
    let tcp = timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FtpError::data_channel(format!("data connect to {} timed out", addr)))?
        .map_err(|e| FtpError::data_channel(format!("data connect to {}: {}", addr, e)))?;
    Ok(tcp)
}

/// Parse `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`.
pub fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let re = Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").unwrap();
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("cannot parse PASV reply: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

/// Parse `229 Entering Extended Passive Mode (|||port|)`. The client
/// connects to the control-connection host on the returned port.
pub fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let re = Regex::new(r"\|\|\|(\d+)\|").unwrap();
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("cannot parse EPSV reply: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pasv_replies() {
        let addr =
            parse_pasv_response("227 Entering Passive Mode (192,168,1,9,19,137).").unwrap();
        assert_eq!(addr.to_string(), "192.168.1.9:5001");
        assert!(parse_pasv_response("227 whatever").is_err());
    }

    #[test]
    fn parses_epsv_replies() {
        assert_eq!(
            parse_epsv_response("229 Entering Extended Passive Mode (|||6446|)").unwrap(),
            6446
        );
        assert!(parse_epsv_response("229 nope").is_err());
    }
}
