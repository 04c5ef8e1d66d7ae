//! Low-level FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code
//!
//! The codec owns the whole control stream; nothing reads and writes
//! it concurrently, so there is no need to split it into halves.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

/// The control connection, plain or TLS-wrapped.
pub enum ControlStream {
    Plain(BufStream<TcpStream>),
    Tls(BufStream<TlsStream<TcpStream>>),
}

/// Command/response codec over the control connection.
pub struct FtpCodec {
    stream: ControlStream,
}

impl FtpCodec {
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            stream: ControlStream::Plain(BufStream::new(stream)),
        }
    }

    pub fn from_tls(stream: TlsStream<TcpStream>) -> Self {
        Self {
            stream: ControlStream::Tls(BufStream::new(stream)),
        }
    }

    /// Send a raw FTP command (without trailing CRLF — we add it).
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        match &mut self.stream {
            ControlStream::Plain(s) => {
                s.write_all(line.as_bytes()).await?;
                s.flush().await?;
            }
            ControlStream::Tls(s) => {
                s.write_all(line.as_bytes()).await?;
                s.flush().await?;
            }
        }
        log::trace!(">>> {}", cmd);
        Ok(())
    }

    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = match &mut self.stream {
            ControlStream::Plain(s) => s.read_line(&mut buf).await?,
            ControlStream::Tls(s) => s.read_line(&mut buf).await?,
        };
        if n == 0 {
            return Err(FtpError::disconnected("server closed connection"));
        }
        Ok(buf)
    }

    /// Read a complete FTP reply (possibly multi-line).
    ///
    /// Multi-line replies look like:
    /// ```text
    /// 220-Welcome
    /// 220-Second line
    /// 220 End of greeting
    /// ```
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let first = self.read_line_raw().await?;
        let first = first.trim_end_matches(|c| c == '\r' || c == '\n');

        let code = parse_code(first)?;
        let mut lines = vec![first.to_string()];

        if is_multiline_opener(first) {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next = next.trim_end_matches(|c| c == '\r' || c == '\n');
                lines.push(next.to_string());
                if next.starts_with(&terminator) {
                    break;
                }
            }
        }

        let resp = FtpResponse { code, lines };
        log::trace!("<<< {}", resp.lines.last().map(String::as_str).unwrap_or(""));
        Ok(resp)
    }

    /// Tear the codec back down to the raw TCP stream (for the AUTH TLS
    /// upgrade). Fails if the connection is already TLS.
    pub fn into_tcp(self) -> FtpResult<TcpStream> {
        match self.stream {
            ControlStream::Plain(s) => Ok(s.into_inner()),
            ControlStream::Tls(_) => Err(FtpError::protocol_error(
                "cannot upgrade: connection is already TLS",
            )),
        }
    }
}

/// Parse the 3-digit reply code from the start of a line.
pub(crate) fn parse_code(line: &str) -> FtpResult<u16> {
    if line.len() < 3 {
        return Err(FtpError::protocol_error(format!(
            "reply too short: '{}'",
            line
        )));
    }
    line[..3]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error(format!("invalid reply code in: '{}'", line)))
}

/// `NNN-` opens a multi-line reply that runs until `NNN ` is seen.
pub(crate) fn is_multiline_opener(line: &str) -> bool {
    line.len() >= 4 && line.as_bytes()[3] == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reply_codes() {
        assert_eq!(parse_code("220 ready").unwrap(), 220);
        assert_eq!(parse_code("550-nope").unwrap(), 550);
        assert!(parse_code("2").is_err());
        assert!(parse_code("abc hello").is_err());
    }

    #[test]
    fn detects_multiline_openers() {
        assert!(is_multiline_opener("220-Welcome"));
        assert!(!is_multiline_opener("220 Welcome"));
        assert!(!is_multiline_opener("220"));
    }
}
