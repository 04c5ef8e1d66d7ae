//! The HTTP transport seam and its default implementation.
//!
//! The engine never talks to a socket directly: it hands an
//! [`HttpStack`] the request head and the multipart payload, and the
//! stack owns connection setup, TLS, and response parsing.
//! `TokioHttpStack` is the bundled implementation — a plain HTTP/1.1
//! exchange over tokio TCP, TLS-wrapped for `https` URLs.

use std::time::Duration;

use async_trait::async_trait;
use conveyor_core::{ServerResponse, TaskContext, UploadError, UploadFile, UploadResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::multipart::{BodyStatus, MultipartPayload, NameValue};

/// Request head handed to the stack: everything except the body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    /// Headers in send order. `Content-Length` and `Host` are the
    /// stack's job and must not appear here.
    pub headers: Vec<NameValue>,
}

/// Pluggable HTTP transport.
#[async_trait]
pub trait HttpStack: Send + Sync {
    /// Perform the exchange. Returns `None` when body writing observed
    /// cancellation: the connection is dropped and there is no
    /// response to report.
    async fn execute(
        &self,
        request: &HttpRequest,
        payload: &MultipartPayload,
        ctx: &mut TaskContext,
    ) -> UploadResult<Option<ServerResponse>>;
}

/// Default transport: hand-rolled HTTP/1.1 over tokio TCP with
/// optional TLS.
pub struct TokioHttpStack {
    connect_timeout: Duration,
    read_timeout: Duration,
    accept_invalid_certs: bool,
}

impl Default for TokioHttpStack {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl TokioHttpStack {
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            accept_invalid_certs,
        }
    }

    async fn exchange<S>(
        &self,
        mut stream: BufStream<S>,
        request: &HttpRequest,
        url: &Url,
        payload: &MultipartPayload,
        ctx: &mut TaskContext,
    ) -> UploadResult<Option<ServerResponse>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let files: Vec<UploadFile> = ctx.files.pending().cloned().collect();
        let content_length = payload.total_length(&files);

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        let host_header = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let mut head = format!("{} {} HTTP/1.1\r\n", request.method, target);
        head.push_str(&format!("Host: {}\r\n", host_header));
        for header in &request.headers {
            head.push_str(&format!("{}: {}\r\n", header.name, header.value));
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", content_length));

        stream.write_all(head.as_bytes()).await?;
        log::debug!(
            "sending {} {} with a {} byte body",
            request.method,
            request.url,
            content_length
        );

        if payload.write_body(&mut stream, ctx).await? == BodyStatus::Aborted {
            // Dropping the stream closes the connection; the server
            // sees a truncated body and discards it.
            return Ok(None);
        }
        stream.flush().await?;

        let response = read_response(&mut stream, self.read_timeout).await?;
        Ok(Some(response))
    }
}

#[async_trait]
impl HttpStack for TokioHttpStack {
    async fn execute(
        &self,
        request: &HttpRequest,
        payload: &MultipartPayload,
        ctx: &mut TaskContext,
    ) -> UploadResult<Option<ServerResponse>> {
        let url = Url::parse(&request.url)
            .map_err(|e| UploadError::invalid_config(format!("bad URL {}: {}", request.url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UploadError::invalid_config(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| UploadError::invalid_config(format!("URL has no host: {}", request.url)))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| UploadError::invalid_config(format!("URL has no port: {}", request.url)))?;

        let addr = format!("{}:{}", host, port);
        let tcp = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| UploadError::Connection {
                host: host.clone(),
                port,
                reason: "connect timed out".into(),
            })?
            .map_err(|e| UploadError::Connection {
                host: host.clone(),
                port,
                reason: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();

        if url.scheme() == "https" {
            let mut builder = native_tls::TlsConnector::builder();
            if self.accept_invalid_certs {
                builder.danger_accept_invalid_certs(true);
                builder.danger_accept_invalid_hostnames(true);
            }
            let connector = builder.build().map_err(|e| UploadError::Connection {
                host: host.clone(),
                port,
                reason: format!("TLS setup: {}", e),
            })?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = connector
                .connect(&host, tcp)
                .await
                .map_err(|e| UploadError::Connection {
                    host: host.clone(),
                    port,
                    reason: format!("TLS handshake: {}", e),
                })?;
            self.exchange(BufStream::new(tls), request, &url, payload, ctx)
                .await
        } else {
            self.exchange(BufStream::new(tcp), request, &url, payload, ctx)
                .await
        }
    }
}

/// Read and parse an HTTP/1.1 response: status line, headers, then a
/// body delimited by `Content-Length` or connection close.
async fn read_response<S>(stream: &mut S, read_timeout: Duration) -> UploadResult<ServerResponse>
where
    S: AsyncBufRead + Unpin + Send,
{
    let status_line = read_line_timed(stream, read_timeout).await?;
    let code = parse_status_code(&status_line)?;

    let mut headers = Vec::new();
    loop {
        let line = read_line_timed(stream, read_timeout).await?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok());

    let body = match content_length {
        Some(len) => {
            let mut buf = vec![0u8; len];
            timed(read_timeout, stream.read_exact(&mut buf)).await??;
            buf
        }
        None => {
            let mut buf = Vec::new();
            timed(read_timeout, stream.read_to_end(&mut buf)).await??;
            buf
        }
    };

    Ok(ServerResponse {
        code,
        headers,
        body,
    })
}

/// Parse the 3-digit status code out of `HTTP/1.1 200 OK`.
fn parse_status_code(status_line: &str) -> UploadResult<u16> {
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| UploadError::protocol(format!("bad status line: {:?}", status_line)))
}

async fn read_line_timed<S>(stream: &mut S, read_timeout: Duration) -> UploadResult<String>
where
    S: AsyncBufRead + Unpin + Send,
{
    let mut line = String::new();
    timed(read_timeout, stream.read_line(&mut line)).await??;
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

async fn timed<F, T>(limit: Duration, fut: F) -> UploadResult<std::io::Result<T>>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    timeout(limit, fut).await.map_err(|_| {
        UploadError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "read timed out",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_content_length_delimited_response() {
        let raw = b"HTTP/1.1 201 Created\r\nContent-Type: text/plain\r\nContent-Length: 7\r\n\r\ncreated";
        let mut cursor = Cursor::new(&raw[..]);
        let resp = read_response(&mut cursor, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.code, 201);
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.body_string(), "created");
    }

    #[tokio::test]
    async fn parses_close_delimited_response() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\neverything";
        let mut cursor = Cursor::new(&raw[..]);
        let resp = read_response(&mut cursor, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.code, 200);
        assert_eq!(resp.body_string(), "everything");
    }

    #[test]
    fn rejects_garbage_status_lines() {
        assert!(parse_status_code("HTTP/1.1 abc OK").is_err());
        assert!(parse_status_code("").is_err());
        assert_eq!(parse_status_code("HTTP/1.1 404 Not Found").unwrap(), 404);
    }
}
