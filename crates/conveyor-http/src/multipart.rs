//! Boundary-framed multipart/form-data body encoder.
//!
//! The declared `Content-Length` must match the written body to the
//! byte, so `total_length` and `write_body` are both built on the same
//! part-construction functions — there is exactly one place that knows
//! what a part looks like.

use conveyor_core::{TaskContext, UploadFile, UploadResult};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// File property: form field name for the part (defaults to `file`).
pub const PROPERTY_PARAM_NAME: &str = "httpParamName";
/// File property: file name presented to the server (defaults to the
/// local file name).
pub const PROPERTY_REMOTE_FILE_NAME: &str = "httpRemoteFileName";
/// File property: part content type (defaults to a guess from the
/// remote file name).
pub const PROPERTY_CONTENT_TYPE: &str = "httpContentType";

const CRLF: &str = "\r\n";
const TWO_HYPHENS: &str = "--";

/// Streaming copy chunk for file content (64 KiB).
const DEFAULT_CHUNK: usize = 65_536;

/// A named form field or request header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How body writing ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyStatus {
    /// Every part and the trailer were written.
    Completed,
    /// Cancellation was observed between files; the body is incomplete
    /// and the connection must be dropped.
    Aborted,
}

/// The multipart body for one task: scalar form fields plus the task's
/// pending files, framed with a boundary unique to the task instance.
pub struct MultipartPayload {
    boundary: String,
    boundary_bytes: Vec<u8>,
    trailer_bytes: Vec<u8>,
    params: Vec<NameValue>,
}

impl MultipartPayload {
    pub fn new(params: Vec<NameValue>) -> Self {
        let boundary = format!("----ConveyorBoundary{}", Uuid::new_v4().simple());
        let boundary_bytes = format!("{}{}{}", TWO_HYPHENS, boundary, CRLF).into_bytes();
        let trailer_bytes =
            format!("{}{}{}{}", TWO_HYPHENS, boundary, TWO_HYPHENS, CRLF).into_bytes();
        Self {
            boundary,
            boundary_bytes,
            trailer_bytes,
            params,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact body length in bytes for the given file set. This figure
    /// is declared as the transfer's content length before any byte is
    /// written.
    pub fn total_length(&self, files: &[UploadFile]) -> u64 {
        let params: u64 = self
            .params
            .iter()
            .map(|p| (self.boundary_bytes.len() + param_part(p).len()) as u64)
            .sum();
        let files: u64 = files
            .iter()
            .map(|f| {
                (self.boundary_bytes.len() + file_part_header(f).len() + CRLF.len()) as u64
                    + f.size()
            })
            .sum();
        params + files + self.trailer_bytes.len() as u64
    }

    /// Write the body, advancing the task's byte counter chunk by
    /// chunk. Cancellation is honoured between files only: a file
    /// write, once started, runs to completion or error.
    pub async fn write_body<W>(
        &self,
        writer: &mut W,
        ctx: &mut TaskContext,
    ) -> UploadResult<BodyStatus>
    where
        W: AsyncWrite + Unpin + Send,
    {
        // A retried attempt may arrive here with uploaded already
        // non-zero; the body always starts from byte zero.
        ctx.counter.set_uploaded(0);

        for param in &self.params {
            writer.write_all(&self.boundary_bytes).await?;
            let part = param_part(param);
            writer.write_all(&part).await?;
            ctx.advance((self.boundary_bytes.len() + part.len()) as u64);
        }

        let files: Vec<UploadFile> = ctx.files.pending().cloned().collect();
        for file in &files {
            if !ctx.should_continue() {
                log::info!("upload cancelled before writing {}", file.name());
                return Ok(BodyStatus::Aborted);
            }

            writer.write_all(&self.boundary_bytes).await?;
            let header = file_part_header(file);
            writer.write_all(&header).await?;
            ctx.advance((self.boundary_bytes.len() + header.len()) as u64);

            let mut reader = file.source().open().await?;
            let mut buf = vec![0u8; DEFAULT_CHUNK];
            loop {
                let n = tokio::io::AsyncReadExt::read(&mut reader, &mut buf).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buf[..n]).await?;
                ctx.advance(n as u64);
            }

            writer.write_all(CRLF.as_bytes()).await?;
            ctx.advance(CRLF.len() as u64);
        }

        writer.write_all(&self.trailer_bytes).await?;
        // Pin uploaded to exactly total so observers always see
        // uploaded == total on completion.
        ctx.finish_progress();
        Ok(BodyStatus::Completed)
    }
}

/// `Content-Disposition` + value block for one scalar form field.
fn param_part(param: &NameValue) -> Vec<u8> {
    format!(
        "Content-Disposition: form-data; name=\"{}\"{}{}{}{}",
        param.name, CRLF, CRLF, param.value, CRLF
    )
    .into_bytes()
}

/// Part header for one file, with the property defaults applied.
fn file_part_header(file: &UploadFile) -> Vec<u8> {
    let param_name = file.property(PROPERTY_PARAM_NAME).unwrap_or("file");
    let remote_name = file
        .property(PROPERTY_REMOTE_FILE_NAME)
        .unwrap_or_else(|| file.name());
    let content_type = match file.property(PROPERTY_CONTENT_TYPE) {
        Some(ct) => ct.to_string(),
        None => mime_guess::from_path(remote_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };
    format!(
        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"{}Content-Type: {}{}{}",
        param_name, remote_name, CRLF, content_type, CRLF, CRLF
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conveyor_core::{CancellationFlag, EventSink, FileSource, SourceReader, UploadEvent};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    struct MemorySource {
        name: String,
        data: Vec<u8>,
        cancel_on_eof: Option<CancellationFlag>,
    }

    impl MemorySource {
        fn new(name: &str, data: &[u8]) -> Self {
            Self {
                name: name.into(),
                data: data.to_vec(),
                cancel_on_eof: None,
            }
        }
    }

    struct MemoryReader {
        data: Vec<u8>,
        pos: usize,
        on_eof: Option<CancellationFlag>,
    }

    impl AsyncRead for MemoryReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let this = self.get_mut();
            if this.pos >= this.data.len() {
                if let Some(flag) = &this.on_eof {
                    flag.request();
                }
                return Poll::Ready(Ok(()));
            }
            let n = buf.remaining().min(this.data.len() - this.pos);
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    #[async_trait]
    impl FileSource for MemorySource {
        fn name(&self) -> &str {
            &self.name
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }

        async fn open(&self) -> std::io::Result<SourceReader> {
            Ok(Box::pin(MemoryReader {
                data: self.data.clone(),
                pos: 0,
                on_eof: self.cancel_on_eof.clone(),
            }))
        }
    }

    fn mem_file(name: &str, data: &[u8]) -> UploadFile {
        UploadFile::new(Arc::new(MemorySource::new(name, data)))
    }

    async fn written_body(
        payload: &MultipartPayload,
        files: Vec<UploadFile>,
    ) -> (Vec<u8>, BodyStatus, u64) {
        let (sink, _rx) = EventSink::channel();
        let mut ctx = TaskContext::new(files, sink);
        let snapshot: Vec<UploadFile> = ctx.files.pending().cloned().collect();
        let declared = payload.total_length(&snapshot);
        ctx.counter.set_total(declared);

        let mut out = Vec::new();
        let status = payload.write_body(&mut out, &mut ctx).await.unwrap();
        (out, status, declared)
    }

    #[tokio::test]
    async fn declared_length_matches_written_bytes() {
        let combos: Vec<(Vec<NameValue>, Vec<UploadFile>)> = vec![
            (vec![NameValue::new("k", "v")], vec![]),
            (vec![], vec![mem_file("a.txt", b"alpha")]),
            (
                vec![NameValue::new("k", "v"), NameValue::new("empty", "")],
                vec![
                    mem_file("a.txt", b"alpha"),
                    mem_file("b.bin", &[0u8; 1000]),
                ],
            ),
        ];

        for (params, files) in combos {
            let payload = MultipartPayload::new(params);
            let (body, status, declared) = written_body(&payload, files).await;
            assert_eq!(status, BodyStatus::Completed);
            assert_eq!(body.len() as u64, declared);
        }
    }

    #[tokio::test]
    async fn wire_format_is_boundary_delimited() {
        let payload = MultipartPayload::new(vec![NameValue::new("title", "hello")]);
        let file = mem_file("a.txt", b"alpha").with_property(PROPERTY_PARAM_NAME, "doc");
        let (body, _, _) = written_body(&payload, vec![file]).await;
        let text = String::from_utf8_lossy(&body);

        let opener = format!("--{}\r\n", payload.boundary());
        let trailer = format!("--{}--\r\n", payload.boundary());
        assert_eq!(text.matches(&opener).count(), 2);
        assert!(text.ends_with(&trailer));
        assert!(text.contains("Content-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n"));
        assert!(text.contains(
            "Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nalpha\r\n"
        ));
    }

    #[tokio::test]
    async fn content_type_defaults_from_remote_name() {
        let payload = MultipartPayload::new(Vec::new());
        let file =
            mem_file("clip.dat", b"x").with_property(PROPERTY_REMOTE_FILE_NAME, "clip.mp4");
        let (body, _, _) = written_body(&payload, vec![file]).await;
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"clip.mp4\""));
        assert!(text.contains("Content-Type: video/mp4"));
    }

    #[tokio::test]
    async fn final_progress_equals_total() {
        let payload = MultipartPayload::new(vec![NameValue::new("k", "v")]);
        let (sink, mut rx) = EventSink::channel();
        let mut ctx = TaskContext::new(vec![mem_file("a.txt", b"abc")], sink);
        let snapshot: Vec<UploadFile> = ctx.files.pending().cloned().collect();
        let total = payload.total_length(&snapshot);
        ctx.counter.set_total(total);

        let mut out = Vec::new();
        payload.write_body(&mut out, &mut ctx).await.unwrap();

        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            last = Some(ev);
        }
        assert_eq!(
            last.unwrap(),
            UploadEvent::Progress {
                uploaded: total,
                total
            }
        );
    }

    #[tokio::test]
    async fn cancellation_between_files_aborts_the_body() {
        let payload = MultipartPayload::new(Vec::new());
        let (sink, _rx) = EventSink::channel();
        let mut ctx = TaskContext::new(Vec::new(), sink);

        // The first file raises the cancellation flag when its stream
        // reaches EOF, so the check before the second file trips.
        let mut first = MemorySource::new("a.txt", b"alpha");
        first.cancel_on_eof = Some(ctx.cancellation());
        ctx.files = conveyor_core::TransferList::new(vec![
            UploadFile::new(Arc::new(first)),
            mem_file("b.txt", b"bravo"),
        ]);
        let snapshot: Vec<UploadFile> = ctx.files.pending().cloned().collect();
        ctx.counter.set_total(payload.total_length(&snapshot));

        let mut out = Vec::new();
        let status = payload.write_body(&mut out, &mut ctx).await.unwrap();
        assert_eq!(status, BodyStatus::Aborted);

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("alpha"));
        assert!(!text.contains("bravo"));
        assert!(!text.contains(&format!("--{}--", payload.boundary())));
    }
}
