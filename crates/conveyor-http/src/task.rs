//! HTTP multipart upload orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use conveyor_core::{
    CancellationFlag, EventSink, TaskContext, UploadFile, UploadOutcome, UploadResult, UploadTask,
};

use crate::multipart::{MultipartPayload, NameValue};
use crate::stack::{HttpRequest, HttpStack, TokioHttpStack};

/// Parameters for one multipart upload task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTransferConfig {
    pub server_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Extra request headers, sent in order.
    #[serde(default)]
    pub headers: Vec<NameValue>,
    /// Scalar form fields, written before the files.
    #[serde(default)]
    pub params: Vec<NameValue>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_sec: u64,
    /// Accept self-signed / untrusted certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_method() -> String {
    "POST".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_read_timeout() -> u64 {
    30
}

impl Default for HttpTransferConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            method: default_method(),
            headers: Vec::new(),
            params: Vec::new(),
            connect_timeout_sec: default_connect_timeout(),
            read_timeout_sec: default_read_timeout(),
            accept_invalid_certs: false,
        }
    }
}

/// Uploads the task's files as one multipart/form-data request.
///
/// All files travel in a single body, so the set is confirmed as a
/// whole: every pending file is marked transferred when the server
/// acknowledges the request, and none of them otherwise.
pub struct MultipartUploadTask {
    config: HttpTransferConfig,
    ctx: TaskContext,
    stack: Box<dyn HttpStack>,
}

impl MultipartUploadTask {
    pub fn new(config: HttpTransferConfig, files: Vec<UploadFile>, events: EventSink) -> Self {
        let stack = TokioHttpStack::new(
            Duration::from_secs(config.connect_timeout_sec),
            Duration::from_secs(config.read_timeout_sec),
            config.accept_invalid_certs,
        );
        Self::with_stack(config, files, events, Box::new(stack))
    }

    /// Use a caller-provided transport instead of the default stack.
    pub fn with_stack(
        config: HttpTransferConfig,
        files: Vec<UploadFile>,
        events: EventSink,
        stack: Box<dyn HttpStack>,
    ) -> Self {
        Self {
            config,
            ctx: TaskContext::new(files, events),
            stack,
        }
    }

    fn request_headers(&self, payload: &MultipartPayload) -> Vec<NameValue> {
        let mut headers = self.config.headers.clone();
        if !headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("user-agent"))
        {
            headers.push(NameValue::new(
                "User-Agent",
                concat!("conveyor/", env!("CARGO_PKG_VERSION")),
            ));
        }
        // Single-file bodies close the connection, batches keep it.
        let connection = if self.ctx.files.pending_count() <= 1 {
            "close"
        } else {
            "keep-alive"
        };
        headers.push(NameValue::new("Connection", connection));
        headers.push(NameValue::new("Content-Type", payload.content_type()));
        headers
    }
}

#[async_trait]
impl UploadTask for MultipartUploadTask {
    async fn run(&mut self) -> UploadResult<UploadOutcome> {
        log::debug!(
            "starting multipart upload of {} file(s) to {}",
            self.ctx.files.pending_count(),
            self.config.server_url
        );

        let payload = MultipartPayload::new(self.config.params.clone());
        let request = HttpRequest {
            method: self.config.method.clone(),
            url: self.config.server_url.clone(),
            headers: self.request_headers(&payload),
        };

        // For HTTP the progress total is the exact body length, headers
        // and boundaries included, because that is what gets declared
        // and written on the wire.
        let files: Vec<UploadFile> = self.ctx.files.pending().cloned().collect();
        self.ctx.counter.set_total(payload.total_length(&files));
        self.ctx.counter.set_uploaded(0);
        self.ctx.emit_progress();

        if !self.ctx.should_continue() {
            self.ctx.emit_stopped();
            return Ok(UploadOutcome::Stopped);
        }

        match self.stack.execute(&request, &payload, &mut self.ctx).await {
            Ok(Some(response)) if self.ctx.should_continue() => {
                log::debug!(
                    "server replied {} with {} body bytes",
                    response.code,
                    response.body.len()
                );
                if response.is_success() {
                    self.ctx.files.complete_all();
                }
                self.ctx.emit_completed(response.clone());
                Ok(UploadOutcome::Completed(response))
            }
            Ok(_) => {
                log::info!("multipart upload to {} stopped", self.config.server_url);
                self.ctx.emit_stopped();
                Ok(UploadOutcome::Stopped)
            }
            Err(error) => {
                self.ctx.emit_failed(&error);
                Err(error)
            }
        }
    }

    fn cancellation(&self) -> CancellationFlag {
        self.ctx.cancellation()
    }
}
