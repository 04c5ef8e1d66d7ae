//! FTP upload orchestrator.

use async_trait::async_trait;
use log::{debug, info};

use conveyor_core::{
    CancellationFlag, EventSink, ServerResponse, TaskContext, UploadError, UploadFile,
    UploadOutcome, UploadResult, UploadTask,
};

use crate::ftp::error::{FtpError, FtpErrorKind};
use crate::ftp::session::FtpSession;
use crate::ftp::types::{CopyStatus, FtpTransferConfig, PROPERTY_REMOTE_PATH};

/// Uploads the task's files over one FTP session, strictly in order,
/// moving each file to the completed list as the server confirms it.
///
/// `run` can be called again after a failure: completed files stay
/// completed, the byte counter resumes from their size sum, and only
/// the still-pending files are uploaded.
pub struct FtpUploadTask {
    config: FtpTransferConfig,
    ctx: TaskContext,
}

impl FtpUploadTask {
    pub fn new(config: FtpTransferConfig, files: Vec<UploadFile>, events: EventSink) -> Self {
        Self {
            config,
            ctx: TaskContext::new(files, events),
        }
    }

    fn map_error(&self, error: FtpError, file: Option<&UploadFile>) -> UploadError {
        match error.kind {
            FtpErrorKind::AuthFailed => UploadError::Authentication {
                host: self.config.host.clone(),
                port: self.config.port,
                username: self.config.username.clone().unwrap_or_default(),
                reason: error.message,
            },
            FtpErrorKind::RemoteDirectory => UploadError::RemoteDirectory {
                segment: error.path.clone().unwrap_or_default(),
                file: file.map(|f| f.name().to_string()).unwrap_or_default(),
                reason: error.message,
            },
            FtpErrorKind::ConnectionFailed
            | FtpErrorKind::TlsFailed
            | FtpErrorKind::Timeout
            | FtpErrorKind::Disconnected => UploadError::Connection {
                host: self.config.host.clone(),
                port: self.config.port,
                reason: error.to_string(),
            },
            FtpErrorKind::InvalidConfig => UploadError::InvalidConfig(error.message),
            FtpErrorKind::ProtocolError => UploadError::Protocol {
                reason: error.message,
            },
            _ => match file {
                Some(file) => UploadError::FileStore {
                    file: file.name().to_string(),
                    destination: file
                        .property(PROPERTY_REMOTE_PATH)
                        .unwrap_or_default()
                        .to_string(),
                    reason: error.to_string(),
                },
                None => UploadError::Connection {
                    host: self.config.host.clone(),
                    port: self.config.port,
                    reason: error.to_string(),
                },
            },
        }
    }
}

#[async_trait]
impl UploadTask for FtpUploadTask {
    async fn run(&mut self) -> UploadResult<UploadOutcome> {
        info!(
            "starting FTP upload of {} pending file(s) to {}:{}",
            self.ctx.files.pending_count(),
            self.config.host,
            self.config.port
        );

        let mut session = match FtpSession::connect(&self.config).await {
            Ok(session) => session,
            Err(e) => {
                let error = self.map_error(e, None);
                self.ctx.emit_failed(&error);
                return Err(error);
            }
        };

        // Totals are recomputed per attempt: a retry resumes progress
        // from the files a previous attempt already confirmed.
        self.ctx.recompute_progress();

        let mut stopped = false;
        let mut failure: Option<UploadError> = None;

        loop {
            if !self.ctx.should_continue() {
                debug!("cancellation requested, stopping before the next file");
                stopped = true;
                break;
            }
            let file = match self.ctx.files.next_pending() {
                Some(file) => file,
                None => break,
            };

            let transfer = session
                .transfer_file(
                    &file,
                    self.config.created_directories_permissions.as_deref(),
                    &mut self.ctx,
                )
                .await;

            match transfer {
                Ok(CopyStatus::Completed) => self.ctx.files.complete_front(),
                Ok(CopyStatus::Aborted) => {
                    stopped = true;
                    break;
                }
                Err(e) => {
                    failure = Some(self.map_error(e, Some(&file)));
                    break;
                }
            }
        }

        // Teardown runs on every exit path: success, failure or stop.
        session.close().await;

        if let Some(error) = failure {
            self.ctx.emit_failed(&error);
            return Err(error);
        }
        if stopped {
            self.ctx.emit_stopped();
            return Ok(UploadOutcome::Stopped);
        }

        let response = ServerResponse::successful_empty();
        self.ctx.emit_completed(response.clone());
        Ok(UploadOutcome::Completed(response))
    }

    fn cancellation(&self) -> CancellationFlag {
        self.ctx.cancellation()
    }
}
