//! The contract protocol crates implement.

use async_trait::async_trait;

use crate::context::CancellationFlag;
use crate::error::UploadResult;
use crate::response::ServerResponse;

/// Terminal outcome of one attempt.
///
/// `Stopped` is the cooperative-cancellation outcome: an early, clean
/// stop, distinct from both success and failure.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(ServerResponse),
    Stopped,
}

/// One transfer task: owns its file list and byte counter, drives a
/// protocol encoder or driver, and reports a terminal outcome.
///
/// `run` may be called again after a failed attempt; completed files
/// stay completed, so a retry only uploads what is still pending.
#[async_trait]
pub trait UploadTask: Send {
    async fn run(&mut self) -> UploadResult<UploadOutcome>;

    /// Handle for requesting cooperative cancellation.
    fn cancellation(&self) -> CancellationFlag;
}
