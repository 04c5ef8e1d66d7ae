//! Progress and terminal event delivery.
//!
//! Events go out over an unbounded channel so the uploading worker
//! never blocks on the observer. A task emits any number of `Progress`
//! events followed by exactly one terminal event.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::response::ServerResponse;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum UploadEvent {
    /// Byte-level progress snapshot.
    Progress { uploaded: u64, total: u64 },
    /// The attempt finished and the server confirmed it.
    Completed { response: ServerResponse },
    /// The attempt was cancelled cooperatively. Not a failure.
    Stopped,
    /// The attempt aborted on a fatal error.
    Failed { error: String },
}

/// Sending side of the event channel, held by the task.
///
/// A dropped receiver never fails the task: uploads outlive their
/// observers.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl EventSink {
    /// Create a connected sink/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything (unobserved tasks).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, uploaded: u64, total: u64) {
        self.emit(UploadEvent::Progress { uploaded, total });
    }

    pub fn completed(&self, response: ServerResponse) {
        self.emit(UploadEvent::Completed { response });
    }

    pub fn stopped(&self) {
        self.emit(UploadEvent::Stopped);
    }

    pub fn failed(&self, error: &crate::error::UploadError) {
        self.emit(UploadEvent::Failed {
            error: error.to_string(),
        });
    }
}
