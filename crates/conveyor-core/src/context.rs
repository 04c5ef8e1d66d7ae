//! Per-attempt task state and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::counter::ByteCounter;
use crate::error::UploadError;
use crate::events::EventSink;
use crate::files::{TransferList, UploadFile};
use crate::response::ServerResponse;

/// Shared flag checked by the running worker at defined points.
///
/// Requesting cancellation never interrupts the worker; it stops at the
/// next check point (between files, or per chunk inside the FTP copy
/// loop).
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything one upload attempt owns: the file partition, the byte
/// counter, the event sink and the cancellation flag.
///
/// Created with the task and reset per attempt via
/// [`TaskContext::recompute_progress`]; nothing protocol-specific lives
/// here.
pub struct TaskContext {
    pub files: TransferList,
    pub counter: ByteCounter,
    events: EventSink,
    cancel: CancellationFlag,
}

impl TaskContext {
    pub fn new(files: Vec<UploadFile>, events: EventSink) -> Self {
        Self {
            files: TransferList::new(files),
            counter: ByteCounter::new(),
            events,
            cancel: CancellationFlag::new(),
        }
    }

    /// Handle observers and callers use to request cancellation.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn should_continue(&self) -> bool {
        !self.cancel.is_requested()
    }

    /// Reset the counters from the current file partition and emit the
    /// initial progress event — `uploaded` starts non-zero when a
    /// previous attempt already moved files to the completed list.
    pub fn recompute_progress(&mut self) {
        self.counter.recompute(&self.files);
        log::debug!(
            "progress recomputed: {}/{} bytes, {} file(s) pending",
            self.counter.uploaded(),
            self.counter.total(),
            self.files.pending_count()
        );
        self.emit_progress();
    }

    /// Advance `uploaded` and emit a progress event.
    pub fn advance(&mut self, bytes: u64) {
        self.counter.add(bytes);
        self.emit_progress();
    }

    /// Pin `uploaded` to exactly `total` and emit — the completion
    /// correction that protects against drift on retried attempts.
    pub fn finish_progress(&mut self) {
        self.counter.set_uploaded(self.counter.total());
        self.emit_progress();
    }

    pub fn emit_progress(&self) {
        self.events
            .progress(self.counter.uploaded(), self.counter.total());
    }

    pub fn emit_completed(&self, response: ServerResponse) {
        self.events.completed(response);
    }

    pub fn emit_stopped(&self) {
        self.events.stopped();
    }

    pub fn emit_failed(&self, error: &UploadError) {
        self.events.failed(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UploadEvent;
    use crate::files::{FileSource, SourceReader};
    use async_trait::async_trait;

    struct FixedSource(u64);

    #[async_trait]
    impl FileSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn size(&self) -> u64 {
            self.0
        }

        async fn open(&self) -> std::io::Result<SourceReader> {
            Ok(Box::pin(std::io::Cursor::new(Vec::new())))
        }
    }

    fn ctx_with_sizes(sizes: &[u64]) -> (TaskContext, tokio::sync::mpsc::UnboundedReceiver<UploadEvent>) {
        let (sink, rx) = EventSink::channel();
        let files = sizes
            .iter()
            .map(|s| UploadFile::new(Arc::new(FixedSource(*s))))
            .collect();
        (TaskContext::new(files, sink), rx)
    }

    #[test]
    fn initial_progress_reflects_prior_attempts() {
        let (mut ctx, mut rx) = ctx_with_sizes(&[10, 20, 30]);
        ctx.files.complete_front();
        ctx.recompute_progress();

        assert_eq!(
            rx.try_recv().unwrap(),
            UploadEvent::Progress {
                uploaded: 10,
                total: 60
            }
        );
    }

    #[test]
    fn cancellation_is_observed_through_the_context() {
        let (ctx, _rx) = ctx_with_sizes(&[1]);
        assert!(ctx.should_continue());
        ctx.cancellation().request();
        assert!(!ctx.should_continue());
    }

    #[test]
    fn finish_progress_pins_uploaded_to_total() {
        let (mut ctx, mut rx) = ctx_with_sizes(&[5, 5]);
        ctx.recompute_progress();
        ctx.advance(3);
        ctx.finish_progress();

        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            last = Some(ev);
        }
        assert_eq!(
            last.unwrap(),
            UploadEvent::Progress {
                uploaded: 10,
                total: 10
            }
        );
    }
}
