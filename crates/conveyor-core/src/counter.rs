//! Uploaded/total byte bookkeeping for one task.
//!
//! `uploaded` never runs backwards within an attempt, and `recompute`
//! restores it from the completed-file sizes at the start of every
//! attempt so a retried task resumes progress instead of restarting
//! from zero.

use crate::files::TransferList;

#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCounter {
    uploaded: u64,
    total: u64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Recompute both figures from the current pending/completed
    /// partition. Called at the start of every attempt: the pending set
    /// shrinks across retries, so neither value can be carried over.
    pub fn recompute(&mut self, files: &TransferList) {
        self.uploaded = files.completed_bytes();
        self.total = self.uploaded + files.pending_bytes();
    }

    /// Advance `uploaded` by `bytes`.
    pub fn add(&mut self, bytes: u64) {
        self.uploaded += bytes;
        debug_assert!(
            self.uploaded <= self.total,
            "uploaded {} exceeds total {}",
            self.uploaded,
            self.total
        );
    }

    /// Pin `uploaded` to an exact figure (body-writer reset, final
    /// uploaded == total correction).
    pub fn set_uploaded(&mut self, bytes: u64) {
        self.uploaded = bytes;
    }

    /// Replace `total` (HTTP tasks use the exact body length rather
    /// than the file-size sum).
    pub fn set_total(&mut self, bytes: u64) {
        self.total = bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{FileSource, SourceReader, UploadFile};
    use async_trait::async_trait;
    use std::sync::Arc;

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

    fn list(sizes: &[u64]) -> TransferList {
        TransferList::new(
            sizes
                .iter()
                .map(|s| UploadFile::new(Arc::new(FixedSource(*s))))
                .collect(),
        )
    }

    #[test]
    fn total_is_the_file_size_sum_before_any_byte_is_sent() {
        let files = list(&[100, 200, 300]);
        let mut counter = ByteCounter::new();
        counter.recompute(&files);
        assert_eq!(counter.uploaded(), 0);
        assert_eq!(counter.total(), 600);
    }

    #[test]
    fn recompute_resumes_from_completed_bytes() {
        let mut files = list(&[100, 200, 300]);
        files.complete_front();
        files.complete_front();

        let mut counter = ByteCounter::new();
        counter.recompute(&files);
        assert_eq!(counter.uploaded(), 300);
        assert_eq!(counter.total(), 600);
    }

    #[test]
    fn add_accumulates() {
        let files = list(&[10]);
        let mut counter = ByteCounter::new();
        counter.recompute(&files);
        counter.add(4);
        counter.add(6);
        assert_eq!(counter.uploaded(), 10);
        assert_eq!(counter.total(), 10);
    }
}
