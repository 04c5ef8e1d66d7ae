//! Local file access and the pending/completed bookkeeping.
//!
//! `FileSource` is the opaque accessor for a file's bytes; `UploadFile`
//! couples a source with the protocol-specific string properties the
//! task needs (remote path, permissions, content type, ...).
//!
//! `TransferList` keeps two explicit ordered sequences — pending and
//! completed — with a single move-on-success operation, so no code ever
//! mutates a list it is iterating.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncRead;

/// Byte stream returned by [`FileSource::open`].
pub type SourceReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Opaque accessor for a local file's content.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// The local file name (no directory components).
    fn name(&self) -> &str;

    /// Content size in bytes.
    fn size(&self) -> u64;

    /// Open a fresh stream over the content, positioned at the start.
    async fn open(&self) -> std::io::Result<SourceReader>;
}

/// A [`FileSource`] backed by a file on disk.
///
/// Size and name are captured when the source is probed, so `size()` is
/// cheap and stable for the task's lifetime.
pub struct DiskSource {
    path: PathBuf,
    name: String,
    size: u64,
}

impl DiskSource {
    /// Stat `path` and capture its name and size.
    pub async fn probe(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path,
            name,
            size: meta.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileSource for DiskSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self) -> std::io::Result<SourceReader> {
        let file = fs::File::open(&self.path).await?;
        Ok(Box::pin(file))
    }
}

/// One file to upload: a content source, the protocol-specific
/// properties, and the transferred flag.
///
/// The flag is set exactly once, by [`TransferList`], after a confirmed
/// successful protocol-level write of the file.
#[derive(Clone)]
pub struct UploadFile {
    source: Arc<dyn FileSource>,
    properties: HashMap<String, String>,
    transferred: bool,
}

impl UploadFile {
    pub fn new(source: Arc<dyn FileSource>) -> Self {
        Self {
            source,
            properties: HashMap::new(),
            transferred: false,
        }
    }

    /// Probe a file on disk and wrap it.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(Arc::new(DiskSource::probe(path).await?)))
    }

    /// Attach a protocol-specific property (builder style).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn source(&self) -> &dyn FileSource {
        self.source.as_ref()
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn size(&self) -> u64 {
        self.source.size()
    }

    pub fn is_transferred(&self) -> bool {
        self.transferred
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name())
            .field("size", &self.size())
            .field("transferred", &self.transferred)
            .finish()
    }
}

/// The pending/completed partition of a task's file set.
///
/// Invariant: every file handed to [`TransferList::new`] is in exactly
/// one of the two lists at all times, and only ever moves
/// pending → completed.
pub struct TransferList {
    pending: std::collections::VecDeque<UploadFile>,
    completed: Vec<UploadFile>,
}

impl TransferList {
    /// Partition `files`, honouring transferred flags already set by a
    /// previous attempt.
    pub fn new(files: Vec<UploadFile>) -> Self {
        let mut pending = std::collections::VecDeque::new();
        let mut completed = Vec::new();
        for file in files {
            if file.is_transferred() {
                completed.push(file);
            } else {
                pending.push_back(file);
            }
        }
        Self { pending, completed }
    }

    pub fn pending(&self) -> impl Iterator<Item = &UploadFile> {
        self.pending.iter()
    }

    pub fn completed(&self) -> &[UploadFile] {
        &self.completed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of the next file to process, if any.
    ///
    /// Returns a clone (sources are shared via `Arc`) so callers can
    /// work on the file while still holding mutable access to the rest
    /// of the task state.
    pub fn next_pending(&self) -> Option<UploadFile> {
        self.pending.front().cloned()
    }

    /// Move the front pending file to the completed list, setting its
    /// transferred flag. The move-on-success operation.
    pub fn complete_front(&mut self) {
        if let Some(mut file) = self.pending.pop_front() {
            file.transferred = true;
            self.completed.push(file);
        }
    }

    /// Mark every pending file transferred at once (single-request
    /// protocols confirm the whole set together).
    pub fn complete_all(&mut self) {
        while !self.pending.is_empty() {
            self.complete_front();
        }
    }

    /// Byte sum of the completed files.
    pub fn completed_bytes(&self) -> u64 {
        self.completed.iter().map(|f| f.size()).sum()
    }

    /// Byte sum of the pending files.
    pub fn pending_bytes(&self) -> u64 {
        self.pending.iter().map(|f| f.size()).sum()
    }
}
