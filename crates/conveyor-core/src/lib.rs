//! # conveyor-core — protocol-independent upload engine
//!
//! The pieces every transfer task shares, regardless of wire protocol:
//! - `files` — local content access and the pending/completed file lists
//! - `counter` — uploaded/total byte bookkeeping, retry-aware
//! - `events` — async progress + terminal event delivery
//! - `context` — per-attempt task state and cooperative cancellation
//! - `response` — the terminal server payload
//! - `error` — the shared error taxonomy
//! - `task` — the `UploadTask` contract protocol crates implement

pub mod context;
pub mod counter;
pub mod error;
pub mod events;
pub mod files;
pub mod response;
pub mod task;

pub use context::{CancellationFlag, TaskContext};
pub use counter::ByteCounter;
pub use error::{UploadError, UploadResult};
pub use events::{EventSink, UploadEvent};
pub use files::{DiskSource, FileSource, SourceReader, TransferList, UploadFile};
pub use response::ServerResponse;
pub use task::{UploadOutcome, UploadTask};
