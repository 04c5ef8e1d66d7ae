//! # FTP/FTPS upload driver
//!
//! Implements the FTP protocol (RFC 959) as far as uploading needs it,
//! with extensions:
//! - **RFC 2228 / 4217** — AUTH TLS / FTPS (Explicit & Implicit)
//! - **RFC 2428** — EPSV (extended passive mode)
//!
//! Architecture:
//! - `types` — configuration, response type, property keys
//! - `error` — categorised FTP error
//! - `protocol` — low-level command/response codec
//! - `connection` — TCP + TLS transport for the control channel
//! - `tls` — TLS upgrade and FTPS configuration
//! - `data` — passive data-channel setup and reply parsing
//! - `paths` — remote file-name and directory-segment resolution
//! - `session` — the protocol driver: one control connection per
//!   attempt, from connect to teardown
//! - `task` — the upload orchestrator built on `session`

pub mod connection;
pub mod data;
pub mod error;
pub mod paths;
pub mod protocol;
pub mod session;
pub mod task;
pub mod tls;
pub mod types;
