//! Domain-specific error types for the scriptcast protocol.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the scriptcast protocol.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known frame kind.
    #[error("unknown frame kind: {0:#x}")]
    UnknownFrameKind(u8),

    /// A frame violated protocol rules (order, missing payload, ...).
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Frame Errors ─────────────────────────────────────────────
    /// The payload exceeds the configured maximum receive size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A byte region ended before the declared frame did.
    #[error("truncated frame: need {need} bytes, have {have}")]
    TruncatedFrame { need: usize, have: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// The peer closed the connection before the exchange finished.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Screen / Delta Errors ────────────────────────────────────
    /// An encoded delta run falls outside the screen buffer.
    #[error("delta run out of bounds: offset {offset} + len {len} > {size}")]
    DeltaOutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Execution Errors ─────────────────────────────────────────
    /// Archive extraction or inspection failed.
    #[error("archive error: {0}")]
    Archive(String),

    /// The script runtime reported a failure.
    #[error("script execution failed: {0}")]
    Script(String),

    /// Artifact deletion still failing after the retry bound.
    #[error("cleanup failed for {path} after {attempts} attempts")]
    Cleanup { path: String, attempts: u32 },

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for CastError {
    fn from(s: String) -> Self {
        CastError::Other(s)
    }
}

impl From<&str> for CastError {
    fn from(s: &str) -> Self {
        CastError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}
