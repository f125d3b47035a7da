//! Trace-level and navigation errors
//!
//! Framing, I/O and descriptor problems are fatal for a validation run and
//! carry enough context (offsets, sizes, likely cause) to diagnose a broken
//! trace without a hex editor. Per-message decode failures are not fatal;
//! they surface as [`TraceError::Decode`] only on direct reads and are
//! otherwise kept inside the message cache.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening, indexing or reading a trace
#[derive(Debug, Error)]
pub enum TraceError {
    /// Underlying file could not be opened, read or seeked
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record claims more bytes than the file holds
    #[error("Truncated record at offset {offset}: need {need} bytes, {available} available (cause: {likely_cause})")]
    TruncatedRecord {
        offset: u64,
        need: u64,
        available: u64,
        likely_cause: String,
    },

    /// Offsets violate the monotonicity/minimum-distance invariants
    #[error("Invalid framing at offset {offset}: {reason}")]
    InvalidFraming { offset: u64, reason: String },

    /// Framing name not recognised
    #[error("Unknown framing '{0}': expected 'length' or 'separator'")]
    UnknownFraming(String),

    /// XZ/LZMA stream could not be decoded
    #[error("Failed to decompress {path}: {reason}")]
    Decompression { path: PathBuf, reason: String },

    /// Descriptor set missing or malformed
    #[error("Invalid descriptor set {path}: {reason}")]
    Descriptor { path: PathBuf, reason: String },

    /// Requested top-level type is not part of the descriptor pool
    #[error("Message type '{name}' not found in descriptor pool (known top-level candidates: {known})")]
    UnknownMessageType { name: String, known: String },

    /// Index beyond the number of records in the trace
    #[error("Message index {index} out of range (trace has {count} messages)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Single message could not be decoded against the schema
    #[error("Failed to decode message {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: prost::DecodeError,
    },
}

impl TraceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a TruncatedRecord error with a guess at what went wrong
    pub fn truncated_record(offset: u64, need: u64, available: u64) -> Self {
        let likely_cause = if available == 0 {
            "trace ends inside a length prefix"
        } else if need > available.saturating_mul(16) {
            "corrupted length prefix or wrong framing (separator trace read as length-prefixed?)"
        } else {
            "trace truncated while recording"
        };

        Self::TruncatedRecord {
            offset,
            need,
            available,
            likely_cause: likely_cause.to_string(),
        }
    }

    pub fn invalid_framing(offset: u64, reason: impl Into<String>) -> Self {
        Self::InvalidFraming {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type for trace operations
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors raised by [`Navigator`](crate::Navigator) path resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigatorError {
    #[error("Path '{path}' escapes the root message at '{at}'")]
    PathEscapesRoot { path: String, at: String },

    #[error("Unknown field '{field}' on message '{message}'")]
    UnknownField { field: String, message: String },

    #[error("Cannot traverse into '{at}': not a message")]
    NotAMessage { at: String },
}
