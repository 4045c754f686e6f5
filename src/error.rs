//! Error types for the codec and for graph construction.

use std::io;

use thiserror::Error;

use crate::graph::ObjectId;

/// Result alias used by every codec entry point.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Failures raised while packing or unpacking a stream.
///
/// None of these are recoverable for the stream that produced them: once an
/// error is returned the owning session is aborted and the caller must
/// discard whatever was written or read so far.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying sink or source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A tag, discriminator, or decoded payload did not match what the reader expected.
    #[error("stream corruption: {0}")]
    StreamCorruption(String),
    /// A reference record named a slot that has not been defined yet.
    #[error("dangling {kind} reference: slot {slot} with {defined} defined")]
    DanglingReference {
        /// Registry the slot was looked up in.
        kind: &'static str,
        /// Slot id read from the stream.
        slot: i64,
        /// Number of objects defined so far in that registry.
        defined: usize,
    },
    /// The source ended before a fixed-width or length-prefixed field was complete.
    #[error("truncated stream: {0}")]
    TruncatedStream(String),
    /// A value cannot be represented on the wire.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
    /// The stream header names a format revision this build does not speak.
    #[error("unsupported stream format version {found}")]
    UnsupportedVersion {
        /// Version byte found in the header.
        found: u8,
    },
    /// Nested definitions went deeper than the session allows.
    #[error("nesting depth limit of {limit} exceeded")]
    DepthLimitExceeded {
        /// Configured limit.
        limit: usize,
    },
    /// A previous call on this session failed; the session cannot be used again.
    #[error("session aborted by an earlier error")]
    SessionAborted,
    /// Session options could not be parsed.
    #[error("invalid session options: {0}")]
    Config(#[from] toml::de::Error),
}

impl CodecError {
    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        CodecError::StreamCorruption(msg.into())
    }

    pub(crate) fn truncated(msg: impl Into<String>) -> Self {
        CodecError::TruncatedStream(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        CodecError::UnsupportedValue(msg.into())
    }
}

/// Failures raised while building or evaluating expression graphs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A constructor argument violates the type's invariants.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A sparsity pattern is internally inconsistent.
    #[error("invalid sparsity pattern: {0}")]
    InvalidSparsity(String),
    /// An output depends on a symbol that is not one of the function inputs.
    #[error("free symbol '{0}' is not a function input")]
    FreeSymbol(String),
    /// The number of supplied values does not match what was declared.
    #[error("{what}: expected {expected}, got {found}")]
    ArityMismatch {
        /// What was being counted.
        what: &'static str,
        /// Declared count.
        expected: usize,
        /// Supplied count.
        found: usize,
    },
    /// Evaluation reached a node whose value was never computed.
    #[error("node {0} has no value")]
    Unbound(ObjectId),
}
