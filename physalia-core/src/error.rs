//! Structured error types for the Physalia ecosystem.

use thiserror::Error;

/// Unified error type for all Physalia operations.
///
/// The binary container codecs (BCF, BGZF) report through the dedicated
/// variants below so callers can distinguish a bad magic number from a
/// record-level corruption without parsing message strings.
#[derive(Debug, Error)]
pub enum PhysaliaError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed text input)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Stream does not begin with the expected magic bytes
    #[error("invalid magic: {0}")]
    InvalidMagic(String),

    /// File version outside the supported range
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// Structurally invalid or self-contradictory header
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Record-level structural corruption (truncation, impossible counts)
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Unknown type tag, reserved-range value, or bad size word
    #[error("invalid typing: {0}")]
    InvalidTyping(String),

    /// More values observed than the declared field cardinality allows
    #[error("cardinality violation: {0}")]
    CardinalityViolation(String),

    /// Value shape does not match the declared field type
    #[error("incompatible value: {0}")]
    IncompatibleValue(String),
}

/// Convenience alias used throughout the Physalia ecosystem.
pub type Result<T> = std::result::Result<T, PhysaliaError>;
