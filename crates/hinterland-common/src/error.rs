//! Error types shared across Hinterland crates.

use thiserror::Error;

/// Errors raised when parsing or validating coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Key string is not of the form `"{x},{y}"`
    #[error("Malformed chunk key: {0:?}")]
    MalformedKey(String),

    /// Key is not aligned to the chunk span
    #[error("Chunk key {key} is not aligned to span {span}")]
    Misaligned {
        /// Offending key
        key: String,
        /// Chunk span in world pixels
        span: i64,
    },
}

/// Result type alias for coordinate operations.
pub type CoordResult<T> = Result<T, CoordError>;
