//! Error types for surfel tree construction and fragment I/O

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Too many primitives for one tree: {count} exceeds the limit of {limit}")]
    TooManyPrimitives { count: usize, limit: usize },

    #[error("Too many nodes for one tree: {count} exceeds the limit of {limit}")]
    TooManyNodes { count: usize, limit: usize },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}
