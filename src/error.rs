//! Error types for the AIFF container engine.

use thiserror::Error;

/// Errors raised while reading, writing or repairing AIFF files.
#[derive(Error, Debug)]
pub enum AiffError {
    /// Bad signature, bad chunk id, truncated header or a structural
    /// ordering violation.
    #[error("Invalid AIFF file: {0}")]
    InvalidContainer(String),

    /// Output could not be produced; any partial output has been removed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// PCM data could not be read from its source.
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("metadata not from audio file")]
    ForeignMetadata,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiffError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AiffError::InvalidContainer(msg.into())
    }

    pub(crate) fn encoding(msg: impl ToString) -> Self {
        AiffError::Encoding(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AiffError>;
