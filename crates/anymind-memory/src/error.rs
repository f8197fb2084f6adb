//! Memory store errors

use thiserror::Error;

pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("invalid memory input: {0}")]
    Invalid(String),

    #[error("refusing to clear all memories without confirmation")]
    ConfirmationRequired,
}

impl MemoryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<MemoryError> for anymind_core::Error {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Io(io) => anymind_core::Error::IoError(io),
            MemoryError::Json(json) => anymind_core::Error::JsonError(json),
            MemoryError::Invalid(msg) => anymind_core::Error::Validation(msg),
            other => anymind_core::Error::memory(other.to_string()),
        }
    }
}
