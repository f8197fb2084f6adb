//! Error types for Anymind

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing credentials or an unusable provider entry. Not retryable.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {provider} - {message}")]
    Transport { provider: String, message: String },

    #[error("quota exceeded: {provider} (retry after {retry_after_secs}s)")]
    Quota {
        provider: String,
        retry_after_secs: u64,
    },

    /// Input rejected before any provider work began.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no provider available: {0}")]
    AllProvidersUnavailable(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory(message.into())
    }

    /// Lift a provider failure into the error taxonomy.
    pub fn from_failure(provider: &crate::ProviderId, failure: &crate::ProviderFailure) -> Self {
        match failure.kind {
            crate::FailureKind::Configuration => {
                Self::Configuration(format!("{}: {}", provider, failure.message))
            }
            crate::FailureKind::Transport => Self::transport(provider.as_str(), &failure.message),
            crate::FailureKind::Quota => Self::Quota {
                provider: provider.to_string(),
                retry_after_secs: failure.retry_after_secs.unwrap_or(0),
            },
        }
    }
}
