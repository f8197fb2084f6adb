//! Core types for Anymind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Provider identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ProviderId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ProviderId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Failure classes a provider call can end in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing credentials, unknown or disabled provider, no adapter.
    Configuration,
    /// Network trouble, timeouts, upstream errors. Retryable next round.
    Transport,
    /// Rate limit or exhausted quota. Retryable after a backoff window.
    Quota,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Configuration => write!(f, "configuration"),
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Quota => write!(f, "quota"),
        }
    }
}

/// A provider call that did not produce text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Backoff hint reported by the upstream, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Configuration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn quota(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self {
            kind: FailureKind::Quota,
            message: message.into(),
            retry_after_secs,
        }
    }
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.message)
    }
}

/// Outcome of one dispatch inside a synthesis round.
#[derive(Clone, Debug)]
pub struct ProviderResponse {
    pub provider: ProviderId,
    pub outcome: std::result::Result<String, ProviderFailure>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderResponse {
    pub fn new(provider: ProviderId, outcome: std::result::Result<String, ProviderFailure>) -> Self {
        Self {
            provider,
            outcome,
            timestamp: Utc::now(),
        }
    }

    pub fn ok(provider: impl Into<ProviderId>, text: impl Into<String>) -> Self {
        Self::new(provider.into(), Ok(text.into()))
    }

    pub fn failed(provider: impl Into<ProviderId>, failure: ProviderFailure) -> Self {
        Self::new(provider.into(), Err(failure))
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn text(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn failure(&self) -> Option<&ProviderFailure> {
        self.outcome.as_ref().err()
    }
}
