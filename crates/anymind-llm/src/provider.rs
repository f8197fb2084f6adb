//! LLM Provider trait

use crate::types::CompletionRequest;
use anymind_core::{FailureKind, ProviderFailure};
use regex::Regex;
use std::sync::OnceLock;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0} is not configured (missing API key)")]
    NotConfigured(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider {0} is disabled")]
    Disabled(String),

    #[error("provider {0} has no adapter implemented")]
    NotImplemented(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: {message}")]
    RateLimited {
        retry_after_ms: Option<u64>,
        message: String,
    },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(reqwest::Error),
}

impl From<reqwest::Error> for LlmError {
    /// Request URLs can carry credentials, so they never reach the message.
    fn from(e: reqwest::Error) -> Self {
        LlmError::NetworkError(e.without_url())
    }
}

impl LlmError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LlmError::NotConfigured(_)
            | LlmError::UnknownProvider(_)
            | LlmError::Disabled(_)
            | LlmError::NotImplemented(_)
            | LlmError::AuthFailed(_) => FailureKind::Configuration,
            LlmError::RateLimited { .. } => FailureKind::Quota,
            LlmError::Timeout(_)
            | LlmError::RequestFailed(_)
            | LlmError::InvalidResponse(_)
            | LlmError::StreamError(_)
            | LlmError::NetworkError(_) => FailureKind::Transport,
        }
    }

    /// Convert into the data-only failure carried by a `ProviderResponse`.
    pub fn into_failure(self) -> ProviderFailure {
        let kind = self.kind();
        let retry_after_secs = match &self {
            LlmError::RateLimited { retry_after_ms, .. } => {
                retry_after_ms.map(|ms| ms.div_ceil(1000))
            }
            _ => None,
        };
        ProviderFailure {
            kind,
            message: self.to_string(),
            retry_after_secs,
        }
    }
}

const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "resource_exhausted",
];

fn retry_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"retry\s+in\s+(\d+\.?\d*)\s*s", r"seconds:\s*(\d+)"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Does an upstream error body read as a rate limit or exhausted quota?
/// Some vendors answer 400 or 403 with a quota message instead of 429.
pub fn is_quota_message(body: &str) -> bool {
    let lowered = body.to_lowercase();
    QUOTA_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Retry hint embedded in an upstream error message, in whole seconds.
pub fn retry_after_from_text(text: &str) -> Option<u64> {
    let lowered = text.to_lowercase();
    retry_patterns().iter().find_map(|re| {
        re.captures(&lowered)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|secs| secs.ceil() as u64)
    })
}

/// Map a non-success HTTP status into an `LlmError`.
///
/// `retry_after` is the parsed `Retry-After` header, in seconds. Only the
/// status and the response body are inspected, never the request URL.
pub(crate) fn status_error(
    provider: &str,
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: String,
) -> LlmError {
    let code = status.as_u16();
    if code == 429 || (code != 401 && is_quota_message(&body)) {
        let secs = retry_after.or_else(|| retry_after_from_text(&body));
        return LlmError::RateLimited {
            retry_after_ms: secs.map(|s| s * 1000),
            message: format!("{} {}: {}", provider, code, body),
        };
    }
    match code {
        401 | 403 => LlmError::AuthFailed(format!("{}: {}", provider, body)),
        _ => LlmError::RequestFailed(format!("{} {}: {}", provider, status, body)),
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|s| s.ceil() as u64)
}

/// Send a prepared request and hand back the body of a successful response.
pub(crate) async fn send_checked(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> LlmResult<reqwest::Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after_secs(response.headers());
    let body = response.text().await.unwrap_or_default();
    tracing::error!("{} error {}: {}", provider, status, body);
    Err(status_error(provider, status, retry_after, body))
}

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a single text completion for one user turn.
    async fn complete(&self, request: CompletionRequest) -> LlmResult<String>;
}
