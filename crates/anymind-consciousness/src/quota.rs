//! Quota blocking
//!
//! A provider that reports a rate limit or an exhausted quota is skipped
//! until its retry window passes. Any success unblocks it immediately.
//! Failures that are not rate limits never block.

use anymind_core::{FailureKind, ProviderFailure, ProviderId, ProviderResponse};
use anymind_llm::retry_after_from_text;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{info, warn};

/// Does this failure mean "come back later"?
///
/// Only the structured kind counts. Adapters read the upstream status and
/// body to decide on `Quota`; transport and configuration messages may
/// quote URLs or unrelated limits and are never scanned.
pub fn is_rate_limit(failure: &ProviderFailure) -> bool {
    failure.kind == FailureKind::Quota
}

pub struct QuotaTracker {
    blocked: Mutex<BTreeMap<ProviderId, DateTime<Utc>>>,
    default_backoff: Duration,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(60)
    }
}

impl QuotaTracker {
    pub fn new(default_backoff_secs: u64) -> Self {
        Self {
            blocked: Mutex::new(BTreeMap::new()),
            default_backoff: Duration::seconds(default_backoff_secs as i64),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ProviderId, DateTime<Utc>>> {
        self.blocked.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block `id` until `until`.
    pub fn block_until(&self, id: &ProviderId, until: DateTime<Utc>) {
        self.lock().insert(id.clone(), until);
    }

    pub fn clear(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn is_blocked(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.lock().get(id).is_some_and(|until| *until > now)
    }

    /// Drop every block whose window has passed; returns the freed ids.
    pub fn release_expired(&self, now: DateTime<Utc>) -> Vec<ProviderId> {
        let mut blocked = self.lock();
        let expired: Vec<ProviderId> = blocked
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            blocked.remove(id);
            info!("{} available again", id);
        }
        expired
    }

    /// Currently blocked providers and when each block ends.
    pub fn blocked(&self, now: DateTime<Utc>) -> Vec<(ProviderId, DateTime<Utc>)> {
        self.lock()
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(id, until)| (id.clone(), *until))
            .collect()
    }

    /// `candidates` minus everything blocked at `now`, order kept.
    pub fn filter_available(&self, candidates: &[ProviderId], now: DateTime<Utc>) -> Vec<ProviderId> {
        let blocked = self.lock();
        candidates
            .iter()
            .filter(|id| blocked.get(id.as_str()).map_or(true, |until| *until <= now))
            .cloned()
            .collect()
    }

    /// Fold one dispatch outcome in. Returns the block end when this
    /// outcome blocked the provider.
    pub fn record(&self, response: &ProviderResponse, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &response.outcome {
            Ok(_) => {
                if self.clear(response.provider.as_str()) {
                    info!("{} available again", response.provider);
                }
                None
            }
            Err(failure) if is_rate_limit(failure) => {
                let secs = failure
                    .retry_after_secs
                    .or_else(|| retry_after_from_text(&failure.message));
                let backoff = secs
                    .map(|s| Duration::seconds(s as i64))
                    .unwrap_or(self.default_backoff);
                let until = now + backoff;
                self.block_until(&response.provider, until);
                warn!(
                    provider = %response.provider,
                    backoff_secs = backoff.num_seconds(),
                    "Quota exhausted, blocking provider"
                );
                Some(until)
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn rate_limit_detection_reads_only_the_kind() {
        assert!(is_rate_limit(&ProviderFailure::quota("slow down", None)));
        assert!(!is_rate_limit(&ProviderFailure::transport("connection refused")));
        assert!(!is_rate_limit(&ProviderFailure::transport(
            "request failed: groq 400 Bad Request: maximum context length limit"
        )));
        assert!(!is_rate_limit(&ProviderFailure::configuration("403 invalid key")));
    }

    #[test]
    fn transport_failure_quoting_an_endpoint_does_not_block() {
        let tracker = QuotaTracker::new(60);
        let failure = ProviderFailure::transport(
            "network error: error sending request for url (http://127.0.0.1:1/models/gemini-pro:generateContent)",
        );
        let response = ProviderResponse::failed("google", failure);
        assert!(tracker.record(&response, now()).is_none());
        assert!(!tracker.is_blocked("google", now()));
    }

    #[test]
    fn quota_text_hint_used_when_no_structured_hint() {
        let tracker = QuotaTracker::new(60);
        let response = ProviderResponse::failed("google", ProviderFailure::quota("retry in 9s", None));
        assert_eq!(tracker.record(&response, now()), Some(now() + Duration::seconds(9)));
    }

    #[test]
    fn structured_hint_beats_text_and_default() {
        let tracker = QuotaTracker::new(60);
        let response = ProviderResponse::failed("groq", ProviderFailure::quota("retry in 5s", Some(30)));
        let until = tracker.record(&response, now()).unwrap();
        assert_eq!(until, now() + Duration::seconds(30));

        let response = ProviderResponse::failed("google", ProviderFailure::quota("quota", None));
        let until = tracker.record(&response, now()).unwrap();
        assert_eq!(until, now() + Duration::seconds(60));
    }

    #[test]
    fn success_unblocks_and_plain_failure_does_not_block() {
        let tracker = QuotaTracker::new(60);
        tracker.block_until(&ProviderId::new("groq"), now() + Duration::seconds(100));
        assert!(tracker.is_blocked("groq", now()));

        tracker.record(&ProviderResponse::ok("groq", "hola"), now());
        assert!(!tracker.is_blocked("groq", now()));

        let down = ProviderResponse::failed("ollama", ProviderFailure::transport("connection refused"));
        assert!(tracker.record(&down, now()).is_none());
        assert!(!tracker.is_blocked("ollama", now()));
    }

    #[test]
    fn expired_blocks_are_released() {
        let tracker = QuotaTracker::new(60);
        tracker.block_until(&ProviderId::new("a"), now() + Duration::seconds(10));
        tracker.block_until(&ProviderId::new("b"), now() + Duration::seconds(100));

        let later = now() + Duration::seconds(20);
        assert_eq!(tracker.release_expired(later), vec![ProviderId::new("a")]);
        assert_eq!(tracker.blocked(later).len(), 1);

        let ids = vec![ProviderId::new("a"), ProviderId::new("b"), ProviderId::new("c")];
        assert_eq!(
            tracker.filter_available(&ids, later),
            vec![ProviderId::new("a"), ProviderId::new("c")]
        );
    }
}
