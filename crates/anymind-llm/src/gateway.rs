//! Provider gateway - one `invoke` over every configured vendor
//!
//! Failures never escape as errors: every outcome of `invoke` is either
//! the completion text or a data-only [`ProviderFailure`].

use crate::anthropic::AnthropicProvider;
use crate::cohere::CohereProvider;
use crate::gemini::GeminiProvider;
use crate::huggingface::HuggingFaceProvider;
use crate::ollama::OllamaProvider;
use crate::openai::{default_base_url, OpenAiCompatibleProvider};
use crate::provider::{LlmError, LlmProvider};
use crate::types::CompletionRequest;
use anymind_core::{ApiKind, AppConfig, ProviderConfig, ProviderFailure, ProviderId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Provider entry as shown in status reports.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderStatus {
    pub id: ProviderId,
    pub enabled: bool,
    /// An adapter exists and credentials are present.
    pub configured: bool,
    pub model: String,
    pub cost_tier: String,
}

enum Backend {
    Ready(Arc<dyn LlmProvider>),
    MissingKey,
    NoAdapter,
}

struct GatewayEntry {
    enabled: bool,
    model: String,
    cost_tier: String,
    backend: Backend,
}

pub struct ProviderGateway {
    entries: BTreeMap<ProviderId, GatewayEntry>,
    timeout: Duration,
}

impl Default for ProviderGateway {
    fn default() -> Self { Self::new() }
}

impl ProviderGateway {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Build one adapter per provider entry in the config.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut gateway = Self::new()
            .with_timeout(Duration::from_secs(config.limits.dispatch_timeout_secs));

        for (id, provider) in &config.providers {
            let backend = build_backend(id, config.api_kind(id), provider);
            match &backend {
                Backend::Ready(_) => debug!("Provider {} ready (model {})", id, provider.model),
                Backend::MissingKey if provider.enabled => {
                    warn!("Provider {} is enabled but has no API key", id)
                }
                Backend::NoAdapter if provider.enabled => {
                    warn!("Provider {} is enabled but has no adapter", id)
                }
                _ => {}
            }
            gateway.entries.insert(
                ProviderId::new(id.as_str()),
                GatewayEntry {
                    enabled: provider.enabled,
                    model: provider.model.clone(),
                    cost_tier: provider.cost_tier.clone(),
                    backend,
                },
            );
        }
        gateway
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register (or replace) an enabled provider backed by `provider`.
    pub fn register(&mut self, id: impl Into<ProviderId>, model: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.entries.insert(
            id.into(),
            GatewayEntry {
                enabled: true,
                model: model.into(),
                cost_tier: "free".into(),
                backend: Backend::Ready(provider),
            },
        );
    }

    /// Toggle an entry. Returns false for an unknown id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enabled provider ids, in id order.
    pub fn list_enabled(&self) -> Vec<ProviderId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn list_all(&self) -> Vec<ProviderStatus> {
        self.entries
            .iter()
            .map(|(id, e)| ProviderStatus {
                id: id.clone(),
                enabled: e.enabled,
                configured: matches!(e.backend, Backend::Ready(_)),
                model: e.model.clone(),
                cost_tier: e.cost_tier.clone(),
            })
            .collect()
    }

    pub fn status(&self, id: &str) -> Option<ProviderStatus> {
        self.list_all().into_iter().find(|s| s.id == id)
    }

    /// Ask one provider for a completion, bounded by the gateway timeout.
    pub async fn invoke(&self, id: &str, user: &str, system: &str) -> Result<String, ProviderFailure> {
        let (provider, model) = self.resolve(id).map_err(LlmError::into_failure)?;
        let request = CompletionRequest::new(model, system, user);

        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(text) => {
                debug!(provider = %id, elapsed_ms, chars = text.len(), "Provider answered");
                Ok(text)
            }
            Err(e) => {
                warn!(provider = %id, elapsed_ms, "Provider failed: {}", e);
                Err(e.into_failure())
            }
        }
    }

    fn resolve(&self, id: &str) -> Result<(Arc<dyn LlmProvider>, String), LlmError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| LlmError::UnknownProvider(id.to_string()))?;
        if !entry.enabled {
            return Err(LlmError::Disabled(id.to_string()));
        }
        match &entry.backend {
            Backend::Ready(provider) => Ok((provider.clone(), entry.model.clone())),
            Backend::MissingKey => Err(LlmError::NotConfigured(id.to_string())),
            Backend::NoAdapter => Err(LlmError::NotImplemented(id.to_string())),
        }
    }
}

fn build_backend(id: &str, api: Option<ApiKind>, provider: &ProviderConfig) -> Backend {
    let Some(api) = api else {
        return Backend::NoAdapter;
    };
    let key = provider.api_key.trim().to_string();
    if api.requires_key() && key.is_empty() {
        return Backend::MissingKey;
    }
    let base_url = provider.base_url.clone();

    let adapter: Arc<dyn LlmProvider> = match api {
        ApiKind::OpenaiCompatible => {
            let Some(url) = base_url.or_else(|| default_base_url(id).map(String::from)) else {
                return Backend::NoAdapter;
            };
            Arc::new(OpenAiCompatibleProvider::new(id, key, url))
        }
        ApiKind::Anthropic => {
            let adapter = AnthropicProvider::new(key);
            Arc::new(match base_url {
                Some(url) => adapter.with_base_url(url),
                None => adapter,
            })
        }
        ApiKind::Gemini => {
            let adapter = GeminiProvider::new(key);
            Arc::new(match base_url {
                Some(url) => adapter.with_base_url(url),
                None => adapter,
            })
        }
        ApiKind::Cohere => {
            let adapter = CohereProvider::new(key);
            Arc::new(match base_url {
                Some(url) => adapter.with_base_url(url),
                None => adapter,
            })
        }
        ApiKind::Huggingface => {
            let adapter = HuggingFaceProvider::new(key);
            Arc::new(match base_url {
                Some(url) => adapter.with_base_url(url),
                None => adapter,
            })
        }
        ApiKind::Ollama => Arc::new(match base_url {
            Some(url) => OllamaProvider::new(url),
            None => OllamaProvider::default(),
        }),
    };
    Backend::Ready(adapter)
}
