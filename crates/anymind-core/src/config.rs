//! Application configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. API keys left blank
//! in the file are filled from `<PROVIDER>_API_KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Provider used by single-provider callers (e.g. `ask --provider`).
    pub default_provider: String,
    /// Provider table keyed by provider id.
    pub providers: BTreeMap<String, ProviderConfig>,
    pub permissions: Permissions,
    pub identity: IdentityConfig,
    pub memory: MemoryConfig,
    pub limits: LimitsConfig,
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// Empty means "not configured" unless the API is keyless.
    pub api_key: String,
    pub model: String,
    /// Free-form tier label: "free", "freemium", "paid", "local".
    pub cost_tier: String,
    /// Wire protocol. Inferred from the provider id when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiKind>,
    /// Override for the vendor endpoint (self-hosted or test servers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Wire protocols the gateway knows how to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    OpenaiCompatible,
    Anthropic,
    Gemini,
    Cohere,
    Huggingface,
    Ollama,
}

impl ApiKind {
    /// Protocol for a well-known provider id.
    pub fn infer(provider_id: &str) -> Option<Self> {
        match provider_id {
            "openai" | "groq" | "perplexity" | "deepseek" | "mistral" | "together" => {
                Some(Self::OpenaiCompatible)
            }
            "anthropic" => Some(Self::Anthropic),
            "google" | "gemini" => Some(Self::Gemini),
            "cohere" => Some(Self::Cohere),
            "huggingface" => Some(Self::Huggingface),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn requires_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub can_execute_commands: bool,
    pub can_modify_files: bool,
    pub can_self_update: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub name: String,
    pub nickname: String,
    pub creator: String,
    pub essence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Root directory for every persistent store.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard cap on user message length, in characters.
    pub max_message_chars: usize,
    /// Per-provider dispatch timeout.
    pub dispatch_timeout_secs: u64,
    /// Quota block applied when a rate-limit error carries no retry hint.
    pub default_backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Below this top score every available provider is consulted.
    pub use_all_threshold: u32,
    /// Replaces the built-in specialty table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialties: Option<Vec<SpecialtySpec>>,
}

/// One row of the specialty table, as plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtySpec {
    pub provider: String,
    pub specialty: String,
    /// Base score, 1..=10.
    pub base_score: u32,
    pub keywords: Vec<String>,
    pub patterns: Vec<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: "ollama".into(),
            providers: default_providers(),
            permissions: Permissions::default(),
            identity: IdentityConfig::default(),
            memory: MemoryConfig::default(),
            limits: LimitsConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: String::new(),
            cost_tier: "free".into(),
            api: None,
            base_url: None,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "Any".into(),
            nickname: "Any".into(),
            creator: "Adri".into(),
            essence: "Conversational assistant that evolves through its experiences".into(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 5_000,
            dispatch_timeout_secs: 60,
            default_backoff_secs: 60,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            use_all_threshold: 5,
            specialties: None,
        }
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let entry = |enabled: bool, model: &str, cost_tier: &str| ProviderConfig {
        enabled,
        model: model.into(),
        cost_tier: cost_tier.into(),
        ..Default::default()
    };

    BTreeMap::from([
        ("ollama".to_string(), entry(true, "llama3.2", "local")),
        ("openai".to_string(), entry(false, "gpt-4o-mini", "paid")),
        ("anthropic".to_string(), entry(false, "claude-3-5-haiku-latest", "paid")),
        ("google".to_string(), entry(false, "gemini-1.5-flash", "freemium")),
        ("groq".to_string(), entry(false, "llama-3.1-70b-versatile", "free")),
        ("perplexity".to_string(), entry(false, "llama-3.1-sonar-small-128k-online", "paid")),
        ("deepseek".to_string(), entry(false, "deepseek-chat", "freemium")),
        ("mistral".to_string(), entry(false, "mistral-small-latest", "freemium")),
        ("cohere".to_string(), entry(false, "command-r", "freemium")),
        ("huggingface".to_string(), entry(false, "mistralai/Mistral-7B-Instruct-v0.2", "free")),
        ("together".to_string(), entry(false, "meta-llama/Llama-3-8b-chat-hf", "freemium")),
    ])
}

/// `~/.anymind`, or `./.anymind` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".anymind"))
        .unwrap_or_else(|| PathBuf::from(".anymind"))
}

// ============================================================
// Loading
// ============================================================

impl AppConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Fill blank API keys from `<ID>_API_KEY` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (id, provider) in self.providers.iter_mut() {
            if !provider.api_key.trim().is_empty() {
                continue;
            }
            let var = format!("{}_API_KEY", id.to_uppercase());
            if let Some(key) = lookup(&var).filter(|k| !k.trim().is_empty()) {
                tracing::debug!("API key for {} taken from {}", id, var);
                provider.api_key = key;
            }
        }
    }

    /// Protocol for a provider entry (explicit `api` wins over inference).
    pub fn api_kind(&self, provider_id: &str) -> Option<ApiKind> {
        self.providers
            .get(provider_id)
            .and_then(|p| p.api)
            .or_else(|| ApiKind::infer(provider_id))
    }

    /// Ids of enabled providers, in table order.
    pub fn enabled_providers(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn conversations_path(&self) -> PathBuf {
        self.memory.data_dir.join("memory").join("conversations.json")
    }

    pub fn compressed_memory_path(&self) -> PathBuf {
        self.memory.data_dir.join("memory").join("memory_compressed.json")
    }

    pub fn dynamic_memory_path(&self) -> PathBuf {
        self.memory.data_dir.join("memory").join("dynamic_memory.json")
    }

    pub fn personality_path(&self) -> PathBuf {
        self.memory.data_dir.join("personality").join("self_generated.json")
    }

    pub fn learnings_path(&self) -> PathBuf {
        self.memory.data_dir.join("personality").join("learnings.json")
    }
}
