//! Anymind LLM - Vendor adapters behind one provider interface

pub mod anthropic;
pub mod cohere;
pub mod gateway;
pub mod gemini;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use cohere::CohereProvider;
pub use gateway::{ProviderGateway, ProviderStatus};
pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{is_quota_message, retry_after_from_text, LlmError, LlmProvider, LlmResult};
pub use types::*;
