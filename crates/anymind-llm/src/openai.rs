//! OpenAI-compatible chat completions provider
//!
//! One adapter covers every vendor that speaks `/chat/completions`:
//! OpenAI, Groq, Perplexity, DeepSeek, Mistral, Together.

use crate::provider::{send_checked, LlmError, LlmProvider, LlmResult};
use crate::types::{chat_messages, ChatMessage, CompletionRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct OpenAiCompatibleProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Adapter for a well-known vendor id with its public endpoint.
    pub fn for_vendor(name: &str, api_key: impl Into<String>) -> Option<Self> {
        default_base_url(name).map(|url| Self::new(name, api_key, url))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Public endpoint for vendors speaking the OpenAI wire format.
pub fn default_base_url(vendor: &str) -> Option<&'static str> {
    match vendor {
        "openai" => Some("https://api.openai.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "perplexity" => Some("https://api.perplexity.ai"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        _ => None,
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str { &self.name }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: chat_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("{} request: model={}", self.name, body.model);

        let response = send_checked(
            &self.name,
            self.client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse(format!("{}: no choices", self.name)))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
