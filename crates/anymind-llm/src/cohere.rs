//! Cohere v2 chat provider

use crate::provider::{send_checked, LlmError, LlmProvider, LlmResult};
use crate::types::{chat_messages, ChatMessage, CompletionRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const COHERE_API_URL: &str = "https://api.cohere.com/v2/chat";

pub struct CohereProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl CohereProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: COHERE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for CohereProvider {
    fn name(&self) -> &str { "cohere" }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        let body = CohereRequest {
            model: request.model.clone(),
            messages: chat_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = send_checked(
            "cohere",
            self.client
                .post(&self.base_url)
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let parsed: CohereResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))?;

        let text: String = parsed
            .message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse("cohere: empty message".into()));
        }
        Ok(text.trim().to_string())
    }
}

#[derive(Serialize)]
struct CohereRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CohereResponse {
    message: CohereMessage,
}

#[derive(Deserialize)]
struct CohereMessage {
    #[serde(default)]
    content: Vec<CohereBlock>,
}

#[derive(Deserialize)]
struct CohereBlock {
    text: Option<String>,
}
