//! Ollama local model server provider (no API key)

use crate::provider::{send_checked, LlmError, LlmProvider, LlmResult};
use crate::types::CompletionRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OLLAMA_API_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl Default for OllamaProvider {
    fn default() -> Self { Self::new(OLLAMA_API_URL) }
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str { "ollama" }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        let body = GenerateRequest {
            model: request.model.clone(),
            prompt: request.flattened_prompt(),
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = send_checked("ollama", self.client.post(url).json(&body))
            .await
            .map_err(|e| match e {
                LlmError::NetworkError(inner) if inner.is_connect() => LlmError::RequestFailed(
                    "ollama is not running (start it with `ollama serve`)".into(),
                ),
                other => other,
            })?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(LlmError::InvalidResponse("ollama: empty response".into()));
        }
        Ok(parsed.response)
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
