//! Hugging Face serverless inference provider

use crate::provider::{send_checked, LlmError, LlmProvider, LlmResult};
use crate::types::CompletionRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const HF_API_URL: &str = "https://api-inference.huggingface.co/models";

pub struct HuggingFaceProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HuggingFaceProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: HF_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for HuggingFaceProvider {
    fn name(&self) -> &str { "huggingface" }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        let prompt = request.flattened_prompt();
        let body = HfRequest {
            inputs: prompt.clone(),
            parameters: HfParameters {
                max_new_tokens: 500,
                return_full_text: false,
            },
        };

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), request.model);
        let response = send_checked(
            "huggingface",
            self.client.post(url).bearer_auth(&self.api_key).json(&body),
        )
        .await?;

        let parsed: Vec<HfGeneration> = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))?;

        let text = parsed
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .unwrap_or_default();
        // Some models echo the prompt even with return_full_text=false
        let text = text.strip_prefix(&prompt).unwrap_or(&text).trim().to_string();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse("huggingface: empty generation".into()));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct HfRequest {
    inputs: String,
    parameters: HfParameters,
}

#[derive(Serialize)]
struct HfParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct HfGeneration {
    #[serde(default)]
    generated_text: String,
}
