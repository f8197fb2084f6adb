//! LLM request types

use serde::{Deserialize, Serialize};

/// One single-turn completion: a system prompt plus the user's text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            system: String::new(),
            user: String::new(),
            max_tokens: Some(4096),
            temperature: Some(0.7),
        }
    }
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Plain-prompt rendering for completion-style APIs without a system role.
    pub fn flattened_prompt(&self) -> String {
        if self.system.trim().is_empty() {
            format!("User: {}\n\nAssistant:", self.user)
        } else {
            format!("{}\n\nUser: {}\n\nAssistant:", self.system, self.user)
        }
    }
}

/// Chat message in the OpenAI-style `{role, content}` shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// System + user messages for a request, skipping an empty system prompt.
pub fn chat_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.trim().is_empty() {
        messages.push(ChatMessage::system(request.system.clone()));
    }
    messages.push(ChatMessage::user(request.user.clone()));
    messages
}
