//! Anthropic Claude API provider with SSE streaming

use crate::provider::{send_checked, LlmError, LlmProvider, LlmResult};
use crate::types::CompletionRequest;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str { "anthropic" }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
            max_tokens: request.max_tokens.unwrap_or(4096),
            stream: true,
            system: Some(request.system.clone()).filter(|s| !s.trim().is_empty()),
        };

        debug!("Anthropic request: model={}", body.model);

        let response = send_checked(
            "anthropic",
            self.client
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body),
        )
        .await?;

        collect_sse_text(response.bytes_stream()).await
    }
}

/// Drain an SSE body, concatenating text deltas until `message_stop`.
async fn collect_sse_text(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send,
) -> LlmResult<String> {
    let stream = parse_sse_stream(bytes_stream);
    tokio::pin!(stream);

    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        match delta? {
            SseEvent::Text(t) => text.push_str(&t),
            SseEvent::Done => break,
        }
    }

    if text.trim().is_empty() {
        return Err(LlmError::InvalidResponse("empty completion".into()));
    }
    Ok(text)
}

enum SseEvent {
    Text(String),
    Done,
}

/// Pop one complete event off the front of `buffer`. Bytes are only decoded
/// once the blank-line terminator has arrived, so a character split across
/// network chunks stays intact.
fn take_event(buffer: &mut Vec<u8>) -> Option<String> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let event: Vec<u8> = buffer.drain(..end + 2).take(end).collect();
    Some(String::from_utf8_lossy(&event).into_owned())
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send,
) -> impl futures::Stream<Item = LlmResult<SseEvent>> + Send {
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();

        tokio::pin!(bytes_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.without_url().to_string()));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(event_str) = take_event(&mut buffer) {
                let mut event_type = String::new();
                let mut event_data = String::new();

                for line in event_str.lines() {
                    if let Some(rest) = line.strip_prefix("event: ") {
                        event_type = rest.to_string();
                    } else if let Some(rest) = line.strip_prefix("data: ") {
                        event_data = rest.to_string();
                    }
                }

                if event_data.is_empty() { continue; }

                match event_type.as_str() {
                    "content_block_delta" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event_data) {
                            if let DeltaType::TextDelta { text } = data.delta {
                                yield Ok(SseEvent::Text(text));
                            }
                        }
                    }
                    "message_delta" => {
                        if let Ok(data) = serde_json::from_str::<MessageDelta>(&event_data) {
                            if let Some(stop_reason) = data.delta.stop_reason {
                                debug!("Message complete: stop_reason={}", stop_reason);
                            }
                        }
                    }
                    "message_stop" => {
                        yield Ok(SseEvent::Done);
                    }
                    "error" => {
                        if let Ok(data) = serde_json::from_str::<ErrorEvent>(&event_data) {
                            if data.error.error_type == "rate_limit_error" {
                                yield Err(LlmError::RateLimited {
                                    retry_after_ms: None,
                                    message: data.error.message,
                                });
                            } else {
                                yield Err(LlmError::StreamError(data.error.message));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    #[allow(dead_code)]
    index: u32,
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send {
        let owned: Vec<Result<bytes::Bytes, reqwest::Error>> = parts
            .iter()
            .map(|p| Ok(bytes::Bytes::from(p.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    #[tokio::test]
    async fn accumulates_text_across_split_chunks() {
        let stream = chunks(&[
            "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Ho\"}}\n\n",
            "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_",
            "delta\",\"text\":\"la\"}}\n\nevent: message_stop\ndata: {}\n\n",
        ]);
        let text = collect_sse_text(stream).await.unwrap();
        assert_eq!(text, "Hola");
    }

    #[tokio::test]
    async fn multibyte_character_split_between_chunks() {
        let event = "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"canción\"}}\n\nevent: message_stop\ndata: {}\n\n";
        let bytes = event.as_bytes();
        // "ó" is 0xC3 0xB3; cut right between the two bytes.
        let cut = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let owned: Vec<Result<bytes::Bytes, reqwest::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(&bytes[..cut])),
            Ok(bytes::Bytes::copy_from_slice(&bytes[cut..])),
        ];
        let text = collect_sse_text(futures::stream::iter(owned)).await.unwrap();
        assert_eq!(text, "canción");
    }

    #[test]
    fn take_event_leaves_partial_tail() {
        let mut buffer = b"data: a\n\ndata: b".to_vec();
        assert_eq!(take_event(&mut buffer).as_deref(), Some("data: a"));
        assert_eq!(buffer, b"data: b");
        assert_eq!(take_event(&mut buffer), None);
    }

    #[tokio::test]
    async fn error_event_becomes_rate_limit() {
        let stream = chunks(&[
            "event: error\ndata: {\"error\":{\"type\":\"rate_limit_error\",\"message\":\"slow\"}}\n\n",
        ]);
        let err = collect_sse_text(stream).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn empty_stream_is_invalid() {
        let stream = chunks(&["event: message_stop\ndata: {}\n\n"]);
        assert!(matches!(
            collect_sse_text(stream).await,
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
