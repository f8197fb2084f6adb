//! Tests for anymind-llm: vendor adapters over HTTP, gateway failure taxonomy

use anymind_core::{AppConfig, FailureKind, ProviderConfig};
use anymind_llm::{LlmProvider, LlmResult, CompletionRequest, ProviderGateway};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(id: &str, base_url: String) -> ProviderGateway {
    let mut config = AppConfig::default();
    config.providers.insert(
        id.to_string(),
        ProviderConfig {
            enabled: true,
            api_key: "test-key".into(),
            model: "test-model".into(),
            base_url: Some(base_url),
            ..Default::default()
        },
    );
    ProviderGateway::from_config(&config)
}

// ===========================================================================
// OpenAI-compatible
// ===========================================================================

#[tokio::test]
async fn openai_compatible_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [
                {"role": "system", "content": "Sos Any"},
                {"role": "user", "content": "hola"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "¡Hola!"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for("groq", server.uri());
    let text = gateway.invoke("groq", "hola", "Sos Any").await.unwrap();
    assert_eq!(text, "¡Hola!");
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({"error": {"message": "Rate limit exceeded"}})),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for("groq", server.uri());
    let failure = gateway.invoke("groq", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Quota);
    assert_eq!(failure.retry_after_secs, Some(7));
}

#[tokio::test]
async fn unauthorized_is_configuration_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let gateway = gateway_for("mistral", server.uri());
    let failure = gateway.invoke("mistral", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Configuration);
}

#[tokio::test]
async fn server_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let gateway = gateway_for("deepseek", server.uri());
    let failure = gateway.invoke("deepseek", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.message.contains("503"));
}

#[tokio::test]
async fn malformed_body_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let gateway = gateway_for("perplexity", server.uri());
    let failure = gateway.invoke("perplexity", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Transport);
}

// ===========================================================================
// Other vendors
// ===========================================================================

#[tokio::test]
async fn anthropic_accumulates_sse_deltas() {
    let server = MockServer::start().await;
    let sse = concat!(
        "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
        "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Buen\"}}\n\n",
        "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" día\"}}\n\n",
        "event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let gateway = gateway_for("anthropic", format!("{}/v1/messages", server.uri()));
    let text = gateway.invoke("anthropic", "hola", "sistema").await.unwrap();
    assert_eq!(text, "Buen día");
}

#[tokio::test]
async fn gemini_joins_candidate_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "uno "}, {"text": "dos"}]}}]
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for("google", server.uri());
    assert_eq!(gateway.invoke("google", "hola", "").await.unwrap(), "uno dos");
}

#[tokio::test]
async fn network_failure_never_exposes_the_key() {
    // Nothing listens on port 1.
    let gateway = gateway_for("google", "http://127.0.0.1:1".into());
    let failure = gateway.invoke("google", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(!failure.message.contains("test-key"), "{}", failure.message);
    assert!(!failure.message.contains("generateContent"), "{}", failure.message);
}

#[tokio::test]
async fn cohere_reads_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": [{"type": "text", "text": "Redacción lista"}]}
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for("cohere", server.uri());
    assert_eq!(gateway.invoke("cohere", "hola", "").await.unwrap(), "Redacción lista");
}

#[tokio::test]
async fn huggingface_reads_generated_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-model"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"generated_text": "fn main() {}"}
        ])))
        .mount(&server)
        .await;

    let gateway = gateway_for("huggingface", server.uri());
    assert_eq!(gateway.invoke("huggingface", "código", "").await.unwrap(), "fn main() {}");
}

#[tokio::test]
async fn ollama_needs_no_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "local", "done": true
        })))
        .mount(&server)
        .await;

    let mut config = AppConfig::default();
    config.providers.get_mut("ollama").unwrap().base_url = Some(server.uri());
    let gateway = ProviderGateway::from_config(&config);
    assert_eq!(gateway.invoke("ollama", "hola", "").await.unwrap(), "local");
}

// ===========================================================================
// Gateway
// ===========================================================================

#[tokio::test]
async fn slow_provider_times_out_as_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"choices": [{"message": {"content": "late"}}]})),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for("groq", server.uri()).with_timeout(Duration::from_millis(200));
    let failure = gateway.invoke("groq", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.message.contains("timed out"));
}

struct CountingProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl LlmProvider for CountingProvider {
    fn name(&self) -> &str { "counting" }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}:{}", request.model, request.user))
    }
}

#[tokio::test]
async fn registered_provider_receives_model_and_text() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut gateway = ProviderGateway::new();
    gateway.register("fake", "fake-model", Arc::new(CountingProvider { calls: calls.clone() }));

    assert_eq!(gateway.invoke("fake", "hola", "").await.unwrap(), "fake-model:hola");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(gateway.set_enabled("fake", false));
    let failure = gateway.invoke("fake", "hola", "").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Configuration);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(gateway.list_enabled().is_empty());
}

#[test]
fn list_all_reports_every_entry() {
    let gateway = ProviderGateway::from_config(&AppConfig::default());
    let all = gateway.list_all();
    assert_eq!(all.len(), AppConfig::default().providers.len());
    assert_eq!(gateway.list_enabled(), vec!["ollama".into()] as Vec<anymind_core::ProviderId>);
    assert!(all.iter().any(|s| s.id == "groq" && !s.enabled && !s.configured));
}
