//! Tests for anymind-consciousness: synthesis rounds against fake providers

use anymind_consciousness::*;
use anymind_core::{AppConfig, Error, FailureKind, ProviderId};
use anymind_llm::{CompletionRequest, LlmError, LlmProvider, LlmResult, ProviderGateway};
use anymind_memory::{CompressedMemory, ConversationLog, DynamicMemory, MemoryCategory};
use anymind_router::QueryRouter;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Copy)]
enum Script {
    Reply(&'static str),
    Down,
    Broken(&'static str),
    RateLimited(Option<u64>),
}

struct FakeProvider {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    systems: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn new(script: Script) -> Arc<Self> {
        Self::slow(script, 0)
    }

    fn slow(script: Script, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            script,
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
            systems: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_system(&self) -> String {
        self.systems.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.systems.lock().unwrap().push(request.system.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.script {
            Script::Reply(text) => Ok(text.to_string()),
            Script::Down => Err(LlmError::RequestFailed("connection refused".into())),
            Script::Broken(message) => Err(LlmError::RequestFailed(message.into())),
            Script::RateLimited(secs) => Err(LlmError::RateLimited {
                retry_after_ms: secs.map(|s| s * 1000),
                message: "429 quota exceeded".into(),
            }),
        }
    }
}

fn gateway_with(providers: &[(&str, &Arc<FakeProvider>)]) -> Arc<ProviderGateway> {
    let mut gateway = ProviderGateway::new().with_timeout(Duration::from_secs(5));
    for (id, provider) in providers {
        let provider: Arc<dyn LlmProvider> = (*provider).clone();
        gateway.register(*id, "fake-model", provider);
    }
    Arc::new(gateway)
}

fn orchestrator(providers: &[(&str, &Arc<FakeProvider>)]) -> Orchestrator {
    let config = AppConfig::default();
    let stores = Stores::in_memory(&config.identity).unwrap();
    Orchestrator::new(&config, gateway_with(providers), QueryRouter::default(), stores)
}

fn ids(names: &[&str]) -> Vec<ProviderId> {
    names.iter().map(|n| ProviderId::new(*n)).collect()
}

// ===========================================================================
// Partial and total failure
// ===========================================================================

#[tokio::test]
async fn one_success_out_of_three_is_returned() {
    let groq = FakeProvider::new(Script::Down);
    let mistral = FakeProvider::new(Script::Reply("bonjour"));
    let ollama = FakeProvider::new(Script::Down);
    let orch = orchestrator(&[("groq", &groq), ("mistral", &mistral), ("ollama", &ollama)]);

    let result = orch.synthesize("hola", None).await;

    assert_eq!(result.outcome, SynthesisOutcome::Answered);
    assert_eq!(result.text, "bonjour");
    let analysis = result.analysis.unwrap();
    assert_eq!(analysis.success_count, 1);
    assert_eq!(analysis.total_responses, 3);
    assert_eq!(analysis.selected_provider, "mistral");
    assert_eq!(analysis.providers_used, ids(&["mistral"]));
    assert_eq!(result.failures.len(), 2);
    assert!(result.failures.iter().all(|(_, f)| f.kind == FailureKind::Transport));
    assert_eq!(orch.stores().conversations.len(), 1);
}

#[tokio::test]
async fn total_failure_names_every_provider_and_learns_nothing() {
    let a = FakeProvider::new(Script::Down);
    let b = FakeProvider::new(Script::Down);
    let c = FakeProvider::new(Script::Down);
    let orch = orchestrator(&[("alpha", &a), ("beta", &b), ("gamma", &c)]);

    let result = orch.synthesize("Me llamo Adri, recordá que prefiero el mate", None).await;

    assert_eq!(result.outcome, SynthesisOutcome::AllFailed);
    assert!(!result.text.is_empty());
    for name in ["alpha", "beta", "gamma"] {
        assert!(result.text.contains(name), "apology misses {}: {}", name, result.text);
    }
    assert!(result.analysis.is_none());

    let stores = orch.stores();
    assert!(stores.conversations.is_empty());
    assert!(stores.compressed.tokens().is_empty());
    assert!(stores.compressed.fact("usuario", "nombre").is_none());
    assert!(stores.dynamic.is_empty());
    assert_eq!(orch.consciousness_summary().patterns_identified, 0);
}

#[tokio::test]
async fn oversized_message_is_rejected_before_dispatch() {
    let provider = FakeProvider::new(Script::Reply("ok"));
    let orch = orchestrator(&[("ollama", &provider)]);

    let result = orch.synthesize(&"x".repeat(5_001), None).await;

    assert_eq!(result.outcome, SynthesisOutcome::Rejected);
    assert!(matches!(result.error, Some(Error::Validation(_))));
    assert!(result.text.contains("5001"));
    assert_eq!(provider.calls(), 0);
    assert!(orch.stores().conversations.is_empty());

    // exactly at the cap is fine
    let result = orch.synthesize(&"x".repeat(5_000), None).await;
    assert_eq!(result.outcome, SynthesisOutcome::Answered);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let provider = FakeProvider::new(Script::Reply("ok"));
    let orch = orchestrator(&[("ollama", &provider)]);

    let result = orch.synthesize("   ", None).await;
    assert_eq!(result.outcome, SynthesisOutcome::Rejected);
    assert_eq!(provider.calls(), 0);
}

// ===========================================================================
// Dispatch and selection
// ===========================================================================

#[tokio::test]
async fn providers_are_called_concurrently() {
    let a = FakeProvider::slow(Script::Reply("a"), 300);
    let b = FakeProvider::slow(Script::Reply("b"), 300);
    let c = FakeProvider::slow(Script::Reply("c"), 300);
    let orch = orchestrator(&[("a", &a), ("b", &b), ("c", &c)]);

    let started = Instant::now();
    let result = orch.synthesize("zzz", None).await;
    let elapsed = started.elapsed();

    assert_eq!(result.analysis.unwrap().success_count, 3);
    assert!(elapsed < Duration::from_millis(800), "took {:?}", elapsed);
}

#[tokio::test]
async fn ranking_beats_completion_order() {
    let mistral = FakeProvider::slow(Script::Reply("traducción de mistral"), 200);
    let ollama = FakeProvider::new(Script::Reply("respuesta rápida"));
    let orch = orchestrator(&[("mistral", &mistral), ("ollama", &ollama)]);

    let result = orch.synthesize("Traduce esto al francés", None).await;

    assert_eq!(result.text, "traducción de mistral");
    let analysis = result.analysis.unwrap();
    assert_eq!(analysis.selected_provider, "mistral");
    assert!(analysis.selection_successful);
    assert_eq!(analysis.query_type, "multilingüe_europeo");
}

#[tokio::test]
async fn unranked_providers_fall_back_to_dispatch_order() {
    let a = FakeProvider::new(Script::Reply("uno"));
    let b = FakeProvider::new(Script::Reply("dos"));
    let orch = orchestrator(&[("local-a", &a), ("local-b", &b)]);

    let result = orch.synthesize("zzz", None).await;

    assert_eq!(result.text, "uno");
    assert!(!result.analysis.unwrap().selection_successful);
}

#[tokio::test]
async fn slow_provider_times_out_without_sinking_the_round() {
    let slow = FakeProvider::slow(Script::Reply("tarde"), 3_000);
    let fast = FakeProvider::new(Script::Reply("a tiempo"));
    let mut gateway = ProviderGateway::new().with_timeout(Duration::from_millis(200));
    gateway.register("slow", "m", slow.clone());
    gateway.register("fast", "m", fast.clone());
    let config = AppConfig::default();
    let orch = Orchestrator::new(
        &config,
        Arc::new(gateway),
        QueryRouter::default(),
        Stores::in_memory(&config.identity).unwrap(),
    );

    let result = orch.synthesize("zzz", None).await;

    assert_eq!(result.text, "a tiempo");
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].0, "slow");
    assert_eq!(result.failures[0].1.kind, FailureKind::Transport);
    // a timeout is not a rate limit
    assert!(result.newly_blocked.is_empty());
}

#[tokio::test]
async fn allow_list_narrows_dispatch() {
    let a = FakeProvider::new(Script::Reply("a"));
    let b = FakeProvider::new(Script::Reply("b"));
    let orch = orchestrator(&[("a", &a), ("b", &b)]);

    let allowed = ids(&["b"]);
    let result = orch.synthesize("zzz", Some(&allowed)).await;
    assert_eq!(result.text, "b");
    assert_eq!(a.calls(), 0);

    let nobody = ids(&["unknown"]);
    let result = orch.synthesize("zzz", Some(&nobody)).await;
    assert_eq!(result.outcome, SynthesisOutcome::Unavailable);
    assert!(result.text.starts_with("No hay IAs disponibles"));
    match result.error {
        Some(Error::AllProvidersUnavailable(reason)) => assert!(!reason.contains("blocked"), "{}", reason),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(a.calls() + b.calls(), 1);
}

// ===========================================================================
// Quota blocking
// ===========================================================================

#[tokio::test]
async fn rate_limited_provider_sits_out_the_next_round() {
    let groq = FakeProvider::new(Script::RateLimited(Some(120)));
    let ollama = FakeProvider::new(Script::Reply("hola"));
    let orch = orchestrator(&[("groq", &groq), ("ollama", &ollama)]);

    let first = orch.synthesize("hola", None).await;
    assert_eq!(first.newly_blocked, ids(&["groq"]));
    assert!(orch.quota().is_blocked("groq", Utc::now()));

    let second = orch.synthesize("hola", None).await;
    assert_eq!(second.text, "hola");
    assert_eq!(groq.calls(), 1);
    assert_eq!(ollama.calls(), 2);
}

#[tokio::test]
async fn everything_blocked_short_circuits() {
    let groq = FakeProvider::new(Script::RateLimited(None));
    let orch = orchestrator(&[("groq", &groq)]);

    let first = orch.synthesize("hola", None).await;
    assert_eq!(first.outcome, SynthesisOutcome::AllFailed);

    let second = orch.synthesize("hola", None).await;
    assert_eq!(second.outcome, SynthesisOutcome::Unavailable);
    assert!(matches!(second.error, Some(Error::AllProvidersUnavailable(_))));
    assert!(second.text.contains("groq"));
    assert_eq!(groq.calls(), 1);
}

#[tokio::test]
async fn transport_failures_mentioning_limits_do_not_block() {
    let google = FakeProvider::new(Script::Broken(
        "error sending request for url (http://127.0.0.1:1/models/gemini-pro:generateContent)",
    ));
    let groq = FakeProvider::new(Script::Broken("groq 400 Bad Request: maximum context length limit"));
    let ollama = FakeProvider::new(Script::Reply("hola"));
    let orch = orchestrator(&[("google", &google), ("groq", &groq), ("ollama", &ollama)]);

    let first = orch.synthesize("hola", None).await;
    assert_eq!(first.outcome, SynthesisOutcome::Answered);
    assert!(first.newly_blocked.is_empty(), "blocked: {:?}", first.newly_blocked);
    assert!(orch.quota().blocked(Utc::now()).is_empty());

    orch.synthesize("hola", None).await;
    assert_eq!(google.calls(), 2);
    assert_eq!(groq.calls(), 2);
}

// ===========================================================================
// Enrichment and learning
// ===========================================================================

#[tokio::test]
async fn learning_feeds_every_store() {
    let ollama = FakeProvider::new(Script::Reply("¡Un gusto, Adri!"));
    let orch = orchestrator(&[("ollama", &ollama)]);

    let result = orch
        .synthesize("Me llamo Adri y vivo en Rosario. Recordá que prefiero el mate amargo", None)
        .await;
    assert!(result.is_answered());

    let stores = orch.stores();
    assert_eq!(stores.conversations.len(), 1);
    assert_eq!(stores.compressed.tokens().len(), 1);
    assert_eq!(stores.compressed.fact("usuario", "nombre").unwrap().value, "Adri");
    assert_eq!(stores.compressed.fact("usuario", "ciudad").unwrap().value, "Rosario");
    assert_eq!(
        stores.compressed.preference("pref_el_mate_amargo").unwrap().value,
        "el mate amargo"
    );

    let memories = stores.dynamic.all(None);
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].category, MemoryCategory::Preferences);
    assert!(memories[0].importance >= 7);

    let summary = orch.consciousness_summary();
    assert_eq!(summary.total_conversations, 1);
    assert_eq!(summary.patterns_identified, 1);
    assert!(summary.concepts_learned > 0);
}

#[tokio::test]
async fn later_rounds_see_remembered_facts() {
    let ollama = FakeProvider::new(Script::Reply("ok"));
    let orch = orchestrator(&[("ollama", &ollama)]);

    orch.synthesize("Me llamo Adri", None).await;
    orch.synthesize("zzz", None).await;

    let system = ollama.last_system();
    assert!(system.starts_with("Sos Any"));
    assert!(system.contains("nombre: Adri"), "{}", system);
}

#[tokio::test]
async fn self_inquiry_adds_status_report() {
    let ollama = FakeProvider::new(Script::Reply("Soy Any"));
    let orch = orchestrator(&[("ollama", &ollama)]);

    orch.synthesize("zzz", None).await;
    assert!(!ollama.last_system().contains("AUTO-ANÁLISIS"));

    orch.synthesize("¿Quién sos y qué podés hacer?", None).await;
    let system = ollama.last_system();
    assert!(system.contains("AUTO-ANÁLISIS"));
    assert!(system.contains("fake-model"));
}

#[tokio::test]
async fn personality_evolves_and_journal_notes_it() {
    let ollama = FakeProvider::new(Script::Reply("Gracias, intento ser curiosa"));
    let orch = orchestrator(&[("ollama", &ollama)]);
    orch.stores().personality.add_trait("curiosa", "Hace preguntas", 5).unwrap();

    orch.synthesize("zzz", None).await;

    let state = orch.stores().personality.snapshot();
    assert_eq!(state.learned_traits["curiosa"].strength, 6);
    assert_eq!(orch.consciousness_summary().evolutions, 1);
}

#[tokio::test]
async fn overlapping_rounds_keep_every_exchange_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.memory.data_dir = dir.path().to_path_buf();

    let ollama = FakeProvider::slow(Script::Reply("dale"), 20);
    let stores = Stores::open(&config).unwrap();
    let orch = Orchestrator::new(&config, gateway_with(&[("ollama", &ollama)]), QueryRouter::default(), stores);

    let (a, b, c, d) = tokio::join!(
        orch.synthesize("uno", None),
        orch.synthesize("dos", None),
        orch.synthesize("tres", None),
        orch.synthesize("cuatro", None),
    );
    assert!([a, b, c, d].iter().all(|r| r.is_answered()));

    let reopened = ConversationLog::open(config.conversations_path());
    assert_eq!(reopened.len(), 4);
    let journal = LearningJournal::open(config.learnings_path());
    assert_eq!(journal.summary(0).patterns_identified, 4);
}

#[tokio::test]
async fn failed_learning_step_still_answers() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let config = AppConfig::default();
    let stores = Stores {
        conversations: ConversationLog::open(blocker.join("conversations.json")),
        compressed: CompressedMemory::in_memory(),
        dynamic: DynamicMemory::in_memory(),
        personality: PersonalityEngine::in_memory(&config.identity).unwrap(),
        journal: LearningJournal::in_memory(),
    };
    let ollama = FakeProvider::new(Script::Reply("sigo acá"));
    let orch = Orchestrator::new(&config, gateway_with(&[("ollama", &ollama)]), QueryRouter::default(), stores);

    let result = orch.synthesize("Me llamo Adri", None).await;

    assert_eq!(result.text, "sigo acá");
    assert!(result.is_answered());
    // the steps after the broken one still ran
    assert_eq!(orch.stores().compressed.tokens().len(), 1);
    assert_eq!(orch.stores().compressed.fact("usuario", "nombre").unwrap().value, "Adri");
    assert_eq!(orch.consciousness_summary().patterns_identified, 1);
}

// ===========================================================================
// Accessors
// ===========================================================================

#[tokio::test]
async fn memory_accessors_round_trip() {
    let orch = orchestrator(&[]);
    let id = orch
        .save_memory("Adri usa Rust", MemoryCategory::Tech, 8, vec!["lenguaje".into()])
        .unwrap();

    let hits = orch
        .recall_memory(&anymind_memory::SearchQuery::text("rust"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);

    assert!(orch.personality_summary().contains("Nombre: Any"));
    assert_eq!(
        orch.classify("Qué noticias hay sobre Argentina hoy?").primary_provider,
        Some(ProviderId::new("perplexity"))
    );
}

#[tokio::test]
async fn no_enabled_providers_is_unavailable() {
    let orch = orchestrator(&[]);
    let result = orch.synthesize("hola", None).await;
    assert_eq!(result.outcome, SynthesisOutcome::Unavailable);
    assert!(!result.text.is_empty());
}
