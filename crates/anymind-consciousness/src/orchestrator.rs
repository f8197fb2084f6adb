//! Synthesis orchestrator
//!
//! One round per user message: enrich the system prompt, fan the message
//! out to every eligible provider at once, pick the reply the classifier
//! ranks highest, then run the learning steps in a fixed order.
//!
//! Provider failures are data, never errors. The caller always gets text:
//! the selected reply, an apology naming every provider that failed, or
//! a short explanation of why nothing was dispatched.

use crate::extract::{ExtractedFact, FactExtractor, HeuristicExtractor, ImportanceHeuristic, KeywordImportance};
use crate::journal::{ConsciousnessSummary, LearningJournal};
use crate::personality::{EvolutionChanges, PersonalityEngine};
use crate::quota::QuotaTracker;
use crate::self_knowledge::SelfKnowledge;
use anymind_core::{AppConfig, Error, IdentityConfig, ProviderFailure, ProviderId, ProviderResponse, Result};
use anymind_llm::{ProviderGateway, ProviderStatus};
use anymind_memory::{
    CompressedMemory, ConversationLog, DynamicMemory, MemoryCategory, MemoryRecord, SearchQuery,
};
use anymind_router::{ClassificationResult, QueryRouter};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a round is. Logged at debug on every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Enriching,
    Dispatching,
    Awaiting,
    Selecting,
    Learning,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Enriching => "enriching",
            Phase::Dispatching => "dispatching",
            Phase::Awaiting => "awaiting",
            Phase::Selecting => "selecting",
            Phase::Learning => "learning",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// A provider reply was selected.
    Answered,
    /// Every dispatched provider failed.
    AllFailed,
    /// Nothing was eligible; no provider was called.
    Unavailable,
    /// The message was refused before dispatch.
    Rejected,
}

#[derive(Clone, Debug, Serialize)]
pub struct SynthesisAnalysis {
    pub query_type: String,
    pub total_responses: usize,
    pub success_count: usize,
    /// Providers that answered, in dispatch order.
    pub providers_used: Vec<ProviderId>,
    pub selected_provider: ProviderId,
    /// The winner came from the classifier ranking rather than the fallback.
    pub selection_successful: bool,
}

#[derive(Debug)]
pub struct Synthesis {
    pub round_id: Uuid,
    pub text: String,
    pub outcome: SynthesisOutcome,
    /// Present only when a reply was selected.
    pub analysis: Option<SynthesisAnalysis>,
    pub failures: Vec<(ProviderId, ProviderFailure)>,
    /// Providers this round put on quota hold.
    pub newly_blocked: Vec<ProviderId>,
    /// Why nothing was dispatched, for `Rejected` and `Unavailable`.
    pub error: Option<Error>,
}

impl Synthesis {
    fn short_circuit(round_id: Uuid, outcome: SynthesisOutcome, text: String, error: Error) -> Self {
        Self {
            round_id,
            text,
            outcome,
            analysis: None,
            failures: Vec::new(),
            newly_blocked: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.outcome == SynthesisOutcome::Answered
    }
}

/// Every persistent store a round touches.
pub struct Stores {
    pub conversations: ConversationLog,
    pub compressed: CompressedMemory,
    pub dynamic: DynamicMemory,
    pub personality: PersonalityEngine,
    pub journal: LearningJournal,
}

impl Stores {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let stores = Self {
            conversations: ConversationLog::open(config.conversations_path()),
            compressed: CompressedMemory::open(config.compressed_memory_path()),
            dynamic: DynamicMemory::open(config.dynamic_memory_path()),
            personality: PersonalityEngine::open(config.personality_path(), &config.identity)?,
            journal: LearningJournal::open(config.learnings_path()),
        };
        info!("Stores opened under {}", config.memory.data_dir.display());
        Ok(stores)
    }

    pub fn in_memory(identity: &IdentityConfig) -> Result<Self> {
        Ok(Self {
            conversations: ConversationLog::in_memory(),
            compressed: CompressedMemory::in_memory(),
            dynamic: DynamicMemory::in_memory(),
            personality: PersonalityEngine::in_memory(identity)?,
            journal: LearningJournal::in_memory(),
        })
    }
}

pub struct Orchestrator {
    gateway: Arc<ProviderGateway>,
    router: QueryRouter,
    stores: Stores,
    quota: QuotaTracker,
    self_knowledge: SelfKnowledge,
    extractor: Box<dyn FactExtractor>,
    importance: Box<dyn ImportanceHeuristic>,
    max_message_chars: usize,
}

impl Orchestrator {
    /// Build every service from config: gateway, router, on-disk stores.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let gateway = Arc::new(ProviderGateway::from_config(config));
        let router = QueryRouter::from_config(&config.router);
        let stores = Stores::open(config)?;
        Ok(Self::new(config, gateway, router, stores))
    }

    pub fn new(config: &AppConfig, gateway: Arc<ProviderGateway>, router: QueryRouter, stores: Stores) -> Self {
        let self_knowledge = SelfKnowledge::new(config, &router);
        Self {
            gateway,
            router,
            stores,
            quota: QuotaTracker::new(config.limits.default_backoff_secs),
            self_knowledge,
            extractor: Box::new(HeuristicExtractor::new()),
            importance: Box::new(KeywordImportance::default()),
            max_message_chars: config.limits.max_message_chars,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FactExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_importance(mut self, importance: Box<dyn ImportanceHeuristic>) -> Self {
        self.importance = importance;
        self
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn classify(&self, text: &str) -> ClassificationResult {
        self.router.classify(text)
    }

    pub fn consciousness_summary(&self) -> ConsciousnessSummary {
        self.stores.journal.summary(self.stores.conversations.len())
    }

    pub fn recall_memory(&self, query: &SearchQuery) -> Result<Vec<MemoryRecord>> {
        Ok(self.stores.dynamic.search(query)?)
    }

    pub fn save_memory(
        &self,
        content: &str,
        category: MemoryCategory,
        importance: u8,
        tags: Vec<String>,
    ) -> Result<String> {
        Ok(self.stores.dynamic.write(content, category, importance, tags)?)
    }

    pub fn personality_summary(&self) -> String {
        self.stores.personality.summary()
    }

    pub fn providers(&self) -> Vec<ProviderStatus> {
        self.gateway.list_all()
    }

    pub fn status_report(&self) -> String {
        self.self_knowledge.status_report(&self.gateway.list_all())
    }

    // ============================================================
    // Synthesis round
    // ============================================================

    /// Run one round. `allowed` narrows dispatch to the listed providers.
    pub async fn synthesize(&self, message: &str, allowed: Option<&[ProviderId]>) -> Synthesis {
        let round = Uuid::new_v4();
        let started = Instant::now();
        enter(round, Phase::Idle);

        let length = message.chars().count();
        if message.trim().is_empty() {
            warn!(%round, "Rejected empty message");
            return Synthesis::short_circuit(
                round,
                SynthesisOutcome::Rejected,
                "El mensaje está vacío.".into(),
                Error::validation("empty message"),
            );
        }
        if length > self.max_message_chars {
            warn!(%round, length, max = self.max_message_chars, "Rejected oversized message");
            return Synthesis::short_circuit(
                round,
                SynthesisOutcome::Rejected,
                format!(
                    "El mensaje es demasiado largo ({} caracteres). El máximo es {}.",
                    length, self.max_message_chars
                ),
                Error::validation(format!("message has {} characters, limit is {}", length, self.max_message_chars)),
            );
        }

        enter(round, Phase::Enriching);
        let system = self.system_prompt_for(message);

        enter(round, Phase::Dispatching);
        let now = Utc::now();
        self.quota.release_expired(now);
        let mut eligible = self.quota.filter_available(&self.gateway.list_enabled(), now);
        if let Some(allowed) = allowed {
            eligible.retain(|id| allowed.contains(id));
        }
        if eligible.is_empty() {
            let blocked: Vec<String> = self.quota.blocked(now).iter().map(|(id, _)| id.to_string()).collect();
            warn!(%round, blocked = ?blocked, "No eligible providers");
            let (text, reason) = if blocked.is_empty() {
                (
                    "No hay IAs disponibles para responder. Revisá la configuración.".to_string(),
                    "no provider is enabled for this request".to_string(),
                )
            } else {
                (
                    format!(
                        "Todas las IAs disponibles están bloqueadas por límite de uso ({}). Intentá en un rato.",
                        blocked.join(", ")
                    ),
                    format!("all providers blocked: {}", blocked.join(", ")),
                )
            };
            enter(round, Phase::Done);
            return Synthesis::short_circuit(
                round,
                SynthesisOutcome::Unavailable,
                text,
                Error::AllProvidersUnavailable(reason),
            );
        }

        let classification = self.router.classify(message);
        let order = self.router.select_optimal(message, &eligible);
        debug!(%round, query_type = %classification.query_type, providers = order.len(), "Dispatch order ready");

        enter(round, Phase::Awaiting);
        let responses = self.dispatch(&order, message, &system).await;

        enter(round, Phase::Selecting);
        let now = Utc::now();
        let newly_blocked: Vec<ProviderId> = responses
            .iter()
            .filter(|r| self.quota.record(r, now).is_some())
            .map(|r| r.provider.clone())
            .collect();
        let failures: Vec<(ProviderId, ProviderFailure)> = responses
            .iter()
            .filter_map(|r| r.failure().map(|f| (r.provider.clone(), f.clone())))
            .collect();
        let successes: Vec<ProviderResponse> = responses.iter().filter(|r| r.is_success()).cloned().collect();

        if successes.is_empty() {
            let names: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
            warn!(%round, failed = ?names, "Every provider failed");
            enter(round, Phase::Done);
            return Synthesis {
                round_id: round,
                text: apology(&names),
                outcome: SynthesisOutcome::AllFailed,
                analysis: None,
                failures,
                newly_blocked,
                error: None,
            };
        }

        let selected = self
            .router
            .select_best_response(message, &successes)
            .unwrap_or(&successes[0]);
        let selection_successful = classification.ranked_providers.contains(&selected.provider);
        let text = selected.text().unwrap_or_default().to_string();
        let analysis = SynthesisAnalysis {
            query_type: classification.query_type.clone(),
            total_responses: responses.len(),
            success_count: successes.len(),
            providers_used: successes.iter().map(|r| r.provider.clone()).collect(),
            selected_provider: selected.provider.clone(),
            selection_successful,
        };

        enter(round, Phase::Learning);
        self.learn(round, message, &text);

        enter(round, Phase::Done);
        info!(
            %round,
            provider = %analysis.selected_provider,
            successes = analysis.success_count,
            total = analysis.total_responses,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synthesis round complete"
        );

        Synthesis {
            round_id: round,
            text,
            outcome: SynthesisOutcome::Answered,
            analysis: Some(analysis),
            failures,
            newly_blocked,
            error: None,
        }
    }

    /// Personality prompt, then self-knowledge when asked about ourselves,
    /// then whatever compressed memory knows.
    fn system_prompt_for(&self, message: &str) -> String {
        let mut prompt = self.stores.personality.system_prompt();
        if SelfKnowledge::is_self_inquiry(message) {
            prompt.push_str("\n\n");
            prompt.push_str(&self.status_report());
        }
        let context = self.stores.compressed.render_full_context();
        if !context.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&context);
        }
        prompt
    }

    /// Invoke every provider concurrently. Results come back in `order`,
    /// whatever order they completed in.
    async fn dispatch(&self, order: &[ProviderId], message: &str, system: &str) -> Vec<ProviderResponse> {
        let user: Arc<str> = Arc::from(message);
        let system: Arc<str> = Arc::from(system);
        let mut set: JoinSet<(usize, ProviderResponse)> = JoinSet::new();

        for (index, id) in order.iter().cloned().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let user = Arc::clone(&user);
            let system = Arc::clone(&system);
            debug!(provider = %id, "Dispatching");
            set.spawn(async move {
                let outcome = gateway.invoke(id.as_str(), &user, &system).await;
                (index, ProviderResponse::new(id, outcome))
            });
        }

        let mut slots: Vec<Option<ProviderResponse>> = vec![None; order.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, response)) => slots[index] = Some(response),
                Err(e) => warn!("Dispatch task died: {}", e),
            }
        }

        order
            .iter()
            .zip(slots)
            .map(|(id, slot)| {
                slot.unwrap_or_else(|| {
                    ProviderResponse::failed(id.clone(), ProviderFailure::transport("dispatch task aborted"))
                })
            })
            .collect()
    }

    // ============================================================
    // Learning
    // ============================================================

    fn learn(&self, round: Uuid, user: &str, reply: &str) {
        self.step(round, "conversation_log", || {
            self.stores.conversations.append(user, reply)?;
            Ok(())
        });
        self.step(round, "compressed_token", || {
            self.stores.compressed.compress(user, reply)?;
            Ok(())
        });
        self.step(round, "fact_extraction", || self.store_facts(user, reply));
        self.step(round, "dynamic_memory", || self.store_if_important(user, reply));
        let changes = self.step(round, "personality", || {
            self.stores.personality.evolve_from_interaction(user, reply)
        });
        self.step(round, "journal", || self.update_journal(user, reply, changes.as_ref()));
    }

    /// Run one learning step; a failure is logged and swallowed.
    fn step<T>(&self, round: Uuid, name: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%round, step = name, "Learning step failed: {}", e);
                None
            }
        }
    }

    fn store_facts(&self, user: &str, reply: &str) -> Result<()> {
        let memory = &self.stores.compressed;
        for fact in self.extractor.extract(user, reply) {
            debug!(?fact, "Extracted");
            match fact {
                ExtractedFact::Fact { category, key, value } => memory.add_fact(&category, &key, &value)?,
                ExtractedFact::Preference { key, value } => memory.add_preference(&key, &value)?,
                ExtractedFact::Relationship { a, b, kind } => memory.add_relationship(&a, &b, &kind)?,
            }
        }
        Ok(())
    }

    fn store_if_important(&self, user: &str, reply: &str) -> Result<()> {
        if let Some(candidate) = self.importance.assess(user, reply) {
            self.stores.dynamic.write(
                &candidate.content,
                candidate.category,
                candidate.importance,
                candidate.tags,
            )?;
        }
        Ok(())
    }

    fn update_journal(&self, user: &str, reply: &str, changes: Option<&EvolutionChanges>) -> Result<()> {
        let journal = &self.stores.journal;
        journal.record(user, reply)?;
        if let Some(changes) = changes {
            if !changes.traits_reinforced.is_empty() {
                journal.note_evolution("interacción", &format!("Rasgos reforzados: {}", changes.traits_reinforced.join(", ")))?;
            }
            if let Some(experience) = &changes.experience_added {
                journal.note_evolution("experiencia", experience)?;
            }
        }
        Ok(())
    }
}

fn enter(round: Uuid, phase: Phase) {
    debug!(%round, %phase, "Round phase");
}

fn apology(failed: &[&str]) -> String {
    format!(
        "Lo siento, no pude obtener respuesta de ninguna IA ({}). Intentá de nuevo.",
        failed.join(", ")
    )
}
