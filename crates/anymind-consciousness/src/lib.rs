//! Anymind Consciousness - the synthesis round and everything it learns
//!
//! A round runs:
//!   Enriching   - personality prompt, self-knowledge, compressed memory
//!   Dispatching - eligible providers (enabled, not quota-blocked), ranked
//!   Awaiting    - concurrent fan-out, each call bounded by the gateway timeout
//!   Selecting   - best-ranked successful reply
//!   Learning    - conversation log, compressed token, facts, dynamic
//!                 memory, personality, learning journal
//!
//! Learning steps fail independently; the caller always gets a reply.

pub mod extract;
pub mod journal;
pub mod orchestrator;
pub mod personality;
pub mod quota;
pub mod self_knowledge;

pub use extract::{
    ExtractedFact, FactExtractor, HeuristicExtractor, ImportanceHeuristic, KeywordImportance,
    MemoryCandidate,
};
pub use journal::{ConsciousnessSummary, Intent, LearnedConcept, LearningJournal, ResponseKind};
pub use orchestrator::{Orchestrator, Phase, Stores, Synthesis, SynthesisAnalysis, SynthesisOutcome};
pub use personality::{EvolutionChanges, Impact, PersonalityEngine, PersonalityState, Trait};
pub use quota::QuotaTracker;
pub use self_knowledge::SelfKnowledge;
