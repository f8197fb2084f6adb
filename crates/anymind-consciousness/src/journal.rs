//! Learning journal
//!
//! Concepts seen in user messages, the shape of each exchange, and
//! personality evolution notes. Persisted next to the personality profile.

use anymind_core::Result;
use anymind_memory::Persisted;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

pub const MAX_PATTERNS: usize = 100;
const CONCEPTS_PER_MESSAGE: usize = 5;
const CONTEXT_CHARS: usize = 100;
const DETAILED_RESPONSE_CHARS: usize = 200;

const STOP_WORDS: &[&str] = &[
    "el", "la", "de", "que", "y", "a", "en", "un", "una", "los", "las", "por", "para", "con",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Question,
    Thanks,
    Request,
    Conversation,
}

impl Intent {
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let has = |cues: &[&str]| cues.iter().any(|c| lowered.contains(c));
        if has(&["cómo", "qué", "cuál", "dónde", "cuándo", "por qué"]) {
            Self::Question
        } else if has(&["gracias", "genial", "perfecto", "bien"]) {
            Self::Thanks
        } else if has(&["ayuda", "necesito", "quiero", "puedes"]) {
            Self::Request
        } else {
            Self::Conversation
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Error,
    Detailed,
    Direct,
}

impl ResponseKind {
    pub fn classify(response: &str) -> Self {
        if response.to_lowercase().contains("error") {
            Self::Error
        } else if response.chars().count() > DETAILED_RESPONSE_CHARS {
            Self::Detailed
        } else {
            Self::Direct
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnedConcept {
    pub concept: String,
    pub date: DateTime<Utc>,
    /// Head of the message the concept came from.
    pub context: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationPattern {
    pub user_intent: Intent,
    pub response_type: ResponseKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionNote {
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    pub change: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalState {
    pub concepts: Vec<LearnedConcept>,
    pub patterns: Vec<ConversationPattern>,
    pub evolutions: Vec<EvolutionNote>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConsciousnessSummary {
    pub concepts_learned: usize,
    pub patterns_identified: usize,
    pub evolutions: usize,
    pub total_conversations: usize,
    pub last_concept: Option<LearnedConcept>,
}

/// Candidate concepts: words over four characters that are not stop words.
pub fn extract_concepts(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.chars().count() > 4 && !STOP_WORDS.contains(&w.as_str()))
        .take(CONCEPTS_PER_MESSAGE)
        .collect()
}

pub struct LearningJournal {
    store: Persisted<JournalState>,
}

impl LearningJournal {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { store: Persisted::open(path) }
    }

    pub fn in_memory() -> Self {
        Self { store: Persisted::in_memory() }
    }

    /// Log one exchange. Returns how many concepts were new.
    pub fn record(&self, user: &str, response: &str) -> Result<usize> {
        let candidates = extract_concepts(user);
        let context: String = user.chars().take(CONTEXT_CHARS).collect();
        let pattern = ConversationPattern {
            user_intent: Intent::classify(user),
            response_type: ResponseKind::classify(response),
            timestamp: Utc::now(),
        };

        let added = self.store.update(|s| {
            let now = Utc::now();
            let mut added = 0;
            for concept in candidates {
                if s.concepts.iter().any(|c| c.concept == concept) {
                    continue;
                }
                s.concepts.push(LearnedConcept { concept, date: now, context: context.clone() });
                added += 1;
            }
            s.patterns.push(pattern);
            let overflow = s.patterns.len().saturating_sub(MAX_PATTERNS);
            s.patterns.drain(..overflow);
            added
        })?;

        debug!(new_concepts = added, "Journal updated");
        Ok(added)
    }

    pub fn note_evolution(&self, trigger: &str, change: &str) -> Result<()> {
        self.store.update(|s| {
            s.evolutions.push(EvolutionNote {
                timestamp: Utc::now(),
                trigger: trigger.to_string(),
                change: change.to_string(),
            })
        })?;
        info!("Evolution: {}", change);
        Ok(())
    }

    pub fn snapshot(&self) -> JournalState {
        self.store.read(|s| s.clone())
    }

    pub fn summary(&self, total_conversations: usize) -> ConsciousnessSummary {
        self.store.read(|s| ConsciousnessSummary {
            concepts_learned: s.concepts.len(),
            patterns_identified: s.patterns.len(),
            evolutions: s.evolutions.len(),
            total_conversations,
            last_concept: s.concepts.last().cloned(),
        })
    }
}
