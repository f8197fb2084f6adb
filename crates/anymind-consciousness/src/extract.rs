//! Fact extraction and importance heuristics
//!
//! Both run after a successful round. Extraction pulls user facts,
//! preferences and relationships out of the exchange; the importance
//! heuristic decides whether the exchange deserves a dynamic memory.
//! Both are plain pattern matching and sit behind traits so a smarter
//! implementation can replace them.

use anymind_memory::MemoryCategory;
use regex::Regex;

/// Something worth keeping in compressed memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractedFact {
    Fact { category: String, key: String, value: String },
    Preference { key: String, value: String },
    Relationship { a: String, b: String, kind: String },
}

pub trait FactExtractor: Send + Sync {
    fn extract(&self, user: &str, assistant: &str) -> Vec<ExtractedFact>;
}

/// A dynamic memory the heuristic wants written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryCandidate {
    pub content: String,
    pub category: MemoryCategory,
    pub importance: u8,
    pub tags: Vec<String>,
}

pub trait ImportanceHeuristic: Send + Sync {
    fn assess(&self, user: &str, assistant: &str) -> Option<MemoryCandidate>;
}

// ============================================================
// Heuristic extractor
// ============================================================

const USER: &str = "usuario";

struct FactRule {
    pattern: Regex,
    key: &'static str,
}

pub struct HeuristicExtractor {
    facts: Vec<FactRule>,
    preference: Option<Regex>,
    relationship: Option<Regex>,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        let fact = |pattern: &str, key: &'static str| Regex::new(pattern).ok().map(|pattern| FactRule { pattern, key });
        let facts = [
            fact(r"(?i)\b(?:me llamo|mi nombre es|my name is)\s+(\p{L}+)", "nombre"),
            // case-insensitive cue only; capitalization decides where the place name ends
            fact(r"\b(?i:vivo en|i live in)\s+(\p{L}+(?:\s\p{Lu}\p{L}*)*)", "ciudad"),
            fact(r"(?i)\btrabajo (?:en|como)\s+([^.,;!?\n]{2,40})", "trabajo"),
            fact(r"(?i)\btengo\s+(\d{1,3})\s+años\b", "edad"),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            facts,
            preference: Regex::new(r"(?i)\b(no\s+)?(?:prefiero|me gustan?|i prefer|i like)\s+([^.,;!?\n]{2,60})").ok(),
            relationship: Regex::new(
                r"\b(?i:mi\s+(hermano|hermana|madre|padre|mamá|papá|novia|novio|esposa|esposo|hijo|hija|amigo|amiga|jefe|jefa|perro|gata|gato)\s+(?:se llama|es))\s+(\p{Lu}\p{L}*)",
            )
            .ok(),
        }
    }
}

impl FactExtractor for HeuristicExtractor {
    /// Only the user's words are mined; the assistant's reply is ignored.
    fn extract(&self, user: &str, _assistant: &str) -> Vec<ExtractedFact> {
        let mut found = Vec::new();

        for rule in &self.facts {
            if let Some(value) = rule.pattern.captures(user).and_then(|c| c.get(1)) {
                found.push(ExtractedFact::Fact {
                    category: USER.to_string(),
                    key: rule.key.to_string(),
                    value: value.as_str().trim().to_string(),
                });
            }
        }

        if let Some(re) = &self.preference {
            for caps in re.captures_iter(user) {
                let Some(value) = caps.get(2).map(|m| m.as_str().trim()) else {
                    continue;
                };
                let negated = caps.get(1).is_some();
                let slug = slug(value);
                if slug.is_empty() {
                    continue;
                }
                let key = if negated { format!("pref_no_{}", slug) } else { format!("pref_{}", slug) };
                found.push(ExtractedFact::Preference { key, value: value.to_string() });
            }
        }

        if let Some(re) = &self.relationship {
            for caps in re.captures_iter(user) {
                if let (Some(kind), Some(name)) = (caps.get(1), caps.get(2)) {
                    found.push(ExtractedFact::Relationship {
                        a: USER.to_string(),
                        b: name.as_str().to_string(),
                        kind: kind.as_str().to_lowercase(),
                    });
                }
            }
        }

        found
    }
}

/// First three alphanumeric words, lowercased, joined by `_`.
fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase())
        .filter(|w| !w.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================
// Keyword importance
// ============================================================

/// Scores the user's message by explicit "remember this" cues.
pub struct KeywordImportance {
    /// Minimum score for a memory to be written.
    pub threshold: u8,
}

impl Default for KeywordImportance {
    fn default() -> Self {
        Self { threshold: 7 }
    }
}

const REMEMBER_CUES: &[&str] = &[
    "recordá", "recorda", "acordate", "acuérdate", "no olvides", "no te olvides", "guardá", "anotá",
    "remember", "don't forget",
];
const EMPHASIS_CUES: &[&str] = &["importante", "important", "siempre", "nunca", "urgente"];
const PERSONAL_CUES: &[&str] = &["me llamo", "mi nombre", "vivo en", "mi cumpleaños", "mi familia", "my name"];

const CATEGORY_CUES: &[(MemoryCategory, &[&str])] = &[
    (MemoryCategory::Preferences, &["prefiero", "me gusta", "odio", "i prefer", "i like"]),
    (MemoryCategory::Events, &["mañana", "cumpleaños", "reunión", "turno", "viaje", "evento"]),
    (MemoryCategory::Tech, &["código", "python", "rust", "servidor", "programa", "api"]),
    (MemoryCategory::Ideas, &["idea", "proyecto", "plan"]),
    (MemoryCategory::Learning, &["aprendí", "aprender", "estudio", "curso"]),
    (MemoryCategory::Personal, &["mi ", "me llamo", "vivo", "familia"]),
];

const MAX_CONTENT_CHARS: usize = 500;

impl KeywordImportance {
    pub fn score(&self, user: &str) -> u8 {
        let lowered = user.to_lowercase();
        let mut score: u8 = 3;
        if REMEMBER_CUES.iter().any(|c| lowered.contains(c)) {
            score += 5;
        }
        if EMPHASIS_CUES.iter().any(|c| lowered.contains(c)) {
            score += 2;
        }
        if PERSONAL_CUES.iter().any(|c| lowered.contains(c)) {
            score += 1;
        }
        score.min(10)
    }

    fn categorize(lowered: &str) -> MemoryCategory {
        CATEGORY_CUES
            .iter()
            .find(|(_, cues)| cues.iter().any(|c| lowered.contains(c)))
            .map(|(category, _)| *category)
            .unwrap_or(MemoryCategory::Facts)
    }
}

impl ImportanceHeuristic for KeywordImportance {
    fn assess(&self, user: &str, _assistant: &str) -> Option<MemoryCandidate> {
        let importance = self.score(user);
        if importance < self.threshold {
            return None;
        }
        let content: String = user.trim().chars().take(MAX_CONTENT_CHARS).collect();
        if content.is_empty() {
            return None;
        }
        let category = Self::categorize(&content.to_lowercase());
        Some(MemoryCandidate {
            content,
            category,
            importance,
            tags: vec!["auto".to_string(), category.as_str().to_string()],
        })
    }
}
