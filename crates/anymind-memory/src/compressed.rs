//! Compressed memory: one short token per exchange plus keyed facts
//!
//! Token format is `category|concepts|details|yyyymmdd`, e.g.
//! `ais|gemini groq|compará gemini groq|20250114`. Only the last
//! [`MAX_TOKENS`] tokens are kept.

use crate::error::MemoryResult;
use crate::store::Persisted;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const MAX_TOKENS: usize = 100;

const MAX_CONCEPTS: usize = 5;
const FALLBACK_CONCEPTS: usize = 3;
const MAX_DETAILS: usize = 10;

/// Topic categories, checked in order; first hit wins.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("cod", &["código", "code", "programa", "función", "class", "bug"]),
    ("ais", &["ia", "modelo", "provider", "gemini", "gpt"]),
    ("mem", &["memoria", "recordar", "guardar", "aprendizaje"]),
    ("voc", &["voz", "hablar", "escuchar", "tts", "stt"]),
    ("vis", &["visión", "pantalla", "captura", "ver", "screenshot"]),
    ("prf", &["preferencia", "gustar", "quiero", "prefiero"]),
    ("prj", &["proyecto", "app", "crear", "hacer"]),
];

const GENERAL: &str = "gen";

const VOCABULARY: &[&str] = &[
    "any", "gemini", "groq", "deepseek", "python", "gui", "vision", "voice", "memoria", "asi",
    "consciencia", "análisis", "auto", "perplexity", "cohere", "huggingface", "rosario",
    "argentina",
];

const STOP_WORDS: &[&str] = &[
    "el", "la", "los", "las", "un", "una", "de", "del", "que", "en", "y", "a", "para", "con",
    "por", "es", "esta", "este", "como", "qué", "cómo", "cuál", "cuándo", "dónde",
];

fn category_label(code: &str) -> &str {
    match code {
        "cod" => "Programación",
        "ais" => "IAs",
        "mem" => "Memoria",
        "voc" => "Voz",
        "vis" => "Visión",
        "prf" => "Preferencias",
        "prj" => "Proyecto",
        "gen" => "General",
        other => other,
    }
}

fn fact_category_label(category: &str) -> &str {
    match category {
        "usuario" => "Usuario",
        "ias" => "IAs configuradas",
        "proyectos" => "Proyectos",
        "tecnologias" => "Tecnologías",
        "tareas" => "Tareas pendientes",
        "problemas" => "Problemas recientes",
        "contexto" => "Contexto",
        other => other,
    }
}

// ============================================================
// Token
// ============================================================

/// Parsed view of one compressed token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedToken {
    pub category: String,
    pub concepts: String,
    pub details: String,
    /// `yyyymmdd`
    pub date: String,
}

impl CompressedToken {
    /// Derive a token from one exchange.
    pub fn derive(user: &str, assistant: &str, date: NaiveDate) -> Self {
        Self {
            category: detect_category(user, assistant).to_string(),
            concepts: key_concepts(user, assistant),
            details: minimal_details(user),
            date: date.format("%Y%m%d").to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(4, '|');
        let category = parts.next()?.to_string();
        let concepts = parts.next()?.to_string();
        let details = parts.next()?.to_string();
        let date = parts.next().unwrap_or_default().to_string();
        Some(Self { category, concepts, details, date })
    }
}

impl fmt::Display for CompressedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}|{}", self.category, self.concepts, self.details, self.date)
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

fn detect_category(user: &str, assistant: &str) -> &'static str {
    let combined = format!("{} {}", user, assistant).to_lowercase();
    let tokens: Vec<&str> = words(&combined).collect();

    CATEGORIES
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                // Short keywords ("ia", "ver", "app") only count as whole words
                if kw.chars().count() <= 3 {
                    tokens.contains(kw)
                } else {
                    combined.contains(kw)
                }
            })
        })
        .map(|(code, _)| *code)
        .unwrap_or(GENERAL)
}

fn key_concepts(user: &str, assistant: &str) -> String {
    let combined = format!("{} {}", user, assistant).to_lowercase();
    let raw: Vec<&str> = combined.split_whitespace().collect();

    let mut found: Vec<String> = Vec::new();
    for word in &raw {
        let clean: String = word.chars().filter(|c| c.is_alphanumeric() || *c == '-').collect();
        if VOCABULARY.contains(&clean.as_str()) && !found.contains(&clean) {
            found.push(clean);
            if found.len() >= MAX_CONCEPTS {
                break;
            }
        }
    }

    if found.is_empty() {
        found = raw
            .iter()
            .filter(|w| w.chars().count() > 4 && w.chars().all(char::is_alphabetic))
            .take(FALLBACK_CONCEPTS)
            .map(|w| w.to_string())
            .collect();
    }
    found.join(" ")
}

fn minimal_details(user: &str) -> String {
    user.to_lowercase()
        .split_whitespace()
        .map(|w| w.replace('|', ""))
        .filter(|w| !STOP_WORDS.contains(&w.as_str()) && w.chars().count() > 2)
        .take(MAX_DETAILS)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================
// Store
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyFact {
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct CompressedState {
    version: String,
    context_tokens: Vec<String>,
    /// category -> key -> fact
    key_facts: BTreeMap<String, BTreeMap<String, KeyFact>>,
    preferences: BTreeMap<String, KeyFact>,
    /// `"{a}-{b}"` -> relationship
    relationships: BTreeMap<String, Relationship>,
    last_update: Option<DateTime<Utc>>,
}

impl Default for CompressedState {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            context_tokens: Vec::new(),
            key_facts: BTreeMap::new(),
            preferences: BTreeMap::new(),
            relationships: BTreeMap::new(),
            last_update: None,
        }
    }
}

impl CompressedState {
    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CompressedStats {
    pub total_tokens: usize,
    pub key_facts: usize,
    pub preferences: usize,
    pub relationships: usize,
    pub last_update: Option<DateTime<Utc>>,
}

pub struct CompressedMemory {
    store: Persisted<CompressedState>,
}

impl CompressedMemory {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { store: Persisted::open(path) }
    }

    pub fn in_memory() -> Self {
        Self { store: Persisted::in_memory() }
    }

    /// Derive a token for today's date and append it.
    pub fn compress(&self, user: &str, assistant: &str) -> MemoryResult<String> {
        self.compress_on(user, assistant, Local::now().date_naive())
    }

    pub fn compress_on(&self, user: &str, assistant: &str, date: NaiveDate) -> MemoryResult<String> {
        let token = CompressedToken::derive(user, assistant, date).to_string();
        self.store.update(|state| {
            state.context_tokens.push(token.clone());
            let overflow = state.context_tokens.len().saturating_sub(MAX_TOKENS);
            state.context_tokens.drain(..overflow);
            state.touch();
        })?;
        Ok(token)
    }

    /// Last-write-wins per `(category, key)`.
    pub fn add_fact(&self, category: &str, key: &str, value: &str) -> MemoryResult<()> {
        self.store.update(|state| {
            state.key_facts.entry(category.to_string()).or_default().insert(
                key.to_string(),
                KeyFact { value: value.to_string(), timestamp: Utc::now() },
            );
            state.touch();
        })
    }

    pub fn add_preference(&self, key: &str, value: &str) -> MemoryResult<()> {
        self.store.update(|state| {
            state.preferences.insert(
                key.to_string(),
                KeyFact { value: value.to_string(), timestamp: Utc::now() },
            );
            state.touch();
        })
    }

    pub fn add_relationship(&self, a: &str, b: &str, kind: &str) -> MemoryResult<()> {
        self.store.update(|state| {
            state.relationships.insert(
                format!("{}-{}", a, b),
                Relationship { kind: kind.to_string(), timestamp: Utc::now() },
            );
            state.touch();
        })
    }

    pub fn tokens(&self) -> Vec<String> {
        self.store.read(|state| state.context_tokens.clone())
    }

    pub fn fact(&self, category: &str, key: &str) -> Option<KeyFact> {
        self.store
            .read(|state| state.key_facts.get(category).and_then(|facts| facts.get(key)).cloned())
    }

    pub fn preference(&self, key: &str) -> Option<KeyFact> {
        self.store.read(|state| state.preferences.get(key).cloned())
    }

    pub fn relationship(&self, a: &str, b: &str) -> Option<Relationship> {
        self.store.read(|state| state.relationships.get(&format!("{}-{}", a, b)).cloned())
    }

    /// Human-readable digest: facts, then preferences, then recent topics.
    /// Empty when nothing has been stored yet.
    pub fn render_full_context(&self) -> String {
        self.store.read(|state| {
            if state.context_tokens.is_empty()
                && state.key_facts.is_empty()
                && state.preferences.is_empty()
            {
                return String::new();
            }

            let mut out = vec!["=== MEMORIA DE CONVERSACIONES ANTERIORES ===".to_string()];

            if !state.key_facts.is_empty() {
                out.push("\nHECHOS IMPORTANTES:".into());
                for (category, facts) in &state.key_facts {
                    let label = fact_category_label(category);
                    for (key, fact) in facts.iter().take(5) {
                        out.push(format!("  • {} - {}: {}", label, key, fact.value));
                    }
                }
            }

            if !state.preferences.is_empty() {
                out.push("\nPREFERENCIAS DEL USUARIO:".into());
                for (key, pref) in state.preferences.iter().take(8) {
                    let clean_key = key.trim_start_matches("pref_").replace('_', " ");
                    let value: String = pref.value.chars().take(100).collect();
                    out.push(format!("  • {}: {}", clean_key, value));
                }
            }

            if !state.context_tokens.is_empty() {
                out.push("\nTEMAS RECIENTES:".into());
                let start = state.context_tokens.len().saturating_sub(5);
                for raw in &state.context_tokens[start..] {
                    if let Some(token) = CompressedToken::parse(raw) {
                        let details: String = token.details.chars().take(50).collect();
                        out.push(format!(
                            "  • {}: {} - {}",
                            category_label(&token.category),
                            token.concepts,
                            details
                        ));
                    }
                }
            }

            out.push(format!("\n{}", "=".repeat(45)));
            out.join("\n")
        })
    }

    /// `cat:concepts,concepts | cat:...` over the last `max_tokens` tokens,
    /// at most three distinct concept groups per category.
    pub fn render_compact_summary(&self, max_tokens: usize) -> String {
        self.store.read(|state| {
            let start = state.context_tokens.len().saturating_sub(max_tokens);
            let mut groups: Vec<(String, Vec<String>)> = Vec::new();

            for token in state.context_tokens[start..].iter().filter_map(|t| CompressedToken::parse(t)) {
                let idx = match groups.iter().position(|(cat, _)| *cat == token.category) {
                    Some(idx) => idx,
                    None => {
                        groups.push((token.category.clone(), Vec::new()));
                        groups.len() - 1
                    }
                };
                let items = &mut groups[idx].1;
                if items.len() < 3 && !items.contains(&token.concepts) {
                    items.push(token.concepts);
                }
            }

            groups
                .into_iter()
                .map(|(cat, items)| format!("{}:{}", cat, items.join(",")))
                .collect::<Vec<_>>()
                .join(" | ")
        })
    }

    /// Last ten tokens containing `query`, case-insensitive.
    pub fn search_context(&self, query: &str) -> Vec<String> {
        let needle = query.to_lowercase();
        self.store.read(|state| {
            let hits: Vec<String> = state
                .context_tokens
                .iter()
                .filter(|t| t.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            let start = hits.len().saturating_sub(10);
            hits[start..].to_vec()
        })
    }

    /// Drop tokens dated before `days` ago. Returns how many remain.
    pub fn clear_older_than(&self, days: i64) -> MemoryResult<usize> {
        self.clear_older_than_on(days, Local::now().date_naive())
    }

    pub fn clear_older_than_on(&self, days: i64, today: NaiveDate) -> MemoryResult<usize> {
        let cutoff = (today - Duration::days(days)).format("%Y%m%d").to_string();
        self.store.update(|state| {
            state.context_tokens.retain(|raw| {
                CompressedToken::parse(raw)
                    .map(|t| t.date.len() == 8 && t.date >= cutoff)
                    .unwrap_or(false)
            });
            state.touch();
            state.context_tokens.len()
        })
    }

    pub fn stats(&self) -> CompressedStats {
        self.store.read(|state| CompressedStats {
            total_tokens: state.context_tokens.len(),
            key_facts: state.key_facts.values().map(BTreeMap::len).sum(),
            preferences: state.preferences.len(),
            relationships: state.relationships.len(),
            last_update: state.last_update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn token_has_four_fields() {
        let token = CompressedToken::derive(
            "Compará gemini con groq para mi proyecto",
            "Gemini razona mejor, Groq es más rápido",
            day(2025, 1, 14),
        );
        assert_eq!(token.category, "ais");
        assert_eq!(token.concepts, "gemini groq");
        assert_eq!(token.details, "compará gemini groq proyecto");
        assert_eq!(token.date, "20250114");
        assert_eq!(token.to_string().split('|').count(), 4);
    }

    #[test]
    fn categories_follow_priority() {
        assert_eq!(detect_category("tengo un bug en el código", "revisemos"), "cod");
        assert_eq!(detect_category("quiero recordar esto", ""), "mem");
        assert_eq!(detect_category("prefiero el té", ""), "prf");
        assert_eq!(detect_category("buen día", "hola"), "gen");
    }

    #[test]
    fn short_keywords_need_whole_words() {
        // "noticias" contains "ia" but is not about AI
        assert_eq!(detect_category("noticias del clima", "lluvia"), "gen");
        assert_eq!(detect_category("qué ia usás", ""), "ais");
    }

    #[test]
    fn fallback_concepts_take_first_long_words() {
        assert_eq!(key_concepts("mañana quiero cocinar lentejas guisadas", ""), "mañana quiero cocinar");
    }

    #[test]
    fn details_drop_stop_words_and_short_words() {
        assert_eq!(minimal_details("Qué es la memoria de Any?"), "memoria any?");
    }

    #[test]
    fn pipe_in_user_text_does_not_break_token() {
        let token = CompressedToken::derive("uno|dos tres", "", day(2025, 1, 1)).to_string();
        assert_eq!(token.split('|').count(), 4);
    }

    #[test]
    fn clear_older_than_uses_token_date() {
        let memory = CompressedMemory::in_memory();
        memory.compress_on("viejo tema", "", day(2024, 1, 1)).unwrap();
        memory.compress_on("nuevo tema", "", day(2025, 1, 10)).unwrap();

        let remaining = memory.clear_older_than_on(30, day(2025, 1, 15)).unwrap();
        assert_eq!(remaining, 1);
        assert!(memory.tokens()[0].contains("nuevo"));
    }
}
