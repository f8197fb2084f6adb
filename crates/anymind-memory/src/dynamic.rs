//! Dynamic memory: tagged, importance-ranked entries with full CRUD
//!
//! Looking at a memory counts as using it: `read` and every `search`
//! hit bump `access_count` and `last_accessed`, so browsed memories
//! drift toward the top of recency-based views.

use crate::error::{MemoryError, MemoryResult};
use crate::store::{write_atomic, Persisted};
use chrono::{DateTime, Utc};
use ring::digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

const ID_LEN: usize = 12;
const IMPORTANT_THRESHOLD: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Facts,
    Preferences,
    Events,
    Learning,
    Personal,
    Tech,
    Ideas,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 7] = [
        Self::Facts,
        Self::Preferences,
        Self::Events,
        Self::Learning,
        Self::Personal,
        Self::Tech,
        Self::Ideas,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Facts => "facts",
            Self::Preferences => "preferences",
            Self::Events => "events",
            Self::Learning => "learning",
            Self::Personal => "personal",
            Self::Tech => "tech",
            Self::Ideas => "ideas",
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| MemoryError::invalid(format!("unknown category: {}", s)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub category: MemoryCategory,
    /// 1..=10
    pub importance: u8,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = Some(now);
    }
}

/// Search filters; every field left empty matches everything.
#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub category: Option<MemoryCategory>,
    /// Matches when the memory carries any of these tags.
    pub tags: Vec<String>,
    pub min_importance: u8,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Default::default() }
    }

    pub fn with_category(mut self, category: MemoryCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_min_importance(mut self, min: u8) -> Self {
        self.min_importance = min;
        self
    }

    fn matches(&self, memory: &MemoryRecord) -> bool {
        if memory.importance < self.min_importance {
            return false;
        }
        if self.category.is_some_and(|c| c != memory.category) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| memory.tags.contains(t)) {
            return false;
        }
        match &self.text {
            Some(text) => memory.content.to_lowercase().contains(&text.to_lowercase()),
            None => true,
        }
    }
}

/// Partial update; the category is fixed at creation.
#[derive(Clone, Debug, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub importance: Option<u8>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DynamicStats {
    pub total: usize,
    pub by_category: BTreeMap<MemoryCategory, usize>,
    /// Index 0 holds importance 1.
    pub by_importance: [usize; 10],
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct DynamicState {
    version: String,
    memories: BTreeMap<String, MemoryRecord>,
    categories: BTreeMap<MemoryCategory, Vec<String>>,
    last_update: Option<DateTime<Utc>>,
    total_memories: usize,
}

impl Default for DynamicState {
    fn default() -> Self {
        Self {
            version: "2.0".into(),
            memories: BTreeMap::new(),
            categories: MemoryCategory::ALL.into_iter().map(|c| (c, Vec::new())).collect(),
            last_update: None,
            total_memories: 0,
        }
    }
}

impl DynamicState {
    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
        self.total_memories = self.memories.len();
    }

    fn index(&mut self, id: &str, category: MemoryCategory) {
        let ids = self.categories.entry(category).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    fn unindex(&mut self, id: &str, category: MemoryCategory) {
        if let Some(ids) = self.categories.get_mut(&category) {
            ids.retain(|existing| existing != id);
        }
    }

    fn fresh_id(&self, content: &str, at: DateTime<Utc>) -> String {
        let stamp = at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        let mut salt = 0u32;
        loop {
            let input = format!("{}{}{}", content, stamp, if salt == 0 { String::new() } else { salt.to_string() });
            let id = memory_id(&input);
            if !self.memories.contains_key(&id) {
                return id;
            }
            salt += 1;
        }
    }
}

fn memory_id(input: &str) -> String {
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()[..ID_LEN]
        .to_string()
}

fn sort_ranked(results: &mut [MemoryRecord]) {
    results.sort_by(|a, b| {
        b.importance
            .cmp(&a.importance)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

pub struct DynamicMemory {
    store: Persisted<DynamicState>,
}

impl DynamicMemory {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { store: Persisted::open(path) }
    }

    pub fn in_memory() -> Self {
        Self { store: Persisted::in_memory() }
    }

    /// Store a new memory and return its id. Importance is clamped to 1..=10.
    pub fn write(
        &self,
        content: &str,
        category: MemoryCategory,
        importance: u8,
        tags: Vec<String>,
    ) -> MemoryResult<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MemoryError::invalid("memory content is empty"));
        }
        let importance = importance.clamp(1, 10);

        let id = self.store.update(|state| {
            let now = Utc::now();
            let id = state.fresh_id(content, now);
            state.memories.insert(
                id.clone(),
                MemoryRecord {
                    id: id.clone(),
                    content: content.to_string(),
                    category,
                    importance,
                    tags,
                    created_at: now,
                    updated_at: now,
                    access_count: 0,
                    last_accessed: None,
                },
            );
            state.index(&id, category);
            state.touch();
            id
        })?;

        info!("Memory saved: {} ({}, importance {}/10)", id, category, importance);
        Ok(id)
    }

    /// Fetch one memory, counting the access.
    pub fn read(&self, id: &str) -> MemoryResult<Option<MemoryRecord>> {
        self.store.update(|state| {
            let memory = state.memories.get_mut(id)?;
            memory.touch(Utc::now());
            Some(memory.clone())
        })
    }

    /// Filter, then rank by importance and creation time, newest first.
    /// Every hit has its access stats bumped.
    pub fn search(&self, query: &SearchQuery) -> MemoryResult<Vec<MemoryRecord>> {
        self.store.update(|state| {
            let now = Utc::now();
            let mut results: Vec<MemoryRecord> = state
                .memories
                .values_mut()
                .filter(|m| query.matches(m))
                .map(|m| {
                    m.touch(now);
                    m.clone()
                })
                .collect();
            sort_ranked(&mut results);
            results
        })
    }

    pub fn update(&self, id: &str, update: MemoryUpdate) -> MemoryResult<MemoryRecord> {
        if update.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(MemoryError::invalid("memory content is empty"));
        }
        let updated = self.store.update(|state| {
            let memory = state.memories.get_mut(id)?;
            if let Some(content) = update.content {
                memory.content = content.trim().to_string();
            }
            if let Some(importance) = update.importance {
                memory.importance = importance.clamp(1, 10);
            }
            if let Some(tags) = update.tags {
                memory.tags = tags;
            }
            memory.updated_at = Utc::now();
            let out = memory.clone();
            state.touch();
            Some(out)
        })?;
        updated.ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> MemoryResult<MemoryRecord> {
        let removed = self.store.update(|state| {
            let memory = state.memories.remove(id)?;
            state.unindex(id, memory.category);
            state.touch();
            Some(memory)
        })?;
        let removed = removed.ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        info!("Memory deleted: {}", id);
        Ok(removed)
    }

    /// Every memory, optionally restricted to one category. No access tracking.
    pub fn all(&self, category: Option<MemoryCategory>) -> Vec<MemoryRecord> {
        self.store.read(|state| match category {
            Some(category) => state
                .categories
                .get(&category)
                .map(|ids| ids.iter().filter_map(|id| state.memories.get(id).cloned()).collect())
                .unwrap_or_default(),
            None => state.memories.values().cloned().collect(),
        })
    }

    pub fn important(&self, min_importance: u8) -> MemoryResult<Vec<MemoryRecord>> {
        self.search(&SearchQuery::default().with_min_importance(min_importance))
    }

    pub fn recent(&self, limit: usize) -> Vec<MemoryRecord> {
        let mut all = self.all(None);
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        all
    }

    pub fn len(&self) -> usize {
        self.store.read(|state| state.memories.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> DynamicStats {
        self.store.read(|state| {
            let mut by_category = BTreeMap::new();
            let mut by_importance = [0usize; 10];
            for memory in state.memories.values() {
                *by_category.entry(memory.category).or_insert(0) += 1;
                by_importance[usize::from(memory.importance.clamp(1, 10)) - 1] += 1;
            }
            DynamicStats {
                total: state.memories.len(),
                by_category,
                by_importance,
                last_update: state.last_update,
            }
        })
    }

    /// Write the whole store to `path` as JSON.
    pub fn export(&self, path: &Path) -> MemoryResult<()> {
        self.store.read(|state| write_atomic(path, state))?;
        info!("Memories exported to {}", path.display());
        Ok(())
    }

    /// Merge memories from an export. Existing ids win. Returns how many were added.
    pub fn import(&self, path: &Path) -> MemoryResult<usize> {
        let content = std::fs::read_to_string(path)?;
        let imported: DynamicState = serde_json::from_str(&content)?;

        let added = self.store.update(|state| {
            let mut added = 0;
            for (id, memory) in imported.memories {
                if state.memories.contains_key(&id) {
                    continue;
                }
                state.index(&id, memory.category);
                state.memories.insert(id, memory);
                added += 1;
            }
            state.touch();
            added
        })?;
        info!("Imported {} memories from {}", added, path.display());
        Ok(added)
    }

    /// Drop every memory. Requires `confirm == true`. Returns how many were removed.
    pub fn clear_all(&self, confirm: bool) -> MemoryResult<usize> {
        if !confirm {
            return Err(MemoryError::ConfirmationRequired);
        }
        let removed = self.store.update(|state| {
            let removed = state.memories.len();
            *state = DynamicState::default();
            state.touch();
            removed
        })?;
        info!("Cleared {} memories", removed);
        Ok(removed)
    }

    /// Important memories (>= 7) then the ten most recent, de-duplicated by id.
    pub fn context_summary(&self, max_memories: usize) -> MemoryResult<String> {
        let important = self.important(IMPORTANT_THRESHOLD)?;
        let recent = self.recent(10);

        let mut picked: Vec<MemoryRecord> = Vec::new();
        for memory in important.into_iter().chain(recent) {
            if picked.len() >= max_memories {
                break;
            }
            if !picked.iter().any(|p| p.id == memory.id) {
                picked.push(memory);
            }
        }

        if picked.is_empty() {
            return Ok("[No hay memorias guardadas todavía]".to_string());
        }

        let mut summary = String::from("=== MEMORIAS IMPORTANTES ===\n\n");
        for (i, memory) in picked.iter().enumerate() {
            summary.push_str(&format!(
                "{}. [{}] {}\n   (Importancia: {}/10, Accesos: {})\n\n",
                i + 1,
                memory.category.as_str().to_uppercase(),
                memory.content,
                memory.importance,
                memory.access_count
            ));
        }
        Ok(summary)
    }
}
