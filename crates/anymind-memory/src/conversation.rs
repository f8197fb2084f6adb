//! Append-only conversation log
//!
//! The whole log is rewritten on every append. Fine for a personal
//! assistant with a few thousand exchanges; past that, switch to an
//! append-only line format.

use crate::error::MemoryResult;
use crate::store::Persisted;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub assistant: String,
}

pub struct ConversationLog {
    store: Persisted<Vec<ConversationEntry>>,
}

impl ConversationLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { store: Persisted::open(path) }
    }

    pub fn in_memory() -> Self {
        Self { store: Persisted::in_memory() }
    }

    pub fn append(&self, user: &str, assistant: &str) -> MemoryResult<ConversationEntry> {
        let entry = ConversationEntry {
            timestamp: Utc::now(),
            user: user.to_string(),
            assistant: assistant.to_string(),
        };
        self.store.update(|log| log.push(entry.clone()))?;
        Ok(entry)
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ConversationEntry> {
        self.store.read(|log| log[log.len().saturating_sub(n)..].to_vec())
    }

    /// Case-insensitive substring search over both sides of each exchange.
    pub fn search(&self, query: &str) -> Vec<ConversationEntry> {
        let needle = query.to_lowercase();
        self.store.read(|log| {
            log.iter()
                .filter(|e| {
                    e.user.to_lowercase().contains(&needle)
                        || e.assistant.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect()
        })
    }

    pub fn clear(&self) -> MemoryResult<()> {
        self.store.update(|log| log.clear())
    }

    pub fn len(&self) -> usize {
        self.store.read(|log| log.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_keeps_chronological_order() {
        let log = ConversationLog::in_memory();
        for i in 0..5 {
            log.append(&format!("u{}", i), &format!("a{}", i)).unwrap();
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user, "u3");
        assert_eq!(recent[1].user, "u4");
        assert!(recent[0].timestamp <= recent[1].timestamp);
        assert_eq!(log.recent(50).len(), 5);
    }

    #[test]
    fn search_matches_either_side() {
        let log = ConversationLog::in_memory();
        log.append("Hablame de Rosario", "Es una ciudad").unwrap();
        log.append("hola", "Hola, ¿cómo estás?").unwrap();

        assert_eq!(log.search("rosario").len(), 1);
        assert_eq!(log.search("HOLA").len(), 1);
        assert!(log.search("python").is_empty());
    }

    #[test]
    fn clear_empties_log() {
        let log = ConversationLog::in_memory();
        log.append("a", "b").unwrap();
        log.clear().unwrap();
        assert!(log.is_empty());
    }
}
