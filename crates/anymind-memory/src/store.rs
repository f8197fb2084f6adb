//! Mutex-guarded JSON document with atomic replace-on-write

use crate::error::MemoryResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One persisted document. `path == None` keeps it in memory only.
pub struct Persisted<T> {
    state: Mutex<T>,
    path: Option<PathBuf>,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    /// Load the document at `path`, starting empty when it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load_or_default(&path);
        Self {
            state: Mutex::new(state),
            path: Some(path),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(T::default()),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a read-only view under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate a draft, save it, then commit, holding the lock throughout.
    /// A failed save leaves the live state untouched.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> MemoryResult<R> {
        let mut guard = self.lock();
        let mut draft = guard.clone();
        let out = f(&mut draft);
        self.save(&draft)?;
        *guard = draft;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, state: &T) -> MemoryResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_atomic(path, state)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(state) => {
                info!("Loaded {}", path.display());
                state
            }
            Err(e) => {
                warn!("Failed to parse {}: {} - starting empty", path.display(), e);
                T::default()
            }
        },
        Err(_) => {
            debug!("No store at {} - starting empty", path.display());
            T::default()
        }
    }
}

/// Serialize, write a sibling `.tmp`, then rename over the target.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> MemoryResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, Serialize, serde::Deserialize)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn update_persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("counter.json");

        let store: Persisted<Counter> = Persisted::open(&path);
        store.update(|c| c.n += 2).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reopened: Persisted<Counter> = Persisted::open(&path);
        assert_eq!(reopened.read(|c| c.n), 2);
    }

    #[test]
    fn failed_save_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let store: Persisted<Counter> = Persisted::open(blocker.join("counter.json"));
        assert!(store.update(|c| c.n = 5).is_err());
        assert_eq!(store.read(|c| c.n), 0);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let store: std::sync::Arc<Persisted<Counter>> = std::sync::Arc::new(Persisted::open(&path));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store.update(|c| c.n += 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reopened: Persisted<Counter> = Persisted::open(&path);
        assert_eq!(reopened.read(|c| c.n), 80);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        std::fs::write(&path, "{not json").unwrap();

        let store: Persisted<Counter> = Persisted::open(&path);
        assert_eq!(store.read(|c| c.n), 0);
    }

    #[test]
    fn in_memory_never_touches_disk() {
        let store: Persisted<Counter> = Persisted::in_memory();
        store.update(|c| c.n = 9).unwrap();
        assert!(store.path().is_none());
        assert_eq!(store.read(|c| c.n), 9);
    }
}
