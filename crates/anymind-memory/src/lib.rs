//! Anymind Memory - persistent stores fed by every completed round
//!
//! Three independent JSON documents:
//! - Conversation log: every exchange, append-only
//! - Compressed memory: one-line tokens per exchange plus keyed facts and preferences
//! - Dynamic memory: tagged, importance-ranked entries with full CRUD
//!
//! Each store holds its state behind a mutex for the whole
//! read-modify-write-save sequence and replaces its file atomically.

pub mod compressed;
pub mod conversation;
pub mod dynamic;
pub mod error;
pub mod store;

pub use compressed::{CompressedMemory, CompressedStats, CompressedToken, KeyFact, Relationship};
pub use conversation::{ConversationEntry, ConversationLog};
pub use dynamic::{DynamicMemory, DynamicStats, MemoryCategory, MemoryRecord, MemoryUpdate, SearchQuery};
pub use error::{MemoryError, MemoryResult};
pub use store::Persisted;
