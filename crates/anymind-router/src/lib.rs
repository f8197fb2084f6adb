//! Anymind Router - specialty-based query classification
//!
//! Scores a message against a table of provider specialties
//! (keywords and regex patterns) and ranks providers for dispatch
//! and for picking the winning reply.

pub mod classifier;
pub mod specialties;

pub use classifier::{ClassificationResult, QueryRouter, Specialty, SpecialtyTable, GENERAL_QUERY};
pub use specialties::builtin_specialties;
