//! Query classification and provider ranking
//!
//! `score = (2 * keyword_hits + 3 * pattern_hits) * base_score`.
//! Each keyword or pattern counts once no matter how often it occurs.

use crate::specialties::builtin_specialties;
use anymind_core::{ProviderId, ProviderResponse, RouterConfig, SpecialtySpec};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

pub const GENERAL_QUERY: &str = "general";

const KEYWORD_WEIGHT: u32 = 2;
const PATTERN_WEIGHT: u32 = 3;

/// One compiled row of the specialty table.
#[derive(Clone, Debug)]
pub struct Specialty {
    pub provider: ProviderId,
    pub tag: String,
    pub base_score: u32,
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl Specialty {
    fn compile(spec: &SpecialtySpec) -> Self {
        let patterns = spec
            .patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid pattern for {}: {} ({})", spec.provider, p, e);
                    None
                }
            })
            .collect();

        Self {
            provider: ProviderId::new(spec.provider.as_str()),
            tag: spec.specialty.clone(),
            base_score: spec.base_score.clamp(1, 10),
            keywords: spec.keywords.iter().map(|k| k.to_lowercase()).collect(),
            patterns,
        }
    }

    /// Score against an already lower-cased message.
    fn score(&self, lowered: &str) -> u32 {
        let keyword_hits = self.keywords.iter().filter(|k| lowered.contains(k.as_str())).count() as u32;
        let pattern_hits = self.patterns.iter().filter(|re| re.is_match(lowered)).count() as u32;
        (KEYWORD_WEIGHT * keyword_hits + PATTERN_WEIGHT * pattern_hits) * self.base_score
    }
}

/// Compiled specialty table. Row order breaks score ties.
#[derive(Clone, Debug, Default)]
pub struct SpecialtyTable {
    rows: Vec<Specialty>,
}

impl SpecialtyTable {
    pub fn compile(specs: &[SpecialtySpec]) -> Self {
        Self {
            rows: specs.iter().map(Specialty::compile).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::compile(&builtin_specialties())
    }

    pub fn get(&self, provider: &str) -> Option<&Specialty> {
        self.rows.iter().find(|r| r.provider == provider)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specialty> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassificationResult {
    /// Winning specialty tag, or [`GENERAL_QUERY`] when `use_all` is set.
    pub query_type: String,
    /// Top-ranked provider; `None` only for an empty table.
    pub primary_provider: Option<ProviderId>,
    /// Every provider in the table, best first.
    pub ranked_providers: Vec<ProviderId>,
    /// No provider scored above the threshold; consult everyone.
    pub use_all: bool,
    /// Scores in ranked order.
    pub scores: Vec<(ProviderId, u32)>,
}

impl ClassificationResult {
    pub fn score_of(&self, provider: &str) -> Option<u32> {
        self.scores.iter().find(|(id, _)| *id == provider).map(|(_, s)| *s)
    }

    pub fn top_score(&self) -> u32 {
        self.scores.first().map(|(_, s)| *s).unwrap_or(0)
    }
}

pub struct QueryRouter {
    table: SpecialtyTable,
    use_all_threshold: u32,
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new(SpecialtyTable::builtin(), 5)
    }
}

impl QueryRouter {
    pub fn new(table: SpecialtyTable, use_all_threshold: u32) -> Self {
        Self { table, use_all_threshold }
    }

    /// Table from config when present, built-in table otherwise.
    pub fn from_config(config: &RouterConfig) -> Self {
        let table = match &config.specialties {
            Some(specs) => SpecialtyTable::compile(specs),
            None => SpecialtyTable::builtin(),
        };
        Self::new(table, config.use_all_threshold)
    }

    pub fn table(&self) -> &SpecialtyTable {
        &self.table
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        let lowered = text.to_lowercase();

        let mut scored: Vec<(&Specialty, u32)> =
            self.table.iter().map(|row| (row, row.score(&lowered))).collect();
        // stable: equal scores keep table order
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let top_score = scored.first().map(|(_, s)| *s).unwrap_or(0);
        let use_all = top_score < self.use_all_threshold;
        let query_type = match scored.first() {
            Some((row, _)) if !use_all => row.tag.clone(),
            _ => GENERAL_QUERY.to_string(),
        };

        let result = ClassificationResult {
            query_type,
            primary_provider: scored.first().map(|(row, _)| row.provider.clone()),
            ranked_providers: scored.iter().map(|(row, _)| row.provider.clone()).collect(),
            use_all,
            scores: scored.iter().map(|(row, s)| (row.provider.clone(), *s)).collect(),
        };

        debug!(
            query_type = %result.query_type,
            top_score,
            use_all,
            "Classified query"
        );
        result
    }

    /// Dispatch order for `available`. A general query keeps the given
    /// order; otherwise ranked providers come first and unranked ones
    /// follow in their original order.
    pub fn select_optimal(&self, text: &str, available: &[ProviderId]) -> Vec<ProviderId> {
        let classification = self.classify(text);
        if classification.use_all {
            return available.to_vec();
        }

        let mut ordered: Vec<ProviderId> = classification
            .ranked_providers
            .into_iter()
            .filter(|id| available.contains(id))
            .collect();
        for id in available {
            if !ordered.contains(id) {
                ordered.push(id.clone());
            }
        }
        ordered
    }

    /// First response whose provider appears earliest in the ranking,
    /// else the first response; `None` for an empty slice.
    pub fn select_best_response<'a>(
        &self,
        text: &str,
        responses: &'a [ProviderResponse],
    ) -> Option<&'a ProviderResponse> {
        let classification = self.classify(text);
        classification
            .ranked_providers
            .iter()
            .find_map(|id| responses.iter().find(|r| &r.provider == id))
            .or_else(|| responses.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(provider: &str, base: u32, keywords: &[&str], patterns: &[&str]) -> SpecialtySpec {
        SpecialtySpec {
            provider: provider.into(),
            specialty: format!("{}_tag", provider),
            base_score: base,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn presence_not_frequency() {
        let router = QueryRouter::new(SpecialtyTable::compile(&[row("a", 1, &["hola"], &[])]), 5);
        let once = router.classify("hola");
        let thrice = router.classify("hola hola hola");
        assert_eq!(once.score_of("a"), Some(2));
        assert_eq!(thrice.score_of("a"), Some(2));
    }

    #[test]
    fn ties_keep_table_order() {
        let table = SpecialtyTable::compile(&[
            row("first", 5, &["x"], &[]),
            row("second", 5, &["x"], &[]),
        ]);
        let result = QueryRouter::new(table, 5).classify("x");
        assert_eq!(result.ranked_providers, vec![ProviderId::new("first"), ProviderId::new("second")]);
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let table = SpecialtyTable::compile(&[row("a", 3, &[], &["(unclosed", r"\bok\b"])]);
        let result = QueryRouter::new(table, 5).classify("ok");
        assert_eq!(result.score_of("a"), Some(9));
    }

    #[test]
    fn empty_table_has_no_primary() {
        let result = QueryRouter::new(SpecialtyTable::default(), 5).classify("hola");
        assert!(result.primary_provider.is_none());
        assert!(result.use_all);
        assert_eq!(result.query_type, GENERAL_QUERY);
    }

    #[test]
    fn uppercase_input_still_matches() {
        let router = QueryRouter::default();
        let result = router.classify("TRADUCE esto al FRANCÉS");
        assert_eq!(result.primary_provider, Some(ProviderId::new("mistral")));
    }
}
