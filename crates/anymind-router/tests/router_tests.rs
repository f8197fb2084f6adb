//! Tests for anymind-router: scoring, ranking, dispatch order, reply selection

use anymind_core::{ProviderFailure, ProviderId, ProviderResponse, RouterConfig, SpecialtySpec};
use anymind_router::*;

fn ids(names: &[&str]) -> Vec<ProviderId> {
    names.iter().map(|n| ProviderId::new(*n)).collect()
}

fn row(provider: &str, base: u32, keywords: &[&str], patterns: &[&str]) -> SpecialtySpec {
    SpecialtySpec {
        provider: provider.into(),
        specialty: format!("{}_tag", provider),
        base_score: base,
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        patterns: patterns.iter().map(|s| s.to_string()).collect(),
    }
}

// ===========================================================================
// Classification
// ===========================================================================

#[test]
fn news_query_ranks_search_provider_first() {
    let router = QueryRouter::default();
    let result = router.classify("Qué noticias hay sobre Argentina hoy?");

    assert_eq!(result.primary_provider, Some(ProviderId::new("perplexity")));
    assert_eq!(result.ranked_providers[0], "perplexity");
    assert_eq!(result.query_type, "búsqueda_tiempo_real");
    assert!(!result.use_all);

    let top = result.score_of("perplexity").unwrap();
    for (id, score) in result.scores.iter().skip(1) {
        assert!(top > *score, "{} scored {}", id, score);
    }
}

#[test]
fn news_pattern_adds_to_keyword() {
    let table = SpecialtyTable::compile(&[
        row("search", 10, &["noticias"], &[r"\bnoticias (de|sobre)\b"]),
        row("chat", 6, &["hola"], &[]),
    ]);
    let result = QueryRouter::new(table, 5).classify("Noticias sobre Rosario");
    // 2 * 10 for the keyword plus 3 * 10 for the pattern
    assert_eq!(result.score_of("search"), Some(50));
    assert_eq!(result.score_of("chat"), Some(0));
}

#[test]
fn classify_is_deterministic() {
    let router = QueryRouter::default();
    let text = "Analiza el código de esta función para resolver la ecuación";
    let first = router.classify(text);
    for _ in 0..10 {
        let again = router.classify(text);
        assert_eq!(again.ranked_providers, first.ranked_providers);
        assert_eq!(again.scores, first.scores);
    }
}

#[test]
fn more_matches_never_lower_rank() {
    let table = SpecialtyTable::compile(&[
        row("a", 8, &["alfa"], &[]),
        row("b", 5, &["beta", "gamma", "delta"], &[r"\bomega\b"]),
        row("c", 7, &["alfa", "beta"], &[]),
    ]);
    let router = QueryRouter::new(table, 5);

    let texts = ["beta", "beta gamma", "beta gamma delta", "beta gamma delta omega"];
    let mut last_rank = usize::MAX;
    for text in texts {
        let result = router.classify(&format!("alfa {}", text));
        let rank = result.ranked_providers.iter().position(|p| *p == "b").unwrap();
        assert!(rank <= last_rank, "rank of b went from {} to {} on {:?}", last_rank, rank, text);
        last_rank = rank;
    }
    assert_eq!(last_rank, 0);
}

#[test]
fn no_matches_means_use_all() {
    let router = QueryRouter::default();
    let result = router.classify("zzz qqq");
    assert!(result.use_all);
    assert_eq!(result.query_type, GENERAL_QUERY);
    assert_eq!(result.top_score(), 0);
    // ranking still covers the whole table
    assert_eq!(result.ranked_providers.len(), router.table().len());
}

#[test]
fn threshold_comes_from_config() {
    let config = RouterConfig {
        use_all_threshold: 1_000,
        specialties: Some(vec![row("solo", 10, &["hola"], &[r"\bhola\b"])]),
    };
    let router = QueryRouter::from_config(&config);
    let result = router.classify("hola");
    assert_eq!(result.score_of("solo"), Some(50));
    assert!(result.use_all);
    assert_eq!(router.table().len(), 1);
}

// ===========================================================================
// Dispatch order
// ===========================================================================

#[test]
fn optimal_order_puts_specialist_first() {
    let router = QueryRouter::default();
    let available = ids(&["ollama", "google", "deepseek", "custom"]);
    let order = router.select_optimal("Resolver esta ecuación de cálculo", &available);

    assert_eq!(order[0], "deepseek");
    assert_eq!(order.last().unwrap(), &ProviderId::new("custom"));
    assert_eq!(order.len(), available.len());
}

#[test]
fn general_query_keeps_given_order() {
    let router = QueryRouter::default();
    let available = ids(&["mistral", "ollama", "groq"]);
    assert_eq!(router.select_optimal("zzz", &available), available);
}

// ===========================================================================
// Reply selection
// ===========================================================================

#[test]
fn best_response_is_first_ranked_present() {
    let table = SpecialtyTable::compile(&[
        row("A", 10, &["x"], &[]),
        row("B", 9, &["x"], &[]),
        row("C", 8, &["x"], &[]),
    ]);
    let router = QueryRouter::new(table, 5);
    let responses = vec![
        ProviderResponse::ok("C", "from C"),
        ProviderResponse::ok("B", "from B"),
    ];

    let best = router.select_best_response("x", &responses).unwrap();
    assert_eq!(best.provider, "B");
    assert_eq!(best.text(), Some("from B"));
}

#[test]
fn unranked_responses_fall_back_to_first() {
    let router = QueryRouter::default();
    let responses = vec![
        ProviderResponse::ok("local-a", "uno"),
        ProviderResponse::ok("local-b", "dos"),
    ];
    let best = router.select_best_response("hola", &responses).unwrap();
    assert_eq!(best.provider, "local-a");
}

#[test]
fn empty_responses_select_nothing() {
    let router = QueryRouter::default();
    assert!(router.select_best_response("hola", &[]).is_none());
}

#[test]
fn selection_ignores_success_flag() {
    // callers filter failures out; the ranker itself only looks at ids
    let router = QueryRouter::default();
    let responses = vec![ProviderResponse::failed("ollama", ProviderFailure::transport("down"))];
    assert_eq!(router.select_best_response("hola", &responses).unwrap().provider, "ollama");
}
