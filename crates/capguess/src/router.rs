//! Query-complexity routing.
//!
//! Decides which model tier answers a chat query. A layered heuristic,
//! not a learned classifier: rules run in priority order and the first
//! hit wins, so a cross-company comparison stays on the high tier even
//! when it is phrased as a simple lookup.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::ModelTier;

// ============================================================================
// Vocabulary
// ============================================================================

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("ticker regex is valid"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year regex is valid"));

/// Uppercase tokens that look like tickers but are financial shorthand.
const TICKER_STOPLIST: &[&str] = &[
    "PE", "PB", "PS", "EPS", "ROE", "ROA", "ROI", "FCF", "OCF", "EBIT", "EBITDA", "GAAP", "SEC",
    "USD", "CEO", "CFO", "COO", "IPO", "YOY", "TTM", "FY", "MDA", "AI", "IT", "US", "ETF", "IRS",
];

const ANALYTICAL_TERMS: &[&str] = &[
    "compare",
    "comparison",
    "versus",
    "thesis",
    "discrepancy",
    "forward-looking",
    "pattern",
    "investment case",
    "valuation",
    "trend",
    "trajectory",
    "analyze",
    "analysis",
    "bull case",
    "bear case",
];

const SIMPLE_LOOKUP_TERMS: &[&str] = &[
    "what is",
    "what was",
    "current",
    "latest",
    "definition",
    "how much",
];

// ============================================================================
// Decision
// ============================================================================

/// Routing decision plus the rule that produced it, for logs and
/// response metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDecision {
    pub tier: ModelTier,
    pub reason: String,
}

fn high(reason: String) -> TierDecision {
    TierDecision {
        tier: ModelTier::High,
        reason,
    }
}

/// Classify one chat query.
///
/// `excerpt_count` is how many filing excerpts retrieval produced for
/// this turn; `conversation_depth` counts the user's prior turns in
/// the session.
pub fn classify(query: &str, excerpt_count: usize, conversation_depth: usize) -> TierDecision {
    let query_lower = query.to_lowercase();
    let analytical = contains_any(&query_lower, ANALYTICAL_TERMS);
    let simple_lookup = contains_any(&query_lower, SIMPLE_LOOKUP_TERMS);

    // Cross-company questions need the stronger model regardless of
    // phrasing.
    let tickers = distinct_tickers(query);
    if tickers.len() > 1 {
        return high(format!("multiple tickers: {}", tickers.join(", ")));
    }

    // Multi-year analytical questions.
    let years = distinct_years(query);
    if years >= 3 && analytical {
        return high(format!("analysis across {} distinct years", years));
    }

    // A large retrieved context deserves a model that can use it,
    // unless the question is a plain lookup.
    if excerpt_count >= 15 && !simple_lookup {
        return high(format!("{} excerpts retrieved", excerpt_count));
    }

    // Deep conversations accumulate context worth the stronger model.
    if conversation_depth >= 3 {
        return high(format!("conversation depth {}", conversation_depth));
    }

    if analytical && !simple_lookup {
        return high("analytical phrasing".to_string());
    }

    let reason = if simple_lookup {
        "simple lookup"
    } else {
        "standard query"
    };
    TierDecision {
        tier: ModelTier::Standard,
        reason: reason.to_string(),
    }
}

/// Distinct ticker-shaped tokens in `query`, stoplist filtered, in
/// order of first appearance.
pub fn distinct_tickers(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();
    for m in TICKER_RE.find_iter(query) {
        let token = m.as_str();
        if TICKER_STOPLIST.contains(&token) {
            continue;
        }
        if seen.insert(token) {
            tickers.push(token.to_string());
        }
    }
    tickers
}

fn distinct_years(query: &str) -> usize {
    YEAR_RE
        .find_iter(query)
        .map(|m| m.as_str())
        .collect::<HashSet<_>>()
        .len()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_tickers_route_high() {
        let decision = classify("How does AAPL compare to MSFT?", 0, 0);
        assert_eq!(decision.tier, ModelTier::High);
        assert!(decision.reason.contains("AAPL"));
        assert!(decision.reason.contains("MSFT"));
    }

    #[test]
    fn financial_shorthand_is_not_a_ticker() {
        let decision = classify("What is the PE ratio in USD?", 0, 0);
        assert_eq!(decision.tier, ModelTier::Standard);
        assert_eq!(decision.reason, "simple lookup");
    }

    #[test]
    fn multi_year_analysis_routes_high() {
        let decision = classify(
            "Analyze the revenue trend across 2021, 2022 and 2023",
            0,
            0,
        );
        assert_eq!(decision.tier, ModelTier::High);
        assert!(decision.reason.contains("3 distinct years"));
    }

    #[test]
    fn three_years_without_analytical_phrasing_stay_standard() {
        let decision = classify("Revenue for 2021, 2022 and 2023?", 0, 0);
        assert_eq!(decision.tier, ModelTier::Standard);
    }

    #[test]
    fn repeated_years_count_once() {
        let decision = classify("Compare 2023 revenue to 2023 costs and 2023 cash", 0, 0);
        // One distinct year, but "compare" alone still routes high via
        // the analytical rule.
        assert_eq!(decision.tier, ModelTier::High);
        assert_eq!(decision.reason, "analytical phrasing");
    }

    #[test]
    fn heavy_retrieved_context_routes_high() {
        let decision = classify("Summarize the filing discussion", 15, 0);
        assert_eq!(decision.tier, ModelTier::High);
        assert!(decision.reason.contains("15 excerpts"));
    }

    #[test]
    fn heavy_context_with_a_simple_lookup_stays_standard() {
        let decision = classify("What is the latest revenue?", 20, 0);
        assert_eq!(decision.tier, ModelTier::Standard);
        assert_eq!(decision.reason, "simple lookup");
    }

    #[test]
    fn deep_conversations_route_high() {
        let decision = classify("And how did that affect cash?", 0, 3);
        assert_eq!(decision.tier, ModelTier::High);
        assert!(decision.reason.contains("depth 3"));
        assert_eq!(classify("And equity?", 0, 2).tier, ModelTier::Standard);
    }

    #[test]
    fn analytical_phrasing_routes_high() {
        let decision = classify("Walk me through the bull case", 0, 0);
        assert_eq!(decision.tier, ModelTier::High);
        assert_eq!(decision.reason, "analytical phrasing");
    }

    #[test]
    fn plain_questions_default_to_standard() {
        let decision = classify("Did margins improve?", 0, 0);
        assert_eq!(decision.tier, ModelTier::Standard);
        assert_eq!(decision.reason, "standard query");
    }

    #[test]
    fn ticker_rule_outranks_simple_lookup_phrasing() {
        let decision = classify("What is the latest on AAPL versus NVDA?", 0, 0);
        assert_eq!(decision.tier, ModelTier::High);
    }
}
