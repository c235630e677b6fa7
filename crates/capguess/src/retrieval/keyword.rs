//! Keyword fallback retrieval.
//!
//! When semantic search comes back sparse, derive keyword clusters
//! from the query and scan the filing corpus for them directly. Blunt,
//! but it guarantees qualitative questions are never answered from
//! numbers alone just because the vector path had an off day.

use std::sync::Arc;

use anyhow::Result;

use super::ExcerptCorpus;
use crate::types::FilingExcerpt;

const GROWTH_TERMS: &[&str] = &[
    "growth", "outlook", "guidance", "forecast", "expansion", "trajectory",
];
const MARGIN_TERMS: &[&str] = &[
    "margin", "profitability", "cost", "expense", "efficiency", "pricing",
];
const RISK_TERMS: &[&str] = &[
    "risk", "threat", "uncertainty", "litigation", "regulatory", "competition", "headwind",
];

const CLUSTERS: &[&[&str]] = &[GROWTH_TERMS, MARGIN_TERMS, RISK_TERMS];

const STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "does", "about", "this", "that", "with", "from", "have",
    "their", "there", "company", "companies", "tell",
];

/// Keyword clusters relevant to `query`. A query touching a cluster
/// pulls in the whole cluster, so "growth" also searches "outlook" and
/// "guidance". Falls back to the query's own significant words when no
/// cluster matches.
pub fn derive_keywords(query: &str) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();

    for cluster in CLUSTERS {
        if cluster.iter().any(|term| query_lower.contains(term)) {
            keywords.extend(cluster.iter().map(|term| term.to_string()));
        }
    }

    if keywords.is_empty() {
        keywords = query_lower
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_string()
            })
            .filter(|word| word.len() > 3 && !STOPWORDS.contains(&word.as_str()))
            .collect();
    }

    keywords.sort();
    keywords.dedup();
    keywords
}

/// Scans stored excerpts for keyword hits.
pub struct KeywordSearch {
    corpus: Arc<dyn ExcerptCorpus>,
}

impl KeywordSearch {
    pub fn new(corpus: Arc<dyn ExcerptCorpus>) -> Self {
        Self { corpus }
    }

    /// Pattern-match the corpus for `ticker` against keywords derived
    /// from `query`. Results are scored by distinct keyword hits and
    /// capped at `cap`.
    pub async fn search(&self, query: &str, ticker: &str, cap: usize) -> Result<Vec<FilingExcerpt>> {
        let keywords = derive_keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.corpus.excerpts_for_ticker(ticker).await?;
        let mut hits: Vec<(usize, FilingExcerpt)> = Vec::new();
        for excerpt in rows {
            let text_lower = excerpt.text.to_lowercase();
            let matched = keywords
                .iter()
                .filter(|keyword| text_lower.contains(keyword.as_str()))
                .count();
            if matched > 0 {
                hits.push((matched, excerpt));
            }
        }

        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.truncate(cap);
        tracing::debug!(
            ticker = %ticker,
            keywords = keywords.len(),
            hits = hits.len(),
            "keyword fallback search"
        );

        Ok(hits
            .into_iter()
            .map(|(matched, mut excerpt)| {
                excerpt.score = matched as f32;
                excerpt
            })
            .collect())
    }
}
