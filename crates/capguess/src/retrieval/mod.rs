//! Excerpt retrieval for chat context.
//!
//! Strategies run in a fixed order, semantic first, keyword fallback
//! second, and the chain stops as soon as enough usable excerpts have
//! accumulated. Retrieval never fails the caller: a broken semantic
//! path degrades to keywords, and an empty result is a valid outcome
//! (the chat then answers from structured data alone).

pub mod keyword;
pub mod semantic;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::RetrievalConfig;
use crate::types::FilingExcerpt;
use keyword::KeywordSearch;
use semantic::{EmbeddingClient, SimilarityIndex};

/// Appended when assembled context blows the character budget.
pub const TRUNCATION_MARKER: &str = "\n\n[context truncated]";

/// Source of stored filing fragments, scanned by the keyword fallback.
#[async_trait]
pub trait ExcerptCorpus: Send + Sync {
    async fn excerpts_for_ticker(&self, ticker: &str) -> Result<Vec<FilingExcerpt>>;
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Semantic,
    Keyword,
}

/// Ordered retrieval chain over one ticker's filings.
pub struct RetrievalEngine {
    embeddings: Option<Arc<dyn EmbeddingClient>>,
    index: Option<Arc<dyn SimilarityIndex>>,
    keyword: KeywordSearch,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(
        embeddings: Option<Arc<dyn EmbeddingClient>>,
        index: Option<Arc<dyn SimilarityIndex>>,
        corpus: Arc<dyn ExcerptCorpus>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            keyword: KeywordSearch::new(corpus),
            config,
        }
    }

    /// Retrieve excerpts for `query`, scoped to `ticker`.
    ///
    /// Score decided membership; the returned list is ordered for
    /// presentation, fiscal year descending then section name, so
    /// assembled context reads chronologically.
    pub async fn retrieve(&self, query: &str, ticker: &str) -> Vec<FilingExcerpt> {
        let mut excerpts: Vec<FilingExcerpt> = Vec::new();

        for strategy in [Strategy::Semantic, Strategy::Keyword] {
            if excerpts.len() >= self.config.min_excerpts {
                break;
            }
            match self.run_strategy(strategy, query, ticker).await {
                Ok(hits) => merge(&mut excerpts, hits),
                Err(e) => {
                    tracing::warn!(strategy = ?strategy, error = %e, "retrieval strategy failed");
                }
            }
        }

        sort_excerpts(&mut excerpts);
        tracing::debug!(ticker = %ticker, count = excerpts.len(), "retrieval complete");
        excerpts
    }

    async fn run_strategy(
        &self,
        strategy: Strategy,
        query: &str,
        ticker: &str,
    ) -> Result<Vec<FilingExcerpt>> {
        match strategy {
            Strategy::Semantic => {
                let (Some(embeddings), Some(index)) = (&self.embeddings, &self.index) else {
                    return Ok(Vec::new());
                };
                let vector = embeddings.embed(query).await?;
                index
                    .search(&vector, ticker, self.config.semantic_top_k)
                    .await
            }
            Strategy::Keyword => {
                self.keyword
                    .search(query, ticker, self.config.keyword_cap)
                    .await
            }
        }
    }
}

/// Append `hits`, skipping fragments already present.
fn merge(excerpts: &mut Vec<FilingExcerpt>, hits: Vec<FilingExcerpt>) {
    for hit in hits {
        let duplicate = excerpts.iter().any(|e| {
            e.fiscal_year == hit.fiscal_year
                && e.section == hit.section
                && e.chunk_index == hit.chunk_index
        });
        if !duplicate {
            excerpts.push(hit);
        }
    }
}

/// Fiscal year descending, then section name ascending.
pub fn sort_excerpts(excerpts: &mut [FilingExcerpt]) {
    excerpts.sort_by(|a, b| {
        b.fiscal_year
            .cmp(&a.fiscal_year)
            .then_with(|| a.section.cmp(&b.section))
    });
}

/// Cut `text` to at most `budget` characters, tail first. Returns the
/// text and whether anything was dropped; a dropped tail is replaced
/// by [`TRUNCATION_MARKER`] so the model knows the context is partial.
pub fn truncate_to_budget(text: &str, budget: usize) -> (String, bool) {
    if text.len() <= budget {
        return (text.to_string(), false);
    }
    let mut end = budget.saturating_sub(TRUNCATION_MARKER.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = text[..end].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}
