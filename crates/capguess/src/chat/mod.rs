//! Chat types, prompts, and helpers.

pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::ModelTier;

pub use engine::ChatEngine;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One persisted transcript turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Answer returned to the UI. `content` is also the persisted
/// assistant turn, error messages included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub session_id: Uuid,
    pub content: String,
    pub metadata: AnswerMetadata,
}

/// Routing and assembly metadata for one answered turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerMetadata {
    pub model_tier: Option<ModelTier>,
    pub routing_reason: Option<String>,
    pub excerpt_count: usize,
    pub context_truncated: bool,
    pub duration_ms: Option<u64>,
}

// ============================================================================
// Prompts
// ============================================================================

pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are a financial analyst assistant inside a market-cap guessing game. The player has just seen the reveal for a company and is asking about its financials.

Answer using ONLY the provided context: the structured financial summary and any filing excerpts. Do not use outside knowledge about the company and do not speculate beyond the numbers shown.

Rules:
1. Ground every figure you cite in the context. If a number is not there, say it is not available.
2. Keep answers concise: a short paragraph or a few bullet points.
3. Prefer filing excerpts for qualitative questions (risks, outlook, strategy) and cite the fiscal year and section, e.g. (FY2023, Item 1A - Risk Factors).
4. For ratios marked "not available", explain they could not be computed. Do not estimate them.
5. Never give investment advice or price targets."#;

/// Assistant turn persisted when the model API rejects credentials.
pub const ERROR_MISCONFIGURED: &str =
    "The analysis service is not configured correctly. Please contact support if this keeps happening.";
/// Assistant turn persisted when the model API is rate limiting.
pub const ERROR_RATE_LIMITED: &str =
    "The analysis service is busy right now. Please try again shortly.";
/// Assistant turn persisted for any other model failure.
pub const ERROR_GENERIC: &str =
    "Something went wrong while generating an answer. Please try asking again.";

// ============================================================================
// Helpers
// ============================================================================

/// Rough token estimate, one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
