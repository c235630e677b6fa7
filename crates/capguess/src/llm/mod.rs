//! Completion model boundary.
//!
//! The chat layer asks for a completion at a capability tier; which
//! concrete model serves the tier lives in [`ModelConfig`]. Errors are
//! typed so callers can pick the right user-facing message instead of
//! leaking HTTP details into the transcript.
//!
//! [`ModelConfig`]: crate::config::ModelConfig

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::OpenAiCompletions;

/// Capability level used to answer a chat query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Standard,
    High,
}

/// Failures from the completion API, split by how the user should be
/// told about them.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Bad or missing credentials. An operator problem, not a user one.
    #[error("model API rejected credentials (HTTP {status})")]
    Auth { status: u16 },
    #[error("model API rate limit hit")]
    RateLimited,
    #[error("model API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("model API request failed: {0}")]
    Network(String),
}

/// Boundary to the external completion API.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tier: ModelTier,
    ) -> Result<String, CompletionError>;
}
