//! capguess: match engine and contextual chat retrieval for the
//! market-cap guessing game.
//!
//! Two subsystems share this crate. The game side scores guesses
//! against hidden market caps, keeps per-session aggregates, and
//! bridges matches scored before sign-in into durable records once an
//! identity arrives. The chat side answers questions about revealed
//! companies from structured fundamentals plus retrieved filing
//! excerpts, routing each query to a model tier by complexity.

pub mod chat;
pub mod config;
pub mod context;
pub mod events;
pub mod game;
pub mod identity;
pub mod llm;
pub mod metrics;
pub mod retrieval;
pub mod router;
pub mod store;
pub mod types;

// Re-export the primary types for convenience
pub use chat::{ChatAnswer, ChatEngine, ChatMessage, ChatRole};
pub use config::GameConfig;
pub use events::{EventEmitter, NoopEmitter};
pub use game::engine::GameSession;
pub use game::reconcile::{ReconcileState, Reconciler};
pub use game::{parse_guess, GuessOutcome, Subject};
pub use identity::{Identity, IdentityHub};
pub use llm::{CompletionClient, CompletionError, ModelTier};
pub use retrieval::RetrievalEngine;
pub use router::{classify, TierDecision};
pub use types::{
    Company, CompanyId, CompanyMetrics, FilingExcerpt, FinancialSnapshot, GuessRecord, MarketData,
    PendingMatch, UserId,
};

pub use anyhow::{Error, Result};
pub use uuid::Uuid;
