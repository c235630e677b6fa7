//! Storage seams: guess records, chat transcripts, company data, and
//! the durable pending-match slot.
//!
//! Production backends sit behind these traits and enforce row-level
//! ownership; a user only ever reads and writes rows they own. The
//! in-memory implementations back tests and single-process runs.

pub mod slot;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::chat::{ChatMessage, ChatRole};
use crate::retrieval::semantic::{cosine_similarity, SimilarityIndex};
use crate::retrieval::ExcerptCorpus;
use crate::types::{
    Company, CompanyId, FilingExcerpt, FinancialSnapshot, GuessRecord, MarketData, PendingMatch,
    UserId,
};

pub use slot::JsonFileSlot;

// ============================================================================
// Traits
// ============================================================================

/// Persisted guess records, one per authenticated guess. Records are
/// append-only; nothing updates or deletes them.
#[async_trait]
pub trait GuessStore: Send + Sync {
    async fn insert_guess(&self, record: &GuessRecord) -> Result<()>;

    /// All records owned by `user`, most recent first.
    async fn guesses_for_user(&self, user: UserId) -> Result<Vec<GuessRecord>>;
}

/// Chat sessions and their transcripts.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The open session for `(user, subject)`, created lazily on first
    /// use.
    async fn get_or_create_session(&self, user: UserId, subject: CompanyId) -> Result<Uuid>;

    /// Append one turn to a session transcript.
    async fn append_message(
        &self,
        session: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage>;

    /// Full transcript in creation order. Messages are never reordered
    /// or deleted.
    async fn list_messages(&self, session: Uuid) -> Result<Vec<ChatMessage>>;
}

/// Read side for company fundamentals.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn company(&self, id: CompanyId) -> Result<Option<Company>>;

    /// Annual snapshots for a company, any order.
    async fn snapshots(&self, id: CompanyId) -> Result<Vec<FinancialSnapshot>>;

    async fn market_data(&self, id: CompanyId) -> Result<Option<MarketData>>;
}

/// Durable slot holding at most one pending match across restarts.
/// Single writer, last write wins.
#[async_trait]
pub trait PendingSlot: Send + Sync {
    async fn read(&self) -> Result<Option<PendingMatch>>;
    async fn write(&self, pending: &PendingMatch) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory backend implementing every store trait except the slot.
#[derive(Default)]
pub struct MemoryStore {
    guesses: DashMap<UserId, Vec<GuessRecord>>,
    sessions: DashMap<(UserId, CompanyId), Uuid>,
    messages: DashMap<Uuid, Vec<ChatMessage>>,
    companies: DashMap<CompanyId, Company>,
    snapshots: DashMap<CompanyId, Vec<FinancialSnapshot>>,
    market: DashMap<CompanyId, MarketData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_company(&self, company: Company) {
        self.companies.insert(company.id, company);
    }

    pub fn insert_snapshot(&self, snapshot: FinancialSnapshot) {
        self.snapshots
            .entry(snapshot.company_id)
            .or_default()
            .push(snapshot);
    }

    pub fn set_market_data(&self, market: MarketData) {
        self.market.insert(market.company_id, market);
    }
}

#[async_trait]
impl GuessStore for MemoryStore {
    async fn insert_guess(&self, record: &GuessRecord) -> Result<()> {
        self.guesses
            .entry(record.user_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn guesses_for_user(&self, user: UserId) -> Result<Vec<GuessRecord>> {
        let mut records = self
            .guesses
            .get(&user)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn get_or_create_session(&self, user: UserId, subject: CompanyId) -> Result<Uuid> {
        let id = *self
            .sessions
            .entry((user, subject))
            .or_insert_with(Uuid::new_v4);
        Ok(id)
    }

    async fn append_message(
        &self,
        session: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id: session,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages
            .entry(session)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, session: Uuid) -> Result<Vec<ChatMessage>> {
        Ok(self
            .messages
            .get(&session)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn company(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.companies.get(&id).map(|c| c.value().clone()))
    }

    async fn snapshots(&self, id: CompanyId) -> Result<Vec<FinancialSnapshot>> {
        Ok(self
            .snapshots
            .get(&id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn market_data(&self, id: CompanyId) -> Result<Option<MarketData>> {
        Ok(self.market.get(&id).map(|m| m.value().clone()))
    }
}

// ============================================================================
// In-memory slot and corpus
// ============================================================================

/// In-memory pending-match slot for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySlot {
    value: RwLock<Option<PendingMatch>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingSlot for MemorySlot {
    async fn read(&self) -> Result<Option<PendingMatch>> {
        Ok(self.value.read().clone())
    }

    async fn write(&self, pending: &PendingMatch) -> Result<()> {
        *self.value.write() = Some(pending.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.value.write() = None;
        Ok(())
    }
}

/// In-memory excerpt corpus with optional embeddings. Serves both the
/// similarity and keyword retrieval paths for small datasets.
#[derive(Default)]
pub struct MemoryCorpus {
    rows: RwLock<Vec<(FilingExcerpt, Option<Vec<f32>>)>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, excerpt: FilingExcerpt, embedding: Option<Vec<f32>>) {
        self.rows.write().push((excerpt, embedding));
    }
}

#[async_trait]
impl ExcerptCorpus for MemoryCorpus {
    async fn excerpts_for_ticker(&self, ticker: &str) -> Result<Vec<FilingExcerpt>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|(excerpt, _)| excerpt.ticker == ticker)
            .map(|(excerpt, _)| excerpt.clone())
            .collect())
    }
}

#[async_trait]
impl SimilarityIndex for MemoryCorpus {
    async fn search(
        &self,
        vector: &[f32],
        ticker: &str,
        top_k: usize,
    ) -> Result<Vec<FilingExcerpt>> {
        let mut scored: Vec<FilingExcerpt> = {
            let rows = self.rows.read();
            rows.iter()
                .filter(|(excerpt, _)| excerpt.ticker == ticker)
                .filter_map(|(excerpt, embedding)| {
                    embedding.as_ref().map(|embedding| {
                        let mut hit = excerpt.clone();
                        hit.score = cosine_similarity(vector, embedding);
                        hit
                    })
                })
                .collect()
        };
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}
