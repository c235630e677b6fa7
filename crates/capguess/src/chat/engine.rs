//! Turn-by-turn chat orchestration.
//!
//! One [`ask`] call runs the whole pipeline: persist the question,
//! assemble financial context, retrieve filing excerpts, route to a
//! model tier, invoke the model, persist the answer. The user message
//! goes on record before any model spend, and a model failure still
//! produces a persisted assistant turn so the transcript never ends on
//! an unanswered question.
//!
//! [`ask`]: ChatEngine::ask

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use super::{
    estimate_tokens, AnswerMetadata, ChatAnswer, ChatRole, ANALYST_SYSTEM_PROMPT, ERROR_GENERIC,
    ERROR_MISCONFIGURED, ERROR_RATE_LIMITED,
};
use crate::config::GameConfig;
use crate::context::build_context;
use crate::llm::{CompletionClient, CompletionError};
use crate::retrieval::{truncate_to_budget, RetrievalEngine};
use crate::router::classify;
use crate::store::{ChatStore, CompanyStore};
use crate::types::{CompanyId, FilingExcerpt, UserId};

pub struct ChatEngine {
    companies: Arc<dyn CompanyStore>,
    chats: Arc<dyn ChatStore>,
    retrieval: RetrievalEngine,
    completions: Arc<dyn CompletionClient>,
    config: GameConfig,
}

impl ChatEngine {
    pub fn new(
        companies: Arc<dyn CompanyStore>,
        chats: Arc<dyn ChatStore>,
        retrieval: RetrievalEngine,
        completions: Arc<dyn CompletionClient>,
        config: GameConfig,
    ) -> Self {
        Self {
            companies,
            chats,
            retrieval,
            completions,
            config,
        }
    }

    /// Answer one question about a revealed company.
    pub async fn ask(&self, user: UserId, subject: CompanyId, text: &str) -> Result<ChatAnswer> {
        let started = Instant::now();

        let session = self
            .chats
            .get_or_create_session(user, subject)
            .await
            .context("Failed to open chat session")?;

        // Prior user turns measure conversation depth for routing.
        let conversation_depth = match self.chats.list_messages(session).await {
            Ok(history) => history.iter().filter(|m| m.role == ChatRole::User).count(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load chat history, assuming depth 0");
                0
            }
        };

        // The question goes on record before any model spend. If this
        // write fails the whole turn fails.
        self.chats
            .append_message(session, ChatRole::User, text)
            .await
            .context("Failed to persist user message")?;

        let company = self
            .companies
            .company(subject)
            .await
            .context("Failed to load company")?
            .ok_or_else(|| anyhow!("company {} not found", subject))?;

        let snapshots = match self.companies.snapshots(subject).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load snapshots, continuing without");
                Vec::new()
            }
        };
        let market = match self.companies.market_data(subject).await {
            Ok(market) => market,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load market data, continuing without");
                None
            }
        };

        let financial_context = build_context(
            &company,
            &snapshots,
            market.as_ref(),
            self.config.retrieval.history_years,
        );

        // Retrieval degradation never sinks the turn.
        let excerpts = self.retrieval.retrieve(text, &company.ticker).await;

        let decision = classify(text, excerpts.len(), conversation_depth);
        tracing::info!(
            tier = ?decision.tier,
            reason = %decision.reason,
            excerpts = excerpts.len(),
            depth = conversation_depth,
            "chat turn routed"
        );

        let (prompt, truncated) = self.compose_prompt(&financial_context, &excerpts, text);
        tracing::debug!(
            prompt_tokens = estimate_tokens(&prompt),
            truncated,
            "prompt assembled"
        );

        let content = match self
            .completions
            .complete(ANALYST_SYSTEM_PROMPT, &prompt, decision.tier)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "completion failed, answering with an error turn");
                error_turn(&e).to_string()
            }
        };

        // Error messages are persisted like any other assistant turn so
        // the transcript stays coherent.
        if let Err(e) = self
            .chats
            .append_message(session, ChatRole::Assistant, &content)
            .await
        {
            tracing::error!(error = %e, "failed to persist assistant message");
        }

        Ok(ChatAnswer {
            session_id: session,
            content,
            metadata: AnswerMetadata {
                model_tier: Some(decision.tier),
                routing_reason: Some(decision.reason),
                excerpt_count: excerpts.len(),
                context_truncated: truncated,
                duration_ms: Some(started.elapsed().as_millis() as u64),
            },
        })
    }

    fn compose_prompt(
        &self,
        financial_context: &str,
        excerpts: &[FilingExcerpt],
        question: &str,
    ) -> (String, bool) {
        let mut assembled = String::with_capacity(financial_context.len() + 1024);
        assembled.push_str("FINANCIAL DATA\n");
        assembled.push_str(financial_context);

        if !excerpts.is_empty() {
            assembled.push_str("\nFILING EXCERPTS\n");
            for excerpt in excerpts {
                assembled.push_str(&format!(
                    "[FY{} | {}]\n{}\n\n",
                    excerpt.fiscal_year, excerpt.section, excerpt.text
                ));
            }
        }

        // The budget covers the context, never the question itself.
        let (context_block, truncated) = truncate_to_budget(
            &assembled,
            self.config.retrieval.context_budget_chars,
        );
        let prompt = format!("{}\n\nQUESTION\n{}", context_block, question);
        (prompt, truncated)
    }
}

/// Map a completion failure to the message persisted as the assistant
/// turn. Auth problems are the operator's fault, rate limits pass, and
/// everything else gets a generic retry.
fn error_turn(error: &CompletionError) -> &'static str {
    match error {
        CompletionError::Auth { .. } => ERROR_MISCONFIGURED,
        CompletionError::RateLimited => ERROR_RATE_LIMITED,
        CompletionError::Api { .. } | CompletionError::Network(_) => ERROR_GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::config::RetrievalConfig;
    use crate::llm::ModelTier;
    use crate::store::{MemoryCorpus, MemoryStore};
    use crate::types::{Company, FinancialSnapshot, MarketData, ReportType};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    struct StubCompletions {
        called: AtomicBool,
        fail: Mutex<Option<CompletionError>>,
        last_prompt: Mutex<Option<String>>,
    }

    impl StubCompletions {
        fn new() -> Self {
            Self {
                called: AtomicBool::new(false),
                fail: Mutex::new(None),
                last_prompt: Mutex::new(None),
            }
        }

        fn failing_with(error: CompletionError) -> Self {
            let stub = Self::new();
            *stub.fail.lock() = Some(error);
            stub
        }
    }

    #[async_trait]
    impl CompletionClient for StubCompletions {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
            _tier: ModelTier,
        ) -> Result<String, CompletionError> {
            self.called.store(true, Ordering::SeqCst);
            *self.last_prompt.lock() = Some(user_prompt.to_string());
            if let Some(error) = self.fail.lock().take() {
                return Err(error);
            }
            Ok("Revenue grew on the back of services.".to_string())
        }
    }

    struct FlakyChatStore {
        inner: Arc<MemoryStore>,
        fail_next_append: AtomicBool,
    }

    #[async_trait]
    impl ChatStore for FlakyChatStore {
        async fn get_or_create_session(&self, user: UserId, subject: CompanyId) -> Result<Uuid> {
            self.inner.get_or_create_session(user, subject).await
        }

        async fn append_message(
            &self,
            session: Uuid,
            role: ChatRole,
            content: &str,
        ) -> Result<ChatMessage> {
            if self.fail_next_append.swap(false, Ordering::SeqCst) {
                anyhow::bail!("storage outage");
            }
            self.inner.append_message(session, role, content).await
        }

        async fn list_messages(&self, session: Uuid) -> Result<Vec<ChatMessage>> {
            self.inner.list_messages(session).await
        }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_company(Company {
            id: CompanyId(1),
            ticker: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            sector: Some("Technology".to_string()),
            industry: Some("Consumer Electronics".to_string()),
            logo_url: None,
        });
        store.insert_snapshot(FinancialSnapshot {
            company_id: CompanyId(1),
            fiscal_year: 2023,
            period_end_date: NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
            report_type: ReportType::Annual,
            assets: 352e9,
            liabilities: 290e9,
            equity: 62e9,
            cash: 30e9,
            debt: 111e9,
            revenue: 383e9,
            net_income: 97e9,
            operating_cash_flow: 110e9,
            free_cash_flow: 99e9,
            shares_outstanding: 15.5e9,
        });
        store.set_market_data(MarketData {
            company_id: CompanyId(1),
            market_cap: 3e12,
            stock_price: 190.0,
            last_updated: Utc::now(),
        });
        store
    }

    fn engine_with(
        chats: Arc<dyn ChatStore>,
        completions: Arc<StubCompletions>,
        corpus: Arc<MemoryCorpus>,
    ) -> ChatEngine {
        let retrieval = RetrievalEngine::new(None, None, corpus, RetrievalConfig::default());
        ChatEngine::new(
            seeded_store(),
            chats,
            retrieval,
            completions,
            GameConfig::default(),
        )
    }

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    #[tokio::test]
    async fn a_turn_persists_question_and_answer_in_order() {
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::new());
        let engine = engine_with(
            store.clone(),
            completions.clone(),
            Arc::new(MemoryCorpus::new()),
        );

        let answer = engine
            .ask(user(), CompanyId(1), "What is the latest revenue?")
            .await
            .unwrap();

        assert_eq!(answer.content, "Revenue grew on the back of services.");
        assert_eq!(answer.metadata.model_tier, Some(ModelTier::Standard));
        assert_eq!(answer.metadata.routing_reason.as_deref(), Some("simple lookup"));

        let transcript = store.list_messages(answer.session_id).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn the_prompt_carries_financial_context_and_excerpts() {
        let corpus = Arc::new(MemoryCorpus::new());
        corpus.insert(
            crate::types::FilingExcerpt {
                ticker: "AAPL".to_string(),
                fiscal_year: 2023,
                section: "Item 1A - Risk Factors".to_string(),
                chunk_index: 0,
                text: "Supply chain risk remains elevated.".to_string(),
                score: 0.0,
                word_count: 5,
            },
            None,
        );
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::new());
        let engine = engine_with(store, completions.clone(), corpus);

        let answer = engine
            .ask(user(), CompanyId(1), "What risks does the company face?")
            .await
            .unwrap();
        assert_eq!(answer.metadata.excerpt_count, 1);

        let prompt = completions.last_prompt.lock().clone().unwrap();
        assert!(prompt.contains("FINANCIAL DATA"));
        assert!(prompt.contains("Apple Inc. (AAPL)"));
        assert!(prompt.contains("FILING EXCERPTS"));
        assert!(prompt.contains("Item 1A - Risk Factors"));
        assert!(prompt.ends_with("What risks does the company face?"));
    }

    #[tokio::test]
    async fn user_persist_failure_aborts_before_any_model_call() {
        let store = Arc::new(MemoryStore::new());
        let chats = Arc::new(FlakyChatStore {
            inner: store.clone(),
            fail_next_append: AtomicBool::new(true),
        });
        let completions = Arc::new(StubCompletions::new());
        let engine = engine_with(chats, completions.clone(), Arc::new(MemoryCorpus::new()));

        let result = engine.ask(user(), CompanyId(1), "anything").await;

        assert!(result.is_err());
        assert!(!completions.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rate_limit_becomes_a_persisted_error_turn() {
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::failing_with(CompletionError::RateLimited));
        let engine = engine_with(
            store.clone(),
            completions.clone(),
            Arc::new(MemoryCorpus::new()),
        );

        let answer = engine
            .ask(user(), CompanyId(1), "Did margins improve?")
            .await
            .unwrap();

        assert_eq!(answer.content, ERROR_RATE_LIMITED);
        let transcript = store.list_messages(answer.session_id).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content, ERROR_RATE_LIMITED);
    }

    #[tokio::test]
    async fn auth_failure_reads_as_misconfiguration() {
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::failing_with(CompletionError::Auth {
            status: 401,
        }));
        let engine = engine_with(
            store.clone(),
            completions.clone(),
            Arc::new(MemoryCorpus::new()),
        );

        let answer = engine
            .ask(user(), CompanyId(1), "Did margins improve?")
            .await
            .unwrap();
        assert_eq!(answer.content, ERROR_MISCONFIGURED);
    }

    #[tokio::test]
    async fn network_failure_reads_as_generic_retry() {
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::failing_with(CompletionError::Network(
            "connection reset".to_string(),
        )));
        let engine = engine_with(store, completions.clone(), Arc::new(MemoryCorpus::new()));

        let answer = engine
            .ask(user(), CompanyId(1), "Did margins improve?")
            .await
            .unwrap();
        assert_eq!(answer.content, ERROR_GENERIC);
    }

    #[tokio::test]
    async fn conversation_depth_eventually_routes_high() {
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::new());
        let engine = engine_with(
            store.clone(),
            completions.clone(),
            Arc::new(MemoryCorpus::new()),
        );

        let player = user();
        for _ in 0..3 {
            engine
                .ask(player, CompanyId(1), "Did margins improve?")
                .await
                .unwrap();
        }

        let answer = engine
            .ask(player, CompanyId(1), "Did margins improve?")
            .await
            .unwrap();
        assert_eq!(answer.metadata.model_tier, Some(ModelTier::High));
        assert_eq!(
            answer.metadata.routing_reason.as_deref(),
            Some("conversation depth 3")
        );
    }

    #[tokio::test]
    async fn unknown_company_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let completions = Arc::new(StubCompletions::new());
        let engine = engine_with(store, completions, Arc::new(MemoryCorpus::new()));

        let result = engine.ask(user(), CompanyId(999), "hello?").await;
        assert!(result.is_err());
    }
}
