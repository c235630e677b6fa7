//! Core domain types shared across the game and chat subsystems.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Internal identifier for a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub i64);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Company master record. `logo_url` is only shown after the reveal,
/// never while the subject is anonymized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub logo_url: Option<String>,
}

/// Filing the numbers were reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "10-K")]
    Annual,
    #[serde(rename = "10-Q")]
    Quarterly,
}

/// One reporting period of fundamentals, in USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub company_id: CompanyId,
    pub fiscal_year: i32,
    pub period_end_date: NaiveDate,
    pub report_type: ReportType,
    // Balance sheet
    pub assets: f64,
    pub liabilities: f64,
    pub equity: f64,
    pub cash: f64,
    pub debt: f64,
    // Income statement
    pub revenue: f64,
    pub net_income: f64,
    // Cash flow
    pub operating_cash_flow: f64,
    pub free_cash_flow: f64,
    pub shares_outstanding: f64,
}

/// Point-in-time market snapshot for a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub company_id: CompanyId,
    pub market_cap: f64,
    pub stock_price: f64,
    pub last_updated: DateTime<Utc>,
}

/// Derived valuation ratios. `None` means the ratio could not be
/// computed from the underlying numbers, e.g. negative earnings for
/// P/E, and is rendered as an explicit "not available".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMetrics {
    pub p_e_ratio: Option<f64>,
    pub p_b_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    /// Return on equity, as a percentage.
    pub roe: Option<f64>,
    /// 1 (easiest) to 10 (hardest) to guess.
    pub difficulty_score: u8,
}

impl Default for CompanyMetrics {
    fn default() -> Self {
        Self {
            p_e_ratio: None,
            p_b_ratio: None,
            debt_to_equity: None,
            current_ratio: None,
            roe: None,
            difficulty_score: 5,
        }
    }
}

/// Persisted record of one authenticated guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuessRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub guess: f64,
    pub actual_value: f64,
    pub is_match: bool,
    pub percentage_diff: f64,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a match that happened before the player had an identity.
/// At most one exists at a time; a newer unauthenticated match
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMatch {
    pub subject_id: CompanyId,
    pub guess: f64,
    pub actual_value: f64,
}

/// A scored fragment of an annual filing, produced by retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingExcerpt {
    pub ticker: String,
    pub fiscal_year: i32,
    /// Section heading, e.g. "Item 1A - Risk Factors".
    pub section: String,
    pub chunk_index: usize,
    pub text: String,
    /// Cosine similarity for semantic hits, keyword-hit count for
    /// fallback hits. Decides membership, not presentation order.
    pub score: f32,
    pub word_count: usize,
}
