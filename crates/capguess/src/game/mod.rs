//! Guess handling: the match rule, input parsing, session state, and
//! the auth-bridging reconciler.

pub mod engine;
pub mod reconcile;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::types::CompanyId;

/// Points awarded per successful match.
pub const MATCH_POINTS: u32 = 100;

static GUESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?\s*([0-9][0-9,]*\.?[0-9]*)\s*([tTbBmMkK])?$").expect("guess regex is valid")
});

/// The anonymized company in play for one round. Only the engine knows
/// the actual value until the reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub company_id: CompanyId,
    pub actual_value: f64,
}

/// Result of one guess submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessOutcome {
    pub subject_id: CompanyId,
    pub guess: f64,
    pub actual_value: f64,
    pub is_match: bool,
    pub percentage_diff: f64,
}

/// A guess at or above the actual value is a match. Meeting the value
/// exactly counts: the player reached the target.
pub fn is_match(guess: f64, actual: f64) -> bool {
    guess >= actual
}

/// Signed relative miss as a percentage of the actual value. Positive
/// means the guess was high.
pub fn percentage_diff(guess: f64, actual: f64) -> f64 {
    (guess - actual) / actual * 100.0
}

/// Parse a raw market-cap guess as typed by the player.
///
/// Accepts an optional `$`, thousands separators, and a T/B/M/K
/// magnitude suffix: `"$1.2T"`, `"950 B"`, `"450,000,000,000"`.
/// Returns `None` for anything non-numeric, non-finite, zero, or
/// negative.
pub fn parse_guess(raw: &str) -> Option<f64> {
    let caps = GUESS_RE.captures(raw.trim())?;
    let digits = caps.get(1)?.as_str().replace(',', "");
    let base: f64 = digits.parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("t") | Some("T") => 1e12,
        Some("b") | Some("B") => 1e9,
        Some("m") | Some("M") => 1e6,
        Some("k") | Some("K") => 1e3,
        _ => 1.0,
    };
    let value = base * multiplier;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value)
}
