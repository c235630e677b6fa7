//! Valuation ratios and the difficulty score.
//!
//! All ratios come from the most recent snapshot combined with current
//! market data. Division by zero yields `None`, never infinity.

use crate::types::{CompanyMetrics, FinancialSnapshot, MarketData};

fn safe_divide(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price-to-earnings. Undefined for zero shares or non-positive
/// earnings, where EPS is meaningless.
pub fn pe_ratio(stock_price: f64, net_income: f64, shares_outstanding: f64) -> Option<f64> {
    if shares_outstanding == 0.0 || net_income <= 0.0 {
        return None;
    }
    let eps = net_income / shares_outstanding;
    safe_divide(stock_price, eps)
}

/// Price-to-book: market cap over total equity.
pub fn pb_ratio(market_cap: f64, equity: f64) -> Option<f64> {
    safe_divide(market_cap, equity)
}

pub fn debt_to_equity(debt: f64, equity: f64) -> Option<f64> {
    safe_divide(debt, equity)
}

/// Total assets over total liabilities. A simplification of the
/// textbook current ratio; the data model does not split out current
/// assets and liabilities.
pub fn current_ratio(assets: f64, liabilities: f64) -> Option<f64> {
    safe_divide(assets, liabilities)
}

/// Return on equity as a fraction. Callers wanting a percentage
/// multiply by 100.
pub fn roe(net_income: f64, equity: f64) -> Option<f64> {
    safe_divide(net_income, equity)
}

/// Score how hard a company is to guess, 1 (easy) to 10 (hard).
///
/// Household mega-caps with clean ratios score low; companies with
/// missing or extreme ratios and small market caps score high.
pub fn difficulty_score(
    pe: Option<f64>,
    pb: Option<f64>,
    debt_equity: Option<f64>,
    market_cap: f64,
) -> u8 {
    let mut score: i32 = 5;

    match pe {
        None => score += 1,
        Some(v) if v < 0.0 || v > 100.0 => score += 2,
        Some(_) => {}
    }

    match pb {
        None => score += 1,
        Some(v) if v > 10.0 => score += 1,
        Some(_) => {}
    }

    match debt_equity {
        None => score += 1,
        Some(v) if v > 3.0 => score += 1,
        Some(_) => {}
    }

    if market_cap < 1e9 {
        score += 2;
    } else if market_cap < 1e10 {
        score += 1;
    }

    score.clamp(1, 10) as u8
}

/// Compute the full ratio set for one snapshot against current market
/// data. Ratios are rounded to two decimals; ROE is surfaced as a
/// percentage.
pub fn calculate_metrics(snapshot: &FinancialSnapshot, market: &MarketData) -> CompanyMetrics {
    let pe = pe_ratio(
        market.stock_price,
        snapshot.net_income,
        snapshot.shares_outstanding,
    );
    let pb = pb_ratio(market.market_cap, snapshot.equity);
    let debt_equity = debt_to_equity(snapshot.debt, snapshot.equity);

    CompanyMetrics {
        p_e_ratio: pe.map(round2),
        p_b_ratio: pb.map(round2),
        debt_to_equity: debt_equity.map(round2),
        current_ratio: current_ratio(snapshot.assets, snapshot.liabilities).map(round2),
        roe: roe(snapshot.net_income, snapshot.equity).map(|r| round2(r * 100.0)),
        difficulty_score: difficulty_score(pe, pb, debt_equity, market.market_cap),
    }
}
