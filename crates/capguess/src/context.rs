//! Structured financial context for chat prompts.
//!
//! Renders the company header, current market data, and one block per
//! fiscal year. Missing ratios render as an explicit "not available"
//! so the model does not invent them.

use crate::metrics;
use crate::types::{Company, FinancialSnapshot, MarketData};

pub const NOT_AVAILABLE: &str = "not available";

/// Human-readable USD with a magnitude suffix, e.g. `$1.20T`, `$950.00B`.
pub fn format_usd(value: f64) -> String {
    if value < 0.0 {
        return format!("-{}", format_usd(-value));
    }
    if value >= 1e12 {
        format!("${:.2}T", value / 1e12)
    } else if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("${:.2}K", value / 1e3)
    } else {
        format!("${:.0}", value)
    }
}

fn ratio_line(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Assemble the structured half of the chat context.
///
/// `snapshots` may arrive in any order; the output is most recent
/// fiscal year first, capped at `history_years` blocks.
pub fn build_context(
    company: &Company,
    snapshots: &[FinancialSnapshot],
    market: Option<&MarketData>,
    history_years: usize,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("Company: {} ({})\n", company.name, company.ticker));
    if let Some(sector) = &company.sector {
        out.push_str(&format!("Sector: {}\n", sector));
    }
    if let Some(industry) = &company.industry {
        out.push_str(&format!("Industry: {}\n", industry));
    }
    match market {
        Some(market) => {
            out.push_str(&format!(
                "Current market cap: {}\n",
                format_usd(market.market_cap)
            ));
            out.push_str(&format!(
                "Current stock price: ${:.2}\n",
                market.stock_price
            ));
        }
        None => {
            out.push_str(&format!("Current market cap: {}\n", NOT_AVAILABLE));
        }
    }

    let mut ordered: Vec<&FinancialSnapshot> = snapshots.iter().collect();
    ordered.sort_by(|a, b| b.fiscal_year.cmp(&a.fiscal_year));
    ordered.truncate(history_years);

    for snapshot in ordered {
        out.push('\n');
        out.push_str(&format!("=== Fiscal Year {} ===\n", snapshot.fiscal_year));
        out.push_str(&format!("Revenue: {}\n", format_usd(snapshot.revenue)));
        out.push_str(&format!(
            "Net income: {}\n",
            format_usd(snapshot.net_income)
        ));
        out.push_str(&format!(
            "Total assets: {}\n",
            format_usd(snapshot.assets)
        ));
        out.push_str(&format!(
            "Total liabilities: {}\n",
            format_usd(snapshot.liabilities)
        ));
        out.push_str(&format!("Total equity: {}\n", format_usd(snapshot.equity)));
        out.push_str(&format!("Cash: {}\n", format_usd(snapshot.cash)));
        out.push_str(&format!("Total debt: {}\n", format_usd(snapshot.debt)));
        out.push_str(&format!(
            "Operating cash flow: {}\n",
            format_usd(snapshot.operating_cash_flow)
        ));
        out.push_str(&format!(
            "Free cash flow: {}\n",
            format_usd(snapshot.free_cash_flow)
        ));

        match market {
            Some(market) => {
                let m = metrics::calculate_metrics(snapshot, market);
                out.push_str(&format!("P/E ratio: {}\n", ratio_line(m.p_e_ratio)));
                out.push_str(&format!("P/B ratio: {}\n", ratio_line(m.p_b_ratio)));
                out.push_str(&format!(
                    "Debt-to-equity: {}\n",
                    ratio_line(m.debt_to_equity)
                ));
                match m.roe {
                    Some(v) => out.push_str(&format!("ROE: {:.2}%\n", v)),
                    None => out.push_str(&format!("ROE: {}\n", NOT_AVAILABLE)),
                }
            }
            None => {
                // P/E and P/B need market data. ROE and leverage do not.
                out.push_str(&format!("P/E ratio: {}\n", NOT_AVAILABLE));
                out.push_str(&format!("P/B ratio: {}\n", NOT_AVAILABLE));
                out.push_str(&format!(
                    "Debt-to-equity: {}\n",
                    ratio_line(
                        metrics::debt_to_equity(snapshot.debt, snapshot.equity)
                            .map(metrics::round2)
                    )
                ));
                match metrics::roe(snapshot.net_income, snapshot.equity) {
                    Some(v) => out.push_str(&format!("ROE: {:.2}%\n", v * 100.0)),
                    None => out.push_str(&format!("ROE: {}\n", NOT_AVAILABLE)),
                }
            }
        }
    }

    out
}
