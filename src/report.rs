//! Plain-text rendering of calculator results
//!
//! Each function returns the text printed to stdout for one command, so the
//! layout can be tested without a terminal.

use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::calculator::{
    format_idr, group_thousands, usd_to_idr, ExitPlanRow, InvestmentSummary, PriceAlert,
    Prediction, ProfitSummary,
};
use crate::data::{PricePoint, TokenDetails, TokenSummary};
use crate::signal::{TokenSignal, SIGNAL_THRESHOLD};

/// Formats a USD amount with thousands separators
///
/// Prices under one dollar keep up to eight decimals so that small-cap token
/// prices are not rounded to zero.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "$0.00".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    if abs > 0.0 && abs < 1.0 {
        let digits = format!("{:.8}", abs);
        let trimmed = digits.trim_end_matches('0');
        let trimmed = if trimmed.len() < 4 {
            // keep at least two decimals ("0.5" -> "0.50")
            format!("{:.2}", abs)
        } else {
            trimmed.to_string()
        };
        return format!("{}${}", sign, trimmed);
    }

    let cents = (abs * 100.0).round() as u64;
    format!("{}${}.{:02}", sign, group_thousands(cents / 100, ','), cents % 100)
}

/// One line with the USD to IDR rate
pub fn render_rate(rate: f64) -> String {
    format!("1 USD = {}\n", format_idr(rate))
}

/// Table of selectable tokens with their 24h market cap change
pub fn render_tokens(tokens: &[TokenSummary]) -> String {
    if tokens.is_empty() {
        return "No tokens available.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<20} {:<24} {:<8} {:>10}", "ID", "NAME", "SYMBOL", "MCAP 24H");
    for token in tokens {
        let _ = writeln!(
            out,
            "{:<20} {:<24} {:<8} {:>9.2}%",
            token.id, token.name, token.symbol, token.market_cap_change_percentage_24h
        );
    }
    out
}

/// One line with a token's USD and IDR price
///
/// `as_of` is when the price was fetched; it is appended when known.
pub fn render_price(
    token_id: &str,
    price: Option<f64>,
    rate: f64,
    as_of: Option<DateTime<Local>>,
) -> String {
    let mut out = match price {
        Some(price) => format!(
            "{}: {} ({})",
            token_id,
            format_usd(price),
            format_idr(usd_to_idr(price, rate))
        ),
        None => format!("{}: price unavailable", token_id),
    };
    if let (Some(_), Some(as_of)) = (price, as_of) {
        let _ = write!(out, " as of {}", as_of.format("%H:%M:%S"));
    }
    out.push('\n');
    out
}

/// Alert line for a sharp rise between two polls of a watched price
pub fn render_price_alert(token_id: &str, alert: &PriceAlert) -> String {
    format!(
        "ALERT: {} price up {:.2}% ({} -> {})\n",
        token_id,
        alert.change_percent,
        format_usd(alert.previous),
        format_usd(alert.current)
    )
}

/// Formats a token count with thousands separators and no decimals
fn format_supply(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "0".to_string();
    }
    group_thousands(value.round() as u64, ',')
}

/// Daily price list for the last 7 days
pub fn render_history(token_id: &str, history: &[PricePoint]) -> String {
    if history.is_empty() {
        return format!("{}: no price history available\n", token_id);
    }

    let mut out = format!("{} - last 7 days\n", token_id);
    for point in history {
        let _ = writeln!(
            out,
            "  {}  {}",
            point.timestamp.format("%Y-%m-%d"),
            format_usd(point.price)
        );
    }
    out
}

/// Price, change, volume, valuation and supply figures for one token
pub fn render_details(details: &TokenDetails, rate: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", details.name, details.symbol.to_uppercase());
    let _ = writeln!(
        out,
        "  Price:       {} ({})",
        format_usd(details.current_price),
        format_idr(usd_to_idr(details.current_price, rate))
    );
    if let Some(change) = details.price_change_percentage_1h {
        let _ = writeln!(out, "  Change 1h:   {:.2}%", change);
    }
    if let Some(change) = details.price_change_percentage_24h {
        let _ = writeln!(out, "  Change 24h:  {:.2}%", change);
    }
    if let Some(volume) = details.total_volume {
        let _ = writeln!(out, "  Volume 24h:  {}", format_usd(volume));
    }
    let _ = writeln!(out, "  Market cap:  {}", format_usd(details.market_cap));
    let _ = writeln!(out, "  FDV:         {}", format_usd(details.fully_diluted_valuation));
    let _ = writeln!(out, "  Circulating: {}", format_supply(details.circulating_supply));
    let _ = writeln!(
        out,
        "  Total:       {}",
        details.total_supply.map(format_supply).unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        out,
        "  Max supply:  {}",
        details.max_supply.map(format_supply).unwrap_or_else(|| "unlimited".to_string())
    );
    if let Some(ref twitter) = details.twitter_username {
        let _ = writeln!(out, "  Twitter:     https://twitter.com/{}", twitter);
    }
    out
}

/// Profit summary followed by the exit plan table, with a FOMO banner when flagged
pub fn render_profit(
    summary: &ProfitSummary,
    plan: &[ExitPlanRow],
    rate: f64,
    current_price: Option<f64>,
) -> String {
    let mut out = String::new();

    if summary.is_fomo {
        let _ = writeln!(
            out,
            "FOMO alert: your target is at least 100x the buy price. Make sure it is based on analysis, not emotion."
        );
        out.push('\n');
    }
    if let Some(price) = current_price {
        let _ = writeln!(out, "Current price:  {}", format_usd(price));
    }
    let _ = writeln!(
        out,
        "Invested:       {} ({})",
        format_usd(summary.invested),
        format_idr(usd_to_idr(summary.invested, rate))
    );
    let _ = writeln!(
        out,
        "Total value:    {} ({})",
        format_usd(summary.potential),
        format_idr(usd_to_idr(summary.potential, rate))
    );
    let _ = writeln!(
        out,
        "Profit:         {} ({})",
        format_usd(summary.profit),
        format_idr(usd_to_idr(summary.profit, rate))
    );

    out.push_str("\nExit plan\n");
    let _ = writeln!(out, "{:>6}  {:>16}  {:>18}  {:>24}", "X", "PRICE", "VALUE", "GAIN (IDR)");
    for row in plan {
        let _ = writeln!(
            out,
            "{:>5}x  {:>16}  {:>18}  {:>24}",
            row.multiplier,
            format_usd(row.target_price),
            format_usd(row.total_value),
            format_idr(usd_to_idr(row.gain, rate))
        );
    }
    out
}

/// Rupiah investment conversion and the cost of the target holding
pub fn render_investment(summary: &InvestmentSummary, rate: f64, price: Option<f64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Exchange rate:        1 USD = {}", format_idr(rate));
    match price {
        Some(price) => {
            let _ = writeln!(out, "Token price:          {}", format_usd(price));
        }
        None => {
            let _ = writeln!(out, "Token price:          unavailable");
        }
    }
    let _ = writeln!(out, "Investment (USD):     {}", format_usd(summary.investment_usd));
    let _ = writeln!(out, "Tokens received:      {:.6}", summary.tokens_received);
    let _ = writeln!(
        out,
        "Cost to reach target: {}",
        format_idr(summary.cost_to_reach_target_idr)
    );
    out
}

/// 7-day price projection, one line per day
pub fn render_predictions(token_id: &str, predictions: &[Prediction]) -> String {
    let mut out = format!("{} - 7 day projection at 5% daily growth\n", token_id);
    for prediction in predictions {
        let _ = writeln!(out, "  {:<8} {}", prediction.label, format_usd(prediction.price));
    }
    out
}

/// Signal list sorted by volume, then an alert line per notify-worthy token
pub fn render_signals(signals: &[TokenSignal], updated_at: DateTime<Local>) -> String {
    let mut out = format!("Last updated: {}\n", updated_at.format("%Y-%m-%d %H:%M:%S"));

    if signals.is_empty() {
        let _ = writeln!(
            out,
            "No tokens up at least {}% in 1h or 24h.",
            SIGNAL_THRESHOLD
        );
        return out;
    }

    for signal in signals {
        let token = &signal.token;
        let _ = write!(
            out,
            "{} {:<20} {:>14}  1h {:>7.2}%  24h {:>7.2}%  vol {}",
            if signal.notify { "!" } else { " " },
            format!("{} ({})", token.name, token.symbol.to_uppercase()),
            token.current_price.map(format_usd).unwrap_or_else(|| "-".to_string()),
            token.price_change_percentage_1h_in_currency.unwrap_or(0.0),
            token.price_change_percentage_24h_in_currency.unwrap_or(0.0),
            token.total_volume.map(format_usd).unwrap_or_else(|| "-".to_string()),
        );
        if let Some((low, high)) = token.sparkline_in_7d.as_ref().and_then(|s| s.range()) {
            let _ = write!(out, "  7d {} - {}", format_usd(low), format_usd(high));
        }
        if let Some(ref twitter) = signal.twitter_username {
            let _ = write!(out, "  @{}", twitter);
        }
        out.push('\n');
    }

    for signal in signals.iter().filter(|s| s.notify) {
        let _ = writeln!(out, "ALERT: {}", signal.notification_message());
    }
    out
}
