//! Investment arithmetic for the token calculator
//!
//! Profit and loss, exit-plan tables, 7-day price projections, rupiah
//! investment conversions and price-rise alerts. Everything here is pure and
//! synchronous; prices and rates are fetched by the `data` clients.

use serde::Serialize;
use thiserror::Error;

/// Buy-price multiples shown in the exit plan
pub const EXIT_MULTIPLIERS: [f64; 6] = [2.0, 5.0, 10.0, 50.0, 100.0, 500.0];

/// A target at or above this multiple of the buy price raises the FOMO flag
pub const FOMO_MULTIPLIER: f64 = 100.0;

/// Number of days in a price projection
pub const PREDICTION_DAYS: u32 = 7;

/// Assumed compound growth per projected day
pub const DAILY_GROWTH_RATE: f64 = 0.05;

/// Percentage rise that triggers a price alert
pub const PRICE_ALERT_THRESHOLD: f64 = 10.0;

/// Errors for calculator inputs that have no meaningful result
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    /// An amount or price was negative, NaN or infinite
    #[error("Invalid {field}: {value} (must be a non-negative number)")]
    InvalidAmount { field: &'static str, value: f64 },

    /// The exchange rate was zero, negative, NaN or infinite
    #[error("Invalid exchange rate: {0} (must be greater than zero)")]
    InvalidRate(f64),
}

fn check_amount(field: &'static str, value: f64) -> Result<f64, CalcError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CalcError::InvalidAmount { field, value })
    }
}

fn check_rate(rate: f64) -> Result<f64, CalcError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(CalcError::InvalidRate(rate))
    }
}

/// Inputs for the profit calculator, prices in USD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitInput {
    pub token_amount: f64,
    pub buy_price: f64,
    pub target_price: f64,
}

/// Result of the profit calculator, values in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitSummary {
    /// Amount paid at the buy price
    pub invested: f64,
    /// Value at the target price
    pub potential: f64,
    /// Potential minus invested; negative for a loss
    pub profit: f64,
    /// Target is at least 100x the buy price
    pub is_fomo: bool,
}

/// Computes invested amount, potential value and profit at the target price
pub fn calculate_profit(input: &ProfitInput) -> Result<ProfitSummary, CalcError> {
    let amount = check_amount("token amount", input.token_amount)?;
    let buy = check_amount("buy price", input.buy_price)?;
    let target = check_amount("target price", input.target_price)?;

    let invested = amount * buy;
    let potential = amount * target;

    Ok(ProfitSummary {
        invested,
        potential,
        profit: potential - invested,
        is_fomo: target >= buy * FOMO_MULTIPLIER,
    })
}

/// One row of the exit plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitPlanRow {
    /// Multiple of the buy price
    pub multiplier: f64,
    /// Sell price in USD
    pub target_price: f64,
    /// Holding value at the sell price in USD
    pub total_value: f64,
    /// Total value minus invested amount in USD
    pub gain: f64,
}

/// Builds the exit plan: holding value and gain at each of [`EXIT_MULTIPLIERS`]
pub fn exit_plan(token_amount: f64, buy_price: f64) -> Result<Vec<ExitPlanRow>, CalcError> {
    let amount = check_amount("token amount", token_amount)?;
    let buy = check_amount("buy price", buy_price)?;
    let invested = amount * buy;

    Ok(EXIT_MULTIPLIERS
        .iter()
        .map(|&multiplier| {
            let target_price = buy * multiplier;
            let total_value = amount * target_price;
            ExitPlanRow {
                multiplier,
                target_price,
                total_value,
                gain: total_value - invested,
            }
        })
        .collect())
}

/// A projected price for one future day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Days ahead, starting at 1
    pub day: u32,
    /// Display label such as "+3 days"
    pub label: String,
    /// Projected price in USD
    pub price: f64,
}

/// Projects the next [`PREDICTION_DAYS`] days at [`DAILY_GROWTH_RATE`] compound growth
///
/// Without a current price every projected price is zero.
pub fn predict_prices(current_price: Option<f64>) -> Vec<Prediction> {
    (1..=PREDICTION_DAYS)
        .map(|day| Prediction {
            day,
            label: if day == 1 {
                "+1 day".to_string()
            } else {
                format!("+{} days", day)
            },
            price: current_price
                .map(|price| price * (1.0 + DAILY_GROWTH_RATE).powi(day as i32))
                .unwrap_or(0.0),
        })
        .collect()
}

/// Projects the next [`PREDICTION_DAYS`] days from a known price
///
/// # Returns
/// * `Ok(Vec<Prediction>)` - One projection per day
/// * `Err(CalcError::InvalidAmount)` - If the price is negative, NaN or infinite
pub fn project_prices(current_price: f64) -> Result<Vec<Prediction>, CalcError> {
    let price = check_amount("price", current_price)?;
    Ok(predict_prices(Some(price)))
}

/// Inputs for the rupiah investment calculator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvestmentInput {
    /// Amount to invest in rupiah
    pub investment_idr: f64,
    /// Rupiah per US dollar
    pub exchange_rate: f64,
    /// Token price in USD, if known
    pub token_price_usd: Option<f64>,
    /// Number of tokens the user wants to hold
    pub target_token_amount: f64,
}

/// Result of the rupiah investment calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvestmentSummary {
    /// Investment converted to USD
    pub investment_usd: f64,
    /// Tokens bought with the investment; zero without a price
    pub tokens_received: f64,
    /// Rupiah needed to buy the target amount; zero without a price
    pub cost_to_reach_target_idr: f64,
}

/// Converts a rupiah investment into tokens and prices a target holding
pub fn calculate_investment(input: &InvestmentInput) -> Result<InvestmentSummary, CalcError> {
    let investment_idr = check_amount("investment", input.investment_idr)?;
    let rate = check_rate(input.exchange_rate)?;
    let target = check_amount("target token amount", input.target_token_amount)?;
    let price = input
        .token_price_usd
        .map(|price| check_amount("token price", price))
        .transpose()?
        .filter(|price| *price > 0.0);

    let investment_usd = idr_to_usd(investment_idr, rate);

    Ok(InvestmentSummary {
        investment_usd,
        tokens_received: price.map(|p| investment_usd / p).unwrap_or(0.0),
        cost_to_reach_target_idr: price.map(|p| target * p * rate).unwrap_or(0.0),
    })
}

/// Converts USD to rupiah at the given rate
pub fn usd_to_idr(usd: f64, exchange_rate: f64) -> f64 {
    usd * exchange_rate
}

/// Converts rupiah to USD at the given rate, or zero for a non-positive rate
pub fn idr_to_usd(idr: f64, exchange_rate: f64) -> f64 {
    if exchange_rate > 0.0 {
        idr / exchange_rate
    } else {
        0.0
    }
}

/// Percentage change from `previous` to `current`
///
/// Returns `None` when there is no positive previous price to compare against.
pub fn price_change_percent(previous: f64, current: f64) -> Option<f64> {
    if previous > 0.0 && previous.is_finite() && current.is_finite() {
        Some((current - previous) / previous * 100.0)
    } else {
        None
    }
}

/// Whether the price rose by at least [`PRICE_ALERT_THRESHOLD`] percent
pub fn is_price_alert(previous: f64, current: f64) -> bool {
    price_change_percent(previous, current)
        .map(|change| change >= PRICE_ALERT_THRESHOLD)
        .unwrap_or(false)
}

/// A rise of at least [`PRICE_ALERT_THRESHOLD`] percent between two observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceAlert {
    /// Price at the previous observation, USD
    pub previous: f64,
    /// Price at the latest observation, USD
    pub current: f64,
    /// Rise from `previous` to `current` in percent
    pub change_percent: f64,
}

/// Follows successive prices of one token and raises at most one alert
///
/// Each observation is compared with the one before it. Once an alert has
/// fired the tracker keeps recording prices but stays quiet.
#[derive(Debug, Clone, Default)]
pub struct PriceTracker {
    previous: Option<f64>,
    alerted: bool,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded price
    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    /// Records `current` and returns an alert if it is the first qualifying rise
    pub fn observe(&mut self, current: f64) -> Option<PriceAlert> {
        let previous = self.previous.replace(current)?;
        if self.alerted || !is_price_alert(previous, current) {
            return None;
        }

        self.alerted = true;
        Some(PriceAlert {
            previous,
            current,
            change_percent: price_change_percent(previous, current)?,
        })
    }
}

/// Formats a rupiah amount Indonesian style, e.g. `Rp 1.234.567,89`
///
/// Non-finite values are shown as zero.
pub fn format_idr(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100, '.');
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };

    format!("{}Rp {},{:02}", sign, whole, cents % 100)
}

/// Inserts `separator` between each group of three digits
pub(crate) fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }

    grouped
}
