//! Command-line interface parsing for the token calculator
//!
//! This module handles parsing of CLI arguments using clap, and validates the
//! token selection (catalogue id, live id, or the manual-price token).

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::data::{get_token_by_id, is_manual_price_token, MANUAL_PRICE_TOKEN_ID};

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// The token id is not a valid CoinGecko-style id
    #[error("Invalid token id: '{0}'. Use a lowercase id such as bitcoin or shiba-inu")]
    InvalidToken(String),

    /// The manual-price token was chosen without a price
    #[error("Token '{}' needs a price: pass --price <USD>", MANUAL_PRICE_TOKEN_ID)]
    ManualPriceRequired,

    /// No live price was available for the token
    #[error("No price available for '{0}'. Pass --price <USD> to calculate anyway")]
    PriceUnavailable(String),
}

/// Token calculator - live prices, profit projections and signals
#[derive(Parser, Debug)]
#[command(name = "tokencalc")]
#[command(about = "Crypto token calculator with cached live prices")]
#[command(version)]
pub struct Cli {
    /// Show debug logs (cache hits, misses and requests) on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Show the current USD to IDR exchange rate
    Rate,

    /// List selectable tokens
    Tokens {
        /// Fetch the live listing instead of the built-in catalogue
        #[arg(long)]
        dynamic: bool,
        /// Only show tokens whose name contains this text (case-insensitive)
        #[arg(long)]
        search: Option<String>,
    },

    /// Show the current USD price of a token
    Price {
        /// Token id (e.g. bitcoin)
        token: String,
        /// Keep polling and alert when the price rises 10% between polls
        #[arg(long)]
        watch: bool,
    },

    /// Show 7 days of daily prices for a token
    History {
        /// Token id (e.g. bitcoin)
        token: String,
    },

    /// Show market details for a token
    Detail {
        /// Token id (e.g. bitcoin)
        token: String,
    },

    /// Profit/loss and exit plan for a token holding
    Profit(ProfitArgs),

    /// Convert a rupiah investment into tokens
    Invest(InvestArgs),

    /// Project the next 7 days of prices at 5% daily growth
    Predict {
        /// Token id (e.g. bitcoin)
        token: String,
        /// Use this USD price instead of fetching one
        #[arg(long)]
        price: Option<f64>,
    },

    /// List tokens up at least 10% in 1h or 24h
    Signals {
        /// Keep running and refresh every 5 minutes
        #[arg(long)]
        watch: bool,
    },
}

/// Arguments for the profit calculator
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProfitArgs {
    /// Token id; shows the live price alongside the calculation
    #[arg(long, default_value = "bitcoin")]
    pub token: String,
    /// Number of tokens held
    #[arg(long)]
    pub amount: f64,
    /// Buy price in USD
    #[arg(long)]
    pub buy: f64,
    /// Target sell price in USD
    #[arg(long)]
    pub target: f64,
}

/// Arguments for the rupiah investment calculator
#[derive(Args, Debug, Clone, PartialEq)]
pub struct InvestArgs {
    /// Token id (e.g. bitcoin, or lainnya with --price)
    #[arg(long, default_value = "bitcoin")]
    pub token: String,
    /// Amount to invest in rupiah
    #[arg(long)]
    pub idr: f64,
    /// Number of tokens you want to hold
    #[arg(long, default_value_t = 0.0)]
    pub target_amount: f64,
    /// Token price in USD; required for lainnya, overrides the live price otherwise
    #[arg(long)]
    pub price: Option<f64>,
}

/// Validates a token id argument.
///
/// Catalogue ids are always accepted. Other ids are passed through to the
/// market API as long as they look like CoinGecko ids (lowercase ASCII letters,
/// digits and dashes).
///
/// # Arguments
/// * `s` - The token id string from CLI
///
/// # Returns
/// * `Ok(String)` with the normalized id
/// * `Err(CliError::InvalidToken)` if the id cannot be a market id
pub fn parse_token_arg(s: &str) -> Result<String, CliError> {
    let id = s.trim().to_lowercase();
    if get_token_by_id(&id).is_some() {
        return Ok(id);
    }

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(id)
    } else {
        Err(CliError::InvalidToken(s.to_string()))
    }
}

/// Checks that the manual-price token comes with a price.
///
/// # Returns
/// * `Ok(())` for any other token, or the manual token with a price
/// * `Err(CliError::ManualPriceRequired)` for the manual token without one
pub fn require_manual_price(token_id: &str, price: Option<f64>) -> Result<(), CliError> {
    if is_manual_price_token(token_id) && price.is_none() {
        Err(CliError::ManualPriceRequired)
    } else {
        Ok(())
    }
}

/// Log filter directive for the given verbosity
pub fn log_directive(verbose: bool) -> &'static str {
    if verbose {
        "tokencalc=debug"
    } else {
        "tokencalc=warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_arg_catalogue() {
        assert_eq!(parse_token_arg("bitcoin").unwrap(), "bitcoin");
        assert_eq!(parse_token_arg("Shiba-Inu").unwrap(), "shiba-inu");
        assert_eq!(parse_token_arg("lainnya").unwrap(), "lainnya");
    }

    #[test]
    fn test_parse_token_arg_live_id() {
        assert_eq!(parse_token_arg("matic-network").unwrap(), "matic-network");
        assert_eq!(parse_token_arg("troll-2").unwrap(), "troll-2");
    }

    #[test]
    fn test_parse_token_arg_invalid() {
        let result = parse_token_arg("bit coin?");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid token id"));
        assert!(err.to_string().contains("bit coin?"));
    }

    #[test]
    fn test_parse_token_arg_empty() {
        assert_eq!(parse_token_arg("  "), Err(CliError::InvalidToken("  ".to_string())));
    }

    #[test]
    fn test_require_manual_price() {
        assert!(require_manual_price("bitcoin", None).is_ok());
        assert!(require_manual_price("lainnya", Some(0.1)).is_ok());
        assert_eq!(
            require_manual_price("lainnya", None),
            Err(CliError::ManualPriceRequired)
        );
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(false), "tokencalc=warn");
        assert_eq!(log_directive(true), "tokencalc=debug");
    }

    #[test]
    fn test_cli_parse_rate() {
        let cli = Cli::parse_from(["tokencalc", "rate"]);
        assert_eq!(cli.command, Command::Rate);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_tokens_dynamic() {
        let cli = Cli::parse_from(["tokencalc", "tokens", "--dynamic"]);
        assert_eq!(
            cli.command,
            Command::Tokens {
                dynamic: true,
                search: None
            }
        );
    }

    #[test]
    fn test_cli_parse_tokens_search() {
        let cli = Cli::parse_from(["tokencalc", "tokens", "--search", "Inu"]);
        assert_eq!(
            cli.command,
            Command::Tokens {
                dynamic: false,
                search: Some("Inu".to_string())
            }
        );
    }

    #[test]
    fn test_cli_parse_price_watch() {
        let cli = Cli::parse_from(["tokencalc", "price", "pepe", "--watch"]);
        assert_eq!(
            cli.command,
            Command::Price {
                token: "pepe".to_string(),
                watch: true
            }
        );
    }

    #[test]
    fn test_cli_parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["tokencalc", "price", "bitcoin", "-v"]);
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Command::Price {
                token: "bitcoin".to_string(),
                watch: false
            }
        );
    }

    #[test]
    fn test_cli_parse_profit() {
        let cli = Cli::parse_from([
            "tokencalc", "profit", "--amount", "1000", "--buy", "0.5", "--target", "2",
        ]);
        match cli.command {
            Command::Profit(args) => {
                assert_eq!(args.token, "bitcoin");
                assert_eq!(args.amount, 1000.0);
                assert_eq!(args.buy, 0.5);
                assert_eq!(args.target, 2.0);
            }
            other => panic!("expected profit, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_invest_with_manual_price() {
        let cli = Cli::parse_from([
            "tokencalc", "invest", "--token", "lainnya", "--idr", "1000000", "--price", "0.02",
        ]);
        match cli.command {
            Command::Invest(args) => {
                assert_eq!(args.token, "lainnya");
                assert_eq!(args.idr, 1_000_000.0);
                assert_eq!(args.target_amount, 0.0);
                assert_eq!(args.price, Some(0.02));
            }
            other => panic!("expected invest, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_signals_watch() {
        let cli = Cli::parse_from(["tokencalc", "signals", "--watch"]);
        assert_eq!(cli.command, Command::Signals { watch: true });
    }

    #[test]
    fn test_cli_missing_subcommand_fails() {
        assert!(Cli::try_parse_from(["tokencalc"]).is_err());
    }
}
