//! Token calculator - cached live crypto prices and investment projections
//!
//! A command-line tool that fetches token prices and the USD/IDR rate from
//! public market data APIs, and computes profit, exit plans, rupiah
//! investments, 7-day projections and price signals.

use std::process;

use chrono::{DateTime, Local};
use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use tokencalc::cache::RequestCache;
use tokencalc::calculator::{
    calculate_investment, calculate_profit, exit_plan, project_prices, InvestmentInput,
    ProfitInput,
};
use tokencalc::cli::{
    log_directive, parse_token_arg, require_manual_price, Cli, CliError, Command,
};
use tokencalc::data::{
    is_manual_price_token, search_tokens, ExchangeRateClient, MarketClient, SelectionMode,
};
use tokencalc::refresh::{RefreshConfig, RefreshHandle, RefreshMessage};
use tokencalc::report;
use tokencalc::signal::collect_signals;

/// Installs the stderr log subscriber
///
/// `RUST_LOG` is honoured; without it only warnings are shown, and `--verbose`
/// always enables debug output for this crate.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        match log_directive(true).parse::<Directive>() {
            Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
            Err(_) => EnvFilter::from_default_env(),
        }
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_directive(false)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // One cache shared by every client
    let cache = RequestCache::new();
    let market = MarketClient::with_cache(cache.clone());
    let rates = ExchangeRateClient::with_cache(cache);

    match cli.command {
        Command::Rate => {
            print!("{}", report::render_rate(rates.exchange_rate().await));
        }
        Command::Tokens { dynamic, search } => {
            let mode = if dynamic {
                SelectionMode::Dynamic
            } else {
                SelectionMode::Static
            };
            let mut tokens = market.selectable_tokens(mode).await;
            if let Some(query) = search {
                tokens = search_tokens(tokens, &query);
            }
            print!("{}", report::render_tokens(&tokens));
        }
        Command::Price { token, watch } => {
            let id = parse_token_arg(&token)?;
            if is_manual_price_token(&id) {
                return Err(CliError::ManualPriceRequired.into());
            }
            if watch {
                watch_price(market, rates, id).await;
            } else {
                let (price, rate) = tokio::join!(market.token_price(&id), rates.exchange_rate());
                let as_of = fetched_at(&market, &id).await;
                print!("{}", report::render_price(&id, price, rate, as_of));
            }
        }
        Command::History { token } => {
            let id = parse_token_arg(&token)?;
            print!("{}", report::render_history(&id, &market.token_history(&id).await));
        }
        Command::Detail { token } => {
            let id = parse_token_arg(&token)?;
            let (details, rate) = tokio::join!(market.token_details(&id), rates.exchange_rate());
            print!("{}", report::render_details(&details?, rate));
        }
        Command::Profit(args) => {
            let id = parse_token_arg(&args.token)?;
            let input = ProfitInput {
                token_amount: args.amount,
                buy_price: args.buy,
                target_price: args.target,
            };
            let summary = calculate_profit(&input)?;
            let plan = exit_plan(args.amount, args.buy)?;

            let (current_price, rate) =
                tokio::join!(market.resolve_price(&id, None), rates.exchange_rate());
            print!(
                "{}",
                report::render_profit(&summary, &plan, rate, current_price)
            );
        }
        Command::Invest(args) => {
            let id = parse_token_arg(&args.token)?;
            require_manual_price(&id, args.price)?;

            let price_lookup = async {
                match args.price {
                    Some(price) => Some(price),
                    None => market.resolve_price(&id, None).await,
                }
            };
            let (price, rate) = tokio::join!(price_lookup, rates.exchange_rate());

            let summary = calculate_investment(&InvestmentInput {
                investment_idr: args.idr,
                exchange_rate: rate,
                token_price_usd: price,
                target_token_amount: args.target_amount,
            })?;
            print!("{}", report::render_investment(&summary, rate, price));
        }
        Command::Predict { token, price } => {
            let id = parse_token_arg(&token)?;
            require_manual_price(&id, price)?;

            let current = match price {
                Some(price) => price,
                None => market
                    .resolve_price(&id, None)
                    .await
                    .ok_or_else(|| CliError::PriceUnavailable(id.clone()))?,
            };
            print!("{}", report::render_predictions(&id, &project_prices(current)?));
        }
        Command::Signals { watch: false } => {
            let signals = collect_signals(&market).await?;
            print!("{}", report::render_signals(&signals, Local::now()));
        }
        Command::Signals { watch: true } => {
            watch_signals(market).await;
        }
    }

    Ok(())
}

/// Local time the stored price of `token_id` was fetched
async fn fetched_at(market: &MarketClient, token_id: &str) -> Option<DateTime<Local>> {
    market
        .price_cached_at(token_id)
        .await
        .map(|at| at.with_timezone(&Local))
}

/// Prints the price on every poll, plus an alert on a sharp rise, until Ctrl-C
async fn watch_price(market: MarketClient, rates: ExchangeRateClient, token_id: String) {
    let mut handle =
        RefreshHandle::spawn_price_watch(RefreshConfig::default(), market.clone(), token_id);

    loop {
        tokio::select! {
            message = handle.recv() => match message {
                Some(RefreshMessage::PriceUpdated { token_id, price, alert }) => {
                    let rate = rates.exchange_rate().await;
                    let as_of = fetched_at(&market, &token_id).await;
                    print!("{}", report::render_price(&token_id, price, rate, as_of));
                    if let Some(alert) = alert {
                        print!("{}", report::render_price_alert(&token_id, &alert));
                    }
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    handle.shutdown().await;
}

/// Prints signals on every background refresh until Ctrl-C
async fn watch_signals(market: MarketClient) {
    let mut handle = RefreshHandle::spawn(RefreshConfig::default(), market);

    loop {
        tokio::select! {
            message = handle.recv() => match message {
                Some(RefreshMessage::SignalsUpdated(signals)) => {
                    print!("{}", report::render_signals(&signals, Local::now()));
                    println!();
                }
                Some(RefreshMessage::RefreshError(e)) => {
                    eprintln!("Refresh failed: {}", e);
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    handle.shutdown().await;
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
