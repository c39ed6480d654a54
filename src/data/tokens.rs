//! Static token catalogue
//!
//! This module contains the built-in list of tokens offered when the token
//! list is not fetched from the market API.

use super::TokenInfo;

/// Catalogue id meaning "the user enters the price by hand"
pub const MANUAL_PRICE_TOKEN_ID: &str = "lainnya";

/// Static array of all catalogue tokens
///
/// The last entry is the manual-price placeholder.
pub static TOKENS: [TokenInfo; 26] = [
    token("bitcoin", "Bitcoin", "BTC", 1.2),
    token("ethereum", "Ethereum", "ETH", 2.5),
    token("solana", "Solana", "SOL", 5.7),
    token("cardano", "Cardano", "ADA", -1.2),
    token("lens", "Lens", "LENS", 15.2),
    token("ripple", "XRP", "XRP", 0.8),
    token("polkadot", "Polkadot", "DOT", 3.1),
    token("dogecoin", "Dogecoin", "DOGE", 10.5),
    token("shiba-inu", "Shiba Inu", "SHIB", 8.3),
    token("chainlink", "Chainlink", "LINK", 4.2),
    token("avalanche", "Avalanche", "AVAX", 6.3),
    token("litecoin", "Litecoin", "LTC", 0.5),
    token("uniswap", "Uniswap", "UNI", 1.9),
    token("bnb", "BNB", "BNB", 0.3),
    token("tron", "TRON", "TRX", 1.1),
    token("monero", "Monero", "XMR", 2.8),
    token("stellar", "Stellar", "XLM", -0.7),
    token("cosmos", "Cosmos", "ATOM", 3.4),
    token("tezos", "Tezos", "XTZ", 1.5),
    token("mantra", "MANTRA", "OM", 7.8),
    token("pepe", "Pepe", "PEPE", 25.6),
    token("bonk", "Bonk", "BONK", 18.9),
    token("near", "NEAR Protocol", "NEAR", 5.1),
    token("aptos", "Aptos", "APT", 4.3),
    token("troll-2", "Troll", "TROLL", 12.5),
    token(MANUAL_PRICE_TOKEN_ID, "Lainnya", "LAINNYA", 0.0),
];

const fn token(
    id: &'static str,
    name: &'static str,
    symbol: &'static str,
    market_cap_change_percentage_24h: f64,
) -> TokenInfo {
    TokenInfo {
        id,
        name,
        symbol,
        market_cap_change_percentage_24h,
    }
}

/// Returns all catalogue tokens
pub fn all_tokens() -> &'static [TokenInfo] {
    &TOKENS
}

/// Looks up a catalogue token by its id
pub fn get_token_by_id(id: &str) -> Option<&'static TokenInfo> {
    TOKENS.iter().find(|token| token.id == id)
}

/// Whether the token's price must be supplied by the user
pub fn is_manual_price_token(id: &str) -> bool {
    id == MANUAL_PRICE_TOKEN_ID
}
