//! Cache module for memoizing market data API responses
//!
//! This module provides an in-memory request cache that stores decoded JSON
//! responses under logical cache keys for a short time-to-live, and pauses
//! before every outbound request to respect the providers' rate limits. A
//! failed request never replaces a previously stored response.

mod manager;
mod transport;

pub use manager::{
    CacheConfig, CacheEntry, EntryState, RequestCache, RequestError, DEFAULT_REQUEST_DELAY,
    DEFAULT_TTL,
};
pub use transport::{HttpTransport, RawResponse, Transport};
