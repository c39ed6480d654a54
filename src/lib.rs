//! Token calculator library
//!
//! This module exposes the request cache, market data clients, calculators and
//! CLI parsing for use by the binary and integration tests.

pub mod cache;
pub mod calculator;
pub mod cli;
pub mod data;
pub mod refresh;
pub mod report;
pub mod signal;
