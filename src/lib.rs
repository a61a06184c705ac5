//! UpDownBot Library
//!
//! Dual-strategy paper trading tester for Polymarket 15m BTC Up/Down markets

pub mod buckets;
pub mod clob;
pub mod config;
pub mod engine;
pub mod persistence;
pub mod tracker;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;
