//! Gamma/CLOB API clients
//!
//! Narrow collaborator contracts the core depends on: market lookup by slug
//! and best-quote lookup by token pair.

mod rest;
mod types;

pub use rest::{ApiError, ClobClient, GammaClient, MarketDataApi, PriceOracle};
pub use types::{FlexList, GammaEvent, GammaMarket, MarketToken, PriceResponse};

#[cfg(test)]
pub use rest::{MockMarketDataApi, MockPriceOracle};
