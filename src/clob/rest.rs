//! REST clients for the Gamma market-data API and the CLOB price endpoint
//!
//! Both endpoints are public; no signing is involved. Lookups are probe
//! style: "not found" is a frequent, normal outcome and maps to `None`.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::types::{GammaEvent, GammaMarket, PriceResponse};

/// Wire-level failure surfaced by the REST clients. Callers treat every
/// variant as "candidate absent"; the distinction only matters for logging.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

/// Market-data lookup contract consumed by the tracker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// Look up one market by slug. `Ok(None)` is the normal "does not
    /// exist yet" outcome; `Err` is a transport-level failure.
    async fn market_by_slug(&self, slug: &str) -> Result<Option<GammaMarket>, ApiError>;
}

/// Price-quote lookup contract consumed by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Best buy quote for each side of a window. Either side can be absent
    /// when its book has no liquidity.
    async fn best_prices(
        &self,
        up_token_id: &str,
        down_token_id: &str,
    ) -> (Option<f64>, Option<f64>);
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Client for the Gamma market-data API.
pub struct GammaClient {
    client: Client,
    base_url: String,
}

impl GammaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_by_slug<T: DeserializeOwned>(&self, path: &str, slug: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MarketDataApi for GammaClient {
    async fn market_by_slug(&self, slug: &str) -> Result<Option<GammaMarket>, ApiError> {
        // Events bundle their markets; try that shape first.
        let events: Vec<GammaEvent> = self.get_by_slug("/events", slug).await?;
        if let Some(market) = events
            .into_iter()
            .next()
            .and_then(|event| event.markets.into_iter().next())
        {
            return Ok(Some(market));
        }

        // Fallback: direct market lookup.
        let markets: Vec<GammaMarket> = self.get_by_slug("/markets", slug).await?;
        Ok(markets.into_iter().next())
    }
}

/// Client for the CLOB public price endpoint.
pub struct ClobClient {
    client: Client,
    base_url: String,
}

impl ClobClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Best buy quote for one token; `None` on empty book or any failure.
    async fn buy_price(&self, token_id: &str) -> Option<f64> {
        let url = format!("{}/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id), ("side", "buy")])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<PriceResponse>().await {
                Ok(body) => body
                    .price
                    .parse::<f64>()
                    .ok()
                    .filter(|p| p.is_finite() && *p > 0.0),
                Err(e) => {
                    debug!(token_id, error = %e, "Malformed price payload");
                    None
                }
            },
            Ok(resp) => {
                debug!(token_id, status = %resp.status(), "Price lookup rejected");
                None
            }
            Err(e) => {
                debug!(token_id, error = %e, "Price lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl PriceOracle for ClobClient {
    async fn best_prices(
        &self,
        up_token_id: &str,
        down_token_id: &str,
    ) -> (Option<f64>, Option<f64>) {
        tokio::join!(self.buy_price(up_token_id), self.buy_price(down_token_id))
    }
}
