//! Dashboard Module
//!
//! HTTP/WebSocket API for monitoring and controlling the paper trading
//! session. Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;
mod websocket;

pub use api::create_router;
pub use types::*;

use serde::Serialize;
use std::sync::Arc;

use crate::clob::PriceOracle;
use crate::config::StrategyConfig;
use crate::engine::StrategyEngine;
use crate::tracker::MarketTracker;

/// Shared handles the API serves from.
#[derive(Clone)]
pub struct DashboardState {
    pub engine: Arc<StrategyEngine>,
    pub tracker: Arc<MarketTracker>,
    pub oracle: Arc<dyn PriceOracle>,
    pub strategy: StrategyConfig,
}

/// Envelope shared by every API response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Start the dashboard server
pub async fn start_server(state: DashboardState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Dashboard API starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
