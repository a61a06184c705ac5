//! Response types for the dashboard API.

use serde::Serialize;

use crate::engine::EngineStatus;
use crate::tracker::TrackerStatus;
use crate::types::{PaperOrder, StrategyMetrics, Trade};

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-strategy metrics with derived percentages rendered.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub strategy: String,
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pending: u32,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_invested: f64,
    pub roi: f64,
}

impl From<StrategyMetrics> for MetricsSummary {
    fn from(metrics: StrategyMetrics) -> Self {
        Self {
            strategy: metrics.strategy.to_string(),
            total_trades: metrics.total_trades,
            wins: metrics.wins,
            losses: metrics.losses,
            pending: metrics.pending,
            win_rate: round1(metrics.win_rate()),
            total_pnl: round2(metrics.total_pnl),
            total_invested: round2(metrics.total_invested),
            roi: round1(metrics.roi()),
        }
    }
}

/// GET /api/status payload.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub engine: EngineStatus,
    pub markets: TrackerStatus,
    pub timestamp: i64,
}

/// GET /api/orders payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<PaperOrder>,
    pub open_count: usize,
}

/// GET /api/trades payload.
#[derive(Debug, Clone, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<Trade>,
    pub count: usize,
}

/// GET /api/metrics payload.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub undervalued: MetricsSummary,
    pub momentum: MetricsSummary,
}

/// Quote pair for the t+1 window.
#[derive(Debug, Clone, Serialize)]
pub struct PricePair {
    pub up: Option<f64>,
    pub down: Option<f64>,
    pub sum: Option<f64>,
}

impl PricePair {
    pub fn new(up: Option<f64>, down: Option<f64>) -> Self {
        let sum = match (up, down) {
            (Some(u), Some(d)) => Some(u + d),
            _ => None,
        };
        Self { up, down, sum }
    }
}

/// GET /api/markets payload.
#[derive(Debug, Clone, Serialize)]
pub struct MarketsResponse {
    #[serde(flatten)]
    pub markets: TrackerStatus,
    pub t1_prices: Option<PricePair>,
}

/// GET /api/prices payload.
#[derive(Debug, Clone, Serialize)]
pub struct PricesResponse {
    pub market_slug: String,
    pub countdown: i64,
    pub up_price: Option<f64>,
    pub down_price: Option<f64>,
    pub sum_price: Option<f64>,
    pub undervalued_threshold: f64,
    pub momentum_threshold: f64,
    pub entry_window: bool,
}

/// Full state snapshot pushed over the WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct WsSnapshot {
    pub timestamp: i64,
    pub engine: EngineStatus,
    pub markets: TrackerStatus,
    pub prices: Option<PricePair>,
    pub metrics: MetricsResponse,
    pub orders: Vec<PaperOrder>,
    pub recent_trades: Vec<Trade>,
}
