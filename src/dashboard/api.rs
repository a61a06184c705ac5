//! Dashboard HTTP API
//!
//! REST endpoints for the monitoring frontend.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::{websocket, ApiResponse, DashboardState};
use crate::types::StrategyKind;

/// Create the API router with all endpoints
pub fn create_router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/start", post(start_engine))
        .route("/api/stop", post(stop_engine))
        .route("/api/markets", get(get_markets))
        .route("/api/orders", get(get_orders))
        .route("/api/trades", get(get_trades))
        .route("/api/metrics", get(get_metrics))
        .route("/api/prices", get(get_prices))
        // WebSocket
        .route("/ws", get(websocket::websocket_handler))
        // State
        .with_state(state)
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/status - Engine and tracker status
async fn get_status(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(ApiResponse::success(StatusResponse {
        engine: state.engine.status(),
        markets: state.tracker.status(),
        timestamp: Utc::now().timestamp(),
    }))
}

/// POST /api/start - Start the trading loop (no-op when running)
async fn start_engine(State(state): State<DashboardState>) -> impl IntoResponse {
    state.engine.clone().start();
    Json(ApiResponse::success("Engine started"))
}

/// POST /api/stop - Stop the trading loop (no-op when stopped)
async fn stop_engine(State(state): State<DashboardState>) -> impl IntoResponse {
    state.engine.stop().await;
    Json(ApiResponse::success("Engine stopped"))
}

/// GET /api/markets - Tracked windows plus t+1 quotes
async fn get_markets(State(state): State<DashboardState>) -> impl IntoResponse {
    state.tracker.refresh().await;

    let t1_prices = match state.tracker.next_window() {
        Some(t1) => {
            let (up, down) = state
                .oracle
                .best_prices(&t1.up_token_id, &t1.down_token_id)
                .await;
            Some(PricePair::new(up, down))
        }
        None => None,
    };

    Json(ApiResponse::success(MarketsResponse {
        markets: state.tracker.status(),
        t1_prices,
    }))
}

/// GET /api/orders - All orders
async fn get_orders(State(state): State<DashboardState>) -> impl IntoResponse {
    let orders = state.engine.all_orders();
    let open_count = orders.iter().filter(|o| o.is_open()).count();
    Json(ApiResponse::success(OrdersResponse { orders, open_count }))
}

#[derive(Debug, Deserialize)]
struct TradesQuery {
    strategy: Option<String>,
}

/// GET /api/trades?strategy=undervalued - Trades, optionally filtered
async fn get_trades(
    Query(query): Query<TradesQuery>,
    State(state): State<DashboardState>,
) -> impl IntoResponse {
    // An unknown strategy label falls back to the unfiltered list.
    let filter = query.strategy.as_deref().and_then(StrategyKind::from_str);
    let trades = state.engine.trades(filter);
    let count = trades.len();
    Json(ApiResponse::success(TradesResponse { trades, count }))
}

/// GET /api/metrics - Metrics for both strategies
async fn get_metrics(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(ApiResponse::success(MetricsResponse {
        undervalued: state.engine.metrics(StrategyKind::Undervalued).into(),
        momentum: state.engine.metrics(StrategyKind::Momentum).into(),
    }))
}

/// GET /api/prices - Current quotes for the t+1 window
async fn get_prices(State(state): State<DashboardState>) -> impl IntoResponse {
    state.tracker.refresh().await;

    let Some(t1) = state.tracker.next_window() else {
        return Json(ApiResponse::<PricesResponse>::error("No upcoming window"));
    };

    let (up, down) = state
        .oracle
        .best_prices(&t1.up_token_id, &t1.down_token_id)
        .await;
    let pair = PricePair::new(up, down);
    let countdown = t1.countdown_to_active(Utc::now().timestamp());

    Json(ApiResponse::success(PricesResponse {
        market_slug: t1.slug,
        countdown,
        up_price: pair.up,
        down_price: pair.down,
        sum_price: pair.sum,
        undervalued_threshold: state.strategy.undervalued_threshold,
        momentum_threshold: state.strategy.momentum_threshold,
        entry_window: countdown > 0 && countdown <= state.strategy.entry_countdown_secs,
    }))
}
