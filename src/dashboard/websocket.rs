//! Dashboard WebSocket
//!
//! Pushes a full state snapshot to each connected client on a fixed
//! cadence. Snapshots are copy-out: the engine may mutate between pushes
//! without affecting a frame already serialized.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::types::{MetricsResponse, PricePair, WsSnapshot};
use super::DashboardState;
use crate::types::StrategyKind;

const PUSH_INTERVAL: Duration = Duration::from_secs(2);
const RECENT_TRADES: usize = 10;

/// GET /ws - live state stream
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<DashboardState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_snapshots(socket, state))
}

async fn push_snapshots(mut socket: WebSocket, state: DashboardState) {
    let mut ticker = tokio::time::interval(PUSH_INTERVAL);

    loop {
        ticker.tick().await;

        let snapshot = build_snapshot(&state).await;
        let frame = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "Failed to serialize snapshot");
                continue;
            }
        };

        if socket.send(Message::Text(frame)).await.is_err() {
            // Client went away.
            break;
        }
    }
}

async fn build_snapshot(state: &DashboardState) -> WsSnapshot {
    let prices = match state.tracker.next_window() {
        Some(t1) => {
            let (up, down) = state
                .oracle
                .best_prices(&t1.up_token_id, &t1.down_token_id)
                .await;
            Some(PricePair::new(up, down))
        }
        None => None,
    };

    let trades = state.engine.trades(None);
    let recent_trades = trades
        .iter()
        .rev()
        .take(RECENT_TRADES)
        .rev()
        .cloned()
        .collect();

    WsSnapshot {
        timestamp: Utc::now().timestamp(),
        engine: state.engine.status(),
        markets: state.tracker.status(),
        prices,
        metrics: MetricsResponse {
            undervalued: state.engine.metrics(StrategyKind::Undervalued).into(),
            momentum: state.engine.metrics(StrategyKind::Momentum).into(),
        },
        orders: state.engine.all_orders(),
        recent_trades,
    }
}
