//! Core types used throughout UpDownBot
//!
//! Defines the market window, paper order, trade and per-strategy metrics
//! model shared by the tracker, the engine and the dashboard.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Binary market outcome side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Up,
    Down,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Up => write!(f, "UP"),
            Outcome::Down => write!(f, "DOWN"),
        }
    }
}

/// The two paper strategies evaluated against every window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Buy a side quoting at or below the undervalued threshold.
    Undervalued,
    /// Buy a side quoting at or above the momentum threshold.
    Momentum,
}

impl StrategyKind {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "undervalued" => Some(StrategyKind::Undervalued),
            "momentum" => Some(StrategyKind::Momentum),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Undervalued => write!(f, "undervalued"),
            StrategyKind::Momentum => write!(f, "momentum"),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, not yet placed.
    Pending,
    /// Placed, waiting for a fill.
    Open,
    /// Completely filled.
    Filled,
    /// Cancelled before a fill.
    Cancelled,
    /// Window ended without a fill.
    Expired,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Trade result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Pending,
    Win,
    Loss,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeResult::Pending => write!(f, "PENDING"),
            TradeResult::Win => write!(f, "WIN"),
            TradeResult::Loss => write!(f, "LOSS"),
        }
    }
}

/// One 15-minute market window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketWindow {
    /// Market slug; a pure function of `start_time`.
    pub slug: String,
    /// Condition ID on the exchange.
    pub condition_id: String,
    /// Token ID for the UP outcome.
    pub up_token_id: String,
    /// Token ID for the DOWN outcome.
    pub down_token_id: String,
    /// Unix timestamp when the window becomes active.
    pub start_time: i64,
    /// Unix timestamp when the window resolves (start + window duration).
    pub end_time: i64,
    /// Winning side once the market settles; never mutated afterwards.
    pub winner: Option<Outcome>,
}

impl MarketWindow {
    /// Seconds until the window becomes active, floored at zero.
    pub fn countdown_to_active(&self, now: i64) -> i64 {
        (self.start_time - now).max(0)
    }

    /// Seconds until the window resolves, floored at zero.
    pub fn countdown_to_end(&self, now: i64) -> i64 {
        (self.end_time - now).max(0)
    }

    /// Whether `now` falls inside the active interval `[start, end)`.
    pub fn contains(&self, now: i64) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

/// A paper trading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperOrder {
    pub id: String,
    pub strategy: StrategyKind,
    pub market_slug: String,
    pub outcome: Outcome,
    /// Entry price in (0, 1).
    pub price: f64,
    /// Requested size in shares.
    pub size: f64,
    /// Filled size; never exceeds `size`.
    pub filled_size: f64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PaperOrder {
    pub fn new(
        strategy: StrategyKind,
        market_slug: impl Into<String>,
        outcome: Outcome,
        price: f64,
        size: f64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            strategy,
            market_slug: market_slug.into(),
            outcome,
            price,
            size,
            filled_size: 0.0,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a fill. The filled size is clamped to the requested size and
    /// the order turns `Filled` exactly when the two match. No-op on
    /// terminal orders.
    pub fn fill(&mut self, size: f64) {
        if self.is_terminal() {
            return;
        }
        self.filled_size = (self.filled_size + size).min(self.size);
        if self.filled_size >= self.size {
            self.status = OrderStatus::Filled;
        }
        self.updated_at = Utc::now().timestamp();
    }

    /// Cancel the order. Terminal; no fills can land afterwards.
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now().timestamp();
    }

    /// Expire the order after its window ended without a fill.
    pub fn expire(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = OrderStatus::Expired;
        self.updated_at = Utc::now().timestamp();
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }
}

/// The realized outcome of one filled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub strategy: StrategyKind,
    pub market_slug: String,
    pub outcome: Outcome,
    pub entry_price: f64,
    pub size: f64,
    pub filled_size: f64,
    /// Fill time, not order-creation time.
    pub entry_time: i64,
    /// Set exactly once, together with `result`.
    pub resolution_time: Option<i64>,
    pub result: TradeResult,
    pub pnl: f64,
}

impl Trade {
    /// Materialize a trade from a filled order.
    pub fn from_order(order: &PaperOrder) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            strategy: order.strategy,
            market_slug: order.market_slug.clone(),
            outcome: order.outcome,
            entry_price: order.price,
            size: order.size,
            filled_size: order.filled_size,
            entry_time: order.updated_at,
            resolution_time: None,
            result: TradeResult::Pending,
            pnl: 0.0,
        }
    }

    /// Settle against the winning side. Winners collect $1.00 per share,
    /// losers forfeit the entry cost. A second call is a no-op: the result
    /// and pnl are computed exactly once.
    pub fn resolve(&mut self, winning: Outcome) {
        if self.result != TradeResult::Pending {
            return;
        }
        self.resolution_time = Some(Utc::now().timestamp());
        if self.outcome == winning {
            self.pnl = self.size * (1.0 - self.entry_price);
            self.result = TradeResult::Win;
        } else {
            self.pnl = -self.size * self.entry_price;
            self.result = TradeResult::Loss;
        }
    }
}

/// Aggregated per-strategy performance, recomputable at any time from the
/// full trade list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub strategy: StrategyKind,
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pending: u32,
    pub total_pnl: f64,
    /// Capital invested across resolved trades (filled size x entry price).
    pub total_invested: f64,
}

impl StrategyMetrics {
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            total_trades: 0,
            wins: 0,
            losses: 0,
            pending: 0,
            total_pnl: 0.0,
            total_invested: 0.0,
        }
    }

    /// Aggregate over the trades belonging to `strategy`.
    pub fn from_trades(strategy: StrategyKind, trades: &[Trade]) -> Self {
        let mut metrics = Self::new(strategy);
        for trade in trades.iter().filter(|t| t.strategy == strategy) {
            metrics.total_trades += 1;
            match trade.result {
                TradeResult::Win => {
                    metrics.wins += 1;
                    metrics.total_pnl += trade.pnl;
                    metrics.total_invested += trade.filled_size * trade.entry_price;
                }
                TradeResult::Loss => {
                    metrics.losses += 1;
                    metrics.total_pnl += trade.pnl;
                    metrics.total_invested += trade.filled_size * trade.entry_price;
                }
                TradeResult::Pending => metrics.pending += 1,
            }
        }
        metrics
    }

    /// Win rate over completed trades, as a percentage.
    pub fn win_rate(&self) -> f64 {
        let completed = self.wins + self.losses;
        if completed > 0 {
            self.wins as f64 / completed as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Return on invested capital, as a percentage.
    pub fn roi(&self) -> f64 {
        if self.total_invested > 0.0 {
            self.total_pnl / self.total_invested * 100.0
        } else {
            0.0
        }
    }
}
