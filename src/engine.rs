//! Strategy engine
//!
//! One cooperative loop drives the paper trading session in a fixed order
//! every tick: refresh the tracker, evaluate entry for the t+1 window,
//! check pending resolutions, simulate fills, expire stale orders. All
//! engine state lives here and is mutated only from inside the loop;
//! outside readers get copy-out snapshots.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buckets;
use crate::clob::PriceOracle;
use crate::config::{EngineConfig, StrategyConfig};
use crate::persistence::TradeLog;
use crate::tracker::MarketTracker;
use crate::types::{
    MarketWindow, Outcome, PaperOrder, StrategyKind, StrategyMetrics, Trade, TradeResult,
};

/// Decision source for simulated fills. The default rolls a thread-local
/// RNG; tests substitute deterministic sequences.
pub trait FillDecider: Send + Sync {
    /// Uniform draw in [0, 1); an open order fills when the draw lands
    /// strictly below the configured fill probability.
    fn roll(&self) -> f64;
}

/// Default fill decision source.
pub struct RandomFill;

impl FillDecider for RandomFill {
    fn roll(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

#[derive(Default)]
struct EngineState {
    /// Every order ever placed, keyed by order id. Orders are never
    /// deleted; terminal ones stay for audit and metrics.
    orders: HashMap<String, PaperOrder>,
    trades: Vec<Trade>,
    /// Windows already evaluated for entry. One entry decision per window,
    /// ever, regardless of how often the loop sees it again.
    processed_windows: HashSet<String>,
    /// Last resolution lookup per window slug.
    resolution_checks: HashMap<String, i64>,
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

enum TickOutcome {
    /// Full tick executed.
    Worked,
    /// No upcoming window; nothing to do.
    Idle,
}

/// Dual-strategy paper trading engine.
pub struct StrategyEngine {
    strategy_cfg: StrategyConfig,
    engine_cfg: EngineConfig,
    tracker: Arc<MarketTracker>,
    oracle: Arc<dyn PriceOracle>,
    fill: Arc<dyn FillDecider>,
    trade_log: Option<Arc<TradeLog>>,
    state: RwLock<EngineState>,
    run: Mutex<Option<LoopHandle>>,
    start_time: RwLock<Option<i64>>,
}

impl StrategyEngine {
    pub fn new(
        tracker: Arc<MarketTracker>,
        oracle: Arc<dyn PriceOracle>,
        strategy_cfg: StrategyConfig,
        engine_cfg: EngineConfig,
    ) -> Self {
        Self {
            strategy_cfg,
            engine_cfg,
            tracker,
            oracle,
            fill: Arc::new(RandomFill),
            trade_log: None,
            state: RwLock::new(EngineState::default()),
            run: Mutex::new(None),
            start_time: RwLock::new(None),
        }
    }

    /// Substitute the fill decision source.
    pub fn with_fill_decider(mut self, fill: Arc<dyn FillDecider>) -> Self {
        self.fill = fill;
        self
    }

    /// Attach a CSV log for resolved trades.
    pub fn with_trade_log(mut self, log: Arc<TradeLog>) -> Self {
        self.trade_log = Some(log);
        self
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().unwrap().is_some()
    }

    /// Start the trading loop. Starting a running engine is a no-op.
    pub fn start(self: Arc<Self>) {
        let mut run = self.run.lock().unwrap();
        if run.is_some() {
            return;
        }

        let (shutdown, signal) = watch::channel(false);
        let engine = Arc::clone(&self);
        let task = tokio::spawn(async move { engine.run_loop(signal).await });
        *run = Some(LoopHandle { shutdown, task });
        *self.start_time.write().unwrap() = Some(Utc::now().timestamp());
        info!("Strategy engine started");
    }

    /// Stop the trading loop and wait for the in-flight tick to finish.
    /// Stopping a stopped engine is a no-op.
    pub async fn stop(&self) {
        let handle = self.run.lock().unwrap().take();
        let Some(LoopHandle { shutdown, task }) = handle else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Engine loop ended abnormally");
            }
        }
        info!("Strategy engine stopped");
    }

    async fn run_loop(self: Arc<Self>, mut signal: watch::Receiver<bool>) {
        let tick = Duration::from_secs(self.engine_cfg.tick_interval_secs);
        let idle = Duration::from_secs(self.engine_cfg.idle_backoff_secs);
        let backoff = Duration::from_secs(self.engine_cfg.error_backoff_secs);

        loop {
            if *signal.borrow() {
                break;
            }

            let delay = match self.tick().await {
                Ok(TickOutcome::Worked) => tick,
                Ok(TickOutcome::Idle) => idle,
                Err(e) => {
                    error!(error = %e, "Error in strategy loop");
                    backoff
                }
            };

            // Shutdown is observed only here and at the loop head, never
            // inside a step.
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = signal.changed() => break,
            }
        }
    }

    /// One loop tick in fixed step order.
    async fn tick(&self) -> Result<TickOutcome> {
        self.tracker.refresh().await;

        let now = Utc::now().timestamp();
        let Some(t1) = self.tracker.next_window_at(now) else {
            debug!("No upcoming window; idling");
            return Ok(TickOutcome::Idle);
        };

        let countdown = t1.countdown_to_active(now);
        let processed = {
            let state = self.state.read().unwrap();
            state.processed_windows.contains(&t1.slug)
        };
        debug!(slug = %t1.slug, countdown, processed, "Loop tick");

        if !processed && countdown > 0 && countdown <= self.strategy_cfg.entry_countdown_secs {
            self.check_entry(&t1).await;
        }

        self.check_resolutions(now).await;
        self.simulate_fills();
        self.sweep_stale_orders(now);

        Ok(TickOutcome::Worked)
    }

    /// Evaluate both strategies against the t+1 window.
    ///
    /// The window is marked processed whether or not an order results, so
    /// the decision runs at most once per window. The one exception is
    /// missing quotes: nothing is marked, and the next tick retries while
    /// the entry window is still open.
    async fn check_entry(&self, window: &MarketWindow) {
        let (up_price, down_price) = self
            .oracle
            .best_prices(&window.up_token_id, &window.down_token_id)
            .await;

        let (Some(up), Some(down)) = (up_price, down_price) else {
            warn!(slug = %window.slug, "No prices for window");
            return;
        };

        info!(slug = %window.slug, up, down, "Evaluating entry");

        let mut state = self.state.write().unwrap();

        let undervalued = if up <= self.strategy_cfg.undervalued_threshold {
            Some((Outcome::Up, up))
        } else if down <= self.strategy_cfg.undervalued_threshold {
            Some((Outcome::Down, down))
        } else {
            None
        };
        if let Some((outcome, price)) = undervalued {
            self.place_order(&mut state, StrategyKind::Undervalued, window, outcome, price);
        }

        let momentum = if up >= self.strategy_cfg.momentum_threshold {
            Some((Outcome::Up, up))
        } else if down >= self.strategy_cfg.momentum_threshold {
            Some((Outcome::Down, down))
        } else {
            None
        };
        if let Some((outcome, price)) = momentum {
            self.place_order(&mut state, StrategyKind::Momentum, window, outcome, price);
        }

        state.processed_windows.insert(window.slug.clone());
    }

    /// Record one paper order, enforcing at most one per (strategy, window).
    fn place_order(
        &self,
        state: &mut EngineState,
        strategy: StrategyKind,
        window: &MarketWindow,
        outcome: Outcome,
        price: f64,
    ) {
        let duplicate = state
            .orders
            .values()
            .any(|o| o.strategy == strategy && o.market_slug == window.slug);
        if duplicate {
            debug!(strategy = %strategy, slug = %window.slug, "Order already placed for window");
            return;
        }

        let mut order = PaperOrder::new(
            strategy,
            &window.slug,
            outcome,
            price,
            self.strategy_cfg.order_size,
        );
        order.status = crate::types::OrderStatus::Open;
        info!(
            strategy = %strategy,
            outcome = %outcome,
            price,
            size = order.size,
            slug = %window.slug,
            "Paper order placed"
        );
        state.orders.insert(order.id.clone(), order);
    }

    /// Resolve pending trades whose window has ended.
    ///
    /// The window end comes from the tracker when the window is still in
    /// the sliding list, otherwise it is recovered from the slug. Lookups
    /// per window are throttled.
    async fn check_resolutions(&self, now: i64) {
        let due: Vec<String> = {
            let mut state = self.state.write().unwrap();

            let pending_slugs: HashSet<String> = state
                .trades
                .iter()
                .filter(|t| t.result == TradeResult::Pending)
                .map(|t| t.market_slug.clone())
                .collect();

            let mut due = Vec::new();
            for slug in pending_slugs {
                let end_time = self
                    .tracker
                    .window_by_slug(&slug)
                    .map(|w| w.end_time)
                    .or_else(|| buckets::slug_end(&slug));
                let Some(end_time) = end_time else {
                    warn!(slug = %slug, "Could not determine window end time");
                    continue;
                };
                if now <= end_time {
                    continue;
                }

                let last_check = state.resolution_checks.get(&slug).copied().unwrap_or(0);
                if now - last_check < self.engine_cfg.resolution_throttle_secs {
                    continue;
                }
                state.resolution_checks.insert(slug.clone(), now);
                due.push(slug);
            }
            due
        };

        for slug in due {
            // Network lookup runs without holding the state lock.
            let Some(winner) = self.tracker.resolution(&slug).await else {
                // Window ended but the market has not settled; the next
                // eligible tick retries.
                continue;
            };

            let resolved: Vec<Trade> = {
                let mut state = self.state.write().unwrap();
                let mut resolved = Vec::new();
                for trade in state
                    .trades
                    .iter_mut()
                    .filter(|t| t.market_slug == slug && t.result == TradeResult::Pending)
                {
                    trade.resolve(winner);
                    info!(
                        strategy = %trade.strategy,
                        outcome = %trade.outcome,
                        winner = %winner,
                        pnl = trade.pnl,
                        slug = %slug,
                        "Trade resolved"
                    );
                    resolved.push(trade.clone());
                }
                resolved
            };

            if let Some(log) = &self.trade_log {
                for trade in &resolved {
                    if let Err(e) = log.append(trade) {
                        warn!(error = %e, trade_id = %trade.id, "Failed to log trade");
                    }
                }
            }
        }
    }

    /// Roll the fill decision for every untouched open order. Fills are
    /// total and materialize their trade immediately; an order filled on
    /// one tick is never reconsidered on the next.
    fn simulate_fills(&self) {
        let probability = self.engine_cfg.sim_fill_probability;
        let mut state = self.state.write().unwrap();

        let mut fills = Vec::new();
        for order in state.orders.values_mut() {
            if !order.is_open() || order.filled_size > 0.0 {
                continue;
            }
            if self.fill.roll() >= probability {
                continue;
            }

            order.fill(order.size);
            info!(
                strategy = %order.strategy,
                outcome = %order.outcome,
                price = order.price,
                size = order.size,
                slug = %order.market_slug,
                "Paper order filled"
            );
            fills.push(Trade::from_order(order));
        }
        state.trades.extend(fills);
    }

    /// Cancel unfilled orders once their window goes active (too late to
    /// pre-position), and expire any whose window already ended; windows
    /// can end while the loop is stopped.
    fn sweep_stale_orders(&self, now: i64) {
        let mut state = self.state.write().unwrap();

        for order in state.orders.values_mut() {
            if !order.is_open() || order.filled_size > 0.0 {
                continue;
            }
            let Some(start_time) = buckets::slug_start(&order.market_slug) else {
                continue;
            };

            if now >= start_time + buckets::BUCKET_SIZE_SECS {
                order.expire();
                info!(strategy = %order.strategy, outcome = %order.outcome, slug = %order.market_slug, "Order expired unfilled");
            } else if now >= start_time {
                order.cancel();
                info!(strategy = %order.strategy, outcome = %order.outcome, slug = %order.market_slug, "Order cancelled at window start");
            }
        }
    }

    // ── Snapshot accessors for the presentation layer ───────────

    pub fn open_orders(&self) -> Vec<PaperOrder> {
        let state = self.state.read().unwrap();
        state.orders.values().filter(|o| o.is_open()).cloned().collect()
    }

    /// All orders ever placed, oldest first.
    pub fn all_orders(&self) -> Vec<PaperOrder> {
        let state = self.state.read().unwrap();
        let mut orders: Vec<PaperOrder> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| (o.created_at, o.id.clone()));
        orders
    }

    /// Trades, optionally filtered by strategy, oldest first.
    pub fn trades(&self, strategy: Option<StrategyKind>) -> Vec<Trade> {
        let state = self.state.read().unwrap();
        state
            .trades
            .iter()
            .filter(|t| strategy.map_or(true, |s| t.strategy == s))
            .cloned()
            .collect()
    }

    /// Metrics recomputed from the current trade set.
    pub fn metrics(&self, strategy: StrategyKind) -> StrategyMetrics {
        let state = self.state.read().unwrap();
        StrategyMetrics::from_trades(strategy, &state.trades)
    }

    /// Engine status snapshot.
    pub fn status(&self) -> EngineStatus {
        let state = self.state.read().unwrap();
        let open_orders = state.orders.values().filter(|o| o.is_open()).count();
        let pending_trades = state
            .trades
            .iter()
            .filter(|t| t.result == TradeResult::Pending)
            .count();

        EngineStatus {
            is_running: self.is_running(),
            start_time: *self.start_time.read().unwrap(),
            paper_mode: true,
            config: ConfigSnapshot {
                undervalued_threshold: self.strategy_cfg.undervalued_threshold,
                momentum_threshold: self.strategy_cfg.momentum_threshold,
                order_size: self.strategy_cfg.order_size,
                entry_countdown_secs: self.strategy_cfg.entry_countdown_secs,
                exit_countdown_secs: self.strategy_cfg.exit_countdown_secs,
                sim_fill_probability: self.engine_cfg.sim_fill_probability,
            },
            orders: OrderCounts {
                open: open_orders,
                total: state.orders.len(),
            },
            trades: TradeCounts {
                total: state.trades.len(),
                pending: pending_trades,
            },
            processed_windows: state.processed_windows.len(),
        }
    }
}

/// Active configuration snapshot reported with the engine status.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub undervalued_threshold: f64,
    pub momentum_threshold: f64,
    pub order_size: f64,
    pub entry_countdown_secs: i64,
    pub exit_countdown_secs: i64,
    pub sim_fill_probability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderCounts {
    pub open: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeCounts {
    pub total: usize,
    pub pending: usize,
}

/// Engine status snapshot for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub start_time: Option<i64>,
    pub paper_mode: bool,
    pub config: ConfigSnapshot,
    pub orders: OrderCounts,
    pub trades: TradeCounts,
    pub processed_windows: usize,
}
