//! End-to-end paper trading flow against stubbed collaborators.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use updownbot::buckets;
use updownbot::clob::{ApiError, FlexList, GammaMarket, MarketDataApi, PriceOracle};
use updownbot::config::{EngineConfig, StrategyConfig, TrackerConfig};
use updownbot::engine::{FillDecider, StrategyEngine};
use updownbot::tracker::MarketTracker;
use updownbot::types::{Outcome, StrategyKind, TradeResult};

/// Market-data stub: every probed slug resolves to a valid binary market.
struct AllSlugsExist {
    probes: AtomicUsize,
}

impl AllSlugsExist {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            probes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MarketDataApi for AllSlugsExist {
    async fn market_by_slug(&self, _slug: &str) -> Result<Option<GammaMarket>, ApiError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(GammaMarket {
            condition_id: "0xcond".to_string(),
            outcomes: FlexList(vec!["Up".to_string(), "Down".to_string()]),
            clob_token_ids: FlexList(vec!["111".to_string(), "222".to_string()]),
            ..GammaMarket::default()
        }))
    }
}

/// Price stub with fixed quotes for both sides.
struct FixedQuotes {
    up: Option<f64>,
    down: Option<f64>,
}

#[async_trait]
impl PriceOracle for FixedQuotes {
    async fn best_prices(
        &self,
        _up_token_id: &str,
        _down_token_id: &str,
    ) -> (Option<f64>, Option<f64>) {
        (self.up, self.down)
    }
}

/// Fill decision source that always fills.
struct AlwaysFill;

impl FillDecider for AlwaysFill {
    fn roll(&self) -> f64 {
        0.0
    }
}

fn tracker_config() -> TrackerConfig {
    TrackerConfig {
        refresh_interval_secs: 30,
        slugs_back: 2,
        slugs_forward: 6,
    }
}

fn strategy_config() -> StrategyConfig {
    StrategyConfig {
        undervalued_threshold: 0.48,
        momentum_threshold: 0.52,
        order_size: 10.0,
        entry_countdown_secs: 1200,
        exit_countdown_secs: 930,
    }
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        tick_interval_secs: 2,
        idle_backoff_secs: 5,
        error_backoff_secs: 5,
        resolution_throttle_secs: 15,
        sim_fill_probability: 0.7,
    }
}

#[tokio::test(start_paused = true)]
async fn loop_enters_both_strategies_and_fills_once() {
    let api = AllSlugsExist::new();
    let tracker = Arc::new(MarketTracker::new(api.clone(), &tracker_config()));
    let oracle = Arc::new(FixedQuotes {
        up: Some(0.40),
        down: Some(0.60),
    });

    let engine = Arc::new(
        StrategyEngine::new(tracker, oracle, strategy_config(), engine_config())
            .with_fill_decider(Arc::new(AlwaysFill)),
    );

    Arc::clone(&engine).start();
    // Several ticks elapse under the paused clock.
    tokio::time::sleep(Duration::from_secs(30)).await;
    engine.stop().await;

    // One entry decision for the t+1 window: one order per strategy, both
    // filled into pending trades, no duplicates across repeated ticks.
    let orders = engine.all_orders();
    assert_eq!(orders.len(), 2);

    let undervalued = orders
        .iter()
        .find(|o| o.strategy == StrategyKind::Undervalued)
        .expect("undervalued order");
    assert_eq!(undervalued.outcome, Outcome::Up);
    assert!((undervalued.price - 0.40).abs() < 1e-9);
    assert_eq!(undervalued.filled_size, undervalued.size);

    let momentum = orders
        .iter()
        .find(|o| o.strategy == StrategyKind::Momentum)
        .expect("momentum order");
    assert_eq!(momentum.outcome, Outcome::Down);
    assert!((momentum.price - 0.60).abs() < 1e-9);

    let trades = engine.trades(None);
    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|t| t.result == TradeResult::Pending));

    let status = engine.status();
    assert_eq!(status.processed_windows, 1);
    assert_eq!(status.orders.total, 2);
    assert_eq!(status.trades.pending, 2);

    // Wall-clock time barely moved, so the rate limiter allowed a single
    // probe batch despite one refresh call per tick.
    assert_eq!(api.probes.load(Ordering::SeqCst), 9);
}

#[tokio::test(start_paused = true)]
async fn loop_skips_entry_without_quotes() {
    let api = AllSlugsExist::new();
    let tracker = Arc::new(MarketTracker::new(api, &tracker_config()));
    let oracle = Arc::new(FixedQuotes {
        up: Some(0.40),
        down: None,
    });

    let engine = Arc::new(
        StrategyEngine::new(tracker, oracle, strategy_config(), engine_config())
            .with_fill_decider(Arc::new(AlwaysFill)),
    );

    Arc::clone(&engine).start();
    tokio::time::sleep(Duration::from_secs(10)).await;
    engine.stop().await;

    // Quotes were never complete: no orders, and the window stays
    // unprocessed so entry can still happen once quotes appear.
    assert!(engine.all_orders().is_empty());
    assert_eq!(engine.status().processed_windows, 0);
}

#[tokio::test(start_paused = true)]
async fn engine_controls_are_idempotent() {
    let api = AllSlugsExist::new();
    let tracker = Arc::new(MarketTracker::new(api, &tracker_config()));
    let oracle = Arc::new(FixedQuotes {
        up: None,
        down: None,
    });

    let engine = Arc::new(StrategyEngine::new(
        tracker,
        oracle,
        strategy_config(),
        engine_config(),
    ));

    Arc::clone(&engine).start();
    Arc::clone(&engine).start();
    assert!(engine.is_running());

    tokio::time::sleep(Duration::from_secs(4)).await;

    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());
}

#[test]
fn bucket_clock_discovers_nine_candidates_around_now() {
    let now = Utc::now().timestamp();
    let slugs = buckets::candidate_slugs(now, 2, 6);
    assert_eq!(slugs.len(), 9);

    let starts: Vec<i64> = slugs
        .iter()
        .map(|slug| buckets::slug_start(slug).unwrap())
        .collect();
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
    assert!(starts.contains(&buckets::bucket_start(now)));
}
