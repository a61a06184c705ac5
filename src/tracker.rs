//! Market window tracker
//!
//! Owns the authoritative list of known 15-minute windows. There is no
//! server-side listing for these markets, so a refresh enumerates the slug
//! candidates around "now" and probes each one; whatever resolves becomes
//! the new window list.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::buckets;
use crate::clob::{GammaMarket, MarketDataApi};
use crate::config::TrackerConfig;
use crate::types::{MarketWindow, Outcome};

#[derive(Default)]
struct TrackerState {
    /// Tracked windows, ascending by start time.
    windows: Vec<MarketWindow>,
    /// Unix timestamp of the last completed refresh; 0 = never.
    last_refresh: i64,
}

/// Tracks 15-minute Up/Down market windows via slug enumeration.
pub struct MarketTracker {
    api: Arc<dyn MarketDataApi>,
    refresh_interval_secs: i64,
    slugs_back: i64,
    slugs_forward: i64,
    state: RwLock<TrackerState>,
}

impl MarketTracker {
    pub fn new(api: Arc<dyn MarketDataApi>, config: &TrackerConfig) -> Self {
        Self {
            api,
            refresh_interval_secs: config.refresh_interval_secs,
            slugs_back: config.slugs_back,
            slugs_forward: config.slugs_forward,
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// Refresh the window list. Rate-limited: calls inside the refresh
    /// interval return immediately.
    pub async fn refresh(&self) {
        let now = Utc::now().timestamp();
        {
            let state = self.state.read().unwrap();
            if now - state.last_refresh < self.refresh_interval_secs {
                return;
            }
        }
        self.refresh_at(now).await;
    }

    /// Unconditional refresh anchored at `now`. Candidates probe
    /// independently; a failed or malformed candidate is dropped without
    /// affecting the rest of the batch.
    pub async fn refresh_at(&self, now: i64) {
        let slugs = buckets::candidate_slugs(now, self.slugs_back, self.slugs_forward);
        debug!(candidates = slugs.len(), "Probing market slugs");

        let probes = slugs.iter().map(|slug| self.probe_slug(slug));
        let mut windows: Vec<MarketWindow> =
            join_all(probes).await.into_iter().flatten().collect();
        windows.sort_by_key(|w| w.start_time);

        let mut state = self.state.write().unwrap();
        info!(windows = windows.len(), probed = slugs.len(), "Market list refreshed");
        state.windows = windows;
        state.last_refresh = now;
    }

    async fn probe_slug(&self, slug: &str) -> Option<MarketWindow> {
        match self.api.market_by_slug(slug).await {
            Ok(Some(market)) => parse_window(market, slug),
            // Most probed candidates simply do not exist yet.
            Ok(None) => None,
            Err(e) => {
                debug!(slug = %slug, error = %e, "Slug probe failed");
                None
            }
        }
    }

    /// Window whose interval contains the current instant.
    pub fn active_window(&self) -> Option<MarketWindow> {
        self.active_window_at(Utc::now().timestamp())
    }

    pub fn active_window_at(&self, now: i64) -> Option<MarketWindow> {
        let state = self.state.read().unwrap();
        state.windows.iter().find(|w| w.contains(now)).cloned()
    }

    /// Next window to become active (t+1).
    pub fn next_window(&self) -> Option<MarketWindow> {
        self.next_window_at(Utc::now().timestamp())
    }

    pub fn next_window_at(&self, now: i64) -> Option<MarketWindow> {
        let state = self.state.read().unwrap();
        state
            .windows
            .iter()
            .find(|w| w.start_time > now)
            .cloned()
    }

    /// Window after t+1 (t+2); absent whenever t+1 is absent.
    pub fn next_next_window(&self) -> Option<MarketWindow> {
        self.next_next_window_at(Utc::now().timestamp())
    }

    pub fn next_next_window_at(&self, now: i64) -> Option<MarketWindow> {
        let t1 = self.next_window_at(now)?;
        let state = self.state.read().unwrap();
        state
            .windows
            .iter()
            .find(|w| w.start_time > t1.start_time)
            .cloned()
    }

    /// Tracked window by slug, if still in the sliding list.
    pub fn window_by_slug(&self, slug: &str) -> Option<MarketWindow> {
        let state = self.state.read().unwrap();
        state.windows.iter().find(|w| w.slug == slug).cloned()
    }

    /// Winning outcome for a window. Answers from the tracked list when the
    /// winner is already cached; otherwise performs one targeted fetch,
    /// since old windows roll out of the candidate range before they
    /// settle. `None` means "not yet resolved" (or unreachable right now).
    pub async fn resolution(&self, slug: &str) -> Option<Outcome> {
        if let Some(window) = self.window_by_slug(slug) {
            if window.winner.is_some() {
                return window.winner;
            }
        }

        let winner = match self.api.market_by_slug(slug).await {
            Ok(Some(market)) => parse_window(market, slug).and_then(|w| w.winner),
            Ok(None) => None,
            Err(e) => {
                debug!(slug = %slug, error = %e, "Resolution lookup failed");
                None
            }
        };

        if let Some(winner) = winner {
            // Cache onto the tracked window if it is still in the list.
            let mut state = self.state.write().unwrap();
            if let Some(window) = state.windows.iter_mut().find(|w| w.slug == slug) {
                window.winner.get_or_insert(winner);
            }
        }

        winner
    }

    /// Status snapshot for the presentation layer.
    pub fn status(&self) -> TrackerStatus {
        let now = Utc::now().timestamp();
        let state = self.state.read().unwrap();

        let summarize = |window: Option<&MarketWindow>| {
            window.map(|w| WindowSummary {
                slug: w.slug.clone(),
                start_time: w.start_time,
                end_time: w.end_time,
                countdown_to_active: w.countdown_to_active(now),
                countdown_to_end: w.countdown_to_end(now),
            })
        };

        let active = state.windows.iter().find(|w| w.contains(now));
        let t1 = state.windows.iter().find(|w| w.start_time > now);
        let t2 = t1.and_then(|t1| {
            state
                .windows
                .iter()
                .find(|w| w.start_time > t1.start_time)
        });

        TrackerStatus {
            active_window: summarize(active),
            t1_window: summarize(t1),
            t2_window: summarize(t2),
            total_windows: state.windows.len(),
            last_refresh: state.last_refresh,
        }
    }
}

/// Window summary with live countdowns.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub slug: String,
    pub start_time: i64,
    pub end_time: i64,
    pub countdown_to_active: i64,
    pub countdown_to_end: i64,
}

/// Tracker status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub active_window: Option<WindowSummary>,
    pub t1_window: Option<WindowSummary>,
    pub t2_window: Option<WindowSummary>,
    pub total_windows: usize,
    pub last_refresh: i64,
}

/// Build a [`MarketWindow`] from a Gamma payload. Returns `None` when either
/// outcome token is missing: such a market cannot be quoted and the
/// candidate is discarded.
fn parse_window(market: GammaMarket, slug: &str) -> Option<MarketWindow> {
    let mut up_token_id: Option<String> = None;
    let mut down_token_id: Option<String> = None;

    if !market.tokens.is_empty() {
        for token in &market.tokens {
            match token.outcome.as_str() {
                "Up" => up_token_id = Some(token.token_id.clone()),
                "Down" => down_token_id = Some(token.token_id.clone()),
                _ => {}
            }
        }
    } else {
        // Positional fallback: token IDs matched against the outcomes array.
        for (idx, outcome) in market.outcomes.0.iter().enumerate() {
            let Some(token_id) = market.clob_token_ids.0.get(idx) else {
                break;
            };
            match outcome.as_str() {
                "Up" => up_token_id = Some(token_id.clone()),
                "Down" => down_token_id = Some(token_id.clone()),
                _ => {}
            }
        }
    }

    let up_token_id = up_token_id.filter(|t| !t.is_empty());
    let down_token_id = down_token_id.filter(|t| !t.is_empty());
    let (Some(up_token_id), Some(down_token_id)) = (up_token_id, down_token_id) else {
        debug!(slug = %slug, "Market payload missing outcome tokens");
        return None;
    };

    let start_time = buckets::slug_start(slug)?;

    Some(MarketWindow {
        slug: slug.to_string(),
        condition_id: market.condition_id,
        up_token_id,
        down_token_id,
        start_time,
        end_time: start_time + buckets::BUCKET_SIZE_SECS,
        winner: parse_winner(&market.outcomes.0, &market.outcome_prices.0),
    })
}

/// Settled binary markets quote the winning side at exactly 1; an
/// outcomes/prices length mismatch reads as "not yet resolved".
fn parse_winner(outcomes: &[String], prices: &[String]) -> Option<Outcome> {
    if outcomes.len() < 2 || prices.len() < 2 {
        return None;
    }

    let is_winning_price = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .map(|p| (p - 1.0).abs() < f64::EPSILON)
            .unwrap_or(false)
    };

    if is_winning_price(&prices[0]) {
        Some(if outcomes[0] == "Up" {
            Outcome::Up
        } else {
            Outcome::Down
        })
    } else if is_winning_price(&prices[1]) {
        Some(if outcomes[1] == "Down" {
            Outcome::Down
        } else {
            Outcome::Up
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clob::{ApiError, FlexList, MockMarketDataApi};
    use crate::config::TrackerConfig;
    use reqwest::StatusCode;

    fn test_config() -> TrackerConfig {
        TrackerConfig {
            refresh_interval_secs: 30,
            slugs_back: 2,
            slugs_forward: 6,
        }
    }

    fn market_payload(up: &str, down: &str) -> GammaMarket {
        GammaMarket {
            condition_id: "0xcond".to_string(),
            outcomes: FlexList(vec!["Up".to_string(), "Down".to_string()]),
            clob_token_ids: FlexList(vec![up.to_string(), down.to_string()]),
            ..GammaMarket::default()
        }
    }

    fn settled_payload(up_won: bool) -> GammaMarket {
        let prices = if up_won {
            vec!["1".to_string(), "0".to_string()]
        } else {
            vec!["0".to_string(), "1".to_string()]
        };
        GammaMarket {
            outcome_prices: FlexList(prices),
            ..market_payload("111", "222")
        }
    }

    #[test]
    fn parse_window_prefers_tokens_array() {
        let market = GammaMarket {
            tokens: vec![
                crate::clob::MarketToken {
                    token_id: "up-token".to_string(),
                    outcome: "Up".to_string(),
                },
                crate::clob::MarketToken {
                    token_id: "down-token".to_string(),
                    outcome: "Down".to_string(),
                },
            ],
            ..GammaMarket::default()
        };

        let window = parse_window(market, "btc-updown-15m-900").unwrap();
        assert_eq!(window.up_token_id, "up-token");
        assert_eq!(window.down_token_id, "down-token");
        assert_eq!(window.start_time, 900);
        assert_eq!(window.end_time, 1800);
    }

    #[test]
    fn parse_window_falls_back_to_positional_ids() {
        let window = parse_window(market_payload("111", "222"), "btc-updown-15m-1800").unwrap();
        assert_eq!(window.up_token_id, "111");
        assert_eq!(window.down_token_id, "222");
        assert!(window.winner.is_none());
    }

    #[test]
    fn parse_window_discards_missing_tokens() {
        let market = GammaMarket {
            outcomes: FlexList(vec!["Up".to_string(), "Down".to_string()]),
            clob_token_ids: FlexList(vec!["111".to_string()]),
            ..GammaMarket::default()
        };
        assert!(parse_window(market, "btc-updown-15m-900").is_none());

        let empty = GammaMarket::default();
        assert!(parse_window(empty, "btc-updown-15m-900").is_none());
    }

    #[test]
    fn parse_winner_reads_unit_price() {
        let window = parse_window(settled_payload(true), "btc-updown-15m-900").unwrap();
        assert_eq!(window.winner, Some(Outcome::Up));

        let window = parse_window(settled_payload(false), "btc-updown-15m-900").unwrap();
        assert_eq!(window.winner, Some(Outcome::Down));
    }

    #[test]
    fn parse_winner_requires_both_arrays() {
        let outcomes = vec!["Up".to_string(), "Down".to_string()];
        assert_eq!(parse_winner(&outcomes, &[]), None);
        assert_eq!(parse_winner(&outcomes, &["1".to_string()]), None);
        assert_eq!(
            parse_winner(&outcomes, &["0.4".to_string(), "0.6".to_string()]),
            None
        );
    }

    #[tokio::test]
    async fn refresh_probes_candidates_and_sorts() {
        let now = 10_000i64;
        let mut api = MockMarketDataApi::new();
        // Two candidates exist, probed out of order relative to start time.
        api.expect_market_by_slug().times(9).returning(move |slug| {
            let start = buckets::slug_start(slug).unwrap();
            if start == 9_900 || start == 10_800 {
                Ok(Some(market_payload("111", "222")))
            } else {
                Ok(None)
            }
        });

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        tracker.refresh_at(now).await;

        let status = tracker.status();
        assert_eq!(status.total_windows, 2);
        assert_eq!(status.last_refresh, now);

        assert_eq!(
            tracker.active_window_at(now).unwrap().start_time,
            9_900
        );
        assert_eq!(tracker.next_window_at(now).unwrap().start_time, 10_800);
    }

    #[tokio::test]
    async fn refresh_is_rate_limited() {
        let mut api = MockMarketDataApi::new();
        // Exactly one batch of probes despite two refresh calls.
        api.expect_market_by_slug()
            .times(9)
            .returning(|_| Ok(None));

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        tracker.refresh().await;
        tracker.refresh().await;
    }

    #[tokio::test]
    async fn failed_probes_do_not_abort_the_batch() {
        let now = 10_000i64;
        let mut api = MockMarketDataApi::new();
        api.expect_market_by_slug().times(9).returning(move |slug| {
            let start = buckets::slug_start(slug).unwrap();
            match start {
                10_800 => Ok(Some(market_payload("111", "222"))),
                11_700 => Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
                _ => Ok(None),
            }
        });

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        tracker.refresh_at(now).await;
        assert_eq!(tracker.status().total_windows, 1);
    }

    #[tokio::test]
    async fn window_ordering_queries() {
        let now = 10_000i64;
        let mut api = MockMarketDataApi::new();
        api.expect_market_by_slug()
            .returning(|_| Ok(Some(market_payload("111", "222"))));

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        tracker.refresh_at(now).await;

        let active = tracker.active_window_at(now).unwrap();
        assert!(active.start_time <= now && now < active.end_time);

        let t1 = tracker.next_window_at(now).unwrap();
        assert!(t1.start_time > now);
        assert_eq!(t1.start_time, active.end_time);

        let t2 = tracker.next_next_window_at(now).unwrap();
        assert!(t2.start_time > t1.start_time);
        assert_eq!(t2.start_time, t1.start_time + buckets::BUCKET_SIZE_SECS);
    }

    #[tokio::test]
    async fn next_next_window_absent_without_t1() {
        let mut api = MockMarketDataApi::new();
        api.expect_market_by_slug().returning(|_| Ok(None));

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        tracker.refresh_at(10_000).await;
        assert!(tracker.next_window_at(10_000).is_none());
        assert!(tracker.next_next_window_at(10_000).is_none());
    }

    #[tokio::test]
    async fn resolution_fetches_untracked_windows() {
        let mut api = MockMarketDataApi::new();
        api.expect_market_by_slug()
            .withf(|slug| slug == "btc-updown-15m-900")
            .times(1)
            .returning(|_| Ok(Some(settled_payload(true))));

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        let winner = tracker.resolution("btc-updown-15m-900").await;
        assert_eq!(winner, Some(Outcome::Up));
    }

    #[tokio::test]
    async fn resolution_answers_from_cache_without_fetching() {
        let now = 10_000i64;
        let slug = buckets::window_slug(9_900);

        let mut api = MockMarketDataApi::new();
        // One refresh batch; the cached winner must not trigger a second
        // fetch for the same slug.
        api.expect_market_by_slug().times(9).returning(move |s| {
            if buckets::slug_start(s) == Some(9_900) {
                Ok(Some(settled_payload(false)))
            } else {
                Ok(None)
            }
        });

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        tracker.refresh_at(now).await;

        let winner = tracker.resolution(&slug).await;
        assert_eq!(winner, Some(Outcome::Down));
    }

    #[tokio::test]
    async fn resolution_reports_unsettled_as_none() {
        let mut api = MockMarketDataApi::new();
        api.expect_market_by_slug()
            .returning(|_| Ok(Some(market_payload("111", "222"))));

        let tracker = MarketTracker::new(Arc::new(api), &test_config());
        assert_eq!(tracker.resolution("btc-updown-15m-900").await, None);
    }
}
