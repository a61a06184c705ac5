//! Configuration management for UpDownBot
//!
//! Loads from config files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub engine: EngineConfig,
    pub tracker: TrackerConfig,
    pub api: ApiConfig,
    pub persistence: PersistenceConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Buy when a side quotes at or below this (undervalued rule).
    pub undervalued_threshold: f64,
    /// Buy when a side quotes at or above this (momentum rule).
    pub momentum_threshold: f64,
    /// Shares per paper order.
    pub order_size: f64,
    /// Entry window opens this many seconds before a window starts.
    pub entry_countdown_secs: i64,
    /// Exit point of the entry/exit timing scheme, seconds before a window
    /// starts. Reported with the engine status.
    pub exit_countdown_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Loop tick interval in seconds.
    pub tick_interval_secs: u64,
    /// Sleep when no upcoming window is tracked.
    pub idle_backoff_secs: u64,
    /// Sleep after an unexpected tick error.
    pub error_backoff_secs: u64,
    /// Minimum spacing between resolution lookups for one window.
    pub resolution_throttle_secs: i64,
    /// Per-tick probability that an open order fully fills.
    pub sim_fill_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Minimum spacing between market list refreshes in seconds.
    pub refresh_interval_secs: i64,
    /// Buckets probed behind the current one.
    pub slugs_back: i64,
    /// Buckets probed ahead of the current one.
    pub slugs_forward: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Gamma API endpoint (market lookups).
    pub gamma_url: String,
    /// CLOB API endpoint (price quotes).
    pub clob_url: String,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for CSV output.
    pub data_dir: String,
    /// Enable the resolved-trade CSV log.
    pub csv_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Dashboard API port.
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Strategy defaults
            .set_default("strategy.undervalued_threshold", 0.48)?
            .set_default("strategy.momentum_threshold", 0.52)?
            .set_default("strategy.order_size", 10.0)?
            .set_default("strategy.entry_countdown_secs", 1200)?
            .set_default("strategy.exit_countdown_secs", 930)?
            // Engine defaults
            .set_default("engine.tick_interval_secs", 2)?
            .set_default("engine.idle_backoff_secs", 5)?
            .set_default("engine.error_backoff_secs", 5)?
            .set_default("engine.resolution_throttle_secs", 15)?
            .set_default("engine.sim_fill_probability", 0.7)?
            // Tracker defaults
            .set_default("tracker.refresh_interval_secs", 30)?
            .set_default("tracker.slugs_back", 2)?
            .set_default("tracker.slugs_forward", 6)?
            // API defaults
            .set_default("api.gamma_url", "https://gamma-api.polymarket.com")?
            .set_default("api.clob_url", "https://clob.polymarket.com")?
            .set_default("api.http_timeout_secs", 15)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            // Dashboard defaults
            .set_default("dashboard.port", 8002)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (UPDOWNBOT_*)
            .add_source(Environment::with_prefix("UPDOWNBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.engine.sim_fill_probability) {
            anyhow::bail!("engine.sim_fill_probability must be within [0, 1]");
        }
        if self.strategy.order_size <= 0.0 {
            anyhow::bail!("strategy.order_size must be positive");
        }
        if self.strategy.entry_countdown_secs <= 0 {
            anyhow::bail!("strategy.entry_countdown_secs must be positive");
        }
        if self.tracker.slugs_back < 0 || self.tracker.slugs_forward < 0 {
            anyhow::bail!("tracker slug span must be non-negative");
        }
        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "undervalued<={:.2} momentum>={:.2} size={} entry={}s tick={}s fill_p={:.2}",
            self.strategy.undervalued_threshold,
            self.strategy.momentum_threshold,
            self.strategy.order_size,
            self.strategy.entry_countdown_secs,
            self.engine.tick_interval_secs,
            self.engine.sim_fill_probability
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
