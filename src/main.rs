//! UpDownBot entry point
//!
//! Wires the tracker, the strategy engine and (optionally) the dashboard
//! together and runs until interrupted.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use updownbot::clob::{ClobClient, GammaClient, PriceOracle};
use updownbot::config::AppConfig;
use updownbot::engine::StrategyEngine;
use updownbot::persistence::TradeLog;
use updownbot::tracker::MarketTracker;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(config = %config.digest(), "Starting updownbot");

    let timeout = Duration::from_secs(config.api.http_timeout_secs);
    let gamma = Arc::new(GammaClient::new(&config.api.gamma_url, timeout));
    let oracle: Arc<dyn PriceOracle> = Arc::new(ClobClient::new(&config.api.clob_url, timeout));

    let tracker = Arc::new(MarketTracker::new(gamma, &config.tracker));
    // Warm the window list before the loop takes over.
    tracker.refresh().await;

    let mut engine = StrategyEngine::new(
        Arc::clone(&tracker),
        Arc::clone(&oracle),
        config.strategy.clone(),
        config.engine.clone(),
    );
    if config.persistence.csv_enabled {
        let log = TradeLog::new(&config.persistence.data_dir)?;
        engine = engine.with_trade_log(Arc::new(log));
    }
    let engine = Arc::new(engine);
    Arc::clone(&engine).start();

    #[cfg(feature = "dashboard")]
    {
        let state = updownbot::dashboard::DashboardState {
            engine: Arc::clone(&engine),
            tracker: Arc::clone(&tracker),
            oracle: Arc::clone(&oracle),
            strategy: config.strategy.clone(),
        };
        let port = config.dashboard.port;
        tokio::spawn(async move {
            if let Err(e) = updownbot::dashboard::start_server(state, port).await {
                tracing::error!(error = %e, "Dashboard server failed");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    engine.stop().await;

    Ok(())
}
