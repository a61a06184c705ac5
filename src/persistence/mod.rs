//! CSV Persistence Module
//!
//! Append-only storage of resolved trades for offline analysis.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::types::Trade;

/// Flat CSV row for one resolved trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: i64,
    pub trade_id: String,
    pub strategy: String,
    pub market_slug: String,
    pub outcome: String,
    pub entry_price: f64,
    pub size: f64,
    pub filled_size: f64,
    pub entry_time: i64,
    pub resolution_time: i64,
    pub result: String,
    pub pnl: f64,
}

impl From<&Trade> for TradeRecord {
    fn from(trade: &Trade) -> Self {
        Self {
            timestamp: trade.resolution_time.unwrap_or(trade.entry_time),
            trade_id: trade.id.clone(),
            strategy: trade.strategy.to_string(),
            market_slug: trade.market_slug.clone(),
            outcome: trade.outcome.to_string(),
            entry_price: trade.entry_price,
            size: trade.size,
            filled_size: trade.filled_size,
            entry_time: trade.entry_time,
            resolution_time: trade.resolution_time.unwrap_or(0),
            result: trade.result.to_string(),
            pnl: trade.pnl,
        }
    }
}

/// Append-only trade log under `<data_dir>/trades.csv`.
pub struct TradeLog {
    path: PathBuf,
}

impl TradeLog {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        Ok(Self {
            path: data_dir.as_ref().join("trades.csv"),
        })
    }

    /// Append one trade row. Persistence is advisory: callers log errors
    /// and continue, they never abort a tick over them.
    pub fn append(&self, trade: &Trade) -> Result<()> {
        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut writer = WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer
            .serialize(TradeRecord::from(trade))
            .context("Failed to serialize trade record")?;
        writer.flush().context("Failed to flush trade record")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
