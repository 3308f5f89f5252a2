//! Market-data seam.
//!
//! Fetching real data is an external concern; the cycles consume the trait
//! only. `FixtureProvider` replays snapshots and sessions from JSON files for
//! tests and offline demo runs.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use acelab_core::domain::{Candle, MarketSnapshot};

use crate::config::SessionSection;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("market data unavailable: {0}")]
    Unavailable(String),

    #[error("market data request timed out")]
    Timeout,
}

pub trait MarketDataProvider {
    fn fetch_snapshot(&self, now: DateTime<Utc>) -> Result<MarketSnapshot, MarketDataError>;

    /// Candles covering the session window on `date`, ordered by open time.
    fn fetch_session_ohlc(
        &self,
        date: NaiveDate,
        session: &SessionSection,
    ) -> Result<Vec<Candle>, MarketDataError>;
}

/// File-backed provider: `snapshot.json` plus `ohlc_{YYYY-MM-DD}.json` under
/// one directory.
pub struct FixtureProvider {
    root: PathBuf,
}

impl FixtureProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MarketDataProvider for FixtureProvider {
    fn fetch_snapshot(&self, _now: DateTime<Utc>) -> Result<MarketSnapshot, MarketDataError> {
        let path = self.root.join("snapshot.json");
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| MarketDataError::Unavailable(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| MarketDataError::Unavailable(format!("{}: {e}", path.display())))
    }

    fn fetch_session_ohlc(
        &self,
        date: NaiveDate,
        session: &SessionSection,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let path = self.root.join(format!("ohlc_{date}.json"));
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| MarketDataError::Unavailable(format!("{}: {e}", path.display())))?;
        let candles: Vec<Candle> = serde_json::from_str(&raw)
            .map_err(|e| MarketDataError::Unavailable(format!("{}: {e}", path.display())))?;

        // Clamp to the configured window; fixtures may carry a full day.
        let (open, close) = session.bounds(date);
        Ok(candles
            .into_iter()
            .filter(|c| c.open_time >= open && c.open_time < close)
            .collect())
    }
}
