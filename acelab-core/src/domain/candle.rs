use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single intraday OHLC candle with its open timestamp.
///
/// The simulator is interval-agnostic: candles only need to be equal-duration
/// and ordered by `open_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open_time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { open_time, open, high, low, close }
    }

    /// Validate candle invariants.
    pub fn validate(&self) -> Result<(), CandleError> {
        if self.high < self.low {
            return Err(CandleError::InvalidRange { high: self.high, low: self.low });
        }
        if self.open < 0.0 || self.high < 0.0 || self.low < 0.0 || self.close < 0.0 {
            return Err(CandleError::NegativePrice);
        }
        if !(self.low..=self.high).contains(&self.open) {
            return Err(CandleError::OpenOutOfRange);
        }
        if !(self.low..=self.high).contains(&self.close) {
            return Err(CandleError::CloseOutOfRange);
        }
        Ok(())
    }

    /// True if this candle's range touches `price`.
    pub fn contains(&self, price: f64) -> bool {
        (self.low..=self.high).contains(&price)
    }

    /// Intersection of this candle's range with `[zone_low, zone_high]`,
    /// if non-empty.
    pub fn overlap(&self, zone_low: f64, zone_high: f64) -> Option<(f64, f64)> {
        let lo = self.low.max(zone_low);
        let hi = self.high.min(zone_high);
        if lo <= hi {
            Some((lo, hi))
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum CandleError {
    #[error("invalid candle range: high={high}, low={low}")]
    InvalidRange { high: f64, low: f64 },

    #[error("negative price not allowed")]
    NegativePrice,

    #[error("open price outside high/low range")]
    OpenOutOfRange,

    #[error("close price outside high/low range")]
    CloseOutOfRange,
}
