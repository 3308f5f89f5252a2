use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trend and key levels for one analysis timeframe (Daily, H4, H1, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeframeView {
    pub trend: String,
    #[serde(default)]
    pub key_support: Vec<f64>,
    #[serde(default)]
    pub key_resistance: Vec<f64>,
}

/// Volatility measures for the instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volatility {
    pub atr_daily_pips: f64,
    /// Provider-specific extras (ATR on other timeframes, realized vol, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

/// A scheduled economic event near the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EconomicEvent {
    pub time_utc: DateTime<Utc>,
    pub name: String,
    pub impact: String,
}

/// Structured market snapshot handed to the Generator.
///
/// The core never interprets this beyond serializing it into the prompt; it is
/// produced by an external market-data provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub pair: String,
    pub current_price: f64,
    pub current_time_utc: DateTime<Utc>,
    #[serde(default)]
    pub timeframes: BTreeMap<String, TimeframeView>,
    pub volatility: Volatility,
    #[serde(default)]
    pub economic_events: Vec<EconomicEvent>,
    #[serde(default)]
    pub intermarket: BTreeMap<String, String>,
    /// Set when the provider could not deliver a real snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarketSnapshot {
    /// Minimal stand-in snapshot when the data provider is unavailable.
    ///
    /// Keeps the daily cycle alive; the Generator sees the error and will
    /// lean neutral on its own.
    pub fn unavailable(pair: impl Into<String>, now: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            current_price: 0.0,
            current_time_utc: now,
            timeframes: BTreeMap::new(),
            volatility: Volatility { atr_daily_pips: 0.0, extra: BTreeMap::new() },
            economic_events: Vec::new(),
            intermarket: BTreeMap::new(),
            error: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrip_with_extras() {
        let mut timeframes = BTreeMap::new();
        timeframes.insert(
            "H4".to_string(),
            TimeframeView {
                trend: "bullish".into(),
                key_support: vec![1.0820],
                key_resistance: vec![1.0900, 1.0950],
            },
        );
        let mut extra = BTreeMap::new();
        extra.insert("atr_h1_pips".to_string(), 12.5);
        let snap = MarketSnapshot {
            pair: "EURUSD".into(),
            current_price: 1.0845,
            current_time_utc: Utc::now(),
            timeframes,
            volatility: Volatility { atr_daily_pips: 80.0, extra },
            economic_events: vec![],
            intermarket: BTreeMap::from([("DXY".to_string(), "bearish".to_string())]),
            error: None,
        };
        let json = serde_json::to_string_pretty(&snap).unwrap();
        assert!(json.contains("atr_h1_pips"));
        let back: MarketSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn unavailable_snapshot_carries_reason() {
        let snap = MarketSnapshot::unavailable("EURUSD", Utc::now(), "provider timeout");
        assert_eq!(snap.error.as_deref(), Some("provider timeout"));
    }
}
