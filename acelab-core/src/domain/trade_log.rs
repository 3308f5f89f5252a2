use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final outcome of a replayed plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    NoEntry,
    Open,
}

/// How the outcome was determined.
///
/// `HashBasedFallback` marks degraded runs (no session data available); the
/// field keeps fallback statistics distinguishable from real replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimMethod {
    RealPriceData,
    HashBasedFallback,
}

/// Execution record produced by the simulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    pub outcome: Outcome,
    pub entry_time: Option<DateTime<Utc>>,
    pub entry_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub pnl_pips: f64,
    pub pnl_usd: f64,
    pub method: SimMethod,
}

impl Execution {
    /// Record for a plan whose entry zone was never touched (or that had no
    /// tradeable levels to begin with).
    pub fn no_entry(method: SimMethod) -> Self {
        Self {
            outcome: Outcome::NoEntry,
            entry_time: None,
            entry_price: None,
            exit_time: None,
            exit_price: None,
            pnl_pips: 0.0,
            pnl_usd: 0.0,
            method,
        }
    }
}

/// Heuristic quality of the simulated entry fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryQuality {
    Good,
    Slippage,
    NotTriggered,
    Simulated,
}

/// How the position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTiming {
    TargetHit,
    StoppedOut,
    SessionClose,
    NotApplicable,
}

/// Per-entry verdict attached to each cited playbook entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryVerdict {
    Helpful,
    Harmful,
    Neutral,
}

/// Execution-quality feedback the Executor derives from the replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub entry_quality: EntryQuality,
    pub exit_timing: ExitTiming,
    #[serde(default)]
    pub unexpected_events: Vec<String>,
    #[serde(default)]
    pub playbook_entries_feedback: BTreeMap<String, EntryVerdict>,
}

impl Feedback {
    pub fn empty() -> Self {
        Self {
            entry_quality: EntryQuality::NotTriggered,
            exit_timing: ExitTiming::NotApplicable,
            unexpected_events: Vec::new(),
            playbook_entries_feedback: BTreeMap::new(),
        }
    }
}

/// One day's executed plan: the replay result plus execution feedback.
///
/// `plan_id` equals the plan date in ISO form and keys the session directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeLog {
    pub plan_id: String,
    pub execution: Execution,
    pub feedback: Feedback,
}
