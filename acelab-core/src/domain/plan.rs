use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directional bias of a daily plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

/// Self-reported confidence of the generated plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Daily trading plan emitted by the Generator and consumed by the Executor.
///
/// A `neutral` plan carries no price levels. A directional plan must carry an
/// ordered two-bound entry zone plus stop-loss and first take-profit, with the
/// stop on the opposite side of the zone from the target (see [`TradingPlan::validate`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingPlan {
    pub date: NaiveDate,
    pub bias: Bias,
    #[serde(default)]
    pub entry_zone: Vec<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit_1: Option<f64>,
    #[serde(default)]
    pub take_profit_2: Option<f64>,
    #[serde(default)]
    pub position_size_pct: Option<f64>,
    #[serde(default)]
    pub risk_reward: Option<String>,
    pub rationale: String,
    #[serde(default)]
    pub playbook_entries_used: Vec<String>,
    pub confidence: Confidence,
    /// Set when the plan is a degraded stand-in for a failed generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Price levels of a directional plan, extracted and ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanLevels {
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl PlanLevels {
    pub fn entry_mid(&self) -> f64 {
        (self.entry_low + self.entry_high) / 2.0
    }

    pub fn zone_width(&self) -> f64 {
        self.entry_high - self.entry_low
    }
}

impl TradingPlan {
    /// Safe stand-in plan for any failed or blocked generation.
    pub fn neutral(date: NaiveDate, rationale: impl Into<String>, error: Option<String>) -> Self {
        Self {
            date,
            bias: Bias::Neutral,
            entry_zone: Vec::new(),
            stop_loss: None,
            take_profit_1: None,
            take_profit_2: None,
            position_size_pct: None,
            risk_reward: None,
            rationale: rationale.into(),
            playbook_entries_used: Vec::new(),
            confidence: Confidence::Low,
            error,
        }
    }

    /// Extract the price levels of a directional plan.
    ///
    /// Returns `None` for neutral plans and for directional plans missing any
    /// required level; callers that need the distinction go through
    /// [`TradingPlan::validate`] first.
    pub fn levels(&self) -> Option<PlanLevels> {
        if self.bias == Bias::Neutral || self.entry_zone.len() != 2 {
            return None;
        }
        let (entry_low, entry_high) = (
            self.entry_zone[0].min(self.entry_zone[1]),
            self.entry_zone[0].max(self.entry_zone[1]),
        );
        Some(PlanLevels {
            entry_low,
            entry_high,
            stop_loss: self.stop_loss?,
            take_profit: self.take_profit_1?,
        })
    }

    pub fn is_long(&self) -> bool {
        self.bias == Bias::Bullish
    }

    /// Check the schema constraints beyond what serde enforces.
    ///
    /// Neutral plans pass unconditionally. Directional plans must carry an
    /// ordered entry zone, stop-loss, and take-profit consistent with the
    /// bias: bullish `sl < low <= high < tp`, bearish `tp < low <= high < sl`.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.bias == Bias::Neutral {
            return Ok(());
        }
        if self.entry_zone.len() != 2 {
            return Err(PlanError::MalformedEntryZone { len: self.entry_zone.len() });
        }
        let (low, high) = (self.entry_zone[0], self.entry_zone[1]);
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(PlanError::UnorderedEntryZone { low, high });
        }
        let sl = self.stop_loss.ok_or(PlanError::MissingStopLoss)?;
        let tp = self.take_profit_1.ok_or(PlanError::MissingTakeProfit)?;
        if !sl.is_finite() || !tp.is_finite() {
            return Err(PlanError::InconsistentLevels {
                detail: "non-finite stop-loss or take-profit".into(),
            });
        }
        let consistent = match self.bias {
            Bias::Bullish => sl < low && high < tp,
            Bias::Bearish => tp < low && high < sl,
            Bias::Neutral => unreachable!(),
        };
        if !consistent {
            return Err(PlanError::InconsistentLevels {
                detail: format!(
                    "bias={:?} entry=[{low}, {high}] sl={sl} tp={tp}",
                    self.bias
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("entry_zone must have exactly two bounds, got {len}")]
    MalformedEntryZone { len: usize },

    #[error("entry_zone bounds not ordered: [{low}, {high}]")]
    UnorderedEntryZone { low: f64, high: f64 },

    #[error("directional plan missing stop_loss")]
    MissingStopLoss,

    #[error("directional plan missing take_profit_1")]
    MissingTakeProfit,

    #[error("price levels inconsistent with bias: {detail}")]
    InconsistentLevels { detail: String },
}
