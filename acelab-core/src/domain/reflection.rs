use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Trading-week window a reflection covers (Monday through Friday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReflectionWindow {
    /// The trading week containing `date`, bounded by the trading-day
    /// calendar. Weekend dates map to the week that just completed.
    pub fn trading_week_containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        let anchor = if offset >= 5 {
            // Saturday/Sunday: operate on the preceding complete week.
            date - Duration::days(offset - 4)
        } else {
            date
        };
        let start = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
        Self { start, end: start + Duration::days(4) }
    }

    /// Trading days of the window, Monday through Friday.
    pub fn trading_days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..5).map(move |i| start + Duration::days(i))
    }

    /// ISO year and week number, used for reflection file naming.
    pub fn iso_week(&self) -> (i32, u32) {
        let week = self.end.iso_week();
        (week.year(), week.week())
    }
}

/// Deterministic performance summary over a window of trade logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklySummary {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub no_entries: usize,
    pub win_rate: f64,
    pub total_pips: f64,
    pub avg_win_pips: f64,
    pub avg_loss_pips: f64,
}

impl WeeklySummary {
    pub fn zero() -> Self {
        Self {
            total_trades: 0,
            wins: 0,
            losses: 0,
            no_entries: 0,
            win_rate: 0.0,
            total_pips: 0.0,
            avg_win_pips: 0.0,
            avg_loss_pips: 0.0,
        }
    }
}

/// What kind of pattern an insight describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    SuccessPattern,
    FailurePattern,
    OutdatedRule,
}

/// Playbook update the insight proposes. Applied by the Curator only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    AddEntry,
    IncrementHelpful,
    IncrementHarmful,
    Prune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One proposed knowledge update with its supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub kind: InsightKind,
    pub description: String,
    #[serde(default)]
    pub evidence_plan_ids: Vec<String>,
    pub suggested_action: SuggestedAction,
    #[serde(default)]
    pub target_section: Option<String>,
    #[serde(default)]
    pub target_entry_id: Option<String>,
    #[serde(default)]
    pub proposed_content: Option<String>,
    pub priority: Priority,
}

/// Weekly reflection: deterministic summary plus LLM-proposed updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReflectionReport {
    pub window: ReflectionWindow,
    pub summary: WeeklySummary,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub market_regime_notes: String,
    /// Set when the reflection degraded (LLM failure, unparseable output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReflectionReport {
    /// Empty-insights report for a degraded reflection. The Curator becomes a
    /// no-op for the period; Executor counter updates are unaffected.
    pub fn degraded(window: ReflectionWindow, summary: WeeklySummary, error: impl Into<String>) -> Self {
        Self {
            window,
            summary,
            insights: Vec::new(),
            market_regime_notes: String::new(),
            error: Some(error.into()),
        }
    }
}
