//! Artifact schemas flowing between the ACE roles.

pub mod candle;
pub mod plan;
pub mod reflection;
pub mod snapshot;
pub mod trade_log;

pub use candle::{Candle, CandleError};
pub use plan::{Bias, Confidence, PlanError, PlanLevels, TradingPlan};
pub use reflection::{
    Insight, InsightKind, Priority, ReflectionReport, ReflectionWindow, SuggestedAction,
    WeeklySummary,
};
pub use snapshot::{EconomicEvent, MarketSnapshot, TimeframeView, Volatility};
pub use trade_log::{
    EntryQuality, EntryVerdict, Execution, ExitTiming, Feedback, Outcome, SimMethod, TradeLog,
};
