//! Executor role: replay the plan, build the trade log with execution-quality
//! feedback, and emit the `last_used` delta for cited playbook entries.
//!
//! Deterministic — no LLM involvement.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{
    Candle, EntryQuality, EntryVerdict, ExitTiming, Feedback, Outcome, SimMethod, TradeLog,
    TradingPlan,
};
use crate::playbook::Playbook;
use crate::sim::PriceReplaySimulator;

/// Fill within this fraction of the zone width from its midpoint counts as a
/// clean entry; further out is recorded as slippage.
const GOOD_ENTRY_TOLERANCE: f64 = 0.20;

/// Pending `last_used` updates for cited entries. Applied to the playbook by
/// the cycle before the post-cycle save.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybookDelta {
    pub entry_ids: Vec<String>,
    pub at: DateTime<Utc>,
}

impl PlaybookDelta {
    pub fn is_empty(&self) -> bool {
        self.entry_ids.is_empty()
    }

    pub fn apply(&self, playbook: &mut Playbook) {
        for id in &self.entry_ids {
            playbook.touch(id, self.at);
        }
    }
}

pub struct Executor {
    simulator: PriceReplaySimulator,
}

impl Executor {
    pub fn new(simulator: PriceReplaySimulator) -> Self {
        Self { simulator }
    }

    /// Replay `plan` over `session` and derive feedback.
    ///
    /// Cited entry ids that do not exist in the playbook are dropped with a
    /// warning; they are model hallucinations, not errors.
    pub fn execute(
        &self,
        plan: &TradingPlan,
        session: &[Candle],
        playbook: &Playbook,
        now: DateTime<Utc>,
    ) -> (TradeLog, PlaybookDelta) {
        let simulated = self.simulator.simulate(plan, session);
        let execution = simulated.execution;

        let entry_quality = match (execution.outcome, execution.method) {
            (Outcome::NoEntry, _) => EntryQuality::NotTriggered,
            (_, SimMethod::HashBasedFallback) => EntryQuality::Simulated,
            (_, SimMethod::RealPriceData) => entry_quality(plan, execution.entry_price),
        };
        let exit_timing = match execution.outcome {
            Outcome::Win => ExitTiming::TargetHit,
            Outcome::Loss => ExitTiming::StoppedOut,
            Outcome::Open => ExitTiming::SessionClose,
            Outcome::NoEntry => ExitTiming::NotApplicable,
        };

        let mut feedback = Feedback {
            entry_quality,
            exit_timing,
            unexpected_events: Vec::new(),
            playbook_entries_feedback: Default::default(),
        };
        if let Some(reason) = simulated.fallback_reason {
            feedback.unexpected_events.push(reason);
        }

        let verdict = match execution.outcome {
            Outcome::Win => EntryVerdict::Helpful,
            Outcome::Loss => EntryVerdict::Harmful,
            Outcome::NoEntry | Outcome::Open => EntryVerdict::Neutral,
        };

        let mut known_ids = Vec::new();
        for id in &plan.playbook_entries_used {
            if playbook.find_entry(id).is_some() {
                feedback.playbook_entries_feedback.insert(id.clone(), verdict);
                known_ids.push(id.clone());
            } else {
                warn!(entry_id = %id, "plan cited unknown playbook entry; dropped");
            }
        }

        let log = TradeLog {
            plan_id: plan.date.to_string(),
            execution,
            feedback,
        };
        (log, PlaybookDelta { entry_ids: known_ids, at: now })
    }
}

fn entry_quality(plan: &TradingPlan, entry_price: Option<f64>) -> EntryQuality {
    let (Some(levels), Some(price)) = (plan.levels(), entry_price) else {
        return EntryQuality::Simulated;
    };
    let width = levels.zone_width();
    if width <= 0.0 || (price - levels.entry_mid()).abs() <= GOOD_ENTRY_TOLERANCE * width {
        EntryQuality::Good
    } else {
        EntryQuality::Slippage
    }
}
