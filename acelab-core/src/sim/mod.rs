//! Price-replay execution simulator.
//!
//! Replays a daily plan against the session's OHLC candles: entry fills at
//! the midpoint of the candle/zone intersection, exits walk forward to the
//! first candle containing the stop or target, and a same-candle tie goes to
//! the stop. With no session data the simulator degrades to a deterministic
//! hash-based outcome, always marked as such in the output.

use chrono::{NaiveDate, TimeZone, Utc};

use crate::domain::{Candle, Confidence, Execution, Outcome, SimMethod, TradingPlan};

/// Instrument-level simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    /// Price-to-pips multiplier (4-decimal pair convention: 10,000).
    pub pip_scale: f64,
    /// Dollar value per pip, for reporting only.
    pub pip_value_usd: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self { pip_scale: 10_000.0, pip_value_usd: 10.0 }
    }
}

/// Simulation result: the execution record plus the fallback reason when the
/// degraded path was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulated {
    pub execution: Execution,
    pub fallback_reason: Option<String>,
}

impl Simulated {
    fn real(execution: Execution) -> Self {
        Self { execution, fallback_reason: None }
    }
}

/// Synthetic fill times used by the hash-based fallback, relative to the
/// plan date (mid-session entry, late-session exit).
const FALLBACK_ENTRY_HM: (u32, u32) = (14, 0);
const FALLBACK_EXIT_HM: (u32, u32) = (16, 30);

#[derive(Debug, Clone, Default)]
pub struct PriceReplaySimulator {
    config: SimulatorConfig,
}

impl PriceReplaySimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Deterministically decide the outcome of `plan` over `session`.
    ///
    /// `session` must be ordered by `open_time`; candle ordering is part of
    /// the contract. Identical inputs produce identical outputs.
    pub fn simulate(&self, plan: &TradingPlan, session: &[Candle]) -> Simulated {
        let Some(levels) = plan.levels() else {
            // Neutral plan, or a directional plan stripped of its levels.
            return Simulated::real(Execution::no_entry(SimMethod::RealPriceData));
        };

        if session.is_empty() {
            return self.fallback(plan, levels, "no price data available for session");
        }

        // Entry phase: first candle whose range intersects the zone. Fill at
        // the midpoint of the intersection.
        let entry = session.iter().enumerate().find_map(|(i, candle)| {
            candle
                .overlap(levels.entry_low, levels.entry_high)
                .map(|(lo, hi)| (i, candle.open_time, (lo + hi) / 2.0))
        });
        let Some((entry_idx, entry_time, entry_price)) = entry else {
            return Simulated::real(Execution::no_entry(SimMethod::RealPriceData));
        };

        let is_long = plan.is_long();
        let (sl, tp) = (levels.stop_loss, levels.take_profit);

        // Exit phase: from the next candle, first range containing the stop
        // or the target. Same-candle tie: the stop wins.
        for candle in &session[entry_idx + 1..] {
            let hit_sl = candle.contains(sl);
            let hit_tp = candle.contains(tp);
            if hit_sl {
                return Simulated::real(self.close(
                    Outcome::Loss,
                    entry_time,
                    entry_price,
                    candle.open_time,
                    sl,
                    is_long,
                    SimMethod::RealPriceData,
                ));
            }
            if hit_tp {
                return Simulated::real(self.close(
                    Outcome::Win,
                    entry_time,
                    entry_price,
                    candle.open_time,
                    tp,
                    is_long,
                    SimMethod::RealPriceData,
                ));
            }
        }

        // End of session: still open, marked to the last close.
        let last = &session[session.len() - 1];
        Simulated::real(self.close(
            Outcome::Open,
            entry_time,
            entry_price,
            last.open_time,
            last.close,
            is_long,
            SimMethod::RealPriceData,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn close(
        &self,
        outcome: Outcome,
        entry_time: chrono::DateTime<Utc>,
        entry_price: f64,
        exit_time: chrono::DateTime<Utc>,
        exit_price: f64,
        is_long: bool,
        method: SimMethod,
    ) -> Execution {
        let signed_move = if is_long { exit_price - entry_price } else { entry_price - exit_price };
        let pnl_pips = signed_move * self.config.pip_scale;
        Execution {
            outcome,
            entry_time: Some(entry_time),
            entry_price: Some(entry_price),
            exit_time: Some(exit_time),
            exit_price: Some(exit_price),
            pnl_pips,
            pnl_usd: pnl_pips * self.config.pip_value_usd,
            method,
        }
    }

    /// Degraded outcome when no session data exists (weekend, holiday,
    /// upstream failure). Win/loss derives from `(date, confidence)` so runs
    /// complete and aggregates stay stable, while `method` keeps these
    /// distinguishable from real replays.
    fn fallback(
        &self,
        plan: &TradingPlan,
        levels: crate::domain::PlanLevels,
        reason: &str,
    ) -> Simulated {
        let win = fallback_wins(plan.date, plan.confidence);
        let entry_price = levels.entry_mid();
        let exit_price = if win { levels.take_profit } else { levels.stop_loss };
        let outcome = if win { Outcome::Win } else { Outcome::Loss };

        let at = |(h, m): (u32, u32)| {
            Utc.from_utc_datetime(&plan.date.and_hms_opt(h, m, 0).expect("valid wall time"))
        };
        let execution = self.close(
            outcome,
            at(FALLBACK_ENTRY_HM),
            entry_price,
            at(FALLBACK_EXIT_HM),
            exit_price,
            plan.is_long(),
            SimMethod::HashBasedFallback,
        );
        Simulated { execution, fallback_reason: Some(reason.to_string()) }
    }
}

/// Confidence → win decision for the fallback path.
///
/// Pinned table: `high` wins unless the date bucket is divisible by 3 (~2/3),
/// `medium` wins on even buckets (1/2), `low` never wins.
pub fn fallback_wins(date: NaiveDate, confidence: Confidence) -> bool {
    let bucket = date_bucket(date);
    match confidence {
        Confidence::High => bucket % 3 != 0,
        Confidence::Medium => bucket % 2 == 0,
        Confidence::Low => false,
    }
}

/// Platform-stable bucket from the plan date.
fn date_bucket(date: NaiveDate) -> u64 {
    let hash = blake3::hash(date.to_string().as_bytes());
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("blake3 output is 32 bytes"))
}
