//! Daily cycle: restore → load → snapshot → generate → notify → replay →
//! apply delta → save → publish.
//!
//! Each stage degrades in place and records a structured event; only state
//! persistence (artifact writes, playbook save, bundle publish) is fatal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use acelab_core::domain::{MarketSnapshot, TradeLog, TradingPlan};
use acelab_core::playbook::{LoadSource, Version};
use acelab_core::roles::{Executor, Generator};

use crate::artifacts::SessionArtifacts;
use crate::config::SessionSection;
use crate::market::MarketDataProvider;
use crate::notify::{format_plan_summary, send_best_effort, Notifier};
use crate::paths::Paths;
use crate::state_sync::{RestoreOutcome, StateSynchronizer};

/// A degraded stage, recorded without aborting the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEvent {
    pub stage: &'static str,
    pub detail: String,
}

impl CycleEvent {
    pub fn new(stage: &'static str, detail: impl Into<String>) -> Self {
        Self { stage, detail: detail.into() }
    }
}

#[derive(Debug)]
pub struct DailyOutcome {
    pub plan: TradingPlan,
    pub trade_log: TradeLog,
    pub playbook_version: Version,
    pub events: Vec<CycleEvent>,
    pub bundle_key: String,
}

pub struct DailyCycle {
    pub paths: Paths,
    pub session: SessionSection,
    pub pair: String,
    pub generator: Generator,
    pub executor: Executor,
    pub market: Box<dyn MarketDataProvider>,
    pub notifier: Box<dyn Notifier>,
    pub sync: StateSynchronizer,
}

impl DailyCycle {
    pub fn run(&self, now: DateTime<Utc>) -> Result<DailyOutcome> {
        let today = now.date_naive();
        let mut events = Vec::new();
        info!(%today, "daily cycle starting");

        // 1. Restore state. A failed restore degrades to fresh-start; only a
        //    missing bundle is the normal first-run path.
        match self.sync.restore() {
            Ok(RestoreOutcome::Restored { key }) => info!(%key, "state restored"),
            Ok(RestoreOutcome::FirstRun) => info!("first run; starting from clean seed"),
            Err(e) => {
                warn!(error = %e, "restore failed; continuing with local state");
                events.push(CycleEvent::new("restore", e.to_string()));
            }
        }

        // 2. Load playbook. Quarantine is survivable; I/O failure is not.
        let store = self.paths.playbook_store();
        let loaded = store.load(now).context("loading playbook")?;
        if let LoadSource::Quarantined { quarantined_to } = &loaded.source {
            events.push(CycleEvent::new(
                "playbook_load",
                format!("corrupt playbook quarantined to {}", quarantined_to.display()),
            ));
        }
        let mut playbook = loaded.playbook;

        // 3. Market snapshot; degraded stand-in on failure.
        let snapshot = match self.market.fetch_snapshot(now) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                events.push(CycleEvent::new("market_snapshot", e.to_string()));
                MarketSnapshot::unavailable(&self.pair, now, e.to_string())
            }
        };

        // 4. Generate the plan (infallible; degraded plans carry `error`).
        let plan = self.generator.generate(&playbook, &snapshot, today);
        if let Some(error) = &plan.error {
            events.push(CycleEvent::new("generator", error.clone()));
        }

        // 5. Persist the plan, then notify (best-effort).
        let artifacts = SessionArtifacts::new(self.paths.clone());
        artifacts.write_plan(&plan).context("persisting trading plan")?;
        send_best_effort(self.notifier.as_ref(), &format_plan_summary(&plan));

        // 6. Session candles; an empty session routes the simulator to its
        //    fallback path.
        let candles = match self.market.fetch_session_ohlc(today, &self.session) {
            Ok(candles) => candles,
            Err(e) => {
                events.push(CycleEvent::new("session_ohlc", e.to_string()));
                Vec::new()
            }
        };

        // 7. Replay and apply the usage delta before the post-cycle save.
        let (trade_log, delta) = self.executor.execute(&plan, &candles, &playbook, now);
        delta.apply(&mut playbook);

        // 8. State persistence; failures here are fatal to preserve the
        //    cross-run guarantees.
        store.save(&playbook).context("saving playbook")?;
        artifacts
            .write_trade_log(today, &trade_log)
            .context("persisting trade log")?;
        artifacts
            .write_artifact_summary(&playbook, now)
            .context("writing artifact summary")?;

        // 9. Publish after all session-dir writes; otherwise the next run
        //    could restore stale state.
        let bundle_key = self.sync.bundle_key("daily", now);
        self.sync
            .publish(&bundle_key, now)
            .context("publishing state bundle")?;

        info!(
            outcome = ?trade_log.execution.outcome,
            pnl_pips = trade_log.execution.pnl_pips,
            "daily cycle complete"
        );
        Ok(DailyOutcome {
            plan,
            trade_log,
            playbook_version: playbook.metadata.version,
            events,
            bundle_key,
        })
    }
}
