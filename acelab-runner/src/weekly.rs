//! Weekly cycle: ensure today's daily cycle ran, then reflect over the
//! completed trading week and let the Curator produce the next playbook
//! version.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use acelab_core::domain::{ReflectionReport, ReflectionWindow};
use acelab_core::playbook::Version;
use acelab_core::roles::{Curator, Reflector};

use crate::artifacts::SessionArtifacts;
use crate::daily::{CycleEvent, DailyCycle, DailyOutcome};
use crate::notify::{format_weekly_summary, send_best_effort};
use crate::state_sync::RestoreOutcome;

#[derive(Debug)]
pub struct WeeklyOutcome {
    /// Present when the daily cycle had not yet run today.
    pub daily: Option<DailyOutcome>,
    pub report: ReflectionReport,
    pub playbook_version: Version,
    pub events: Vec<CycleEvent>,
    pub bundle_key: String,
}

pub struct WeeklyCycle {
    pub daily: DailyCycle,
    pub reflector: Reflector,
    pub curator: Curator,
}

impl WeeklyCycle {
    pub fn run(&self, now: DateTime<Utc>) -> Result<WeeklyOutcome> {
        let today = now.date_naive();
        let mut events = Vec::new();
        info!(%today, "weekly cycle starting");

        // Restore so the plan-exists check sees the published state, not an
        // empty ephemeral disk.
        match self.daily.sync.restore() {
            Ok(RestoreOutcome::Restored { key }) => info!(%key, "state restored"),
            Ok(RestoreOutcome::FirstRun) => info!("first run; starting from clean seed"),
            Err(e) => {
                warn!(error = %e, "restore failed; continuing with local state");
                events.push(CycleEvent::new("restore", e.to_string()));
            }
        }

        let artifacts = SessionArtifacts::new(self.daily.paths.clone());
        let daily_outcome = if artifacts.plan_exists(today) {
            None
        } else {
            let outcome = self.daily.run(now).context("running daily cycle first")?;
            events.extend(outcome.events.iter().cloned());
            Some(outcome)
        };

        let store = self.daily.paths.playbook_store();
        let playbook = store.load(now).context("loading playbook")?.playbook;

        // Reflect over the completed trading week.
        let window = ReflectionWindow::trading_week_containing(today);
        let logs = artifacts.load_week_logs(window);
        info!(count = logs.len(), "trade logs loaded for reflection window");

        let report = self.reflector.reflect(&logs, &playbook, window);
        if let Some(error) = &report.error {
            events.push(CycleEvent::new("reflector", error.clone()));
        }
        artifacts.write_reflection(&report).context("persisting reflection")?;

        // Curate: deterministic update algebra, new minor version.
        let outcome = self.curator.apply(&playbook, &report, now);
        for warning in &outcome.warnings {
            events.push(CycleEvent::new("curator", warning.clone()));
        }
        let new_playbook = outcome.playbook;
        store.save(&new_playbook).context("saving curated playbook")?;

        send_best_effort(
            self.daily.notifier.as_ref(),
            &format_weekly_summary(&report, &new_playbook),
        );
        artifacts
            .write_artifact_summary(&new_playbook, now)
            .context("writing artifact summary")?;

        let bundle_key = self.daily.sync.bundle_key("weekly", now);
        self.daily
            .sync
            .publish(&bundle_key, now)
            .context("publishing state bundle")?;

        info!(
            version = %new_playbook.metadata.version,
            insights = report.insights.len(),
            "weekly cycle complete"
        );
        Ok(WeeklyOutcome {
            daily: daily_outcome,
            report,
            playbook_version: new_playbook.metadata.version,
            events,
            bundle_key,
        })
    }
}
