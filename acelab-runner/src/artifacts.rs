//! Session artifacts: plan and trade-log JSON per day, a human-readable plan
//! rendering, weekly reflection files, and the bundle-level summary.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use acelab_core::domain::{Bias, ReflectionReport, ReflectionWindow, TradeLog, TradingPlan};
use acelab_core::playbook::Playbook;

use crate::paths::Paths;

/// Reads and writes everything under the session and reflection directories.
#[derive(Debug, Clone)]
pub struct SessionArtifacts {
    paths: Paths,
}

/// Bundle-level summary written next to the state directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub generated_at: DateTime<Utc>,
    pub playbook: PlaybookInfo,
    pub trading_sessions: Vec<String>,
    pub weekly_reflections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookInfo {
    pub version: String,
    pub total_entries: usize,
    pub last_updated: DateTime<Utc>,
}

impl SessionArtifacts {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Persist the plan as JSON plus a markdown rendering for human review.
    pub fn write_plan(&self, plan: &TradingPlan) -> Result<()> {
        let dir = self.paths.session_dir(plan.date);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating session dir {}", dir.display()))?;
        write_pretty_json(&self.paths.plan_file(plan.date), plan)?;
        fs::write(self.paths.plan_markdown_file(plan.date), render_plan_markdown(plan))
            .context("writing plan markdown")?;
        Ok(())
    }

    pub fn read_plan(&self, date: NaiveDate) -> Result<Option<TradingPlan>> {
        read_optional_json(&self.paths.plan_file(date))
    }

    pub fn plan_exists(&self, date: NaiveDate) -> bool {
        self.paths.plan_file(date).exists()
    }

    pub fn write_trade_log(&self, date: NaiveDate, log: &TradeLog) -> Result<()> {
        let dir = self.paths.session_dir(date);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating session dir {}", dir.display()))?;
        write_pretty_json(&self.paths.trade_log_file(date), log)
    }

    pub fn read_trade_log(&self, date: NaiveDate) -> Result<Option<TradeLog>> {
        read_optional_json(&self.paths.trade_log_file(date))
    }

    /// Trade logs for the window's Monday→Friday; absent days are skipped,
    /// malformed files are skipped with a warning.
    pub fn load_week_logs(&self, window: ReflectionWindow) -> Vec<TradeLog> {
        let mut logs = Vec::new();
        for date in window.trading_days() {
            match self.read_trade_log(date) {
                Ok(Some(log)) => logs.push(log),
                Ok(None) => {}
                Err(e) => warn!(%date, error = %e, "skipping unreadable trade log"),
            }
        }
        logs
    }

    pub fn write_reflection(&self, report: &ReflectionReport) -> Result<()> {
        let (year, week) = report.window.iso_week();
        let path = self.paths.reflection_file(year, week);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("creating reflections dir")?;
        }
        write_pretty_json(&path, report)
    }

    /// Rebuild `artifact_summary.json` from the playbook and the directories
    /// actually on disk.
    pub fn write_artifact_summary(&self, playbook: &Playbook, now: DateTime<Utc>) -> Result<()> {
        let summary = ArtifactSummary {
            generated_at: now,
            playbook: PlaybookInfo {
                version: playbook.metadata.version.to_string(),
                total_entries: playbook.metadata.total_entries,
                last_updated: playbook.metadata.last_updated,
            },
            trading_sessions: sorted_names(&self.paths.session_root(), true),
            weekly_reflections: sorted_names(&self.paths.reflections_dir(), false),
        };
        write_pretty_json(&self.paths.artifact_summary_file(), &summary)
    }
}

/// Markdown rendering of the day's plan.
pub fn render_plan_markdown(plan: &TradingPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Trading Plan - {}\n\n", plan.date));
    out.push_str(&format!("**Bias**: {:?}\n\n", plan.bias));
    out.push_str(&format!("**Confidence**: {:?}\n\n", plan.confidence));

    if plan.bias != Bias::Neutral {
        if let Some(levels) = plan.levels() {
            out.push_str("## Trade Setup\n\n");
            out.push_str(&format!(
                "- **Entry Zone**: {:.5} - {:.5}\n",
                levels.entry_low, levels.entry_high
            ));
            out.push_str(&format!("- **Stop Loss**: {:.5}\n", levels.stop_loss));
            out.push_str(&format!("- **Take Profit 1**: {:.5}\n", levels.take_profit));
            if let Some(tp2) = plan.take_profit_2 {
                out.push_str(&format!("- **Take Profit 2**: {tp2:.5}\n"));
            }
            if let Some(size) = plan.position_size_pct {
                out.push_str(&format!("- **Position Size**: {size:.2}%\n"));
            }
            if let Some(rr) = &plan.risk_reward {
                out.push_str(&format!("- **Risk/Reward**: {rr}\n"));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!("## Rationale\n\n{}\n", plan.rationale));

    if !plan.playbook_entries_used.is_empty() {
        out.push_str("\n## Playbook Entries Applied\n\n");
        for id in &plan.playbook_entries_used {
            out.push_str(&format!("- {id}\n"));
        }
    }
    if let Some(error) = &plan.error {
        out.push_str(&format!("\n## Degraded\n\n{error}\n"));
    }
    out
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing artifact")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn read_optional_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Sorted child names: directories when `dirs` is set, else files.
fn sorted_names(path: &Path, dirs: bool) -> Vec<String> {
    let Ok(read) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_type()
                .map(|t| if dirs { t.is_dir() } else { t.is_file() })
                .unwrap_or(false)
        })
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
