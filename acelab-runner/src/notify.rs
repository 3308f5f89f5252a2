//! Notification sink: best-effort chat delivery of cycle summaries.
//!
//! Failures are logged and never fatal to a cycle.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use acelab_core::domain::{Bias, ReflectionReport, TradingPlan};
use acelab_core::playbook::Playbook;

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier {
    fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Discards messages; used when no transport is configured.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn send(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Telegram bot transport.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    bot_token: String,
    chat_id: String,
}

/// Telegram hard limit is 4096 chars; leave headroom for safety.
const MAX_MESSAGE_CHARS: usize = 4000;

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { client, bot_token: bot_token.into(), chat_id: chat_id.into() }
    }

    fn send_chunk(&self, chunk: &str) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let resp = self
            .client
            .post(url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", chunk)])
            .send()
            .map_err(|e| NotifyError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NotifyError(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        for chunk in split_message(message, MAX_MESSAGE_CHARS) {
            self.send_chunk(&chunk)?;
        }
        Ok(())
    }
}

/// Split on line boundaries so no chunk exceeds `max_chars`. A single line
/// longer than the limit is hard-split.
fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    for line in message.split('\n') {
        let mut line_chars = line.chars().count();
        let mut line = line.to_string();
        while line_chars > max_chars {
            let split_at = line
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            let rest = line.split_off(split_at);
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            chunks.push(line);
            line = rest;
            line_chars = line.chars().count();
        }
        if current_chars + line_chars + 1 > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(&line);
        current_chars += line_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Send with failures demoted to a warning. Used at cycle stage boundaries.
pub fn send_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message) {
        warn!(error = %e, "notification dropped");
    }
}

/// One-screen daily plan summary.
pub fn format_plan_summary(plan: &TradingPlan) -> String {
    let mut out = format!(
        "ACE trading plan {}\nbias: {:?} | confidence: {:?}\n",
        plan.date, plan.bias, plan.confidence
    );
    if plan.bias != Bias::Neutral {
        if let Some(levels) = plan.levels() {
            out.push_str(&format!(
                "entry {:.5}-{:.5} | SL {:.5} | TP1 {:.5}",
                levels.entry_low, levels.entry_high, levels.stop_loss, levels.take_profit
            ));
            if let Some(rr) = &plan.risk_reward {
                out.push_str(&format!(" | R:R {rr}"));
            }
            out.push('\n');
        }
    }
    out.push_str(&format!("rationale: {}\n", plan.rationale));
    if let Some(error) = &plan.error {
        out.push_str(&format!("degraded: {error}\n"));
    }
    out
}

/// One-screen weekly reflection summary.
pub fn format_weekly_summary(report: &ReflectionReport, playbook: &Playbook) -> String {
    let s = &report.summary;
    let mut out = format!(
        "ACE weekly summary {} .. {}\n\
         trades: {} | wins: {} | losses: {} | no-entries: {}\n\
         win rate: {:.0}% | total: {:+.1} pips\n\
         playbook: v{} ({} entries) | insights applied: {}\n",
        report.window.start,
        report.window.end,
        s.total_trades,
        s.wins,
        s.losses,
        s.no_entries,
        s.win_rate * 100.0,
        s.total_pips,
        playbook.metadata.version,
        playbook.metadata.total_entries,
        report.insights.len(),
    );
    if !report.market_regime_notes.is_empty() {
        out.push_str(&format!("regime: {}\n", report.market_regime_notes));
    }
    if let Some(error) = &report.error {
        out.push_str(&format!("degraded: {error}\n"));
    }
    out
}
