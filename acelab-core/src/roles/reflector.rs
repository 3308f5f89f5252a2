//! Reflector role: deterministic weekly summary plus one LLM call proposing
//! prioritized playbook updates.
//!
//! The summary never depends on the model. When the model call fails or its
//! output cannot be decoded, the report degrades to empty insights with the
//! `error` field set and the Curator becomes a no-op for the period.

use serde_json::Value;
use tracing::warn;

use crate::domain::{
    Insight, Outcome, ReflectionReport, ReflectionWindow, TradeLog, WeeklySummary,
};
use crate::llm::{GenerationConfig, LlmClient, RobustJsonDecoder};
use crate::playbook::Playbook;

use super::prompts;

#[derive(Debug, Clone)]
pub struct ReflectorConfig {
    /// Upper bound on insights accepted from the model.
    pub max_insights: usize,
    pub generation: GenerationConfig,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            max_insights: 8,
            generation: GenerationConfig {
                max_output_tokens: 4096,
                ..GenerationConfig::default()
            },
        }
    }
}

pub struct Reflector {
    client: Box<dyn LlmClient>,
    decoder: RobustJsonDecoder,
    config: ReflectorConfig,
}

impl Reflector {
    pub fn new(client: Box<dyn LlmClient>, decoder: RobustJsonDecoder, config: ReflectorConfig) -> Self {
        Self { client, decoder, config }
    }

    /// Analyze one window of trade logs. Infallible by contract.
    pub fn reflect(
        &self,
        logs: &[TradeLog],
        playbook: &Playbook,
        window: ReflectionWindow,
    ) -> ReflectionReport {
        let summary = summarize(logs);

        if logs.is_empty() {
            return ReflectionReport {
                window,
                summary,
                insights: Vec::new(),
                market_regime_notes: "no trading activity recorded this week".into(),
                error: None,
            };
        }

        let evidence = evidence_bundle(logs);
        let user_prompt = prompts::reflector_user(&evidence, playbook, self.config.max_insights);

        let completion = match self.client.generate(
            prompts::REFLECTOR_SYSTEM,
            &user_prompt,
            &self.config.generation,
        ) {
            Ok(completion) => completion,
            Err(e) => return ReflectionReport::degraded(window, summary, e.to_string()),
        };
        let text = match completion.text() {
            Ok(text) => text,
            Err(e) => return ReflectionReport::degraded(window, summary, e.to_string()),
        };
        let value = match self.decoder.decode(text) {
            Ok(value) => value,
            Err(e) => return ReflectionReport::degraded(window, summary, e.to_string()),
        };

        let (insights, notes) = self.accept_insights(value);
        ReflectionReport {
            window,
            summary,
            insights,
            market_regime_notes: notes,
            error: None,
        }
    }

    /// Accept well-formed insights element by element so one bad insight does
    /// not discard the rest, capped at the configured maximum.
    fn accept_insights(&self, value: Value) -> (Vec<Insight>, String) {
        let notes = value
            .get("market_regime_notes")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let raw_insights = match value.get("insights").and_then(Value::as_array) {
            Some(arr) => arr.clone(),
            None => {
                warn!("reflection JSON has no insights array");
                Vec::new()
            }
        };

        let mut insights = Vec::new();
        for raw in raw_insights {
            if insights.len() >= self.config.max_insights {
                warn!(max = self.config.max_insights, "insight budget reached; rest dropped");
                break;
            }
            match serde_json::from_value::<Insight>(raw) {
                Ok(insight) => insights.push(insight),
                Err(e) => warn!(error = %e, "skipping malformed insight"),
            }
        }
        (insights, notes)
    }
}

/// Deterministic summary stats over the window's logs.
pub fn summarize(logs: &[TradeLog]) -> WeeklySummary {
    let mut summary = WeeklySummary::zero();
    summary.total_trades = logs.len();

    let mut win_pips = Vec::new();
    let mut loss_pips = Vec::new();
    for log in logs {
        summary.total_pips += log.execution.pnl_pips;
        match log.execution.outcome {
            Outcome::Win => {
                summary.wins += 1;
                win_pips.push(log.execution.pnl_pips);
            }
            Outcome::Loss => {
                summary.losses += 1;
                loss_pips.push(log.execution.pnl_pips);
            }
            Outcome::NoEntry => summary.no_entries += 1,
            Outcome::Open => {}
        }
    }

    let decided = summary.wins + summary.losses;
    if decided > 0 {
        summary.win_rate = summary.wins as f64 / decided as f64;
    }
    if !win_pips.is_empty() {
        summary.avg_win_pips = win_pips.iter().sum::<f64>() / win_pips.len() as f64;
    }
    if !loss_pips.is_empty() {
        summary.avg_loss_pips = loss_pips.iter().sum::<f64>() / loss_pips.len() as f64;
    }
    summary
}

/// Compact one-line-per-trade evidence for the prompt.
fn evidence_bundle(logs: &[TradeLog]) -> String {
    logs.iter()
        .map(|log| {
            let exec = &log.execution;
            let cited: Vec<&str> = log
                .feedback
                .playbook_entries_feedback
                .keys()
                .map(String::as_str)
                .collect();
            let events = if log.feedback.unexpected_events.is_empty() {
                String::new()
            } else {
                format!("; events: {}", log.feedback.unexpected_events.join(", "))
            };
            format!(
                "{}: {:?} {:+.1} pips ({:?}, entry {:?}, exit {:?}; cited: [{}]{})",
                log.plan_id,
                exec.outcome,
                exec.pnl_pips,
                exec.method,
                log.feedback.entry_quality,
                log.feedback.exit_timing,
                cited.join(", "),
                events,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
