//! Generator role: one LLM call per day turns `(Playbook, MarketSnapshot)`
//! into a validated [`TradingPlan`].
//!
//! Every failure class — transport error, safety block, empty or malformed
//! response, schema violation — collapses to a neutral low-confidence plan
//! with the `error` field set, so the daily cycle always proceeds.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{Bias, Confidence, MarketSnapshot, TradingPlan};
use crate::llm::{DecodeError, GenerationConfig, LlmClient, RobustJsonDecoder};
use crate::playbook::Playbook;

use super::prompts;

/// Model output before the cycle date and defaults are imposed.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    date: Option<NaiveDate>,
    bias: Bias,
    #[serde(default)]
    entry_zone: Vec<f64>,
    #[serde(default)]
    stop_loss: Option<f64>,
    #[serde(default)]
    take_profit_1: Option<f64>,
    #[serde(default)]
    take_profit_2: Option<f64>,
    #[serde(default)]
    position_size_pct: Option<f64>,
    #[serde(default)]
    risk_reward: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default, alias = "playbook_bullets_used")]
    playbook_entries_used: Vec<String>,
    #[serde(default)]
    confidence: Option<Confidence>,
}

pub struct Generator {
    client: Box<dyn LlmClient>,
    decoder: RobustJsonDecoder,
    config: GenerationConfig,
}

impl Generator {
    pub fn new(
        client: Box<dyn LlmClient>,
        decoder: RobustJsonDecoder,
        config: GenerationConfig,
    ) -> Self {
        Self { client, decoder, config }
    }

    /// Produce the plan for `today`. Infallible by contract: degraded paths
    /// return a schema-valid neutral plan.
    pub fn generate(
        &self,
        playbook: &Playbook,
        snapshot: &MarketSnapshot,
        today: NaiveDate,
    ) -> TradingPlan {
        let user_prompt = prompts::generator_user(playbook, snapshot);

        let completion =
            match self.client.generate(prompts::GENERATOR_SYSTEM, &user_prompt, &self.config) {
                Ok(completion) => completion,
                Err(e) => {
                    return degraded(today, "plan generation call failed", &e.to_string());
                }
            };

        let text = match completion.text() {
            Ok(text) => text,
            Err(e) => {
                return degraded(today, "plan response blocked by safety filters", &e.to_string());
            }
        };

        let value = match self.decoder.decode(text) {
            Ok(value) => value,
            Err(e @ DecodeError::EmptyResponse) => {
                return degraded(today, "model returned an empty plan", &e.to_string());
            }
            Err(DecodeError::MalformedJson { message, .. }) => {
                return degraded(
                    today,
                    "model returned malformed JSON; raw response captured for inspection",
                    &message,
                );
            }
        };

        let raw: RawPlan = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                return degraded(today, "plan JSON did not match the schema", &e.to_string());
            }
        };

        if let Some(model_date) = raw.date {
            if model_date != today {
                // The cycle date is authoritative; the model's date is cosmetic.
                warn!(%model_date, %today, "model plan date overridden with cycle date");
            }
        }

        let plan = TradingPlan {
            date: today,
            bias: raw.bias,
            entry_zone: raw.entry_zone,
            stop_loss: raw.stop_loss,
            take_profit_1: raw.take_profit_1,
            take_profit_2: raw.take_profit_2,
            position_size_pct: raw.position_size_pct,
            risk_reward: raw.risk_reward,
            rationale: raw.rationale.unwrap_or_default(),
            playbook_entries_used: raw.playbook_entries_used,
            confidence: raw.confidence.unwrap_or(Confidence::Medium),
            error: None,
        };

        match plan.validate() {
            Ok(()) => plan,
            Err(e) => degraded(today, "plan levels inconsistent with bias", &e.to_string()),
        }
    }
}

fn degraded(today: NaiveDate, rationale: &str, error: &str) -> TradingPlan {
    warn!(error, "generator degraded to neutral plan");
    TradingPlan::neutral(today, rationale, Some(error.to_string()))
}
