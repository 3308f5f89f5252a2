//! TOML configuration — operational knobs with defaults, so a local demo run
//! needs no file at all.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use acelab_core::llm::{GenerationConfig, SafetyPosture};
use acelab_core::roles::{PruneThresholds, ReflectorConfig};
use acelab_core::sim::SimulatorConfig;

/// Top-level configuration from a TOML file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AceConfig {
    #[serde(default)]
    pub instrument: InstrumentSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub curator: CuratorSection,
    #[serde(default)]
    pub state: StateSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSection {
    #[serde(default = "default_pair")]
    pub pair: String,
    /// Price-to-pips multiplier (4-decimal pair → 10,000).
    #[serde(default = "default_pip_scale")]
    pub pip_scale: f64,
    #[serde(default = "default_pip_value_usd")]
    pub pip_value_usd: f64,
}

/// The single definition of session timing; no other module may carry its own.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    #[serde(default = "default_open_hour")]
    pub open_hour_utc: u32,
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_reflector_max_output_tokens")]
    pub reflector_max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CuratorSection {
    #[serde(default = "default_prune_min_harmful")]
    pub prune_min_harmful: u32,
    #[serde(default = "default_prune_margin")]
    pub prune_margin: u32,
    #[serde(default = "default_max_insights")]
    pub max_insights: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateSection {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_pair() -> String {
    "EURUSD".to_string()
}
fn default_pip_scale() -> f64 {
    10_000.0
}
fn default_pip_value_usd() -> f64 {
    10.0
}
fn default_open_hour() -> u32 {
    13
}
fn default_window_hours() -> u32 {
    8
}
fn default_interval_minutes() -> u32 {
    15
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_reflector_max_output_tokens() -> u32 {
    4096
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_prune_min_harmful() -> u32 {
    3
}
fn default_prune_margin() -> u32 {
    2
}
fn default_max_insights() -> usize {
    8
}
fn default_retention_days() -> u32 {
    30
}

impl Default for InstrumentSection {
    fn default() -> Self {
        Self {
            pair: default_pair(),
            pip_scale: default_pip_scale(),
            pip_value_usd: default_pip_value_usd(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            open_hour_utc: default_open_hour(),
            window_hours: default_window_hours(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            reflector_max_output_tokens: default_reflector_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for CuratorSection {
    fn default() -> Self {
        Self {
            prune_min_harmful: default_prune_min_harmful(),
            prune_margin: default_prune_margin(),
            max_insights: default_max_insights(),
        }
    }
}

impl Default for StateSection {
    fn default() -> Self {
        Self { retention_days: default_retention_days() }
    }
}

impl SessionSection {
    /// UTC open and close instants of the session on `date`.
    ///
    /// `open_hour_utc` is range-checked when the config is loaded, so the
    /// wall-time construction here cannot fail.
    pub fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let open = Utc.from_utc_datetime(
            &date
                .and_hms_opt(self.open_hour_utc, 0, 0)
                .expect("open_hour_utc range-checked at config load"),
        );
        (open, open + chrono::Duration::hours(self.window_hours as i64))
    }
}

impl AceConfig {
    /// Load from a TOML file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks the TOML schema cannot express.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.open_hour_utc > 23 {
            return Err(ConfigError::Invalid(format!(
                "session.open_hour_utc must be 0..=23, got {}",
                self.session.open_hour_utc
            )));
        }
        Ok(())
    }

    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            pip_scale: self.instrument.pip_scale,
            pip_value_usd: self.instrument.pip_value_usd,
        }
    }

    /// Generator decoding parameters.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.llm.temperature.clamp(0.0, 1.0),
            max_output_tokens: self.llm.max_output_tokens,
            safety: SafetyPosture::default(),
        }
    }

    pub fn reflector_config(&self) -> ReflectorConfig {
        ReflectorConfig {
            max_insights: self.curator.max_insights,
            generation: GenerationConfig {
                temperature: self.llm.temperature.clamp(0.0, 1.0),
                max_output_tokens: self.llm.reflector_max_output_tokens,
                safety: SafetyPosture::default(),
            },
        }
    }

    pub fn prune_thresholds(&self) -> PruneThresholds {
        PruneThresholds {
            min_harmful: self.curator.prune_min_harmful,
            margin: self.curator.prune_margin,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }
}

/// Config loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
