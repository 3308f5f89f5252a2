//! Text-generation client seam.
//!
//! The [`LlmClient`] trait abstracts over providers so the roles can be run
//! against the real Gemini backend, or a scripted client in tests and offline
//! demos. Blocked responses are a first-class outcome: callers never peek at
//! provider-specific safety fields.

pub mod decode;
pub mod gemini;
pub mod scripted;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use decode::{DecodeError, RobustJsonDecoder};
pub use gemini::GeminiClient;
pub use scripted::ScriptedClient;

/// Safety-filter threshold for one harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockThreshold {
    BlockNone,
    BlockLow,
    BlockMedium,
    BlockHigh,
}

/// Harm categories a provider may block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

/// Per-category safety posture sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPosture {
    pub harassment: BlockThreshold,
    pub hate_speech: BlockThreshold,
    pub sexually_explicit: BlockThreshold,
    pub dangerous_content: BlockThreshold,
}

impl Default for SafetyPosture {
    fn default() -> Self {
        Self {
            harassment: BlockThreshold::BlockNone,
            hate_speech: BlockThreshold::BlockNone,
            sexually_explicit: BlockThreshold::BlockNone,
            dangerous_content: BlockThreshold::BlockHigh,
        }
    }
}

/// Decoding parameters for a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature in `0.0..=1.0`.
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub safety: SafetyPosture,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 2048,
            safety: SafetyPosture::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Other(String),
}

/// Outcome of a generation call that reached the backend.
///
/// Accessing the text of a blocked completion fails fast with a typed error
/// rather than handing back an empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text {
        text: String,
        finish_reason: FinishReason,
    },
    Blocked {
        categories: Vec<HarmCategory>,
        finish_reason: FinishReason,
    },
}

impl Completion {
    pub fn text(&self) -> Result<&str, LlmError> {
        match self {
            Completion::Text { text, .. } => Ok(text),
            Completion::Blocked { categories, .. } => Err(LlmError::ResponseBlocked {
                categories: categories.clone(),
            }),
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Completion::Blocked { .. })
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response blocked by safety filters ({categories:?})")]
    ResponseBlocked { categories: Vec<HarmCategory> },

    #[error("backend returned no candidates")]
    EmptyCandidates,
}

/// Single-call request/response seam to a text-generation model.
pub trait LlmClient {
    fn name(&self) -> &str;

    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Completion, LlmError>;
}
