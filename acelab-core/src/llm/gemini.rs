//! Gemini `generateContent` adapter.
//!
//! Single-call request/response over the REST API with retry, backoff, and
//! normalization of safety blocks into [`Completion::Blocked`]. Callers never
//! see provider-specific fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    BlockThreshold, Completion, FinishReason, GenerationConfig, HarmCategory, LlmClient, LlmError,
    SafetyPosture,
};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: ContentPart,
    contents: Vec<Content>,
    generation_config: WireGenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ContentOut>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct ContentOut {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyRating {
    category: String,
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

// ── Client ───────────────────────────────────────────────────────────

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
    base_delay: Duration,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Override the API endpoint (test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }

    fn build_request(
        system_prompt: &str,
        user_prompt: &str,
        config: &GenerationConfig,
    ) -> GenerateRequest {
        GenerateRequest {
            system_instruction: ContentPart {
                parts: vec![Part { text: system_prompt.to_string() }],
            },
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: user_prompt.to_string() }],
            }],
            generation_config: WireGenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
            safety_settings: safety_settings(&config.safety),
        }
    }

    fn send_once(&self, request: &GenerateRequest) -> Result<Completion, LlmError> {
        let resp = self
            .client
            .post(self.url())
            .json(request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate(&message, 300),
            });
        }

        let body: GenerateResponse = resp
            .json()
            .map_err(|e| LlmError::Transport(format!("response parse: {e}")))?;
        Ok(normalize(body))
    }
}

impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Completion, LlmError> {
        let request = Self::build_request(system_prompt, user_prompt, config);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            match self.send_once(&request) {
                Ok(completion) => return Ok(completion),
                // Retry transient failures only; 4xx (other than 429) are final.
                Err(err @ (LlmError::Timeout | LlmError::Transport(_))) => last_error = Some(err),
                Err(err @ LlmError::Api { status, .. }) if status == 429 || status >= 500 => {
                    last_error = Some(err)
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(LlmError::EmptyCandidates))
    }
}

/// Normalize a provider response into the three-way outcome: text, blocked,
/// or (via the error path above) transport failure.
fn normalize(body: GenerateResponse) -> Completion {
    if let Some(feedback) = &body.prompt_feedback {
        if feedback.block_reason.is_some() {
            return Completion::Blocked {
                categories: blocked_categories(&feedback.safety_ratings),
                finish_reason: FinishReason::Safety,
            };
        }
    }

    let Some(candidate) = body.candidates.into_iter().next() else {
        return Completion::Blocked {
            categories: Vec::new(),
            finish_reason: FinishReason::Safety,
        };
    };

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY") => FinishReason::Safety,
        Some(other) => FinishReason::Other(other.to_string()),
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();

    if finish_reason == FinishReason::Safety || text.is_empty() {
        return Completion::Blocked {
            categories: blocked_categories(&candidate.safety_ratings),
            finish_reason: FinishReason::Safety,
        };
    }

    Completion::Text { text, finish_reason }
}

fn blocked_categories(ratings: &[SafetyRating]) -> Vec<HarmCategory> {
    ratings
        .iter()
        .filter(|r| r.blocked)
        .filter_map(|r| match r.category.as_str() {
            "HARM_CATEGORY_HARASSMENT" => Some(HarmCategory::Harassment),
            "HARM_CATEGORY_HATE_SPEECH" => Some(HarmCategory::HateSpeech),
            "HARM_CATEGORY_SEXUALLY_EXPLICIT" => Some(HarmCategory::SexuallyExplicit),
            "HARM_CATEGORY_DANGEROUS_CONTENT" => Some(HarmCategory::DangerousContent),
            _ => None,
        })
        .collect()
}

fn safety_settings(posture: &SafetyPosture) -> Vec<SafetySetting> {
    fn threshold(t: BlockThreshold) -> &'static str {
        match t {
            BlockThreshold::BlockNone => "BLOCK_NONE",
            BlockThreshold::BlockLow => "BLOCK_LOW_AND_ABOVE",
            BlockThreshold::BlockMedium => "BLOCK_MEDIUM_AND_ABOVE",
            BlockThreshold::BlockHigh => "BLOCK_ONLY_HIGH",
        }
    }
    vec![
        SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT",
            threshold: threshold(posture.harassment),
        },
        SafetySetting {
            category: "HARM_CATEGORY_HATE_SPEECH",
            threshold: threshold(posture.hate_speech),
        },
        SafetySetting {
            category: "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            threshold: threshold(posture.sexually_explicit),
        },
        SafetySetting {
            category: "HARM_CATEGORY_DANGEROUS_CONTENT",
            threshold: threshold(posture.dangerous_content),
        },
    ]
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn normalizes_text_response() {
        let body = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"bias\": \"neutral\"}"}]},
                "finishReason": "STOP"}]}"#,
        );
        let completion = normalize(body);
        assert_eq!(completion.text().unwrap(), "{\"bias\": \"neutral\"}");
    }

    #[test]
    fn empty_candidates_normalize_to_blocked() {
        let completion = normalize(parse(r#"{"candidates": []}"#));
        assert!(completion.is_blocked());
    }

    #[test]
    fn safety_finish_reason_is_blocked_with_categories() {
        let body = parse(
            r#"{"candidates": [{"finishReason": "SAFETY",
                "safetyRatings": [{"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "blocked": true},
                                  {"category": "HARM_CATEGORY_HARASSMENT", "blocked": false}]}]}"#,
        );
        let Completion::Blocked { categories, .. } = normalize(body) else {
            panic!("expected blocked");
        };
        assert_eq!(categories, vec![HarmCategory::DangerousContent]);
    }

    #[test]
    fn prompt_feedback_block_reason_wins() {
        let body = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "ignored"}]}}],
                "promptFeedback": {"blockReason": "SAFETY",
                "safetyRatings": [{"category": "HARM_CATEGORY_HATE_SPEECH", "blocked": true}]}}"#,
        );
        let Completion::Blocked { categories, .. } = normalize(body) else {
            panic!("expected blocked");
        };
        assert_eq!(categories, vec![HarmCategory::HateSpeech]);
    }

    #[test]
    fn multipart_text_is_concatenated() {
        let body = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\""}, {"text": ": 1}"}]},
                "finishReason": "STOP"}]}"#,
        );
        assert_eq!(normalize(body).text().unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn safety_settings_map_thresholds() {
        let settings = safety_settings(&SafetyPosture::default());
        assert_eq!(settings.len(), 4);
        assert_eq!(settings[0].threshold, "BLOCK_NONE");
        assert_eq!(settings[3].threshold, "BLOCK_ONLY_HIGH");
    }

    #[test]
    fn request_serializes_camel_case() {
        let request = GeminiClient::build_request("sys", "user", &GenerationConfig::default());
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("systemInstruction"));
        assert!(json.contains("maxOutputTokens"));
        assert!(json.contains("safetySettings"));
    }
}
