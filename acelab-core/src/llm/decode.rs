//! Defensive JSON extraction from model output.
//!
//! Model responses are adversarial in practice: markdown fences, language
//! tags, truncation mid-string, trailing prose. The decoder either returns a
//! JSON object or fails with a typed error; it never panics on indexing and
//! never returns a partial value.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("malformed JSON in model response: {message}")]
    MalformedJson {
        message: String,
        /// First characters of the cleaned response, for log inspection.
        head: String,
        /// Last characters of the cleaned response.
        tail: String,
    },
}

const HEAD_CHARS: usize = 500;
const TAIL_CHARS: usize = 200;

/// Extract a JSON object from arbitrary model text.
///
/// Strips at most one leading and one trailing code fence (with an optional
/// `json`/`JSON` tag), trims noise outside the outermost brace pair, and
/// parses what remains.
pub fn extract_json(text: &str) -> Result<Value, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }

    let mut body = trimmed;
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.trim_start();
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        body = rest.trim_start();
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest.trim_end();
    } else {
        body = body.trim_end();
    }

    let Some(start) = body.find('{') else {
        return Err(malformed(body, "no JSON object found"));
    };
    let candidate = &body[start..];
    // Drop trailing noise after the brace matching the first `{`. A candidate
    // with no balanced close (truncated output) goes to the parser whole so
    // the error names the real position.
    let slice = match balanced_object_end(candidate) {
        Some(end) => &candidate[..end],
        None => candidate,
    };

    match serde_json::from_str::<Value>(slice) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(malformed(body, "top-level JSON value is not an object")),
        Err(e) => Err(malformed(body, &e.to_string())),
    }
}

/// Byte offset one past the `}` matching the leading `{`, honoring strings
/// and escapes. `None` if the object never closes.
fn balanced_object_end(candidate: &str) -> Option<usize> {
    let mut depth = 0u32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in candidate.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn malformed(body: &str, message: &str) -> DecodeError {
    DecodeError::MalformedJson {
        message: message.to_string(),
        head: head_chars(body, HEAD_CHARS),
        tail: tail_chars(body, TAIL_CHARS),
    }
}

fn head_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn tail_chars(s: &str, n: usize) -> String {
    let total = s.chars().count();
    s.chars().skip(total.saturating_sub(n)).collect()
}

/// Decoder front-end that captures raw responses to a diagnostic sink when
/// extraction fails.
#[derive(Debug, Clone, Default)]
pub struct RobustJsonDecoder {
    debug_dir: Option<PathBuf>,
}

impl RobustJsonDecoder {
    /// `debug_dir`: where to persist unparseable raw responses
    /// (`raw_response_{timestamp}.txt`). `None` disables capture.
    pub fn new(debug_dir: Option<PathBuf>) -> Self {
        Self { debug_dir }
    }

    pub fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        match extract_json(raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                if matches!(err, DecodeError::MalformedJson { .. }) {
                    self.capture(raw);
                }
                Err(err)
            }
        }
    }

    fn capture(&self, raw: &str) {
        let Some(dir) = &self.debug_dir else { return };
        let path = dir.join(format!("raw_response_{}.txt", Utc::now().format("%Y%m%d_%H%M%S%3f")));
        let write = fs::create_dir_all(dir).and_then(|()| fs::write(&path, raw));
        match write {
            Ok(()) => warn!(path = %path.display(), "unparseable model response captured"),
            Err(e) => warn!(error = %e, "could not capture raw model response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_parses() {
        let value = extract_json(r#"{"bias": "neutral"}"#).unwrap();
        assert_eq!(value["bias"], "neutral");
    }

    #[test]
    fn empty_and_whitespace_yield_empty_response() {
        assert!(matches!(extract_json(""), Err(DecodeError::EmptyResponse)));
        assert!(matches!(extract_json("  \n\t "), Err(DecodeError::EmptyResponse)));
    }

    #[test]
    fn fenced_object_with_tag_parses() {
        for text in [
            "```json\n{\"a\": 1}\n```",
            "```JSON\n{\"a\": 1}\n```",
            "```\n{\"a\": 1}\n```",
            "```json{\"a\": 1}```",
        ] {
            let value = extract_json(text).unwrap();
            assert_eq!(value["a"], 1, "failed on {text:?}");
        }
    }

    #[test]
    fn leading_prose_and_trailing_noise_tolerated() {
        let value = extract_json("Here is the plan: {\"a\": 1} hope that helps %").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn nested_braces_and_braces_in_strings_matched() {
        let value = extract_json(r#"{"a": {"b": "}"}, "c": 2} trailing"#).unwrap();
        assert_eq!(value["c"], 2);
    }

    #[test]
    fn truncated_object_is_malformed_not_panic() {
        let err = extract_json(r#"{"a": "unterminated"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedJson { .. }));
    }

    #[test]
    fn only_fences_is_malformed() {
        let err = extract_json("``` ```").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedJson { .. }));
    }

    #[test]
    fn non_object_top_level_is_malformed() {
        // An array: there is no `{` at all.
        let err = extract_json("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedJson { .. }));
    }

    #[test]
    fn head_and_tail_are_char_safe() {
        let text = format!("{}{{\"a\": \u{00e9}", "é".repeat(600));
        let err = extract_json(&text).unwrap_err();
        let DecodeError::MalformedJson { head, tail, .. } = err else {
            panic!("expected malformed");
        };
        assert!(head.chars().count() <= 500);
        assert!(tail.chars().count() <= 200);
    }

    #[test]
    fn decoder_captures_raw_on_malformed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let decoder = RobustJsonDecoder::new(Some(tmp.path().join("debug")));
        let _ = decoder.decode("{\"truncated").unwrap_err();
        let captured: Vec<_> = fs::read_dir(tmp.path().join("debug")).unwrap().collect();
        assert_eq!(captured.len(), 1);
    }

    #[test]
    fn decoder_does_not_capture_on_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let decoder = RobustJsonDecoder::new(Some(tmp.path().join("debug")));
        let _ = decoder.decode("   ").unwrap_err();
        assert!(!tmp.path().join("debug").exists());
    }
}
