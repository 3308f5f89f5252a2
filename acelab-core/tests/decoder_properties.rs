//! Property tests for the robust JSON decoder.
//!
//! The contract: for every input, `extract_json` returns a JSON object or
//! fails with `EmptyResponse`/`MalformedJson`. It must never panic on
//! indexing or length, whatever the model emits.

use proptest::prelude::*;

use acelab_core::llm::decode::extract_json;
use acelab_core::llm::DecodeError;

// ── Fixed corpus of adversarial responses ────────────────────────────

#[test]
fn malformed_corpus_yields_typed_errors_only() {
    let corpus = [
        "",
        "   \n\t  ",
        "```",
        "``` ```",
        "``````",
        "```json",
        "```json\n```",
        "{\"truncated\": \"mid string",
        "{\"a\": 1,",
        "{\"a\": }",
        "null",
        "true",
        "[1, 2, 3]",
        "\"just a string\"",
        "plain prose with no braces at all",
        "}{",
        "{\"nested\": {\"unclosed\": 1}",
        "%%%{",
        "```python\nprint('hi')\n```",
    ];
    for text in corpus {
        match extract_json(text) {
            Ok(value) => assert!(value.is_object(), "non-object accepted for {text:?}"),
            Err(DecodeError::EmptyResponse | DecodeError::MalformedJson { .. }) => {}
        }
    }
}

#[test]
fn recoverable_corpus_parses() {
    let corpus = [
        "{\"a\": 1}",
        "```json\n{\"a\": 1}\n```",
        "```JSON\n{\"a\": 1}\n```",
        "```\n{\"a\": 1}\n```",
        "Sure! Here's the JSON:\n```json\n{\"a\": 1}\n```\nLet me know if it helps.",
        "{\"a\": 1} %",
        "{\"a\": {\"b\": [1, 2]}, \"c\": \"}\"}",
        "prefix {\"a\": 1} suffix {\"b\": 2}",
    ];
    for text in corpus {
        let value = extract_json(text).unwrap_or_else(|e| panic!("failed on {text:?}: {e}"));
        assert!(value.is_object());
    }
}

// ── Property tests ───────────────────────────────────────────────────

proptest! {
    /// Arbitrary bytes of text never crash the decoder.
    #[test]
    fn never_panics_on_arbitrary_text(text in ".{0,400}") {
        let _ = extract_json(&text);
    }

    /// Arbitrary text stuffed with fence and brace fragments never crashes.
    #[test]
    fn never_panics_on_fencey_text(
        parts in prop::collection::vec(
            prop_oneof![
                Just("```".to_string()),
                Just("```json".to_string()),
                Just("{".to_string()),
                Just("}".to_string()),
                Just("\"".to_string()),
                Just("\\".to_string()),
                "[a-z ]{0,10}",
            ],
            0..12,
        )
    ) {
        let text = parts.concat();
        let _ = extract_json(&text);
    }

    /// A well-formed object survives fence wrapping and trailing noise.
    #[test]
    fn fenced_object_roundtrips(
        key in "[a-z]{1,8}",
        value in -1_000_000i64..1_000_000,
        noise in "[ a-z%.!]{0,40}",
    ) {
        let json = format!("{{\"{key}\": {value}}}");
        let wrapped = format!("```json\n{json}\n```{noise}");
        let parsed = extract_json(&wrapped).unwrap();
        prop_assert_eq!(parsed[&key].as_i64(), Some(value));
    }

    /// Truncating a valid response at any char boundary yields Ok or a typed
    /// error — never a panic.
    #[test]
    fn truncation_never_panics(cut in 0usize..200) {
        let full = r#"```json
{"date": "2025-10-29", "bias": "bullish", "entry_zone": [1.0840, 1.0850],
 "rationale": "H4 demand zone éé", "confidence": "high"}
```"#;
        let boundary = full
            .char_indices()
            .map(|(i, _)| i)
            .chain([full.len()])
            .nth(cut.min(full.chars().count()))
            .unwrap_or(full.len());
        let _ = extract_json(&full[..boundary]);
    }
}
