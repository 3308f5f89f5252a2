//! Deterministic LLM client for tests and offline demo runs.

use std::cell::RefCell;

use super::{Completion, FinishReason, GenerationConfig, LlmClient, LlmError};

/// Replays a fixed queue of outcomes, one per `generate` call.
///
/// Once the queue is exhausted, further calls fail with a transport error so
/// a test that over-calls the client fails loudly instead of looping.
pub struct ScriptedClient {
    responses: RefCell<Vec<Result<Completion, LlmError>>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<Completion, LlmError>>) -> Self {
        let mut responses = responses;
        responses.reverse(); // pop from the back in call order
        Self { responses: RefCell::new(responses) }
    }

    /// Queue of plain text responses.
    pub fn with_texts<S: Into<String>>(texts: Vec<S>) -> Self {
        Self::new(
            texts
                .into_iter()
                .map(|t| {
                    Ok(Completion::Text {
                        text: t.into(),
                        finish_reason: FinishReason::Stop,
                    })
                })
                .collect(),
        )
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<Completion, LlmError> {
        self.responses
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Err(LlmError::Transport("scripted client exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_call_order_then_fails() {
        let client = ScriptedClient::with_texts(vec!["first", "second"]);
        let config = GenerationConfig::default();
        assert_eq!(client.generate("s", "u", &config).unwrap().text().unwrap(), "first");
        assert_eq!(client.generate("s", "u", &config).unwrap().text().unwrap(), "second");
        assert!(client.generate("s", "u", &config).is_err());
    }
}
