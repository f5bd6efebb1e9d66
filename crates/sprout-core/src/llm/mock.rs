//! Scripted provider double for tests and offline demos

use super::messages::{GenerationRequest, GenerationResponse};
use super::provider::LlmProvider;
use crate::error::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted outcome for a provider call
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Succeed with the given text
    Success {
        text: String,
        input_tokens: usize,
        output_tokens: usize,
        delay: Duration,
    },
    /// Fail with the given transport error
    Failure(ProviderError),
}

impl ScriptedReply {
    /// A successful reply with token counts derived from the text
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Success {
            input_tokens: 50,
            output_tokens: text.len() / 4 + 1,
            text,
            delay: Duration::ZERO,
        }
    }

    /// A successful reply with explicit token counts
    pub fn text_with_tokens(text: impl Into<String>, input_tokens: usize, output_tokens: usize) -> Self {
        Self::Success {
            text: text.into(),
            input_tokens,
            output_tokens,
            delay: Duration::ZERO,
        }
    }

    /// A reply that arrives only after the given delay
    pub fn delayed(delay: Duration, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Success {
            input_tokens: 50,
            output_tokens: text.len() / 4 + 1,
            text,
            delay,
        }
    }

    /// A 429 rate-limit failure
    pub fn rate_limited() -> Self {
        Self::Failure(ProviderError::with_status("too many requests", 429))
    }

    /// A 401 auth failure
    pub fn auth_failure() -> Self {
        Self::Failure(ProviderError::with_status("invalid api key", 401))
    }

    /// A 503 maintenance failure
    pub fn maintenance() -> Self {
        Self::Failure(ProviderError::with_status("down for maintenance", 503))
    }

    /// A connection failure
    pub fn unreachable() -> Self {
        Self::Failure(ProviderError::connection("connection refused"))
    }
}

/// Provider that replays a fixed script of outcomes
///
/// Calls past the end of the script fail, unless [`repeat_last`] was set, in
/// which case the final entry repeats forever.
///
/// [`repeat_last`]: ScriptedProvider::repeat_last
pub struct ScriptedProvider {
    script: Mutex<Vec<ScriptedReply>>,
    calls: AtomicUsize,
    repeat_last: bool,
}

impl ScriptedProvider {
    /// Create a provider that replays the given script in order
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            repeat_last: false,
        }
    }

    /// Provider that always succeeds with the same text
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedReply::text(text)]).repeat_last()
    }

    /// Keep replaying the final script entry instead of failing
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let script = self.script.lock();
            if script.is_empty() {
                None
            } else if index < script.len() {
                Some(script[index].clone())
            } else if self.repeat_last {
                Some(script[script.len() - 1].clone())
            } else {
                None
            }
        };

        match reply {
            Some(ScriptedReply::Success {
                text,
                input_tokens,
                output_tokens,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(GenerationResponse {
                    text,
                    input_tokens,
                    output_tokens,
                })
            }
            Some(ScriptedReply::Failure(error)) => Err(error),
            None => Err(ProviderError::other("scripted provider ran out of replies")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ModelTier};

    fn request() -> GenerationRequest {
        GenerationRequest::new(vec![ChatMessage::user("hi")], "tutor", ModelTier::Balanced)
    }

    #[tokio::test]
    async fn test_script_plays_in_order() {
        let provider = ScriptedProvider::new(vec![
            ScriptedReply::text("first"),
            ScriptedReply::text("second"),
        ]);

        assert_eq!(provider.generate(request()).await.unwrap().text, "first");
        assert_eq!(provider.generate(request()).await.unwrap().text, "second");
        assert!(provider.generate(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_always_repeats() {
        let provider = ScriptedProvider::always("same");
        for _ in 0..5 {
            assert_eq!(provider.generate(request()).await.unwrap().text, "same");
        }
        assert_eq!(provider.calls(), 5);
    }
}
