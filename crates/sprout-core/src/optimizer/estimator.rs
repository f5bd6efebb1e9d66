//! Token estimation for provider requests
//!
//! Exact tokenization varies by provider, so estimates use the common
//! characters-per-token approximation with a per-message overhead.

use crate::llm::ChatMessage;

/// Token estimator for chat messages
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    /// Characters per token (average for English text)
    chars_per_token: f32,
    /// Overhead tokens per message (role, formatting)
    message_overhead: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimator {
    /// Create an estimator with the common 4-chars-per-token approximation
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
            message_overhead: 4,
        }
    }

    /// Estimate tokens for a string
    pub fn estimate_string(&self, text: &str) -> usize {
        (text.len() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimate tokens for a single message
    pub fn estimate_message(&self, message: &ChatMessage) -> usize {
        self.estimate_string(&message.content) + self.message_overhead
    }

    /// Estimate tokens for a conversation
    pub fn estimate_conversation(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }

    /// Estimate tokens for a full request (messages + instructions)
    pub fn estimate_request(&self, messages: &[ChatMessage], instructions: &str) -> usize {
        self.estimate_conversation(messages) + self.estimate_string(instructions) + 10
    }
}
