//! Request and response types for the provider boundary

use super::tier::ModelTier;
use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// System message (instructions, synthetic summaries)
    System,
    /// Learner utterance
    User,
    /// Tutor reply
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A generation request handed to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Conversation history, oldest first
    pub messages: Vec<ChatMessage>,
    /// Standing instructions for the tutor persona
    pub instructions: String,
    /// Cost/quality tier to bill against
    pub tier: ModelTier,
    /// Output token ceiling
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a request with the given messages and instructions
    pub fn new(messages: Vec<ChatMessage>, instructions: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            messages,
            instructions: instructions.into(),
            tier,
            max_tokens: 512,
            temperature: 0.7,
        }
    }

    /// Set the output token ceiling
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A successful provider response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,
    /// Tokens consumed by the prompt
    pub input_tokens: usize,
    /// Tokens in the generated text
    pub output_tokens: usize,
}

impl GenerationResponse {
    /// Total tokens billed for this call
    pub fn total_tokens(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}
