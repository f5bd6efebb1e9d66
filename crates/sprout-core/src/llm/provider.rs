//! The external LLM provider contract

use super::messages::{GenerationRequest, GenerationResponse};
use crate::error::ProviderError;
use async_trait::async_trait;

/// External text-generation service
///
/// Implementations live outside this crate (HTTP clients, on-device models).
/// Failures must be reported as [`ProviderError`] so the classifier can map
/// them onto the fallback taxonomy; implementations should never panic on
/// transport trouble.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the request
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &str {
        "llm"
    }
}
