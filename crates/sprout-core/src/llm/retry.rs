//! In-call retry with exponential backoff
//!
//! Wraps a provider call in a deadline and retries transient failures with
//! exponential backoff. The backoff here is the short in-call kind (capped at
//! 10 s); the longer `wait_time` advice in the fallback policy table governs
//! replay, not these retries.

use super::messages::{GenerationRequest, GenerationResponse};
use super::provider::LlmProvider;
use crate::config::FallbackConfig;
use crate::error::ProviderError;
use crate::fallback::policy_for;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Retry timing policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before giving up (the first call counts as one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Delay ceiling
    pub max_delay: Duration,
    /// Per-call deadline
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Derive the retry policy from fallback configuration
    pub fn from_config(config: &FallbackConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_backoff,
            max_delay: config.max_backoff,
            call_timeout: config.provider_timeout,
        }
    }

    /// Backoff delay for the given attempt (0-indexed), doubling and capped
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

/// Call the provider, retrying transient failures
///
/// A call that exceeds the deadline is treated as a `Timeout` transport
/// error. Retries only happen for kinds whose fallback policy says retry;
/// an `AuthFailure` returns immediately.
pub async fn generate_with_retry(
    provider: &dyn LlmProvider,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<GenerationResponse, ProviderError> {
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        let result = match timeout(policy.call_timeout, provider.generate(request.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(format!(
                "provider call exceeded {:?}",
                policy.call_timeout
            ))),
        };

        match result {
            Ok(response) => {
                if attempt > 0 {
                    tracing::info!(provider = provider.name(), attempt, "provider call recovered");
                }
                return Ok(response);
            }
            Err(error) => {
                let kind = error.kind();
                let retryable = policy_for(kind).should_retry && attempt + 1 < policy.max_attempts;
                tracing::warn!(
                    provider = provider.name(),
                    %kind,
                    attempt,
                    retryable,
                    "provider call failed: {}",
                    error
                );
                last_error = Some(error);
                if !retryable {
                    break;
                }
                sleep(policy.delay_for_attempt(attempt)).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::other("no attempts were made")))
}
