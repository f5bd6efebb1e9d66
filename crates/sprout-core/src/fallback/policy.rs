//! The fixed failure policy table

use super::bank::FallbackBank;
use super::types::FallbackContentItem;
use crate::error::{ErrorKind, ProviderError};
use std::time::Duration;

/// What to do about one classified failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Retry the call (short in-call backoff) and later replay
    pub should_retry: bool,
    /// Advisory wait before the provider is worth trying again
    pub wait_time: Duration,
    /// Serve offline content for this turn
    pub use_fallback: bool,
    /// Queue the utterance for FIFO replay
    pub queue_for_replay: bool,
    /// Tell a guardian
    pub notify_guardian: bool,
}

/// The policy row for a failure kind
///
/// Total and pure: every kind has exactly one row.
pub fn policy_for(kind: ErrorKind) -> ErrorPolicy {
    match kind {
        ErrorKind::RateLimit => ErrorPolicy {
            should_retry: true,
            wait_time: Duration::from_secs(60),
            use_fallback: true,
            queue_for_replay: true,
            notify_guardian: false,
        },
        ErrorKind::Timeout => ErrorPolicy {
            should_retry: true,
            wait_time: Duration::from_secs(10),
            use_fallback: true,
            queue_for_replay: true,
            notify_guardian: false,
        },
        ErrorKind::NetworkUnavailable => ErrorPolicy {
            should_retry: true,
            wait_time: Duration::from_secs(30),
            use_fallback: true,
            queue_for_replay: true,
            notify_guardian: false,
        },
        ErrorKind::AuthFailure => ErrorPolicy {
            should_retry: false,
            wait_time: Duration::ZERO,
            use_fallback: false,
            queue_for_replay: false,
            notify_guardian: true,
        },
        ErrorKind::ServiceMaintenance => ErrorPolicy {
            should_retry: true,
            wait_time: Duration::from_secs(300),
            use_fallback: true,
            queue_for_replay: true,
            notify_guardian: true,
        },
        ErrorKind::Unknown => ErrorPolicy {
            should_retry: true,
            wait_time: Duration::from_secs(15),
            use_fallback: true,
            queue_for_replay: false,
            notify_guardian: false,
        },
    }
}

/// A degraded resolution for a failed provider call
#[derive(Debug, Clone)]
pub struct FallbackResolution {
    /// Classified failure kind
    pub kind: ErrorKind,
    /// The policy row that was applied
    pub policy: ErrorPolicy,
    /// Offline content to serve, when the policy allows and the bank has any
    pub payload: Option<FallbackContentItem>,
}

/// Turn a provider failure into a degraded response decision
///
/// Only transient kinds draw from the bank; a module with an empty bank
/// yields no payload and the caller serves the generic retry message.
pub fn resolve_failure(
    error: &ProviderError,
    module: &str,
    bank: &FallbackBank,
) -> FallbackResolution {
    let kind = error.kind();
    let policy = policy_for(kind);
    let payload = if policy.use_fallback && kind.is_transient() {
        bank.pick(module)
    } else {
        None
    };

    tracing::warn!(
        %kind,
        module,
        should_retry = policy.should_retry,
        wait_secs = policy.wait_time.as_secs(),
        has_payload = payload.is_some(),
        "provider failure degraded to fallback"
    );

    FallbackResolution {
        kind,
        policy,
        payload,
    }
}
