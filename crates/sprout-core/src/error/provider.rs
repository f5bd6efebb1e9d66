//! Provider transport error classification
//!
//! Transport failures from the LLM provider are reduced to a small taxonomy
//! that the fallback policy table is keyed on. Classification is a pure
//! function of the transport status code and flags: the same error always
//! maps to the same kind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A transport-level failure raised by the LLM provider
#[derive(Error, Debug, Clone)]
#[error("Provider error: {message}")]
pub struct ProviderError {
    /// Human-readable description from the transport layer
    pub message: String,
    /// HTTP status code if the failure carried one
    pub status_code: Option<u16>,
    /// The request exceeded its deadline
    pub timed_out: bool,
    /// The connection could not be established at all
    pub connection_failed: bool,
}

impl ProviderError {
    /// Create an error from a status code
    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code: Some(status_code),
            timed_out: false,
            connection_failed: false,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            timed_out: true,
            connection_failed: false,
        }
    }

    /// Create a connection failure
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            timed_out: false,
            connection_failed: true,
        }
    }

    /// Create an unclassified error
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            timed_out: false,
            connection_failed: false,
        }
    }

    /// Classify this error into the fallback taxonomy
    pub fn kind(&self) -> ErrorKind {
        classify_provider_error(self)
    }
}

/// Classified provider failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider refused the request due to rate limiting or quota
    RateLimit,
    /// The call exceeded its deadline
    Timeout,
    /// No route to the provider at all
    NetworkUnavailable,
    /// Credentials rejected; retrying cannot help
    AuthFailure,
    /// Provider is down for maintenance or overloaded
    ServiceMaintenance,
    /// Anything that does not match a known pattern
    Unknown,
}

impl ErrorKind {
    /// Whether this kind represents transient unavailability that offline
    /// fallback content may paper over
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::AuthFailure)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Timeout => write!(f, "timeout"),
            Self::NetworkUnavailable => write!(f, "network_unavailable"),
            Self::AuthFailure => write!(f, "auth_failure"),
            Self::ServiceMaintenance => write!(f, "service_maintenance"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Map a transport error onto the taxonomy
///
/// Status codes win over flags, flags win over message sniffing, and
/// anything unrecognized is `Unknown`.
pub fn classify_provider_error(error: &ProviderError) -> ErrorKind {
    if let Some(status) = error.status_code {
        match status {
            429 => return ErrorKind::RateLimit,
            401 | 403 => return ErrorKind::AuthFailure,
            408 => return ErrorKind::Timeout,
            503 => return ErrorKind::ServiceMaintenance,
            500..=599 => return ErrorKind::ServiceMaintenance,
            _ => {}
        }
    }

    if error.timed_out {
        return ErrorKind::Timeout;
    }
    if error.connection_failed {
        return ErrorKind::NetworkUnavailable;
    }

    let message = error.message.to_lowercase();
    if message.contains("rate limit") || message.contains("quota") {
        ErrorKind::RateLimit
    } else if message.contains("timeout") || message.contains("timed out") {
        ErrorKind::Timeout
    } else if message.contains("connection") || message.contains("network") {
        ErrorKind::NetworkUnavailable
    } else if message.contains("unauthorized") || message.contains("invalid api key") {
        ErrorKind::AuthFailure
    } else if message.contains("maintenance") || message.contains("overloaded") {
        ErrorKind::ServiceMaintenance
    } else {
        ErrorKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_classification() {
        assert_eq!(
            classify_provider_error(&ProviderError::with_status("too many requests", 429)),
            ErrorKind::RateLimit
        );
        assert_eq!(
            classify_provider_error(&ProviderError::with_status("bad key", 401)),
            ErrorKind::AuthFailure
        );
        assert_eq!(
            classify_provider_error(&ProviderError::with_status("forbidden", 403)),
            ErrorKind::AuthFailure
        );
        assert_eq!(
            classify_provider_error(&ProviderError::with_status("down for upgrades", 503)),
            ErrorKind::ServiceMaintenance
        );
    }

    #[test]
    fn test_flag_classification() {
        assert_eq!(
            classify_provider_error(&ProviderError::timeout("deadline exceeded")),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify_provider_error(&ProviderError::connection("refused")),
            ErrorKind::NetworkUnavailable
        );
    }

    #[test]
    fn test_message_classification() {
        assert_eq!(
            classify_provider_error(&ProviderError::other("monthly quota exhausted")),
            ErrorKind::RateLimit
        );
        assert_eq!(
            classify_provider_error(&ProviderError::other("something exploded")),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_classification_is_stable() {
        // The same error must always map to the same kind
        let err = ProviderError::with_status("slow down", 429);
        for _ in 0..10 {
            assert_eq!(classify_provider_error(&err), ErrorKind::RateLimit);
        }
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::RateLimit.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::ServiceMaintenance.is_transient());
        assert!(!ErrorKind::AuthFailure.is_transient());
    }
}
