//! Core error types for Sprout

use thiserror::Error;

/// Result type alias for Sprout operations
pub type SproutResult<T> = Result<T, SproutError>;

/// Main error type for Sprout
///
/// Each variant carries contextual information where relevant. Provider
/// transport failures are deliberately not a variant here: they are handled
/// by the classification/fallback path and never propagate raw.
#[derive(Error, Debug, Clone)]
pub enum SproutError {
    /// Session lifecycle errors
    #[error("Session error: {message}")]
    Session {
        message: String,
        session_id: Option<String>,
    },

    /// Session id is stale or unknown; the caller must start a new session
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Memory consolidation errors
    #[error("Memory error: {message}")]
    Memory {
        message: String,
        user_id: Option<String>,
    },

    /// Response cache errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Cost tracking / ledger errors
    #[error("Cost tracking error: {message}")]
    Cost { message: String },

    /// Batch scheduling errors
    #[error("Batch error: {message}")]
    Batch { message: String },

    /// Storage backend errors
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        key: Option<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// Invalid input errors
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// Generic errors
    #[error("{message}")]
    Other { message: String },
}

impl SproutError {
    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
            session_id: None,
        }
    }

    /// Create a session error tied to a specific session
    pub fn session_with_id(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
            session_id: Some(session_id.into()),
        }
    }

    /// Create a session-not-found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
            user_id: None,
        }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a cost tracking error
    pub fn cost(message: impl Into<String>) -> Self {
        Self::Cost {
            message: message.into(),
        }
    }

    /// Create a batch error
    pub fn batch(message: impl Into<String>) -> Self {
        Self::Batch {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            key: None,
        }
    }

    /// Create a storage error for a specific key
    pub fn storage_with_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SproutError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SproutError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            key: None,
        }
    }
}
