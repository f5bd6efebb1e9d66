//! Guardian notification channel
//!
//! Fire-and-forget: failures are ignored and never observed by the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event a guardian may want to know about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Short machine-readable kind ("auth_failure", "cost_alert", ...)
    pub kind: String,
    pub message: String,
}

impl GuardianEvent {
    /// Create an event
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Attach the user this event concerns
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach the session this event concerns
    pub fn for_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Outbound notification channel to a guardian
#[async_trait]
pub trait GuardianNotifier: Send + Sync {
    /// Deliver an event; implementations swallow their own failures
    async fn notify(&self, event: GuardianEvent);
}

/// Default notifier that just logs the event
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl GuardianNotifier for LogNotifier {
    async fn notify(&self, event: GuardianEvent) {
        tracing::info!(
            kind = %event.kind,
            user_id = ?event.user_id,
            session_id = ?event.session_id,
            "guardian notification: {}",
            event.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        notifier
            .notify(GuardianEvent::new("cost_alert", "daily spend crossed $0.80").for_user("u1"))
            .await;
    }
}
