//! FIFO replay queue for utterances deferred during provider outages
//!
//! When a turn degrades to fallback content, the utterance that triggered it
//! may be queued here; once a later call succeeds, the owning session drains
//! its queue in arrival order.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// An utterance waiting to be replayed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedUtterance {
    pub session_id: String,
    pub text: String,
    pub queued_at: DateTime<Utc>,
}

/// Per-session FIFO queues, bounded per session
#[derive(Debug)]
pub struct ReplayQueue {
    queues: Mutex<HashMap<String, VecDeque<QueuedUtterance>>>,
    capacity_per_session: usize,
}

impl ReplayQueue {
    /// Create a replay queue with the given per-session bound
    pub fn new(capacity_per_session: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity_per_session: capacity_per_session.max(1),
        }
    }

    /// Queue an utterance; the oldest entry is dropped when the session's
    /// queue is full
    pub fn push(&self, session_id: &str, text: impl Into<String>) {
        let mut queues = self.queues.lock();
        let queue = queues.entry(session_id.to_string()).or_default();
        if queue.len() >= self.capacity_per_session {
            let dropped = queue.pop_front();
            if let Some(dropped) = dropped {
                tracing::warn!(
                    session_id,
                    "replay queue full, dropping oldest utterance: {:?}",
                    dropped.text
                );
            }
        }
        queue.push_back(QueuedUtterance {
            session_id: session_id.to_string(),
            text: text.into(),
            queued_at: Utc::now(),
        });
    }

    /// Take every queued utterance for a session, oldest first
    pub fn drain_session(&self, session_id: &str) -> Vec<QueuedUtterance> {
        let mut queues = self.queues.lock();
        queues
            .remove(session_id)
            .map(|queue| queue.into_iter().collect())
            .unwrap_or_default()
    }

    /// Queued utterances for a session
    pub fn len(&self, session_id: &str) -> usize {
        self.queues.lock().get(session_id).map_or(0, VecDeque::len)
    }

    /// Whether a session has nothing queued
    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    /// Drop a session's queue without replaying (session ended)
    pub fn discard_session(&self, session_id: &str) {
        self.queues.lock().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = ReplayQueue::new(10);
        queue.push("s1", "first");
        queue.push("s1", "second");
        queue.push("s1", "third");

        let drained = queue.drain_session("s1");
        let texts: Vec<_> = drained.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(queue.is_empty("s1"));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let queue = ReplayQueue::new(2);
        queue.push("s1", "a");
        queue.push("s1", "b");
        queue.push("s1", "c");

        let drained = queue.drain_session("s1");
        let texts: Vec<_> = drained.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let queue = ReplayQueue::new(10);
        queue.push("s1", "for s1");
        queue.push("s2", "for s2");

        assert_eq!(queue.len("s1"), 1);
        assert_eq!(queue.drain_session("s2").len(), 1);
        assert_eq!(queue.len("s1"), 1);
    }

    #[test]
    fn test_discard() {
        let queue = ReplayQueue::new(10);
        queue.push("s1", "orphaned");
        queue.discard_session("s1");
        assert!(queue.drain_session("s1").is_empty());
    }
}
