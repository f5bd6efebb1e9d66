//! Session types
//!
//! A session is one continuous tutoring interaction between a learner and
//! the system for a given topic module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique session identifier
pub type SessionId = String;

/// Learner energy, classified per utterance by lexicon heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    High,
    Medium,
    Low,
}

impl Default for EnergyLevel {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyLevel::High => write!(f, "high"),
            EnergyLevel::Medium => write!(f, "medium"),
            EnergyLevel::Low => write!(f, "low"),
        }
    }
}

/// How the learner is doing in this session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Struggling,
    Progressing,
    Excelling,
}

impl Default for PerformanceLevel {
    fn default() -> Self {
        Self::Progressing
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceLevel::Struggling => write!(f, "struggling"),
            PerformanceLevel::Progressing => write!(f, "progressing"),
            PerformanceLevel::Excelling => write!(f, "excelling"),
        }
    }
}

/// Session lifecycle state
///
/// `Created → Active → (BreakSuggested) → Active | Ended → Ended`; `Ended`
/// is terminal. `BreakSuggested` can be entered at most once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Active,
    BreakSuggested,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Active => write!(f, "active"),
            SessionState::BreakSuggested => write!(f, "break_suggested"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// Per-conversation session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub module: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    pub energy_level: EnergyLevel,
    pub performance_level: PerformanceLevel,
    pub message_count: u32,
    /// Topics in first-mention order, no duplicates
    pub topics_discussed: Vec<String>,
    pub mastered_concepts: BTreeSet<String>,
    pub review_concepts: BTreeSet<String>,
    pub mission_progress_pct: f32,
    /// One-way flag: flips to true at most once, never back
    pub break_suggested: bool,
}

impl Session {
    /// Allocate a new session in the `Created` state
    pub fn new(user_id: impl Into<String>, module: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            module: module.into(),
            state: SessionState::Created,
            started_at: now,
            last_interaction_at: now,
            energy_level: EnergyLevel::default(),
            performance_level: PerformanceLevel::default(),
            message_count: 0,
            topics_discussed: Vec::new(),
            mastered_concepts: BTreeSet::new(),
            review_concepts: BTreeSet::new(),
            mission_progress_pct: 0.0,
            break_suggested: false,
        }
    }

    /// Record a topic, keeping first-mention order and uniqueness
    pub fn note_topic(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        if !self.topics_discussed.contains(&topic) {
            self.topics_discussed.push(topic);
        }
    }

    /// Elapsed time since the session started
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.started_at
    }

    /// Whether the session has been idle past the given timeout
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
        (now - self.last_interaction_at).to_std().unwrap_or_default() >= timeout
    }
}

/// Summary produced when a session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub user_id: String,
    pub module: String,
    pub duration_seconds: i64,
    pub message_count: u32,
    pub topics_discussed: Vec<String>,
    /// Concepts newly flagged mastered during this session
    pub concepts_mastered: Vec<String>,
    /// Concepts queued for review
    pub concepts_to_review: Vec<String>,
    pub final_energy: EnergyLevel,
    pub final_performance: PerformanceLevel,
    pub break_was_suggested: bool,
    /// USD spent on provider calls during this session
    pub session_cost: f64,
    /// Short human-readable highlights
    pub key_insights: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_created() {
        let session = Session::new("u1", "math");
        assert_eq!(session.state, SessionState::Created);
        assert_eq!(session.message_count, 0);
        assert!(!session.break_suggested);
    }

    #[test]
    fn test_topics_are_ordered_and_unique() {
        let mut session = Session::new("u1", "math");
        session.note_topic("fractions");
        session.note_topic("decimals");
        session.note_topic("fractions");
        assert_eq!(session.topics_discussed, vec!["fractions", "decimals"]);
    }

    #[test]
    fn test_idle_detection() {
        let mut session = Session::new("u1", "math");
        session.last_interaction_at = Utc::now() - chrono::Duration::hours(3);
        assert!(session.is_idle(Utc::now(), std::time::Duration::from_secs(2 * 3600)));
        assert!(!session.is_idle(Utc::now(), std::time::Duration::from_secs(4 * 3600)));
    }
}
