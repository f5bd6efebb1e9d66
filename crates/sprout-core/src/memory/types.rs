//! Memory types: short-term entries, the long-term profile, and mastery

use crate::session::EnergyLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What one session left behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortTermMemoryEntry {
    pub session_id: String,
    pub date: DateTime<Utc>,
    pub module: String,
    pub topics: Vec<String>,
    pub mistakes: Vec<String>,
    pub vocabulary_used: Vec<String>,
    pub energy: EnergyLevel,
}

/// A ranked interest with a decaying strength
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    pub name: String,
    /// 0–10; derived from mention count, decays with staleness
    pub strength: f32,
    pub mention_count: u32,
    pub last_mentioned: DateTime<Utc>,
}

impl Interest {
    /// Strength after applying staleness decay, floored at 1 while retained
    pub fn effective_strength(&self, now: DateTime<Utc>, decay_per_week: f32) -> f32 {
        let weeks = (now - self.last_mentioned).num_weeks().max(0) as f32;
        (self.strength - weeks * decay_per_week).max(1.0)
    }
}

/// Preferred learning channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningChannel {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
}

/// Primary and optional secondary channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LearningStyle {
    pub primary: LearningChannel,
    pub secondary: Option<LearningChannel>,
}

impl Default for LearningStyle {
    fn default() -> Self {
        Self {
            primary: LearningChannel::Visual,
            secondary: None,
        }
    }
}

/// Long-lived per-user profile, updated incrementally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermProfile {
    pub user_id: String,
    pub interests: Vec<Interest>,
    pub learning_style: LearningStyle,
    pub favorite_topics: Vec<String>,
    pub challenging_concepts: Vec<String>,
    pub personality_traits: Vec<String>,
    pub recurring_questions: Vec<String>,
    /// 0–100, nudged up by positive signals
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LongTermProfile {
    /// Create an empty profile for a user
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            interests: Vec::new(),
            learning_style: LearningStyle::default(),
            favorite_topics: Vec::new(),
            challenging_concepts: Vec::new(),
            personality_traits: Vec::new(),
            recurring_questions: Vec::new(),
            confidence: 50.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Accuracy over repeated attempts at one concept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptMasteryRecord {
    pub concept: String,
    pub module: String,
    pub attempts: u32,
    pub correct_attempts: u32,
    /// Monotonic: false→true only, never back
    pub mastered: bool,
    /// Blended 0–1 estimate (existing*0.7 + new*0.3 per update batch)
    pub mastery_level: f64,
    pub first_seen: DateTime<Utc>,
    /// Elapsed hours from first observation to the mastery flag
    pub hours_to_mastery: Option<f64>,
}

impl ConceptMasteryRecord {
    /// Start tracking a concept
    pub fn new(concept: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            module: module.into(),
            attempts: 0,
            correct_attempts: 0,
            mastered: false,
            mastery_level: 0.0,
            first_seen: Utc::now(),
            hours_to_mastery: None,
        }
    }

    /// Overall accuracy so far
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct_attempts as f64 / self.attempts as f64
        }
    }

    /// Record one attempt and re-evaluate the mastery flag
    ///
    /// The flag check is irreversible: once set it stays set even if
    /// accuracy later drops.
    pub fn record_attempt(
        &mut self,
        correct: bool,
        now: DateTime<Utc>,
        min_attempts: u32,
        required_accuracy: f64,
    ) {
        self.attempts += 1;
        if correct {
            self.correct_attempts += 1;
        }
        if !self.mastered
            && self.attempts >= min_attempts
            && self.accuracy() >= required_accuracy
        {
            self.mastered = true;
            self.hours_to_mastery =
                Some((now - self.first_seen).num_seconds().max(0) as f64 / 3600.0);
        }
    }
}

/// Signals extracted from a turn or session, fed into the profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningSignals {
    /// Topics the learner brought up
    pub topics_mentioned: Vec<String>,
    /// Concept attempts observed: (concept, module, correct)
    pub concept_attempts: Vec<(String, String, bool)>,
    /// Questions asked, for recurring-question tracking
    pub questions: Vec<String>,
    /// Positive signals (correct answers, enthusiasm) for confidence
    pub positive_signals: u32,
}

/// What the consolidator hands the optimizer for a new session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalContext {
    /// Personalized greeting
    pub greeting: String,
    /// Topics ranked by interest strength, recency breaking ties
    pub suggested_topics: Vec<String>,
    /// Topics covered recently, to avoid repetition
    pub avoid_topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mastery_flag_requires_attempts_and_accuracy() {
        let now = Utc::now();
        let mut record = ConceptMasteryRecord::new("multiplication", "math");

        // Four correct attempts: accuracy fine, volume not
        for _ in 0..4 {
            record.record_attempt(true, now, 5, 0.8);
        }
        assert!(!record.mastered);

        // Fifth correct attempt crosses both bars
        record.record_attempt(true, now, 5, 0.8);
        assert!(record.mastered);
        assert!(record.hours_to_mastery.is_some());
    }

    #[test]
    fn test_mastery_never_reverts() {
        let now = Utc::now();
        let mut record = ConceptMasteryRecord::new("division", "math");
        for _ in 0..5 {
            record.record_attempt(true, now, 5, 0.8);
        }
        assert!(record.mastered);

        // A run of failures drops accuracy below the bar but not the flag
        for _ in 0..10 {
            record.record_attempt(false, now, 5, 0.8);
        }
        assert!(record.accuracy() < 0.8);
        assert!(record.mastered);
    }

    #[test]
    fn test_low_accuracy_blocks_mastery() {
        let now = Utc::now();
        let mut record = ConceptMasteryRecord::new("fractions", "math");
        for i in 0..10 {
            record.record_attempt(i % 2 == 0, now, 5, 0.8);
        }
        assert!(!record.mastered);
    }

    #[test]
    fn test_interest_decay() {
        let now = Utc::now();
        let interest = Interest {
            name: "dinosaurs".into(),
            strength: 8.0,
            mention_count: 4,
            last_mentioned: now - chrono::Duration::weeks(3),
        };
        assert!((interest.effective_strength(now, 1.0) - 5.0).abs() < 1e-6);

        // Decay floors at 1 while the interest is retained
        let stale = Interest {
            last_mentioned: now - chrono::Duration::weeks(50),
            ..interest
        };
        assert!((stale.effective_strength(now, 1.0) - 1.0).abs() < 1e-6);
    }
}
