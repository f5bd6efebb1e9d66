//! Memory consolidation
//!
//! Builds personalized context for each user out of a bounded ring of
//! recent-session entries plus a long-lived profile, and folds per-turn
//! learning signals back into both.

pub mod consolidator;
pub mod greetings;
pub mod types;

pub use consolidator::{MasteryDelta, MemoryConsolidator};
pub use greetings::{GreetingCondition, greeting_for};
pub use types::{
    ConceptMasteryRecord, Interest, LearningChannel, LearningSignals, LearningStyle,
    LongTermProfile, PersonalContext, ShortTermMemoryEntry,
};
