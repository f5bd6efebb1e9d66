//! Session orchestration
//!
//! The per-conversation state machine and the turn pipeline that strings
//! together memory, optimization, cache, provider, and fallback.

pub mod heuristics;
pub mod orchestrator;
pub mod types;

pub use heuristics::{classify_energy, classify_performance};
pub use orchestrator::{SessionOrchestrator, SessionStart, TurnContext, TurnReply};
pub use types::{
    EnergyLevel, PerformanceLevel, Session, SessionId, SessionState, SessionSummary,
};
