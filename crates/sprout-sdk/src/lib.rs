//! Sprout SDK
//!
//! High-level facade over `sprout-core`: construct a [`TutoringService`]
//! with your LLM provider and storage, and it wires up the session
//! orchestrator, memory, cache, cost tracking, fallback handling, and the
//! background jobs (cache maintenance, idle sweep, batch drain, weekly
//! pre-generation) with graceful shutdown.

mod generator;
mod service;

pub use generator::PipelineGenerator;
pub use service::{TutoringService, TutoringServiceBuilder};

// Re-export the core surface callers interact with
pub use sprout_core::{
    BatchPriority, CacheStats, ErrorKind, FallbackContentItem, GuardianEvent, GuardianNotifier,
    KeyValueStorage, LlmProvider, ModelTier, ProviderError, RequestPriority, SproutError,
    SproutResult, TutorConfig, UsageStats,
};
pub use sprout_core::fallback::ContentType;
pub use sprout_core::session::{SessionStart, SessionSummary, TurnReply};
