//! LLM provider boundary
//!
//! The provider itself is an external collaborator; this module defines the
//! request/response types, the cost/quality tiers, the retry wrapper for
//! transient failures, and the FIFO replay queue for utterances deferred
//! during an outage.

pub mod messages;
pub mod mock;
pub mod provider;
pub mod replay;
pub mod retry;
pub mod tier;

pub use messages::{ChatMessage, GenerationRequest, GenerationResponse, MessageRole};
pub use mock::{ScriptedProvider, ScriptedReply};
pub use provider::LlmProvider;
pub use replay::{QueuedUtterance, ReplayQueue};
pub use retry::{RetryPolicy, generate_with_retry};
pub use tier::{ModelTier, RequestPriority};
