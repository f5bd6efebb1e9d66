//! Cost-aware request optimization
//!
//! Shrinks conversation history before it reaches the provider: the opening
//! message and a recent window survive verbatim, the middle collapses into
//! one synthetic keyword summary, near-duplicates are dropped, and verbose
//! per-module instructions are swapped for precompiled compact templates.

pub mod compressor;
pub mod estimator;
pub mod keywords;
pub mod templates;

pub use compressor::{OptimizedRequest, RequestOptimizer};
pub use estimator::TokenEstimator;
pub use keywords::extract_keywords;
pub use templates::compact_instructions;
