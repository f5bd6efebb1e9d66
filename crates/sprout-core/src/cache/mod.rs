//! Response cache
//!
//! Prior LLM outputs keyed by normalized prompt + module, with fuzzy reuse
//! for near-identical prompts. Lookup and store are synchronous and bounded;
//! the only slow thing in a turn is the provider call itself.

pub mod response_cache;
pub mod types;

pub use response_cache::{CacheHit, ResponseCache};
pub use types::{CacheStats, CacheTier, CachedResponse, cache_key, jaccard_similarity, normalize_prompt, word_set};
