//! Configuration for the tutoring mediation layer
//!
//! Every policy constant the components consult lives here: break thresholds,
//! cache TTLs, the fuzzy-match similarity bar, the daily budget. Values are
//! plain serde structs with code defaults, optionally overridden from a TOML
//! file.

use crate::llm::ModelTier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{SproutError, SproutResult};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    pub session: SessionConfig,
    pub memory: MemoryConfig,
    pub optimizer: OptimizerConfig,
    pub cache: CacheConfig,
    pub cost: CostConfig,
    pub fallback: FallbackConfig,
    pub batch: BatchConfig,
}

impl TutorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> SproutResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> SproutResult<Self> {
        toml::from_str(raw).map_err(|e| SproutError::config(format!("invalid config: {e}")))
    }
}

/// Session lifecycle policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Suggest a break once a session has run this long
    #[serde(with = "humantime_serde")]
    pub break_after: Duration,
    /// Suggest a break once this many messages have been exchanged
    pub break_message_threshold: u32,
    /// Archive sessions idle for this long
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// How often the idle sweep runs
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            break_after: Duration::from_secs(20 * 60),
            break_message_threshold: 15,
            idle_timeout: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Memory consolidation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Short-term entries retained per user
    pub short_term_capacity: usize,
    /// Sessions whose topics go on the avoid-list
    pub avoid_window: usize,
    /// Interests kept before the weakest are dropped
    pub max_interests: usize,
    /// Strength points an interest loses per week of silence
    pub interest_decay_per_week: f32,
    /// Attempts required before mastery can be flagged
    pub mastery_min_attempts: u32,
    /// Accuracy required before mastery can be flagged
    pub mastery_accuracy: f64,
    /// Weight of the existing mastery level when blending in new evidence
    pub mastery_blend_existing: f64,
    /// Confidence points added per positive signal, capped at 100
    pub confidence_increment: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 10,
            avoid_window: 3,
            max_interests: 12,
            interest_decay_per_week: 1.0,
            mastery_min_attempts: 5,
            mastery_accuracy: 0.8,
            mastery_blend_existing: 0.7,
            confidence_increment: 5.0,
        }
    }
}

/// Request optimization policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Most recent messages kept verbatim
    pub recent_window: usize,
    /// Drop near-identical messages before sending
    pub deduplicate: bool,
    /// Keywords retained in the synthetic summary message
    pub max_summary_keywords: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            recent_window: 10,
            deduplicate: true,
            max_summary_keywords: 8,
        }
    }
}

/// Response cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries kept before eviction kicks in
    pub capacity: usize,
    /// Fraction of entries evicted in one pass
    pub evict_fraction: f64,
    /// TTL for conversational responses
    #[serde(with = "humantime_serde")]
    pub conversational_ttl: Duration,
    /// TTL for bulk pre-generated content
    #[serde(with = "humantime_serde")]
    pub bulk_ttl: Duration,
    /// Jaccard similarity required for a fuzzy hit
    pub similarity_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 2000,
            evict_fraction: 0.2,
            conversational_ttl: Duration::from_secs(60 * 60),
            bulk_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            similarity_threshold: 0.8,
        }
    }
}

/// Budget and tier policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Daily spend ceiling in USD
    pub daily_budget_usd: f64,
    /// Daily usage ratio beyond which every request drops to the cheapest tier
    pub downgrade_ratio: f64,
    /// Absolute daily spend that raises a cost alert
    pub alert_threshold_usd: f64,
    /// Tier chosen when the caller expresses no priority
    pub default_tier: ModelTier,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            daily_budget_usd: 1.0,
            downgrade_ratio: 0.8,
            alert_threshold_usd: 0.8,
            default_tier: ModelTier::Balanced,
        }
    }
}

/// Provider failure handling policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Provider call deadline before the turn degrades to fallback content
    #[serde(with = "humantime_serde")]
    pub provider_timeout: Duration,
    /// In-call retry attempts for transient failures
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Backoff ceiling
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Queued utterances retained per session for replay
    pub replay_capacity: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            replay_capacity: 32,
        }
    }
}

/// Batch generation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// How often the background drain runs
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,
    /// Modules covered by the weekly pre-generation job
    pub pregen_modules: Vec<String>,
    /// Quiz items per module in the weekly bundle
    pub pregen_quiz_count: usize,
    /// Fact items per module in the weekly bundle
    pub pregen_fact_count: usize,
    /// How often the pre-generation job wakes up
    #[serde(with = "humantime_serde")]
    pub pregen_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_secs(5 * 60),
            pregen_modules: vec!["math".to_string(), "reading".to_string()],
            pregen_quiz_count: 10,
            pregen_fact_count: 10,
            pregen_interval: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = TutorConfig::default();
        assert_eq!(config.session.break_message_threshold, 15);
        assert_eq!(config.session.break_after, Duration::from_secs(1200));
        assert_eq!(config.memory.short_term_capacity, 10);
        assert_eq!(config.cache.capacity, 2000);
        assert!((config.cache.similarity_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.cache.conversational_ttl, Duration::from_secs(3600));
        assert_eq!(
            config.cache.bulk_ttl,
            Duration::from_secs(7 * 24 * 60 * 60)
        );
        assert!((config.cost.downgrade_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.fallback.max_attempts, 3);
        assert_eq!(config.fallback.max_backoff, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = TutorConfig::from_toml_str(
            r#"
            [session]
            break_message_threshold = 20
            break_after = "30m"

            [cache]
            similarity_threshold = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.session.break_message_threshold, 20);
        assert_eq!(config.session.break_after, Duration::from_secs(1800));
        assert!((config.cache.similarity_threshold - 0.9).abs() < f64::EPSILON);
        // Untouched sections keep their defaults
        assert_eq!(config.memory.short_term_capacity, 10);
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = TutorConfig::from_toml_str("session = 5").unwrap_err();
        assert!(matches!(err, SproutError::Config { .. }));
    }
}
