//! Cache entry types, prompt normalization, and key derivation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Which TTL band an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Live conversational turns (short TTL)
    Conversational,
    /// Pre-generated bulk content (long TTL)
    Bulk,
}

/// A cached provider response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Module the prompt belonged to
    pub module: String,
    /// Response text served on a hit
    pub response: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry; entries past this are treated as absent
    pub expires_at: DateTime<Utc>,
    /// Times this entry has been served
    pub hit_count: u64,
    /// Tokens the original call cost; credited to `tokens_saved` per hit
    pub token_cost: usize,
    /// Free-form tags (content type, bundle id)
    pub tags: Vec<String>,
    /// Normalized word set of the prompt, kept for fuzzy matching
    pub prompt_words: BTreeSet<String>,
}

impl CachedResponse {
    /// Whether the entry is past its TTL
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Eviction rank: frequency weighted by recency of creation
    ///
    /// recency_weight halves per day of age, so a week-old entry needs ~128x
    /// the hits of a fresh one to survive an eviction pass.
    pub fn retention_score(&self, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.created_at).num_seconds().max(0) as f64 / 3600.0;
        let recency_weight = 0.5f64.powf(age_hours / 24.0);
        (self.hit_count + 1) as f64 * recency_weight
    }
}

/// Aggregate cache counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from the cache (exact or fuzzy)
    pub hits: u64,
    /// Lookups that fell through to the provider
    pub misses: u64,
    /// Cumulative token cost avoided by hits
    pub tokens_saved: u64,
    /// Live entries
    pub entry_count: usize,
    /// Entries removed by eviction passes
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize_prompt(prompt: &str) -> String {
    let mut out = String::with_capacity(prompt.len());
    let mut last_was_space = true;
    for c in prompt.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Word set of the normalized prompt, for Jaccard comparison
pub fn word_set(prompt: &str) -> BTreeSet<String> {
    normalize_prompt(prompt)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two word sets
pub fn jaccard_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Exact cache key: sha256 over the normalized prompt and module
pub fn cache_key(prompt: &str, module: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_prompt(prompt).as_bytes());
    hasher.update(b":");
    hasher.update(module.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_strips_case_and_punctuation() {
        assert_eq!(
            normalize_prompt("What is 7 TIMES 8?!"),
            "what is 7 times 8"
        );
        assert_eq!(normalize_prompt("  spaced    out  "), "spaced out");
    }

    #[test]
    fn test_key_is_stable_under_normalization() {
        assert_eq!(
            cache_key("What is 7 times 8?", "math"),
            cache_key("what is 7 times 8", "math")
        );
        assert_ne!(
            cache_key("what is 7 times 8", "math"),
            cache_key("what is 7 times 8", "reading")
        );
    }

    #[test]
    fn test_jaccard_similarity() {
        let a = word_set("what is seven times eight");
        let b = word_set("what is seven times nine");
        // 4 shared words over a union of 6
        assert!((jaccard_similarity(&a, &b) - 4.0 / 6.0).abs() < 1e-9);

        let identical = word_set("what is seven times eight");
        assert!((jaccard_similarity(&a, &identical) - 1.0).abs() < 1e-9);

        let disjoint = word_set("completely different topic here");
        assert!(jaccard_similarity(&a, &disjoint) < 1e-9);
    }

    #[test]
    fn test_retention_score_favors_fresh_and_frequent() {
        let now = Utc::now();
        let fresh = CachedResponse {
            module: "math".into(),
            response: "r".into(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            hit_count: 0,
            token_cost: 10,
            tags: vec![],
            prompt_words: BTreeSet::new(),
        };
        let stale_popular = CachedResponse {
            hit_count: 3,
            created_at: now - chrono::Duration::days(7),
            ..fresh.clone()
        };
        assert!(fresh.retention_score(now) > stale_popular.retention_score(now));
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < 1e-9);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
