//! The response cache proper

use super::types::{
    CacheStats, CacheTier, CachedResponse, cache_key, jaccard_similarity, word_set,
};
use crate::config::CacheConfig;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A successful cache lookup
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The cached response text
    pub response: String,
    /// Token cost of the original call (credited to `tokens_saved`)
    pub token_cost: usize,
    /// Whether this was an exact-key hit rather than a fuzzy match
    pub exact: bool,
}

/// Key/value store of prior LLM outputs with similarity-based reuse
///
/// Shared, read-mostly state behind a coarse lock; every operation is
/// synchronous and bounded by the entry cap.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
    stats: RwLock<CacheStats>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a cache with the given policy
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            config,
        }
    }

    /// Look up a response for the prompt within a module
    ///
    /// Exact key first; on miss, a fuzzy scan over same-module entries
    /// accepts Jaccard similarity at or above the configured threshold.
    /// Expired entries never match.
    pub fn lookup(&self, prompt: &str, module: &str) -> Option<CacheHit> {
        let now = Utc::now();
        let key = cache_key(prompt, module);

        {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(&key) {
                if !entry.is_expired(now) {
                    entry.hit_count += 1;
                    let hit = CacheHit {
                        response: entry.response.clone(),
                        token_cost: entry.token_cost,
                        exact: true,
                    };
                    self.record_hit(hit.token_cost);
                    return Some(hit);
                }
            }

            // Fuzzy pass within the same module
            let words = word_set(prompt);
            let mut best: Option<(String, f64)> = None;
            for (entry_key, entry) in entries.iter() {
                if entry.module != module || entry.is_expired(now) {
                    continue;
                }
                let similarity = jaccard_similarity(&words, &entry.prompt_words);
                if similarity >= self.config.similarity_threshold
                    && best.as_ref().is_none_or(|(_, s)| similarity > *s)
                {
                    best = Some((entry_key.clone(), similarity));
                }
            }

            if let Some((best_key, similarity)) = best {
                let entry = entries.get_mut(&best_key).unwrap();
                entry.hit_count += 1;
                tracing::debug!(module, similarity, "fuzzy cache hit");
                let hit = CacheHit {
                    response: entry.response.clone(),
                    token_cost: entry.token_cost,
                    exact: false,
                };
                self.record_hit(hit.token_cost);
                return Some(hit);
            }
        }

        self.stats.write().misses += 1;
        None
    }

    /// Insert or overwrite a response
    pub fn store(
        &self,
        prompt: &str,
        module: &str,
        response: impl Into<String>,
        token_cost: usize,
        tier: CacheTier,
    ) {
        self.store_tagged(prompt, module, response, token_cost, tier, Vec::new());
    }

    /// Insert or overwrite a response with tags
    pub fn store_tagged(
        &self,
        prompt: &str,
        module: &str,
        response: impl Into<String>,
        token_cost: usize,
        tier: CacheTier,
        tags: Vec<String>,
    ) {
        let now = Utc::now();
        let ttl = match tier {
            CacheTier::Conversational => self.config.conversational_ttl,
            CacheTier::Bulk => self.config.bulk_ttl,
        };
        let entry = CachedResponse {
            module: module.to_string(),
            response: response.into(),
            created_at: now,
            expires_at: now
                + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(1)),
            hit_count: 0,
            token_cost,
            tags,
            prompt_words: word_set(prompt),
        };

        let mut entries = self.entries.write();
        entries.insert(cache_key(prompt, module), entry);
        if entries.len() > self.config.capacity {
            self.evict_locked(&mut entries);
        }
        self.stats.write().entry_count = entries.len();
    }

    /// Drop expired entries; run periodically by the maintenance job
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "purged expired cache entries");
        }
        self.stats.write().entry_count = entries.len();
        removed
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.entry_count = self.entries.read().len();
        stats
    }

    fn record_hit(&self, token_cost: usize) {
        let mut stats = self.stats.write();
        stats.hits += 1;
        stats.tokens_saved += token_cost as u64;
    }

    /// Evict the lowest-scoring fraction of entries
    fn evict_locked(&self, entries: &mut HashMap<String, CachedResponse>) {
        let now = Utc::now();
        let evict_count =
            ((entries.len() as f64 * self.config.evict_fraction).ceil() as usize).max(1);

        let mut ranked: Vec<(String, f64)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.retention_score(now)))
            .collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        for (key, _) in ranked.into_iter().take(evict_count) {
            entries.remove(&key);
        }

        let mut stats = self.stats.write();
        stats.evictions += evict_count as u64;
        tracing::debug!(evicted = evict_count, "cache eviction pass");
    }
}
