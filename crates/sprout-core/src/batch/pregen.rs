//! Weekly pre-generated content bundles
//!
//! A timer-driven job fills a per-module bundle of quizzes and facts into
//! the response cache on the bulk tier (7-day TTL). A fresh bundle in the
//! cache means the job skips that module until the TTL lapses.

use super::scheduler::BulkGenerator;
use crate::cache::{CacheTier, ResponseCache};
use crate::config::BatchConfig;
use crate::fallback::ContentType;

/// Synthetic cache prompt under which a module's bundle is stored
pub fn bundle_prompt(content_type: ContentType, module: &str) -> String {
    format!("weekly {content_type} bundle for {module}")
}

/// Fetch a module's stored bundle, if a fresh one exists
pub fn stored_bundle(
    cache: &ResponseCache,
    content_type: ContentType,
    module: &str,
) -> Option<Vec<String>> {
    let hit = cache.lookup(&bundle_prompt(content_type, module), module)?;
    serde_json::from_str(&hit.response).ok()
}

/// Generate this week's bundles for every configured module
///
/// Returns the number of bundles actually generated; modules with a fresh
/// cached bundle are skipped.
pub async fn pregenerate(
    cache: &ResponseCache,
    generator: &dyn BulkGenerator,
    config: &BatchConfig,
) -> usize {
    let plan = [
        (ContentType::Quiz, config.pregen_quiz_count),
        (ContentType::Fact, config.pregen_fact_count),
    ];

    let mut generated = 0;
    for module in &config.pregen_modules {
        for (content_type, count) in plan {
            if count == 0 {
                continue;
            }
            let prompt = bundle_prompt(content_type, module);
            if cache.lookup(&prompt, module).is_some() {
                tracing::debug!(%content_type, module, "bundle still fresh, skipping");
                continue;
            }

            match generator.generate_bulk(content_type, module, count).await {
                Ok(items) => {
                    let payload = match serde_json::to_string(&items) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(module, "bundle serialization failed: {e}");
                            continue;
                        }
                    };
                    cache.store_tagged(
                        &prompt,
                        module,
                        payload,
                        0,
                        CacheTier::Bulk,
                        vec!["weekly-bundle".to_string(), content_type.to_string()],
                    );
                    generated += 1;
                    tracing::info!(%content_type, module, items = items.len(), "bundle pre-generated");
                }
                Err(e) => {
                    tracing::warn!(%content_type, module, "bundle generation failed: {e}");
                }
            }
        }
    }
    generated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::SproutResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGenerator {
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BulkGenerator for StubGenerator {
        async fn generate_bulk(
            &self,
            content_type: ContentType,
            module: &str,
            count: usize,
        ) -> SproutResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..count)
                .map(|i| format!("{content_type} {i} for {module}"))
                .collect())
        }
    }

    fn test_config() -> BatchConfig {
        BatchConfig {
            pregen_modules: vec!["math".to_string()],
            pregen_quiz_count: 3,
            pregen_fact_count: 2,
            ..BatchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_pregenerate_fills_and_skips_when_fresh() {
        let cache = ResponseCache::new(CacheConfig::default());
        let generator = StubGenerator::new();
        let config = test_config();

        let generated = pregenerate(&cache, &generator, &config).await;
        assert_eq!(generated, 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

        let quizzes = stored_bundle(&cache, ContentType::Quiz, "math").unwrap();
        assert_eq!(quizzes.len(), 3);

        // A second run finds fresh bundles and does nothing
        let generated = pregenerate(&cache, &generator, &config).await;
        assert_eq!(generated, 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_bundle_is_regenerated() {
        let cache = ResponseCache::new(CacheConfig {
            bulk_ttl: std::time::Duration::ZERO,
            ..CacheConfig::default()
        });
        let generator = StubGenerator::new();
        let config = test_config();

        pregenerate(&cache, &generator, &config).await;
        // Bulk TTL of zero means the bundles expired immediately
        let generated = pregenerate(&cache, &generator, &config).await;
        assert_eq!(generated, 2);
    }
}
