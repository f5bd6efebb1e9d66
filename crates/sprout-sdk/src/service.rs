//! The tutoring service facade

use crate::generator::PipelineGenerator;
use sprout_core::batch::{BatchPriority, BatchScheduler, BatchTicket, BulkGenerator, pregenerate};
use sprout_core::cache::ResponseCache;
use sprout_core::config::TutorConfig;
use sprout_core::cost::{UsageLedger, UsageStats};
use sprout_core::error::{SproutError, SproutResult};
use sprout_core::fallback::{ContentType, FallbackBank, FallbackContentItem, GuardianNotifier, LogNotifier};
use sprout_core::llm::{LlmProvider, RetryPolicy};
use sprout_core::memory::MemoryConsolidator;
use sprout_core::session::{SessionOrchestrator, SessionStart, SessionSummary, TurnReply};
use sprout_core::storage::{InMemoryStorage, KeyValueStorage};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Builder for [`TutoringService`]
///
/// Only the provider is mandatory; everything else has a sensible default
/// (in-memory storage, built-in fallback bank, log-only guardian channel).
pub struct TutoringServiceBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    storage: Option<Arc<dyn KeyValueStorage>>,
    notifier: Option<Arc<dyn GuardianNotifier>>,
    fallback_items: Option<Vec<FallbackContentItem>>,
    config: TutorConfig,
}

impl TutoringServiceBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            provider: None,
            storage: None,
            notifier: None,
            fallback_items: None,
            config: TutorConfig::default(),
        }
    }

    /// Set the LLM provider (required)
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the durable storage backend
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the guardian notification channel
    pub fn with_notifier(mut self, notifier: Arc<dyn GuardianNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the built-in offline content bank
    pub fn with_fallback_items(mut self, items: Vec<FallbackContentItem>) -> Self {
        self.fallback_items = Some(items);
        self
    }

    /// Set the configuration
    pub fn with_config(mut self, config: TutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service and start its background jobs
    pub fn build(self) -> SproutResult<TutoringService> {
        let provider = self
            .provider
            .ok_or_else(|| SproutError::config("an LLM provider is required"))?;
        let storage: Arc<dyn KeyValueStorage> = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryStorage::new()));
        let notifier: Arc<dyn GuardianNotifier> =
            self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let bank = Arc::new(match self.fallback_items {
            Some(items) => FallbackBank::from_items(items),
            None => FallbackBank::builtin(),
        });
        let config = self.config;

        let cache = Arc::new(ResponseCache::new(config.cache.clone()));
        let ledger = Arc::new(UsageLedger::new(config.cost.clone()));
        let consolidator = Arc::new(MemoryConsolidator::new(
            Arc::clone(&storage),
            config.memory.clone(),
        ));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            Arc::clone(&provider),
            consolidator,
            Arc::clone(&cache),
            Arc::clone(&ledger),
            bank,
            notifier,
            storage,
            config.clone(),
        ));
        let scheduler = Arc::new(BatchScheduler::new());
        let generator: Arc<dyn BulkGenerator> = Arc::new(PipelineGenerator::new(
            provider,
            Arc::clone(&ledger),
            RetryPolicy::from_config(&config.fallback),
        ));

        let cancel = CancellationToken::new();
        let jobs = TutoringService::spawn_jobs(
            &config,
            Arc::clone(&orchestrator),
            Arc::clone(&scheduler),
            Arc::clone(&generator),
            Arc::clone(&cache),
            cancel.clone(),
        );

        Ok(TutoringService {
            orchestrator,
            scheduler,
            generator,
            cache,
            ledger,
            config,
            cancel,
            jobs: std::sync::Mutex::new(jobs),
        })
    }
}

impl Default for TutoringServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled tutoring service
///
/// Owns the whole pipeline plus the background jobs; drop-in entry point for
/// a transport layer (HTTP handler, desktop app, CLI).
pub struct TutoringService {
    orchestrator: Arc<SessionOrchestrator>,
    scheduler: Arc<BatchScheduler>,
    generator: Arc<dyn BulkGenerator>,
    cache: Arc<ResponseCache>,
    ledger: Arc<UsageLedger>,
    config: TutorConfig,
    cancel: CancellationToken,
    // std Mutex: the job list is touched once at build and once at shutdown
    jobs: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TutoringService {
    /// Start building a service
    pub fn builder() -> TutoringServiceBuilder {
        TutoringServiceBuilder::new()
    }

    /// Start a tutoring session for a user and module
    pub async fn start_session(&self, user_id: &str, module: &str) -> SproutResult<SessionStart> {
        self.orchestrator.start(user_id, module).await
    }

    /// Send a learner utterance and get the tutor's reply
    pub async fn send_message(&self, session_id: &str, text: &str) -> SproutResult<TurnReply> {
        self.orchestrator.handle_utterance(session_id, text).await
    }

    /// Report a concept attempt observed by the activity layer
    pub async fn record_attempt(
        &self,
        session_id: &str,
        concept: &str,
        correct: bool,
    ) -> SproutResult<()> {
        self.orchestrator.record_attempt(session_id, concept, correct).await
    }

    /// End a session and get its summary
    pub async fn end_session(&self, session_id: &str) -> SproutResult<SessionSummary> {
        self.orchestrator.end(session_id).await
    }

    /// Queue bulk content; resolves when the batch drains
    pub fn request_content(
        &self,
        content_type: ContentType,
        module: &str,
        count: usize,
        priority: BatchPriority,
    ) -> BatchTicket {
        self.scheduler.enqueue(content_type, module, count, priority)
    }

    /// Drain the batch queue immediately instead of waiting for the timer
    pub async fn drain_batches(&self) -> usize {
        self.scheduler.drain(self.generator.as_ref()).await
    }

    /// Run the weekly pre-generation pass immediately
    pub async fn pregenerate_now(&self) -> usize {
        pregenerate(&self.cache, self.generator.as_ref(), &self.config.batch).await
    }

    /// Aggregate usage statistics
    pub fn usage_stats(&self) -> UsageStats {
        self.ledger.stats()
    }

    /// Cache counters
    pub fn cache_stats(&self) -> sprout_core::cache::CacheStats {
        self.cache.stats()
    }

    /// Live session count
    pub fn active_sessions(&self) -> usize {
        self.orchestrator.active_sessions()
    }

    /// Stop background jobs and wait for them to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let jobs = {
            let mut guard = self.jobs.lock().expect("job list lock poisoned");
            std::mem::take(&mut *guard)
        };
        for result in futures::future::join_all(jobs).await {
            if let Err(e) = result {
                tracing::debug!("background job ended uncleanly: {e}");
            }
        }
        tracing::info!("tutoring service shut down");
    }

    /// Spawn the maintenance, batch-drain, and pre-generation loops
    fn spawn_jobs(
        config: &TutorConfig,
        orchestrator: Arc<SessionOrchestrator>,
        scheduler: Arc<BatchScheduler>,
        generator: Arc<dyn BulkGenerator>,
        cache: Arc<ResponseCache>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let mut jobs = Vec::new();

        // Cache maintenance + idle session sweep
        {
            let cancel = cancel.clone();
            let cache = Arc::clone(&cache);
            let sweep_interval = config.session.sweep_interval;
            jobs.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(sweep_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            cache.purge_expired();
                            orchestrator.sweep_idle().await;
                        }
                    }
                }
            }));
        }

        // Batch drain: timer tick or high-priority wakeup
        {
            let cancel = cancel.clone();
            let scheduler = Arc::clone(&scheduler);
            let generator = Arc::clone(&generator);
            let drain_interval = config.batch.drain_interval;
            jobs.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(drain_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            scheduler.drain(generator.as_ref()).await;
                        }
                        _ = scheduler.wait_for_urgent() => {
                            scheduler.drain(generator.as_ref()).await;
                        }
                    }
                }
            }));
        }

        // Weekly pre-generation; the first tick fires at startup, and a
        // still-fresh bundle makes the pass a no-op
        {
            let batch_config = config.batch.clone();
            jobs.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(batch_config.pregen_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            pregenerate(&cache, generator.as_ref(), &batch_config).await;
                        }
                    }
                }
            }));
        }

        jobs
    }
}
