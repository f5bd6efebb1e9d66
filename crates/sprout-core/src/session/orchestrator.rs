//! The session orchestrator
//!
//! One logical owner per session: concurrent utterances on the same session
//! serialize through the per-session lock, so there is never more than one
//! in-flight provider call per session. All collaborators are injected.

use super::heuristics::{classify_energy, classify_performance};
use super::types::{
    EnergyLevel, PerformanceLevel, Session, SessionId, SessionState, SessionSummary,
};
use crate::cache::{CacheTier, ResponseCache};
use crate::config::TutorConfig;
use crate::cost::UsageLedger;
use crate::error::{ErrorKind, SproutError, SproutResult};
use crate::fallback::{FallbackBank, GuardianEvent, GuardianNotifier, resolve_failure};
use crate::llm::{
    ChatMessage, GenerationRequest, LlmProvider, MessageRole, ModelTier, ReplayQueue,
    RequestPriority, RetryPolicy, generate_with_retry,
};
use crate::memory::{
    LearningSignals, MemoryConsolidator, PersonalContext, ShortTermMemoryEntry,
};
use crate::optimizer::{RequestOptimizer, extract_keywords};
use crate::storage::{KeyValueStorage, persist_json_with_retry};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Queued utterances replayed per turn, so replay never stalls a live reply
const MAX_REPLAYS_PER_TURN: usize = 3;

/// XP granted for an ordinary completed turn
const TURN_XP: u32 = 5;

/// Extra XP per concept newly mastered during a turn
const MASTERY_XP: u32 = 10;

/// Result of starting a session
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub greeting: String,
}

/// The enriched context bundle `ingest` hands to the optimizer
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: SessionId,
    pub module: String,
    /// Conversation history including the just-ingested utterance
    pub messages: Vec<ChatMessage>,
    /// Personalized base instructions
    pub instructions: String,
    pub energy: EnergyLevel,
    pub performance: PerformanceLevel,
    pub message_count: u32,
    /// The break rule fired on this utterance
    pub break_suggested: bool,
}

/// Outcome of a full turn
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub reply: String,
    pub xp_delta: u32,
    pub cache_hit: bool,
    /// The break rule fired on this turn
    pub break_suggested: bool,
    /// Set when the turn was served degraded (fallback path)
    pub degraded: Option<ErrorKind>,
    /// Tier billed, when a provider call happened
    pub tier: Option<ModelTier>,
}

/// Per-session state guarded by the serialization lock
struct SlotState {
    session: Session,
    history: Vec<ChatMessage>,
    context: PersonalContext,
}

struct SessionSlot {
    state: Mutex<SlotState>,
}

/// The per-conversation state machine and turn pipeline
pub struct SessionOrchestrator {
    sessions: DashMap<SessionId, Arc<SessionSlot>>,
    provider: Arc<dyn LlmProvider>,
    consolidator: Arc<MemoryConsolidator>,
    cache: Arc<ResponseCache>,
    ledger: Arc<UsageLedger>,
    bank: Arc<FallbackBank>,
    notifier: Arc<dyn GuardianNotifier>,
    storage: Arc<dyn KeyValueStorage>,
    replay: ReplayQueue,
    optimizer: RequestOptimizer,
    retry_policy: RetryPolicy,
    config: TutorConfig,
}

impl SessionOrchestrator {
    /// Wire up an orchestrator from its collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        consolidator: Arc<MemoryConsolidator>,
        cache: Arc<ResponseCache>,
        ledger: Arc<UsageLedger>,
        bank: Arc<FallbackBank>,
        notifier: Arc<dyn GuardianNotifier>,
        storage: Arc<dyn KeyValueStorage>,
        config: TutorConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            provider,
            consolidator,
            cache,
            ledger,
            bank,
            notifier,
            storage,
            replay: ReplayQueue::new(config.fallback.replay_capacity),
            optimizer: RequestOptimizer::new(config.optimizer.clone()),
            retry_policy: RetryPolicy::from_config(&config.fallback),
            config,
        }
    }

    /// Start a session: allocate state and greet the learner
    pub async fn start(
        &self,
        user_id: &str,
        module: &str,
    ) -> SproutResult<SessionStart> {
        let context = self.consolidator.build_context(user_id).await?;
        let session = Session::new(user_id, module);
        let session_id = session.id.clone();
        let greeting = context.greeting.clone();

        let history = vec![ChatMessage::assistant(greeting.clone())];
        self.sessions.insert(
            session_id.clone(),
            Arc::new(SessionSlot {
                state: Mutex::new(SlotState {
                    session,
                    history,
                    context,
                }),
            }),
        );

        tracing::info!(%session_id, user_id, module, "session started");
        Ok(SessionStart {
            session_id,
            greeting,
        })
    }

    /// Ingest an utterance: update session state and return the context
    /// bundle for the optimizer
    ///
    /// For callers driving the provider themselves; [`handle_utterance`]
    /// runs the whole pipeline and applies the same state update internally.
    ///
    /// [`handle_utterance`]: Self::handle_utterance
    pub async fn ingest(&self, session_id: &str, utterance: &str) -> SproutResult<TurnContext> {
        let slot = self.slot(session_id)?;
        let mut state = slot.state.lock().await;
        let break_fired = Self::apply_utterance(&mut state, utterance, &self.config);
        Ok(TurnContext {
            session_id: session_id.to_string(),
            module: state.session.module.clone(),
            messages: state.history.clone(),
            instructions: Self::base_instructions(&state),
            energy: state.session.energy_level,
            performance: state.session.performance_level,
            message_count: state.session.message_count,
            break_suggested: break_fired,
        })
    }

    /// Run one full turn: ingest, build context, optimize, cache, provider,
    /// fallback, and memory updates
    pub async fn handle_utterance(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> SproutResult<TurnReply> {
        let slot = self.slot(session_id)?;
        let mut state = slot.state.lock().await;

        // Replay a bounded number of deferred utterances first; a success
        // here means availability returned since the outage.
        self.replay_pending(session_id, &mut state).await;

        let break_fired = Self::apply_utterance(&mut state, utterance, &self.config);
        let module = state.session.module.clone();

        // Cache first: an exact or fuzzy hit costs nothing
        if let Some(hit) = self.cache.lookup(utterance, &module) {
            let tier = self.ledger.select_tier(self.priority_for(&state));
            let outcome =
                self.ledger
                    .track_usage(session_id, 0, 0, tier, &module, true);
            self.persist_usage(&outcome);
            state.history.push(ChatMessage::assistant(hit.response.clone()));
            tracing::debug!(session_id, exact = hit.exact, "turn served from cache");
            return Ok(TurnReply {
                reply: hit.response,
                xp_delta: TURN_XP,
                cache_hit: true,
                break_suggested: break_fired,
                degraded: None,
                tier: None,
            });
        }

        // Cache miss: compress and call the provider
        let instructions = Self::base_instructions(&state);
        let mut optimized = self
            .optimizer
            .optimize(&state.history, &instructions, &module);
        Self::append_personalization(&mut optimized.instructions, &state.context);

        let tier = self.ledger.select_tier(self.priority_for(&state));
        let request = GenerationRequest::new(
            optimized.messages,
            optimized.instructions,
            tier,
        );

        match generate_with_retry(self.provider.as_ref(), &request, &self.retry_policy).await {
            Ok(response) => {
                let reply = response.text.clone();
                self.cache.store(
                    utterance,
                    &module,
                    &reply,
                    response.total_tokens(),
                    CacheTier::Conversational,
                );
                let outcome = self.ledger.track_usage(
                    session_id,
                    response.input_tokens,
                    response.output_tokens,
                    tier,
                    &module,
                    false,
                );
                self.persist_usage(&outcome);
                if outcome.cost_alert {
                    self.notify_guardian(
                        GuardianEvent::new(
                            "cost_alert",
                            format!(
                                "daily spend at {:.0}% of budget",
                                outcome.daily_usage_percent
                            ),
                        )
                        .for_session(session_id),
                    );
                }

                let xp = TURN_XP + self.absorb_signals(&mut state, utterance).await;
                state.history.push(ChatMessage::assistant(reply.clone()));
                Ok(TurnReply {
                    reply,
                    xp_delta: xp,
                    cache_hit: false,
                    break_suggested: break_fired,
                    degraded: None,
                    tier: Some(tier),
                })
            }
            Err(error) => {
                let resolution = resolve_failure(&error, &module, &self.bank);
                if resolution.policy.queue_for_replay {
                    self.replay.push(session_id, utterance);
                }
                if resolution.policy.notify_guardian {
                    self.notify_guardian(
                        GuardianEvent::new(
                            resolution.kind.to_string(),
                            format!("provider unavailable: {error}"),
                        )
                        .for_user(&state.session.user_id)
                        .for_session(session_id),
                    );
                }

                let (reply, xp) = match &resolution.payload {
                    Some(item) => (item.payload.clone(), item.reward_value),
                    None if resolution.kind == ErrorKind::AuthFailure => (
                        "I need a grown-up to check my settings before we keep going."
                            .to_string(),
                        0,
                    ),
                    None => (
                        "Hmm, my thinking cap slipped off for a moment. Let's try that again soon!"
                            .to_string(),
                        0,
                    ),
                };
                state.history.push(ChatMessage::assistant(reply.clone()));
                Ok(TurnReply {
                    reply,
                    xp_delta: xp,
                    cache_hit: false,
                    break_suggested: break_fired,
                    degraded: Some(resolution.kind),
                    tier: None,
                })
            }
        }
    }

    /// Report a concept attempt observed by the activity layer
    pub async fn record_attempt(
        &self,
        session_id: &str,
        concept: &str,
        correct: bool,
    ) -> SproutResult<()> {
        let slot = self.slot(session_id)?;
        let mut state = slot.state.lock().await;
        let module = state.session.module.clone();
        let user_id = state.session.user_id.clone();

        let signals = LearningSignals {
            concept_attempts: vec![(concept.to_string(), module, correct)],
            positive_signals: u32::from(correct),
            ..Default::default()
        };
        let delta = self.consolidator.update_long_term(&user_id, &signals).await?;

        for concept in &delta.newly_mastered {
            state.session.mastered_concepts.insert(concept.clone());
            state.session.mission_progress_pct =
                (state.session.mission_progress_pct + 10.0).min(100.0);
        }
        for concept in &delta.needs_review {
            state.session.review_concepts.insert(concept.clone());
        }
        Ok(())
    }

    /// End a session: summarize, archive, and write short-term memory
    pub async fn end(&self, session_id: &str) -> SproutResult<SessionSummary> {
        // Remove first so no new turn can start; an in-flight turn finishes
        // under the lock before we take it.
        let (_, slot) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SproutError::session_not_found(session_id))?;
        let mut state = slot.state.lock().await;
        state.session.state = SessionState::Ended;

        let now = Utc::now();
        let vocabulary_used = extract_keywords(
            state
                .history
                .iter()
                .filter(|m| m.role == MessageRole::User)
                .map(|m| m.content.as_str()),
            10,
        );
        let session = &state.session;
        let entry = ShortTermMemoryEntry {
            session_id: session.id.clone(),
            date: now,
            module: session.module.clone(),
            topics: session.topics_discussed.clone(),
            mistakes: session.review_concepts.iter().cloned().collect(),
            vocabulary_used,
            energy: session.energy_level,
        };
        self.consolidator.record_session(&session.user_id, entry).await?;
        self.replay.discard_session(session_id);

        let session_cost = self.ledger.session_stats(session_id).total_cost;
        let mut key_insights = Vec::new();
        if !session.mastered_concepts.is_empty() {
            key_insights.push(format!(
                "Mastered: {}",
                session
                    .mastered_concepts
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        if !session.review_concepts.is_empty() {
            key_insights.push(format!(
                "Worth revisiting: {}",
                session
                    .review_concepts
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        if session.performance_level == PerformanceLevel::Excelling {
            key_insights.push("Finished the session excelling".to_string());
        }

        let summary = SessionSummary {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            module: session.module.clone(),
            duration_seconds: (now - session.started_at).num_seconds(),
            message_count: session.message_count,
            topics_discussed: session.topics_discussed.clone(),
            concepts_mastered: session.mastered_concepts.iter().cloned().collect(),
            concepts_to_review: session.review_concepts.iter().cloned().collect(),
            final_energy: session.energy_level,
            final_performance: session.performance_level,
            break_was_suggested: session.break_suggested,
            session_cost,
            key_insights,
        };
        tracing::info!(
            session_id,
            duration_secs = summary.duration_seconds,
            messages = summary.message_count,
            cost = summary.session_cost,
            "session ended"
        );
        Ok(summary)
    }

    /// Archive sessions idle past the configured timeout
    pub async fn sweep_idle(&self) -> usize {
        let now = Utc::now();
        let mut idle = Vec::new();
        for entry in self.sessions.iter() {
            // try_lock: a session mid-turn is not idle
            if let Ok(state) = entry.value().state.try_lock() {
                if state.session.is_idle(now, self.config.session.idle_timeout) {
                    idle.push(entry.key().clone());
                }
            }
        }

        let mut archived = 0;
        for session_id in idle {
            match self.end(&session_id).await {
                Ok(_) => {
                    tracing::info!(%session_id, "idle session archived");
                    archived += 1;
                }
                Err(e) => tracing::debug!(%session_id, "idle sweep skipped: {e}"),
            }
        }
        archived
    }

    /// Live session count
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn slot(&self, session_id: &str) -> SproutResult<Arc<SessionSlot>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SproutError::session_not_found(session_id))
    }

    /// Apply one utterance to session state; returns whether the break rule
    /// fired on this message
    fn apply_utterance(state: &mut SlotState, utterance: &str, config: &TutorConfig) -> bool {
        let now = Utc::now();
        let session = &mut state.session;

        session.state = match session.state {
            SessionState::Created => SessionState::Active,
            SessionState::BreakSuggested => SessionState::Active,
            other => other,
        };
        session.message_count += 1;
        session.last_interaction_at = now;

        if let Some(energy) = classify_energy(utterance) {
            session.energy_level = energy;
        }
        if let Some(performance) = classify_performance(utterance) {
            session.performance_level = performance;
        }
        for topic in extract_keywords([utterance], 3) {
            session.note_topic(topic);
        }

        state.history.push(ChatMessage::user(utterance));

        // Break rule: time or message threshold, whichever first, once ever
        let elapsed = session.elapsed(now).to_std().unwrap_or_default();
        if !session.break_suggested
            && (elapsed >= config.session.break_after
                || session.message_count >= config.session.break_message_threshold)
        {
            session.break_suggested = true;
            session.state = SessionState::BreakSuggested;
            tracing::info!(
                session_id = %session.id,
                messages = session.message_count,
                "break suggested"
            );
            return true;
        }
        false
    }

    /// Struggling learners get the capable tier; everyone else rides the
    /// default. The ledger may still downgrade on budget.
    fn priority_for(&self, state: &SlotState) -> RequestPriority {
        match state.session.performance_level {
            PerformanceLevel::Struggling => RequestPriority::Quality,
            _ => match self.config.cost.default_tier {
                ModelTier::Quality => RequestPriority::Quality,
                ModelTier::Balanced => RequestPriority::Balanced,
                ModelTier::Economy => RequestPriority::Economy,
            },
        }
    }

    fn base_instructions(state: &SlotState) -> String {
        format!(
            "You are a warm, patient tutor helping a child learn {}. \
             Keep replies short, concrete, and encouraging. Never shame mistakes.",
            state.session.module
        )
    }

    fn append_personalization(instructions: &mut String, context: &PersonalContext) {
        if !context.suggested_topics.is_empty() {
            instructions.push_str(&format!(
                " The student lights up about: {}.",
                context.suggested_topics.join(", ")
            ));
        }
        if !context.avoid_topics.is_empty() {
            instructions.push_str(&format!(
                " Covered recently, avoid rehashing: {}.",
                context.avoid_topics.join(", ")
            ));
        }
    }

    /// Fold per-turn signals into long-term memory; returns bonus XP
    async fn absorb_signals(&self, state: &mut SlotState, utterance: &str) -> u32 {
        let user_id = state.session.user_id.clone();
        let signals = LearningSignals {
            topics_mentioned: extract_keywords([utterance], 3),
            questions: if utterance.contains('?') {
                vec![utterance.to_string()]
            } else {
                Vec::new()
            },
            positive_signals: u32::from(
                state.session.performance_level == PerformanceLevel::Excelling,
            ),
            ..Default::default()
        };

        match self.consolidator.update_long_term(&user_id, &signals).await {
            Ok(delta) => {
                let bonus = delta.newly_mastered.len() as u32 * MASTERY_XP;
                for concept in delta.newly_mastered {
                    state.session.mastered_concepts.insert(concept);
                    state.session.mission_progress_pct =
                        (state.session.mission_progress_pct + 10.0).min(100.0);
                }
                for concept in delta.needs_review {
                    state.session.review_concepts.insert(concept);
                }
                bonus
            }
            Err(e) => {
                // Memory trouble must never fail the turn
                tracing::warn!(%user_id, "long-term memory update failed: {e}");
                0
            }
        }
    }

    /// Replay queued utterances, single attempt each, FIFO; stop on the
    /// first failure and re-queue the remainder
    async fn replay_pending(&self, session_id: &str, state: &mut SlotState) {
        if self.replay.is_empty(session_id) {
            return;
        }
        let queued = self.replay.drain_session(session_id);
        let mut remaining = queued.into_iter();
        let module = state.session.module.clone();

        let mut replayed = 0;
        while replayed < MAX_REPLAYS_PER_TURN {
            let Some(utterance) = remaining.next() else {
                break;
            };
            state.history.push(ChatMessage::user(utterance.text.clone()));
            let instructions = Self::base_instructions(state);
            let optimized = self
                .optimizer
                .optimize(&state.history, &instructions, &module);
            let tier = self.ledger.select_tier(RequestPriority::Economy);
            let request =
                GenerationRequest::new(optimized.messages, optimized.instructions, tier);

            match self.provider.generate(request).await {
                Ok(response) => {
                    let outcome = self.ledger.track_usage(
                        session_id,
                        response.input_tokens,
                        response.output_tokens,
                        tier,
                        &module,
                        false,
                    );
                    self.persist_usage(&outcome);
                    state.history.push(ChatMessage::assistant(response.text));
                    replayed += 1;
                }
                Err(e) => {
                    tracing::debug!(session_id, "replay attempt failed, re-queueing: {e}");
                    self.replay.push(session_id, utterance.text);
                    break;
                }
            }
        }
        for leftover in remaining {
            self.replay.push(session_id, leftover.text);
        }
        if replayed > 0 {
            tracing::info!(session_id, replayed, "replayed deferred utterances");
        }
    }

    fn persist_usage(&self, outcome: &crate::cost::TrackOutcome) {
        let storage = Arc::clone(&self.storage);
        let record = outcome.record.clone();
        tokio::spawn(persist_json_with_retry(
            storage,
            record.storage_key(),
            record,
            3,
        ));
    }

    fn notify_guardian(&self, event: GuardianEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(event).await;
        });
    }
}
