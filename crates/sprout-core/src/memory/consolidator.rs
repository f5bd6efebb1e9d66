//! The memory consolidator

use super::greetings::{GreetingCondition, greeting_for};
use super::types::{
    ConceptMasteryRecord, Interest, LearningSignals, LongTermProfile, PersonalContext,
    ShortTermMemoryEntry,
};
use crate::config::MemoryConfig;
use crate::error::SproutResult;
use crate::storage::{KeyValueStorage, get_json, persist_json_with_retry};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

const PERSIST_ATTEMPTS: u32 = 3;

/// Everything remembered about one user
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct UserMemory {
    profile: Option<LongTermProfile>,
    short_term: VecDeque<ShortTermMemoryEntry>,
    mastery: HashMap<String, ConceptMasteryRecord>,
}

/// Concepts whose status changed in one update
#[derive(Debug, Clone, Default)]
pub struct MasteryDelta {
    /// Concepts newly flagged mastered
    pub newly_mastered: Vec<String>,
    /// Concepts that look shaky and deserve review
    pub needs_review: Vec<String>,
}

/// Merges short-term entries with the long-term profile
///
/// State loads lazily from storage per user; saves are spawned and
/// best-effort, never blocking the caller on persistence.
pub struct MemoryConsolidator {
    storage: Arc<dyn KeyValueStorage>,
    users: RwLock<HashMap<String, UserMemory>>,
    config: MemoryConfig,
}

impl MemoryConsolidator {
    /// Create a consolidator over the given storage
    pub fn new(storage: Arc<dyn KeyValueStorage>, config: MemoryConfig) -> Self {
        Self {
            storage,
            users: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Build the personalized context bundle for a user
    pub async fn build_context(&self, user_id: &str) -> SproutResult<PersonalContext> {
        self.ensure_loaded(user_id).await?;
        let users = self.users.read().await;
        let memory = users.get(user_id).cloned().unwrap_or_default();
        let now = Utc::now();

        let avoid_topics = self.avoid_list(&memory);
        let suggested_topics = self.rank_topics(&memory, &avoid_topics, now);
        let condition = self.greeting_condition(&memory, now);
        let greeting = greeting_for(user_id, now.date_naive(), &condition);

        Ok(PersonalContext {
            greeting,
            suggested_topics,
            avoid_topics,
        })
    }

    /// Append a finished session's entry to the user's short-term ring
    pub async fn record_session(
        &self,
        user_id: &str,
        entry: ShortTermMemoryEntry,
    ) -> SproutResult<()> {
        self.ensure_loaded(user_id).await?;
        let snapshot = {
            let mut users = self.users.write().await;
            let memory = users.entry(user_id.to_string()).or_default();
            memory.short_term.push_back(entry);
            while memory.short_term.len() > self.config.short_term_capacity {
                memory.short_term.pop_front();
            }
            memory.short_term.clone()
        };
        self.spawn_persist(format!("memory/short/{user_id}"), snapshot);
        Ok(())
    }

    /// Fold learning signals into the long-term profile and mastery records
    pub async fn update_long_term(
        &self,
        user_id: &str,
        signals: &LearningSignals,
    ) -> SproutResult<MasteryDelta> {
        self.ensure_loaded(user_id).await?;
        let now = Utc::now();
        let mut delta = MasteryDelta::default();

        let (profile_snapshot, mastery_snapshot) = {
            let mut users = self.users.write().await;
            let memory = users.entry(user_id.to_string()).or_default();
            let profile = memory
                .profile
                .get_or_insert_with(|| LongTermProfile::new(user_id));

            for topic in &signals.topics_mentioned {
                match profile.interests.iter_mut().find(|i| &i.name == topic) {
                    Some(interest) => {
                        interest.mention_count += 1;
                        interest.strength = (interest.mention_count as f32 * 2.0).min(10.0);
                        interest.last_mentioned = now;
                    }
                    None => profile.interests.push(Interest {
                        name: topic.clone(),
                        strength: 2.0,
                        mention_count: 1,
                        last_mentioned: now,
                    }),
                }
            }
            if profile.interests.len() > self.config.max_interests {
                let decay = self.config.interest_decay_per_week;
                profile.interests.sort_by(|a, b| {
                    b.effective_strength(now, decay)
                        .partial_cmp(&a.effective_strength(now, decay))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                profile.interests.truncate(self.config.max_interests);
            }

            for question in &signals.questions {
                if !profile.recurring_questions.contains(question) {
                    profile.recurring_questions.push(question.clone());
                    if profile.recurring_questions.len() > 20 {
                        profile.recurring_questions.remove(0);
                    }
                }
            }

            if signals.positive_signals > 0 {
                profile.confidence = (profile.confidence
                    + signals.positive_signals as f32 * self.config.confidence_increment)
                    .min(100.0);
            }
            profile.updated_at = now;

            // Mastery bookkeeping: blend in this batch, then check the flag
            let mut batch: HashMap<String, (u32, u32, String)> = HashMap::new();
            for (concept, module, correct) in &signals.concept_attempts {
                let entry = batch
                    .entry(concept.clone())
                    .or_insert((0, 0, module.clone()));
                entry.0 += 1;
                if *correct {
                    entry.1 += 1;
                }
            }

            for (concept, (attempts, correct, module)) in batch {
                let record = memory
                    .mastery
                    .entry(concept.clone())
                    .or_insert_with(|| ConceptMasteryRecord::new(&concept, &module));
                let was_mastered = record.mastered;

                let batch_accuracy = correct as f64 / attempts as f64;
                record.mastery_level = record.mastery_level * self.config.mastery_blend_existing
                    + batch_accuracy * (1.0 - self.config.mastery_blend_existing);

                for i in 0..attempts {
                    record.record_attempt(
                        i < correct,
                        now,
                        self.config.mastery_min_attempts,
                        self.config.mastery_accuracy,
                    );
                }

                if record.mastered && !was_mastered {
                    delta.newly_mastered.push(concept.clone());
                } else if !record.mastered && record.attempts >= 2 && record.accuracy() < 0.5 {
                    delta.needs_review.push(concept.clone());
                    let profile = memory.profile.as_mut().unwrap();
                    if !profile.challenging_concepts.contains(&concept) {
                        profile.challenging_concepts.push(concept);
                    }
                }
            }

            (
                memory.profile.clone().unwrap(),
                memory.mastery.clone(),
            )
        };

        self.spawn_persist(format!("memory/profile/{user_id}"), profile_snapshot);
        self.spawn_persist(format!("memory/mastery/{user_id}"), mastery_snapshot);

        if !delta.newly_mastered.is_empty() {
            tracing::info!(user_id, mastered = ?delta.newly_mastered, "concepts newly mastered");
        }
        Ok(delta)
    }

    /// The user's long-term profile, if one exists yet
    pub async fn profile(&self, user_id: &str) -> SproutResult<Option<LongTermProfile>> {
        self.ensure_loaded(user_id).await?;
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .and_then(|m| m.profile.clone()))
    }

    /// Load a user's memory from storage the first time they appear
    async fn ensure_loaded(&self, user_id: &str) -> SproutResult<()> {
        if self.users.read().await.contains_key(user_id) {
            return Ok(());
        }

        let profile: Option<LongTermProfile> =
            get_json(self.storage.as_ref(), &format!("memory/profile/{user_id}")).await?;
        let short_term: Option<VecDeque<ShortTermMemoryEntry>> =
            get_json(self.storage.as_ref(), &format!("memory/short/{user_id}")).await?;
        let mastery: Option<HashMap<String, ConceptMasteryRecord>> =
            get_json(self.storage.as_ref(), &format!("memory/mastery/{user_id}")).await?;

        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_insert(UserMemory {
            profile,
            short_term: short_term.unwrap_or_default(),
            mastery: mastery.unwrap_or_default(),
        });
        Ok(())
    }

    /// Topics covered in the last few sessions
    fn avoid_list(&self, memory: &UserMemory) -> Vec<String> {
        let mut avoid = Vec::new();
        for entry in memory.short_term.iter().rev().take(self.config.avoid_window) {
            for topic in &entry.topics {
                if !avoid.contains(topic) {
                    avoid.push(topic.clone());
                }
            }
        }
        avoid
    }

    /// Interests ranked by decayed strength, recency breaking ties
    fn rank_topics(
        &self,
        memory: &UserMemory,
        avoid: &[String],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let Some(profile) = &memory.profile else {
            return Vec::new();
        };
        let decay = self.config.interest_decay_per_week;
        let mut ranked: Vec<&Interest> = profile
            .interests
            .iter()
            .filter(|i| !avoid.contains(&i.name))
            .collect();
        ranked.sort_by(|a, b| {
            b.effective_strength(now, decay)
                .partial_cmp(&a.effective_strength(now, decay))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_mentioned.cmp(&a.last_mentioned))
        });
        let topics: Vec<String> = ranked.into_iter().take(5).map(|i| i.name.clone()).collect();
        if !topics.is_empty() {
            return topics;
        }
        // No live interests: fall back to declared favorites
        profile
            .favorite_topics
            .iter()
            .filter(|t| !avoid.contains(t))
            .take(5)
            .cloned()
            .collect()
    }

    /// Pick which greeting family applies
    fn greeting_condition(&self, memory: &UserMemory, now: DateTime<Utc>) -> GreetingCondition {
        if memory.short_term.is_empty() && memory.profile.is_none() {
            return GreetingCondition::FirstVisit;
        }

        let streak = self.current_streak(memory, now);
        if streak >= 3 {
            return GreetingCondition::Streak { days: streak };
        }

        // A mastery flagged within the last week counts as a recent win
        let recent_win = memory.mastery.values().find(|r| {
            r.mastered
                && r.hours_to_mastery.is_some_and(|h| {
                    let mastered_at =
                        r.first_seen + ChronoDuration::seconds((h * 3600.0) as i64);
                    now - mastered_at < ChronoDuration::days(7)
                })
        });
        if let Some(record) = recent_win {
            return GreetingCondition::RecentWin {
                achievement: record.concept.clone(),
            };
        }

        GreetingCondition::Returning
    }

    /// Consecutive days with at least one session, ending today or yesterday
    fn current_streak(&self, memory: &UserMemory, now: DateTime<Utc>) -> u32 {
        let mut days: Vec<chrono::NaiveDate> =
            memory.short_term.iter().map(|e| e.date.date_naive()).collect();
        days.sort();
        days.dedup();

        let today = now.date_naive();
        let mut cursor = if days.last() == Some(&today) {
            today
        } else if days.last() == today.pred_opt().as_ref() {
            today.pred_opt().unwrap()
        } else {
            return 0;
        };

        let mut streak = 0;
        for day in days.iter().rev() {
            if *day == cursor {
                streak += 1;
                match cursor.pred_opt() {
                    Some(prev) => cursor = prev,
                    None => break,
                }
            } else {
                break;
            }
        }
        streak
    }

    fn spawn_persist<T: serde::Serialize + Send + 'static>(&self, key: String, value: T) {
        let storage = Arc::clone(&self.storage);
        tokio::spawn(persist_json_with_retry(storage, key, value, PERSIST_ATTEMPTS));
    }
}
