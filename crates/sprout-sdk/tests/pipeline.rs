//! End-to-end pipeline tests over the scripted provider

use sprout_core::config::TutorConfig;
use sprout_core::llm::{ScriptedProvider, ScriptedReply};
use sprout_sdk::{BatchPriority, ContentType, ErrorKind, TutoringService};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> TutorConfig {
    let mut config = TutorConfig::default();
    config.fallback.initial_backoff = Duration::from_millis(1);
    config.fallback.max_backoff = Duration::from_millis(4);
    // Keep background tickers quiet during tests
    config.batch.drain_interval = Duration::from_secs(3600);
    config.session.sweep_interval = Duration::from_secs(3600);
    config.batch.pregen_modules = Vec::new();
    config
}

fn service_with(provider: ScriptedProvider) -> TutoringService {
    TutoringService::builder()
        .with_provider(Arc::new(provider))
        .with_config(fast_config())
        .build()
        .expect("service builds")
}

#[tokio::test]
async fn full_conversation_flow() {
    let service = service_with(ScriptedProvider::always("Great question! 7 x 8 = 56."));

    let start = service.start_session("lena", "math").await.unwrap();
    assert!(!start.greeting.is_empty());
    assert_eq!(service.active_sessions(), 1);

    let reply = service
        .send_message(&start.session_id, "what is seven times eight?")
        .await
        .unwrap();
    assert_eq!(reply.reply, "Great question! 7 x 8 = 56.");
    assert!(!reply.cache_hit);
    assert!(reply.xp_delta > 0);

    let summary = service.end_session(&start.session_id).await.unwrap();
    assert_eq!(summary.message_count, 1);
    assert_eq!(service.active_sessions(), 0);

    service.shutdown().await;
}

#[tokio::test]
async fn repeated_prompt_is_served_from_cache_without_cost() {
    let service = service_with(ScriptedProvider::always("An octagon has 8 sides."));
    let start = service.start_session("omar", "math").await.unwrap();

    let first = service
        .send_message(&start.session_id, "how many sides does an octagon have?")
        .await
        .unwrap();
    assert!(!first.cache_hit);
    let cost_after_first = service.usage_stats().total_cost;
    assert!(cost_after_first > 0.0);

    let second = service
        .send_message(&start.session_id, "How many sides does an octagon have?")
        .await
        .unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.reply, first.reply);

    // The cached turn added no cost, and the cache credits the saved tokens
    assert_eq!(service.usage_stats().total_cost, cost_after_first);
    let cache = service.cache_stats();
    assert_eq!(cache.hits, 1);
    assert!(cache.tokens_saved > 0);

    service.shutdown().await;
}

#[tokio::test]
async fn provider_outage_degrades_to_fallback_content() {
    let provider = ScriptedProvider::new(vec![ScriptedReply::rate_limited()]).repeat_last();
    let service = service_with(provider);
    let start = service.start_session("mia", "science").await.unwrap();

    let reply = service
        .send_message(&start.session_id, "why is the sky blue?")
        .await
        .unwrap();
    assert_eq!(reply.degraded, Some(ErrorKind::RateLimit));
    // Served from the science offline bank, which carries reward XP
    assert!(!reply.reply.is_empty());
    assert!(reply.xp_delta > 0);

    service.shutdown().await;
}

#[tokio::test]
async fn break_suggestion_fires_once_at_message_threshold() {
    let mut config = fast_config();
    config.session.break_message_threshold = 15;
    config.session.break_after = Duration::from_secs(24 * 3600);
    let service = TutoringService::builder()
        .with_provider(Arc::new(ScriptedProvider::always("ok!")))
        .with_config(config)
        .build()
        .unwrap();
    let start = service.start_session("finn", "reading").await.unwrap();

    let mut fired = Vec::new();
    for i in 1..=16 {
        let reply = service
            .send_message(&start.session_id, &format!("tell me more, part {i}"))
            .await
            .unwrap();
        if reply.break_suggested {
            fired.push(i);
        }
    }
    assert_eq!(fired, vec![15]);

    service.shutdown().await;
}

#[tokio::test]
async fn batch_requests_consolidate_and_slice_in_order() {
    // One consolidated call serves all three quiz requests
    let ten_lines = (1..=10)
        .map(|i| format!("Quiz question {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let service = service_with(ScriptedProvider::always(ten_lines));

    let t1 = service.request_content(ContentType::Quiz, "math", 2, BatchPriority::Medium);
    let t2 = service.request_content(ContentType::Quiz, "math", 3, BatchPriority::Medium);
    let t3 = service.request_content(ContentType::Quiz, "math", 5, BatchPriority::Medium);

    let served = service.drain_batches().await;
    assert_eq!(served, 3);

    let r1 = t1.await.unwrap();
    let r2 = t2.await.unwrap();
    let r3 = t3.await.unwrap();
    assert_eq!((r1.len(), r2.len(), r3.len()), (2, 3, 5));
    assert_eq!(r1[0], "Quiz question 1");
    assert_eq!(r2[0], "Quiz question 3");
    assert_eq!(r3[0], "Quiz question 6");
    assert_eq!(r3[4], "Quiz question 10");

    service.shutdown().await;
}

#[tokio::test]
async fn weekly_pregeneration_fills_then_skips() {
    let mut config = fast_config();
    config.batch.pregen_modules = vec!["math".to_string()];
    config.batch.pregen_quiz_count = 3;
    config.batch.pregen_fact_count = 2;
    let lines = "item one\nitem two\nitem three";
    let service = TutoringService::builder()
        .with_provider(Arc::new(ScriptedProvider::always(lines)))
        .with_config(config)
        .build()
        .unwrap();

    // The startup job may already have filled the bundles; either way a
    // fresh bundle must make the next explicit pass a no-op.
    service.pregenerate_now().await;
    let second_pass = service.pregenerate_now().await;
    assert_eq!(second_pass, 0);

    service.shutdown().await;
}

#[tokio::test]
async fn memory_carries_across_sessions() {
    let service = service_with(ScriptedProvider::always("Dinosaurs were amazing!"));

    let first = service.start_session("zoe", "science").await.unwrap();
    service
        .send_message(&first.session_id, "tell me about dinosaurs please")
        .await
        .unwrap();
    service.end_session(&first.session_id).await.unwrap();

    // The next session's greeting comes from the consolidator with the
    // previous session on record
    let second = service.start_session("zoe", "science").await.unwrap();
    assert!(!second.greeting.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn mastery_reflects_in_session_summary() {
    let service = service_with(ScriptedProvider::always("ok"));
    let start = service.start_session("ada", "math").await.unwrap();

    for _ in 0..5 {
        service
            .record_attempt(&start.session_id, "addition", true)
            .await
            .unwrap();
    }

    let summary = service.end_session(&start.session_id).await.unwrap();
    assert_eq!(summary.concepts_mastered, vec!["addition"]);

    service.shutdown().await;
}

#[tokio::test]
async fn shutdown_is_idempotent_and_clean() {
    let service = service_with(ScriptedProvider::always("ok"));
    service.shutdown().await;
    // A second shutdown finds no jobs left and returns immediately
    service.shutdown().await;
}
