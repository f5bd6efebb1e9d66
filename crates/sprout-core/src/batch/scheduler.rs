//! The batch scheduler

use crate::error::SproutResult;
use crate::fallback::ContentType;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Notify, oneshot};

/// Issues one consolidated generation call for a batch of content
///
/// Implemented over the live pipeline by the SDK; batch work rides the same
/// optimizer/cache/provider stack as conversational turns.
#[async_trait]
pub trait BulkGenerator: Send + Sync {
    /// Generate `count` items of the given type for a module
    async fn generate_bulk(
        &self,
        content_type: ContentType,
        module: &str,
        count: usize,
    ) -> SproutResult<Vec<String>>;
}

/// Request urgency; a high-priority enqueue wakes the drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatchPriority {
    High,
    Medium,
    Low,
}

/// Receiver side of one enqueued request
///
/// Resolves at drain time with exactly the requested count of items; the
/// sender is dropped (and the receiver errors) if generation failed.
pub type BatchTicket = oneshot::Receiver<Vec<String>>;

struct QueuedRequest {
    seq: u64,
    content_type: ContentType,
    module: String,
    count: usize,
    responder: oneshot::Sender<Vec<String>>,
}

/// Priority queue of bulk content requests, drained in consolidated groups
pub struct BatchScheduler {
    lanes: Mutex<[VecDeque<QueuedRequest>; 3]>,
    seq: AtomicU64,
    wakeup: Notify,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new([VecDeque::new(), VecDeque::new(), VecDeque::new()]),
            seq: AtomicU64::new(0),
            wakeup: Notify::new(),
        }
    }

    /// Queue a request for `count` items
    ///
    /// High priority nudges the drain loop awake; everything else waits for
    /// the next timer tick.
    pub fn enqueue(
        &self,
        content_type: ContentType,
        module: &str,
        count: usize,
        priority: BatchPriority,
    ) -> BatchTicket {
        let (tx, rx) = oneshot::channel();
        let request = QueuedRequest {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            content_type,
            module: module.to_string(),
            count,
            responder: tx,
        };

        let lane = match priority {
            BatchPriority::High => 0,
            BatchPriority::Medium => 1,
            BatchPriority::Low => 2,
        };
        self.lanes.lock()[lane].push_back(request);

        if priority == BatchPriority::High {
            self.wakeup.notify_one();
        }
        rx
    }

    /// Total queued requests
    pub fn pending(&self) -> usize {
        self.lanes.lock().iter().map(VecDeque::len).sum()
    }

    /// Wait until a high-priority enqueue asks for an immediate drain
    pub async fn wait_for_urgent(&self) {
        self.wakeup.notified().await;
    }

    /// Drain the queue: one consolidated call per `(type, module)` group,
    /// sliced back to the original requests in enqueue order
    pub async fn drain(&self, generator: &dyn BulkGenerator) -> usize {
        let requests: Vec<QueuedRequest> = {
            let mut lanes = self.lanes.lock();
            lanes.iter_mut().flat_map(std::mem::take).collect()
        };
        if requests.is_empty() {
            return 0;
        }

        // Group by (type, module); high-priority groups drain first because
        // lanes were flattened in priority order
        let mut groups: Vec<((ContentType, String), Vec<QueuedRequest>)> = Vec::new();
        for request in requests {
            let key = (request.content_type, request.module.clone());
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(request),
                None => groups.push((key, vec![request])),
            }
        }
        for (_, members) in &mut groups {
            // Slicing follows enqueue order even across priority lanes
            members.sort_by_key(|r| r.seq);
        }

        let mut served = 0;
        for ((content_type, module), members) in groups {
            let total: usize = members.iter().map(|r| r.count).sum();
            tracing::debug!(
                %content_type,
                module,
                requests = members.len(),
                total,
                "draining batch group"
            );

            match generator.generate_bulk(content_type, &module, total).await {
                Ok(items) => {
                    let mut offset = 0;
                    for member in members {
                        let end = (offset + member.count).min(items.len());
                        let slice = items[offset.min(items.len())..end].to_vec();
                        offset = end;
                        // Receiver may have given up; that is fine
                        let _ = member.responder.send(slice);
                        served += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(%content_type, module, "batch generation failed: {e}");
                    // Dropping the responders signals failure to the tickets
                }
            }
        }
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    /// Generator that fabricates numbered items and records its calls
    struct CountingGenerator {
        calls: SyncMutex<Vec<(ContentType, String, usize)>>,
        fail: bool,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: SyncMutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: SyncMutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl BulkGenerator for CountingGenerator {
        async fn generate_bulk(
            &self,
            content_type: ContentType,
            module: &str,
            count: usize,
        ) -> SproutResult<Vec<String>> {
            self.calls
                .lock()
                .push((content_type, module.to_string(), count));
            if self.fail {
                return Err(crate::error::SproutError::batch("generator down"));
            }
            Ok((0..count).map(|i| format!("{content_type}-{module}-{i}")).collect())
        }
    }

    #[tokio::test]
    async fn test_grouped_drain_slices_in_enqueue_order() {
        let scheduler = BatchScheduler::new();
        let generator = CountingGenerator::new();

        let t1 = scheduler.enqueue(ContentType::Quiz, "math", 2, BatchPriority::Medium);
        let t2 = scheduler.enqueue(ContentType::Quiz, "math", 3, BatchPriority::Medium);
        let t3 = scheduler.enqueue(ContentType::Quiz, "math", 5, BatchPriority::Medium);

        let served = scheduler.drain(&generator).await;
        assert_eq!(served, 3);

        // One consolidated call for the whole group
        let calls = generator.calls.lock().clone();
        assert_eq!(calls, vec![(ContentType::Quiz, "math".to_string(), 10)]);

        let r1 = t1.await.unwrap();
        let r2 = t2.await.unwrap();
        let r3 = t3.await.unwrap();
        assert_eq!(r1.len(), 2);
        assert_eq!(r2.len(), 3);
        assert_eq!(r3.len(), 5);
        // Slices are contiguous and in enqueue order
        assert_eq!(r1[0], "quiz-math-0");
        assert_eq!(r2[0], "quiz-math-2");
        assert_eq!(r3[0], "quiz-math-5");
        assert_eq!(r3[4], "quiz-math-9");
    }

    #[tokio::test]
    async fn test_distinct_groups_get_distinct_calls() {
        let scheduler = BatchScheduler::new();
        let generator = CountingGenerator::new();

        let quiz = scheduler.enqueue(ContentType::Quiz, "math", 2, BatchPriority::Low);
        let fact = scheduler.enqueue(ContentType::Fact, "math", 2, BatchPriority::Low);
        let reading = scheduler.enqueue(ContentType::Quiz, "reading", 1, BatchPriority::Low);

        scheduler.drain(&generator).await;
        assert_eq!(generator.calls.lock().len(), 3);
        assert_eq!(quiz.await.unwrap().len(), 2);
        assert_eq!(fact.await.unwrap().len(), 2);
        assert_eq!(reading.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_high_priority_wakes_the_drain_loop() {
        let scheduler = std::sync::Arc::new(BatchScheduler::new());

        let waiter = {
            let scheduler = std::sync::Arc::clone(&scheduler);
            tokio::spawn(async move {
                scheduler.wait_for_urgent().await;
            })
        };
        // Give the waiter a moment to park
        tokio::task::yield_now().await;

        let _ticket = scheduler.enqueue(ContentType::Fact, "science", 1, BatchPriority::High);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("high-priority enqueue must wake the waiter")
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_generation_drops_tickets() {
        let scheduler = BatchScheduler::new();
        let generator = CountingGenerator::failing();

        let ticket = scheduler.enqueue(ContentType::Quiz, "math", 2, BatchPriority::Medium);
        let served = scheduler.drain(&generator).await;
        assert_eq!(served, 0);
        assert!(ticket.await.is_err());
    }

    #[tokio::test]
    async fn test_empty_drain_is_a_noop() {
        let scheduler = BatchScheduler::new();
        let generator = CountingGenerator::new();
        assert_eq!(scheduler.drain(&generator).await, 0);
        assert!(generator.calls.lock().is_empty());
    }
}
