//! History compression

use super::estimator::TokenEstimator;
use super::keywords::extract_keywords;
use super::templates::compact_instructions;
use crate::config::OptimizerConfig;
use crate::llm::{ChatMessage, MessageRole};
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Result of optimizing a request
#[derive(Debug, Clone)]
pub struct OptimizedRequest {
    /// Compressed message list, oldest first
    pub messages: Vec<ChatMessage>,
    /// Instructions, possibly swapped for a compact template
    pub instructions: String,
    /// Estimated prompt tokens after compression
    pub estimated_tokens: usize,
    /// Compressed size over original size (1.0 = no savings)
    pub compression_ratio: f64,
}

/// Compresses context and swaps in compact instruction templates
#[derive(Debug, Clone)]
pub struct RequestOptimizer {
    config: OptimizerConfig,
    estimator: TokenEstimator,
}

impl RequestOptimizer {
    /// Create an optimizer with the given policy
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            estimator: TokenEstimator::new(),
        }
    }

    /// Optimize a request
    ///
    /// The first message and the most recent window survive verbatim; the
    /// middle collapses into one synthetic system message built from topic
    /// keywords. Near-identical messages are dropped by normalized-text hash.
    pub fn optimize(
        &self,
        history: &[ChatMessage],
        instructions: &str,
        module: &str,
    ) -> OptimizedRequest {
        let original_tokens = self
            .estimator
            .estimate_request(history, instructions)
            .max(1);

        let deduped = if self.config.deduplicate {
            self.dedup(history)
        } else {
            history.to_vec()
        };

        let window = self.config.recent_window;
        let messages = if deduped.len() <= window + 1 {
            deduped
        } else {
            let mut compressed = Vec::with_capacity(window + 2);
            compressed.push(deduped[0].clone());
            let middle = &deduped[1..deduped.len() - window];
            if let Some(summary) = self.summarize(middle) {
                compressed.push(summary);
            }
            compressed.extend_from_slice(&deduped[deduped.len() - window..]);
            compressed
        };

        let instructions = compact_instructions(module)
            .map(str::to_string)
            .unwrap_or_else(|| instructions.to_string());

        let estimated_tokens = self.estimator.estimate_request(&messages, &instructions);
        let compression_ratio = estimated_tokens as f64 / original_tokens as f64;

        tracing::debug!(
            module,
            original_tokens,
            estimated_tokens,
            compression_ratio,
            "optimized request"
        );

        OptimizedRequest {
            messages,
            instructions,
            estimated_tokens,
            compression_ratio,
        }
    }

    /// Drop messages whose normalized text was already seen
    fn dedup(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut seen = HashSet::new();
        history
            .iter()
            .filter(|m| {
                let mut hasher = DefaultHasher::new();
                m.role.hash(&mut hasher);
                crate::cache::normalize_prompt(&m.content).hash(&mut hasher);
                seen.insert(hasher.finish())
            })
            .cloned()
            .collect()
    }

    /// Collapse middle messages into one synthetic summary message
    fn summarize(&self, middle: &[ChatMessage]) -> Option<ChatMessage> {
        if middle.is_empty() {
            return None;
        }
        let keywords = extract_keywords(
            middle.iter().map(|m| m.content.as_str()),
            self.config.max_summary_keywords,
        );
        let summary = if keywords.is_empty() {
            format!("(Earlier: {} messages of casual chat.)", middle.len())
        } else {
            format!(
                "(Earlier in this session, {} messages covered: {}.)",
                middle.len(),
                keywords.join(", ")
            )
        };
        Some(ChatMessage::system(summary))
    }
}
