//! Bulk generation over the live provider pipeline

use sprout_core::batch::BulkGenerator;
use sprout_core::cost::UsageLedger;
use sprout_core::error::{SproutError, SproutResult};
use sprout_core::fallback::ContentType;
use sprout_core::llm::{
    ChatMessage, GenerationRequest, LlmProvider, RequestPriority, RetryPolicy,
    generate_with_retry,
};
use sprout_core::optimizer::compact_instructions;
use std::sync::Arc;

use async_trait::async_trait;

/// [`BulkGenerator`] backed by the same provider and ledger as live turns
///
/// Bulk work always rides the economy tier: it is pre-generation, not a
/// learner waiting on an answer.
pub struct PipelineGenerator {
    provider: Arc<dyn LlmProvider>,
    ledger: Arc<UsageLedger>,
    retry: RetryPolicy,
}

impl PipelineGenerator {
    /// Create a generator over the given provider and ledger
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        ledger: Arc<UsageLedger>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            ledger,
            retry,
        }
    }

    /// One generated line per item; numbering and bullets are stripped
    fn parse_items(text: &str, count: usize) -> Vec<String> {
        text.lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                    .trim_start_matches(['-', '*'])
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .take(count)
            .collect()
    }
}

#[async_trait]
impl BulkGenerator for PipelineGenerator {
    async fn generate_bulk(
        &self,
        content_type: ContentType,
        module: &str,
        count: usize,
    ) -> SproutResult<Vec<String>> {
        let prompt = format!(
            "Write {count} short {content_type} items for a child learning {module}. \
             Exactly one item per line, no introduction, no numbering."
        );
        let instructions = compact_instructions(module)
            .unwrap_or("You write short, cheerful learning content for children.")
            .to_string();

        let tier = self.ledger.select_tier(RequestPriority::Economy);
        let request =
            GenerationRequest::new(vec![ChatMessage::user(prompt)], instructions, tier)
                .with_max_tokens(64 * count.max(1))
                .with_temperature(0.9);

        let response = generate_with_retry(self.provider.as_ref(), &request, &self.retry)
            .await
            .map_err(|e| SproutError::batch(format!("bulk generation failed: {e}")))?;

        self.ledger.track_usage(
            "batch",
            response.input_tokens,
            response.output_tokens,
            tier,
            module,
            false,
        );

        let items = Self::parse_items(&response.text, count);
        tracing::debug!(%content_type, module, requested = count, parsed = items.len(), "bulk items generated");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_core::config::CostConfig;
    use sprout_core::llm::ScriptedProvider;

    #[test]
    fn test_parse_items_strips_decoration() {
        let text = "1. What is 2+2?\n2) What is 3+3?\n- What is 4+4?\n\n  * What is 5+5?";
        let items = PipelineGenerator::parse_items(text, 10);
        assert_eq!(
            items,
            vec![
                "What is 2+2?",
                "What is 3+3?",
                "What is 4+4?",
                "What is 5+5?"
            ]
        );
    }

    #[test]
    fn test_parse_items_truncates_to_count() {
        let text = "a\nb\nc\nd";
        assert_eq!(PipelineGenerator::parse_items(text, 2).len(), 2);
    }

    #[tokio::test]
    async fn test_generate_bulk_bills_usage() {
        let provider = Arc::new(ScriptedProvider::always("q one\nq two\nq three"));
        let ledger = Arc::new(UsageLedger::new(CostConfig::default()));
        let generator = PipelineGenerator::new(
            provider,
            Arc::clone(&ledger),
            RetryPolicy::default(),
        );

        let items = generator
            .generate_bulk(ContentType::Quiz, "math", 3)
            .await
            .unwrap();
        assert_eq!(items.len(), 3);

        let stats = ledger.stats();
        assert_eq!(stats.call_count, 1);
        assert!(stats.by_tier.contains_key("economy"));
    }
}
