//! Append-only usage ledger and the daily budget control loop

use super::pricing::PricingTable;
use crate::config::CostConfig;
use crate::llm::{ModelTier, RequestPriority};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One LLM call, as billed
///
/// Records are immutable once appended; the ledger exposes no mutation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub module: String,
    pub tier: ModelTier,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// USD; zero when the turn was served from cache
    pub cost: f64,
    pub cached: bool,
}

impl UsageRecord {
    /// Storage key under which this record is persisted
    pub fn storage_key(&self) -> String {
        format!("usage/{}/{}", self.timestamp.date_naive(), self.id)
    }
}

/// Outcome of tracking one call
#[derive(Debug, Clone)]
pub struct TrackOutcome {
    /// The appended record
    pub record: UsageRecord,
    /// USD billed for this call
    pub cost: f64,
    /// Today's spend as a percentage of the daily budget
    pub daily_usage_percent: f64,
    /// Spend ratio crossed the downgrade threshold; prefer cached/fallback
    pub should_fallback: bool,
    /// Today's spend crossed the alert threshold
    pub cost_alert: bool,
}

/// Aggregated usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_cost: f64,
    pub call_count: usize,
    pub cached_count: usize,
    /// Cost and call count per module
    pub by_module: HashMap<String, (usize, f64)>,
    /// Cost and call count per tier
    pub by_tier: HashMap<String, (usize, f64)>,
}

impl UsageStats {
    fn add(&mut self, record: &UsageRecord) {
        self.total_input_tokens += record.input_tokens;
        self.total_output_tokens += record.output_tokens;
        self.total_cost += record.cost;
        self.call_count += 1;
        if record.cached {
            self.cached_count += 1;
        }
        let module = self.by_module.entry(record.module.clone()).or_default();
        module.0 += 1;
        module.1 += record.cost;
        let tier = self.by_tier.entry(record.tier.to_string()).or_default();
        tier.0 += 1;
        tier.1 += record.cost;
    }

    /// Format the total as a dollar string
    pub fn format_cost(&self) -> String {
        if self.total_cost < 0.01 {
            format!("${:.4}", self.total_cost)
        } else {
            format!("${:.2}", self.total_cost)
        }
    }
}

/// Cost tracker over an append-only record log
///
/// Arithmetic is synchronous and cheap; persistence of appended records is
/// the caller's concern (spawned, best-effort).
pub struct UsageLedger {
    records: RwLock<Vec<UsageRecord>>,
    pricing: PricingTable,
    config: CostConfig,
}

impl UsageLedger {
    /// Create a ledger with default pricing
    pub fn new(config: CostConfig) -> Self {
        Self::with_pricing(config, PricingTable::default())
    }

    /// Create a ledger with custom pricing
    pub fn with_pricing(config: CostConfig, pricing: PricingTable) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            pricing,
            config,
        }
    }

    /// Track one call and evaluate the budget thresholds
    ///
    /// Cached turns always cost zero regardless of token counts.
    pub fn track_usage(
        &self,
        session_id: &str,
        input_tokens: usize,
        output_tokens: usize,
        tier: ModelTier,
        module: &str,
        cached: bool,
    ) -> TrackOutcome {
        let cost = if cached {
            0.0
        } else {
            self.pricing.cost(tier, input_tokens, output_tokens)
        };

        let record = UsageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            module: module.to_string(),
            tier,
            input_tokens,
            output_tokens,
            cost,
            cached,
        };

        let daily_cost = {
            let mut records = self.records.write();
            records.push(record.clone());
            Self::cost_for_date(&records, record.timestamp.date_naive())
        };

        let ratio = if self.config.daily_budget_usd > 0.0 {
            daily_cost / self.config.daily_budget_usd
        } else {
            0.0
        };
        let cost_alert = daily_cost >= self.config.alert_threshold_usd;
        if cost_alert {
            tracing::warn!(daily_cost, module, "daily cost alert threshold crossed");
        }

        TrackOutcome {
            record,
            cost,
            daily_usage_percent: ratio * 100.0,
            should_fallback: ratio >= self.config.downgrade_ratio,
            cost_alert,
        }
    }

    /// Today's spend as a fraction of the daily budget
    pub fn daily_usage_ratio(&self) -> f64 {
        if self.config.daily_budget_usd <= 0.0 {
            return 0.0;
        }
        let records = self.records.read();
        Self::cost_for_date(&records, Utc::now().date_naive()) / self.config.daily_budget_usd
    }

    /// Pick the tier for a request
    ///
    /// Once the daily spend ratio reaches the downgrade threshold, every
    /// request drops to the cheapest tier no matter what was asked for.
    pub fn select_tier(&self, priority: RequestPriority) -> ModelTier {
        let ratio = self.daily_usage_ratio();
        if ratio >= self.config.downgrade_ratio {
            tracing::info!(
                ratio,
                requested = %priority.preferred_tier(),
                "daily budget nearly exhausted, downgrading to cheapest tier"
            );
            ModelTier::cheapest()
        } else {
            priority.preferred_tier()
        }
    }

    /// Estimate the cost of a call without recording it
    pub fn estimate_cost(&self, tier: ModelTier, input_tokens: usize, output_tokens: usize) -> f64 {
        self.pricing.cost(tier, input_tokens, output_tokens)
    }

    /// Aggregate statistics over all records
    pub fn stats(&self) -> UsageStats {
        let records = self.records.read();
        let mut stats = UsageStats::default();
        for record in records.iter() {
            stats.add(record);
        }
        stats
    }

    /// Aggregate statistics for one calendar day
    pub fn daily_summary(&self, date: NaiveDate) -> UsageStats {
        let records = self.records.read();
        let mut stats = UsageStats::default();
        for record in records.iter().filter(|r| r.timestamp.date_naive() == date) {
            stats.add(record);
        }
        stats
    }

    /// Statistics scoped to one session
    pub fn session_stats(&self, session_id: &str) -> UsageStats {
        let records = self.records.read();
        let mut stats = UsageStats::default();
        for record in records.iter().filter(|r| r.session_id == session_id) {
            stats.add(record);
        }
        stats
    }

    fn cost_for_date(records: &[UsageRecord], date: NaiveDate) -> f64 {
        records
            .iter()
            .filter(|r| r.timestamp.date_naive() == date)
            .map(|r| r.cost)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_budget(daily_budget_usd: f64) -> UsageLedger {
        UsageLedger::new(CostConfig {
            daily_budget_usd,
            ..CostConfig::default()
        })
    }

    #[test]
    fn test_cached_calls_cost_zero() {
        let ledger = ledger_with_budget(1.0);
        let outcome = ledger.track_usage("s1", 100_000, 50_000, ModelTier::Quality, "math", true);
        assert_eq!(outcome.cost, 0.0);
        assert_eq!(outcome.record.cost, 0.0);
        assert!(outcome.record.cached);
    }

    #[test]
    fn test_uncached_cost_formula() {
        let ledger = ledger_with_budget(1.0);
        let outcome =
            ledger.track_usage("s1", 1_000_000, 1_000_000, ModelTier::Quality, "math", false);
        // Default quality pricing: $3/1M in + $15/1M out
        assert!((outcome.cost - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_percent_is_non_decreasing() {
        let ledger = ledger_with_budget(1.0);
        let mut last = 0.0;
        for _ in 0..5 {
            let outcome =
                ledger.track_usage("s1", 100_000, 10_000, ModelTier::Balanced, "math", false);
            assert!(outcome.daily_usage_percent >= last);
            last = outcome.daily_usage_percent;
        }
    }

    #[test]
    fn test_should_fallback_past_eighty_percent() {
        let ledger = ledger_with_budget(0.10);
        // Balanced: $0.8/1M in, $4/1M out. 60k in + 10k out = $0.088 = 88%
        let outcome = ledger.track_usage("s1", 60_000, 10_000, ModelTier::Balanced, "math", false);
        assert!(outcome.should_fallback);
        assert!(outcome.daily_usage_percent > 80.0);

        // Well under the threshold stays on the requested tier
        let calm = ledger_with_budget(100.0);
        let outcome = calm.track_usage("s1", 60_000, 10_000, ModelTier::Balanced, "math", false);
        assert!(!outcome.should_fallback);
    }

    #[test]
    fn test_tier_selection_honors_priority_under_budget() {
        let ledger = ledger_with_budget(100.0);
        assert_eq!(
            ledger.select_tier(RequestPriority::Quality),
            ModelTier::Quality
        );
        assert_eq!(
            ledger.select_tier(RequestPriority::Economy),
            ModelTier::Economy
        );
    }

    #[test]
    fn test_tier_downgrade_when_budget_exhausted() {
        let ledger = ledger_with_budget(0.01);
        ledger.track_usage("s1", 1_000_000, 1_000_000, ModelTier::Quality, "math", false);
        assert_eq!(
            ledger.select_tier(RequestPriority::Quality),
            ModelTier::Economy
        );
    }

    #[test]
    fn test_cost_alert() {
        let ledger = UsageLedger::new(CostConfig {
            daily_budget_usd: 10.0,
            alert_threshold_usd: 0.05,
            ..CostConfig::default()
        });
        let outcome = ledger.track_usage("s1", 100_000, 10_000, ModelTier::Quality, "math", false);
        // $0.3 in + $0.15 out = $0.45 >= $0.05
        assert!(outcome.cost_alert);
    }

    #[test]
    fn test_stats_aggregation() {
        let ledger = ledger_with_budget(100.0);
        ledger.track_usage("s1", 1000, 500, ModelTier::Quality, "math", false);
        ledger.track_usage("s1", 1000, 500, ModelTier::Economy, "reading", false);
        ledger.track_usage("s2", 1000, 500, ModelTier::Economy, "math", true);

        let stats = ledger.stats();
        assert_eq!(stats.call_count, 3);
        assert_eq!(stats.cached_count, 1);
        assert_eq!(stats.by_module.get("math").unwrap().0, 2);
        assert_eq!(stats.by_tier.get("economy").unwrap().0, 2);

        let session = ledger.session_stats("s2");
        assert_eq!(session.call_count, 1);
    }

    #[test]
    fn test_daily_summary_scopes_to_date() {
        let ledger = ledger_with_budget(100.0);
        ledger.track_usage("s1", 1000, 500, ModelTier::Balanced, "math", false);

        let today = ledger.daily_summary(Utc::now().date_naive());
        assert_eq!(today.call_count, 1);

        let yesterday = ledger.daily_summary(
            Utc::now().date_naive().pred_opt().unwrap(),
        );
        assert_eq!(yesterday.call_count, 0);
    }
}
