//! Per-tier token pricing

use crate::llm::ModelTier;
use serde::{Deserialize, Serialize};

/// Price per million tokens for one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPrice {
    /// USD per million input tokens
    pub input_per_million: f64,
    /// USD per million output tokens
    pub output_per_million: f64,
}

impl TierPrice {
    /// Create a price
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Cost in USD for a call
    pub fn calculate(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        input_tokens as f64 / 1_000_000.0 * self.input_per_million
            + output_tokens as f64 / 1_000_000.0 * self.output_per_million
    }
}

/// Pricing for every tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    pub quality: TierPrice,
    pub balanced: TierPrice,
    pub economy: TierPrice,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            quality: TierPrice::new(3.0, 15.0),
            balanced: TierPrice::new(0.8, 4.0),
            economy: TierPrice::new(0.1, 0.4),
        }
    }
}

impl PricingTable {
    /// Price for a tier
    pub fn price(&self, tier: ModelTier) -> TierPrice {
        match tier {
            ModelTier::Quality => self.quality,
            ModelTier::Balanced => self.balanced,
            ModelTier::Economy => self.economy,
        }
    }

    /// Cost in USD for a call on a tier
    pub fn cost(&self, tier: ModelTier, input_tokens: usize, output_tokens: usize) -> f64 {
        self.price(tier).calculate(input_tokens, output_tokens)
    }
}
