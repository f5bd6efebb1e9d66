//! Cost/quality tiers

use serde::{Deserialize, Serialize};

/// A cost/quality level of LLM access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Most capable, most expensive
    Quality,
    /// Middle of the road
    Balanced,
    /// Cheapest and fastest; the budget-exhaustion floor
    Economy,
}

impl ModelTier {
    /// The tier every request drops to once the daily budget nears exhaustion
    pub fn cheapest() -> Self {
        Self::Economy
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Quality => write!(f, "quality"),
            ModelTier::Balanced => write!(f, "balanced"),
            ModelTier::Economy => write!(f, "economy"),
        }
    }
}

/// Caller-expressed priority for a request
///
/// Priority is a request, not a promise: the budget loop may override it
/// (see `UsageLedger::select_tier`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Quality,
    Balanced,
    Economy,
}

impl RequestPriority {
    /// The tier this priority maps to when the budget allows it
    pub fn preferred_tier(&self) -> ModelTier {
        match self {
            Self::Quality => ModelTier::Quality,
            Self::Balanced => ModelTier::Balanced,
            Self::Economy => ModelTier::Economy,
        }
    }
}

impl Default for RequestPriority {
    fn default() -> Self {
        Self::Balanced
    }
}
