//! Cost tracking and tier selection
//!
//! Tracks token spend per call in an append-only ledger, watches the daily
//! budget, and downgrades tiers when spend approaches the ceiling. Budget
//! exhaustion is a deliberate degrade, never an error.

pub mod ledger;
pub mod pricing;

pub use ledger::{TrackOutcome, UsageLedger, UsageRecord, UsageStats};
pub use pricing::{PricingTable, TierPrice};
