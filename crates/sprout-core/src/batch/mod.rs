//! Batch content generation
//!
//! Groups bulk content requests so one consolidated provider call serves
//! many, and pre-generates a weekly bundle per module. Runs off the live
//! request path entirely.

pub mod pregen;
pub mod scheduler;

pub use pregen::{bundle_prompt, pregenerate, stored_bundle};
pub use scheduler::{BatchPriority, BatchScheduler, BatchTicket, BulkGenerator};
