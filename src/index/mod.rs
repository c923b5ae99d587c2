//! Index Engine: aggregates per-venue ticks into a weighted index per
//! `IndexSymbol` and publishes snapshots to the Price Bus (§4.2).

pub mod analytics;
pub mod engine;

pub use analytics::{Analytics, WilderAnalytics};
pub use engine::IndexEngine;
