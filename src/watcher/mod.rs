//! Watcher Registry & Supervisors (§4.5).

pub mod registry;
pub mod supervisor;

pub use registry::{CachedPriceSource, PriceSnapshotSource, WatcherRegistry};
pub use supervisor::Supervisor;
