#![forbid(unsafe_code)]

//! Core domain model and derivation logic for the vitals tracker.
//!
//! This crate provides:
//! - Domain types (readings, sessions, sleep entries, lab results)
//! - Session aggregation and change classification
//! - Subscores, the overall health score and insights
//! - The ignored-metric registry with debounced persistence
//! - Persistence (key-value store, journal, CSV export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod catalog;
pub mod change;
pub mod session;
pub mod score;
pub mod insights;
pub mod trends;
pub mod store;
pub mod registry;
pub mod journal;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, default_catalog, MetricCatalog};
pub use change::{classify, compare, ChangeConfig, ChangeResult, ChangeType, DeltaStyle};
pub use config::Config;
pub use insights::compose_insights;
pub use journal::Journal;
pub use registry::{IgnoredMetrics, MetricFilter};
pub use score::{compute_health_score, HealthScore};
pub use session::{build_session, replace_session};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
