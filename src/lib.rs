//! Queue EWT - expected wait time resolver for contact-center queues
//!
//! This crate answers "how many minutes until this caller is answered" from
//! a short-lived estimate cache, live queue metrics and a historical average,
//! always returning a bounded whole number of minutes.

pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod wait_time;

// Re-export commonly used types and traits
pub use error::{EwtError, Result};
pub use types::*;

// Re-export key components
pub use store::{EstimateStore, InMemoryEstimateStore};
pub use telemetry::{MetricsSource, StaticMetricsSource};
pub use wait_time::EwtResolver;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
