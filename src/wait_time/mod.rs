//! Expected wait time resolution
//!
//! This module handles the cache-first resolution pipeline, the tiered
//! live/historical fallback policy and the aligned historical time window.

pub mod estimator;
pub mod resolver;
pub mod window;

// Re-export commonly used types
pub use estimator::{
    clamp_wait_seconds, live_estimate_seconds, EstimationConfig, FallbackEstimator,
    FreshEstimate, PersistencePolicy,
};
pub use resolver::EwtResolver;
pub use window::{align_to_grid, TimeWindow};
