//! Configuration management for the queue-ewt service
//!
//! This module handles all configuration loading from environment variables
//! or TOML files, validation, and default values for the EWT service.

pub mod app;
pub mod backend;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use backend::BackendSettings;
