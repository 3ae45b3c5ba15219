//! Service layer for the queue-ewt resolver
//!
//! This module contains the inbound entry handler, the process-wide
//! application state and the health probes.

pub mod app;
pub mod handler;
pub mod health;

pub use app::AppState;
pub use handler::EntryHandler;
pub use health::{ComponentCheck, HealthCheck, HealthStatus};
