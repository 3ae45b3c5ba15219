//! Metrics and HTTP surface for the queue-ewt service
//!
//! This module provides Prometheus metrics collection for the resolution
//! pipeline and the Axum server exposing `/ewt`, health probes and `/metrics`.

pub mod collector;
pub mod server;

pub use collector::{
    MetricsCollector, MetricsTimer, ResolutionMetrics, ServiceMetrics, UpstreamMetrics,
};
pub use server::{encode_metrics, HttpServer, HttpServerConfig};
