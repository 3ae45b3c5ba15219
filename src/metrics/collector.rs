//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the EWT resolution pipeline
//! using Prometheus metrics.

use crate::types::Resolution;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the EWT service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Resolution pipeline metrics
    resolution_metrics: ResolutionMetrics,

    /// External collaborator metrics
    upstream_metrics: UpstreamMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total inbound requests handled
    pub requests_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Resolution pipeline metrics
#[derive(Clone)]
pub struct ResolutionMetrics {
    /// Resolutions by estimate source
    pub resolutions_total: IntCounterVec,

    /// Cache lookups by outcome (hit/miss)
    pub cache_lookups_total: IntCounterVec,

    /// Last answered minutes by estimate source
    pub last_minutes: IntGaugeVec,

    /// End-to-end resolution time
    pub resolution_duration: Histogram,
}

/// External collaborator metrics
#[derive(Clone)]
pub struct UpstreamMetrics {
    /// Failed or timed out external calls by operation
    pub upstream_errors_total: IntCounterVec,

    /// Estimates that could not be persisted
    pub persist_failures_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let resolution_metrics = ResolutionMetrics::new(&registry)?;
        let upstream_metrics = UpstreamMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            resolution_metrics,
            upstream_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get resolution metrics
    pub fn resolution(&self) -> &ResolutionMetrics {
        &self.resolution_metrics
    }

    /// Get upstream metrics
    pub fn upstream(&self) -> &UpstreamMetrics {
        &self.upstream_metrics
    }

    /// Record a completed resolution
    pub fn record_resolution(&self, resolution: &Resolution, duration: Duration) {
        self.resolution_metrics
            .resolutions_total
            .with_label_values(&[resolution.source.as_str()])
            .inc();

        self.resolution_metrics
            .last_minutes
            .with_label_values(&[resolution.source.as_str()])
            .set(resolution.minutes);

        self.resolution_metrics
            .resolution_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a store lookup outcome
    pub fn record_cache_lookup(&self, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };

        self.resolution_metrics
            .cache_lookups_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a failed external call
    pub fn record_upstream_error(&self, operation: &str) {
        self.upstream_metrics
            .upstream_errors_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record a failed store write
    pub fn record_persist_failure(&self) {
        self.upstream_metrics.persist_failures_total.inc();
    }

    /// Record an inbound request by response status
    pub fn record_request(&self, success: bool) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .requests_total
            .with_label_values(&[status])
            .inc();
    }

    /// Update uptime gauge
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(i64::try_from(uptime.as_secs()).unwrap_or(i64::MAX));
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("queue_ewt_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("queue_ewt_requests_total", "Total inbound EWT requests"),
            &["status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let health_status = IntGauge::new(
            "queue_ewt_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("queue_ewt_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            requests_total,
            health_status,
            component_health,
        })
    }
}

impl ResolutionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let resolutions_total = IntCounterVec::new(
            Opts::new(
                "queue_ewt_resolutions_total",
                "Resolutions by estimate source",
            ),
            &["source"],
        )?;
        registry.register(Box::new(resolutions_total.clone()))?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("queue_ewt_cache_lookups_total", "Estimate store lookups"),
            &["outcome"],
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        let last_minutes = IntGaugeVec::new(
            Opts::new(
                "queue_ewt_last_minutes",
                "Last answered expected wait in minutes",
            ),
            &["source"],
        )?;
        registry.register(Box::new(last_minutes.clone()))?;

        let resolution_duration = Histogram::with_opts(
            HistogramOpts::new(
                "queue_ewt_resolution_duration_seconds",
                "End-to-end resolution time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(resolution_duration.clone()))?;

        Ok(Self {
            resolutions_total,
            cache_lookups_total,
            last_minutes,
            resolution_duration,
        })
    }
}

impl UpstreamMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let upstream_errors_total = IntCounterVec::new(
            Opts::new(
                "queue_ewt_upstream_errors_total",
                "Failed or timed out external calls",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(upstream_errors_total.clone()))?;

        let persist_failures_total = IntCounter::new(
            "queue_ewt_persist_failures_total",
            "Estimates that could not be persisted",
        )?;
        registry.register(Box::new(persist_failures_total.clone()))?;

        Ok(Self {
            upstream_errors_total,
            persist_failures_total,
        })
    }
}
