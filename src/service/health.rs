//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the queue-ewt
//! service, including readiness and liveness probes.

use crate::service::app::AppState;
use crate::types::QueueId;
use crate::utils::current_timestamp;
use crate::wait_time::estimator::bounded_call;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported to Prometheus
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Unhealthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Healthy => 2,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Seconds since the state was built
    pub uptime_seconds: u64,
    /// Estimate store collection
    pub table_name: String,
    /// Metrics backend scope
    pub instance_id: String,
    /// Freshness window applied to stored estimates
    pub freshness_window_minutes: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state);
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        // The resolver answers without the store, so a failing store only degrades
        let store_check = Self::check_estimate_store(&app_state).await;
        if store_check.status != HealthStatus::Healthy && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(store_check);

        let collector = app_state.metrics_collector();
        collector.update_health_status(overall_status.as_gauge());
        collector.update_uptime(app_state.uptime());
        for check in &checks {
            collector.update_component_health(&check.name, check.status == HealthStatus::Healthy);
        }

        let config = app_state.config();
        Ok(HealthCheck {
            status: overall_status,
            service: config.service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: current_timestamp(),
            checks,
            stats: ServiceStats {
                uptime_seconds: app_state.uptime().as_secs(),
                table_name: config.backend.table_name.clone(),
                instance_id: config.backend.instance_id.clone(),
                freshness_window_minutes: config.estimation.freshness_window_minutes,
            },
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running() {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_estimate_store(&app_state).await.status)
    }

    fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Probe the store with a read of the empty key
    async fn check_estimate_store(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let store = app_state.resolver().store();
        let timeout = app_state.config().estimation.call_timeout();

        let (status, message) =
            match bounded_call("store_probe", timeout, store.get(&QueueId::default())).await {
                Ok(_) => (HealthStatus::Healthy, None),
                Err(e) => {
                    warn!("Estimate store probe failed: {}", e);
                    (
                        HealthStatus::Degraded,
                        Some(format!("Store probe failed: {}", e)),
                    )
                }
            };

        debug!(
            "Estimate store '{}' probe finished: {:?}",
            store.table_name(),
            status
        );

        ComponentCheck {
            name: "estimate_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
