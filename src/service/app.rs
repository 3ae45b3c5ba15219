//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the external
//! collaborators into the resolver once at process start and shares them
//! across all requests.

use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::service::handler::EntryHandler;
use crate::store::{EstimateStore, InMemoryEstimateStore};
use crate::telemetry::{MetricsSource, StaticMetricsSource};
use crate::wait_time::EwtResolver;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Process-wide application state
pub struct AppState {
    config: AppConfig,
    resolver: Arc<EwtResolver>,
    handler: Arc<EntryHandler>,
    metrics_collector: Arc<MetricsCollector>,
    started_at: Instant,
    running: AtomicBool,
}

impl AppState {
    /// Build the state with the in-process store and an empty snapshot source
    pub fn new(config: AppConfig) -> Result<Self> {
        let metrics_source = Arc::new(StaticMetricsSource::new(
            config.backend.instance_id.clone(),
        ));
        let store = Arc::new(InMemoryEstimateStore::new(
            config.backend.table_name.clone(),
        ));

        Self::with_collaborators(config, metrics_source, store)
    }

    /// Build the state with the snapshot source seeded from a JSON file
    pub fn with_snapshot_file(config: AppConfig, path: &Path) -> Result<Self> {
        let metrics_source = Arc::new(StaticMetricsSource::from_json_file(
            config.backend.instance_id.clone(),
            path,
        )?);
        let store = Arc::new(InMemoryEstimateStore::new(
            config.backend.table_name.clone(),
        ));

        Self::with_collaborators(config, metrics_source, store)
    }

    /// Build the state around injected collaborators
    pub fn with_collaborators(
        config: AppConfig,
        metrics_source: Arc<dyn MetricsSource>,
        store: Arc<dyn EstimateStore>,
    ) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);

        let resolver = Arc::new(
            EwtResolver::new(config.estimation.clone(), metrics_source, store)?
                .with_metrics(metrics_collector.clone()),
        );
        let handler =
            Arc::new(EntryHandler::new(resolver.clone()).with_metrics(metrics_collector.clone()));

        info!(
            "Application state initialized - table: '{}', instance: '{}', freshness: {}m, lookback: {}h",
            config.backend.table_name,
            config.backend.instance_id,
            config.estimation.freshness_window_minutes,
            config.estimation.historical_lookback_hours
        );

        Ok(Self {
            config,
            resolver,
            handler,
            metrics_collector,
            started_at: Instant::now(),
            running: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn resolver(&self) -> Arc<EwtResolver> {
        self.resolver.clone()
    }

    pub fn handler(&self) -> Arc<EntryHandler> {
        self.handler.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Mark the service as accepting requests
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("Service marked as running");
    }

    /// Mark the service as shutting down
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Service marked as stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
