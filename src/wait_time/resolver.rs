//! Cache-first EWT resolution
//!
//! Resolution order: store read → (on miss or stale row) live snapshot →
//! (when inconclusive) historical average → clamp → store write. Calls are
//! issued sequentially; nothing is shared between resolutions except the
//! injected collaborators, so concurrent misses for one queue may both
//! recompute and the last write wins.

use crate::error::{EwtError, Result};
use crate::metrics::MetricsCollector;
use crate::store::EstimateStore;
use crate::telemetry::MetricsSource;
use crate::types::{Channel, EstimateSource, EwtEstimate, QueueId, Resolution};
use crate::utils::seconds_to_minutes;
use crate::wait_time::estimator::{
    bounded_call, EstimationConfig, FallbackEstimator, PersistencePolicy,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Resolves the expected wait of a queue in whole minutes
pub struct EwtResolver {
    store: Arc<dyn EstimateStore>,
    estimator: FallbackEstimator,
    metrics: Option<Arc<MetricsCollector>>,
}

impl EwtResolver {
    /// Create a new resolver over the two external collaborators
    pub fn new(
        config: EstimationConfig,
        metrics_source: Arc<dyn MetricsSource>,
        store: Arc<dyn EstimateStore>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            estimator: FallbackEstimator::new(config, metrics_source)?,
            metrics: None,
        })
    }

    /// Attach a Prometheus collector
    pub fn with_metrics(mut self, collector: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(collector);
        self
    }

    pub fn config(&self) -> &EstimationConfig {
        self.estimator.config()
    }

    pub fn store(&self) -> Arc<dyn EstimateStore> {
        Arc::clone(&self.store)
    }

    /// Resolve the wait for `queue_locator` as of `now_millis`.
    ///
    /// Always answers unless the persistence policy is `Required` and the
    /// fresh estimate could not be stored.
    pub async fn resolve(
        &self,
        queue_locator: Option<&str>,
        channel_hint: Option<&str>,
        now_millis: i64,
    ) -> Result<Resolution> {
        let timer = std::time::Instant::now();
        let queue_id = QueueId::from_locator(queue_locator);
        let channel = Channel::from_hint(channel_hint);

        if queue_id.is_empty() {
            warn!(
                "Queue locator {:?} did not yield a queue id, resolving with empty key",
                queue_locator
            );
        }

        if let Some(resolution) = self.cached(&queue_id, &channel, now_millis).await {
            self.record_resolution(&resolution, timer.elapsed());
            return Ok(resolution);
        }

        let fresh = self.estimator.estimate(&queue_id, &channel, now_millis).await;
        for operation in &fresh.failed_operations {
            self.record_upstream_error(operation);
        }

        let estimate = EwtEstimate::new(queue_id.clone(), fresh.seconds, now_millis);
        self.persist(estimate).await?;

        let resolution = Resolution {
            queue_id,
            channel,
            wait_seconds: fresh.seconds,
            minutes: seconds_to_minutes(fresh.seconds),
            source: fresh.source,
        };

        info!(
            "Resolved EWT - queue: '{}', channel: {}, source: {}, raw: {}s, wait: {}s, minutes: {}",
            resolution.queue_id,
            resolution.channel,
            resolution.source,
            fresh.raw_seconds,
            resolution.wait_seconds,
            resolution.minutes
        );

        self.record_resolution(&resolution, timer.elapsed());
        Ok(resolution)
    }

    /// Minutes-only form of [`EwtResolver::resolve`]
    pub async fn resolve_minutes(
        &self,
        queue_locator: Option<&str>,
        channel_hint: Option<&str>,
        now_millis: i64,
    ) -> Result<i64> {
        Ok(self
            .resolve(queue_locator, channel_hint, now_millis)
            .await?
            .minutes)
    }

    /// Fresh cached resolution, if the store holds one. Read failures count as a miss.
    async fn cached(
        &self,
        queue_id: &QueueId,
        channel: &Channel,
        now_millis: i64,
    ) -> Option<Resolution> {
        let freshness_millis = self.config().freshness_window_millis();

        let row = match bounded_call(
            "store_get",
            self.config().call_timeout(),
            self.store.get(queue_id),
        )
        .await
        {
            Ok(row) => row,
            Err(e) => {
                warn!(
                    "Estimate store read failed for '{}', treating as cache miss: {}",
                    queue_id, e
                );
                self.record_upstream_error("store_get");
                None
            }
        };

        match row {
            Some(row) if row.age_millis(now_millis) < freshness_millis => {
                // Stored rows are trusted verbatim; only freshness is checked
                let minutes = seconds_to_minutes(row.wait_seconds);
                info!(
                    "Cache hit - queue: '{}', channel: {}, wait: {}s, minutes: {}, age: {}ms",
                    queue_id,
                    channel,
                    row.wait_seconds,
                    minutes,
                    row.age_millis(now_millis)
                );
                self.record_cache_lookup(true);

                Some(Resolution {
                    queue_id: queue_id.clone(),
                    channel: channel.clone(),
                    wait_seconds: row.wait_seconds,
                    minutes,
                    source: EstimateSource::Cache,
                })
            }
            Some(row) => {
                debug!(
                    "Stale estimate for '{}' (age: {}ms, window: {}ms)",
                    queue_id,
                    row.age_millis(now_millis),
                    freshness_millis
                );
                self.record_cache_lookup(false);
                None
            }
            None => {
                debug!("No stored estimate for '{}'", queue_id);
                self.record_cache_lookup(false);
                None
            }
        }
    }

    async fn persist(&self, estimate: EwtEstimate) -> Result<()> {
        let queue_id = estimate.queue_id.clone();

        let Err(e) = bounded_call(
            "store_put",
            self.config().call_timeout(),
            self.store.put(estimate),
        )
        .await
        else {
            return Ok(());
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_persist_failure();
        }

        match self.config().persistence_policy {
            PersistencePolicy::BestEffort => {
                warn!(
                    "Failed to persist estimate for '{}' in table '{}', answering anyway: {}",
                    queue_id,
                    self.store.table_name(),
                    e
                );
                Ok(())
            }
            PersistencePolicy::Required => {
                error!(
                    "Failed to persist estimate for '{}' in table '{}': {}",
                    queue_id,
                    self.store.table_name(),
                    e
                );
                Err(EwtError::StorePersist {
                    queue_id: queue_id.to_string(),
                    message: e.to_string(),
                }
                .into())
            }
        }
    }

    fn record_resolution(&self, resolution: &Resolution, elapsed: std::time::Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_resolution(resolution, elapsed);
        }
    }

    fn record_cache_lookup(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(hit);
        }
    }

    fn record_upstream_error(&self, operation: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_upstream_error(operation);
        }
    }
}
