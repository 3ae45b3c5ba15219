//! Test fixtures and fake collaborators for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queue_ewt::config::{AppConfig, BackendSettings};
use queue_ewt::error::{EwtError, Result};
use queue_ewt::store::{EstimateStore, InMemoryEstimateStore};
use queue_ewt::telemetry::MetricsSource;
use queue_ewt::types::{Channel, EwtEstimate, LiveSnapshot, QueueId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2024-03-14T10:17:42Z
pub const NOW_MILLIS: i64 = 1_710_411_462_000;

pub fn queue_arn(queue_id: &str) -> String {
    format!(
        "arn:aws:connect:us-east-1:111122223333:instance/test-instance/queue/{}",
        queue_id
    )
}

pub fn test_config() -> AppConfig {
    AppConfig {
        backend: BackendSettings::new("test-instance", "ewt-integration"),
        ..Default::default()
    }
}

/// Recorded historical query
#[derive(Debug, Clone)]
pub struct HistoricalQuery {
    pub queue_id: QueueId,
    pub channel: Channel,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Metrics source with programmable answers that counts every call
#[derive(Default)]
pub struct CountingMetricsSource {
    live: Mutex<HashMap<QueueId, LiveSnapshot>>,
    historical: Mutex<HashMap<QueueId, f64>>,
    historical_queries: Mutex<Vec<HistoricalQuery>>,
    live_calls: AtomicUsize,
    fail_live: AtomicBool,
    fail_historical: AtomicBool,
    live_delay_ms: AtomicUsize,
}

impl CountingMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live(&self, queue_id: &str, contacts: u64, oldest_age: u64, agents: u64) {
        if let Ok(mut live) = self.live.lock() {
            live.insert(
                QueueId::from(queue_id),
                LiveSnapshot {
                    contacts_in_queue: contacts,
                    oldest_contact_age_seconds: oldest_age,
                    agents_available: agents,
                },
            );
        }
    }

    pub fn set_historical(&self, queue_id: &str, average_seconds: f64) {
        if let Ok(mut historical) = self.historical.lock() {
            historical.insert(QueueId::from(queue_id), average_seconds);
        }
    }

    pub fn fail_live(&self, fail: bool) {
        self.fail_live.store(fail, Ordering::SeqCst);
    }

    pub fn fail_historical(&self, fail: bool) {
        self.fail_historical.store(fail, Ordering::SeqCst);
    }

    /// Make every live call take this long
    pub fn delay_live(&self, delay: Duration) {
        self.live_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }

    pub fn historical_queries(&self) -> Vec<HistoricalQuery> {
        self.historical_queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetricsSource for CountingMetricsSource {
    async fn live_snapshot(&self, queue_id: &QueueId, _channel: &Channel) -> Result<LiveSnapshot> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.live_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
        }

        if self.fail_live.load(Ordering::SeqCst) {
            return Err(EwtError::UpstreamMetrics {
                operation: "live_snapshot".to_string(),
                message: "backend unavailable".to_string(),
            }
            .into());
        }

        Ok(self
            .live
            .lock()
            .ok()
            .and_then(|live| live.get(queue_id).copied())
            .unwrap_or_default())
    }

    async fn historical_average(
        &self,
        queue_id: &QueueId,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        if let Ok(mut queries) = self.historical_queries.lock() {
            queries.push(HistoricalQuery {
                queue_id: queue_id.clone(),
                channel: channel.clone(),
                start,
                end,
            });
        }

        if self.fail_historical.load(Ordering::SeqCst) {
            return Err(EwtError::UpstreamMetrics {
                operation: "historical_average".to_string(),
                message: "backend unavailable".to_string(),
            }
            .into());
        }

        Ok(self
            .historical
            .lock()
            .ok()
            .and_then(|historical| historical.get(queue_id).copied()))
    }
}

/// In-memory store that can be told to fail and records every write
pub struct FlakyStore {
    inner: InMemoryEstimateStore,
    writes: Mutex<Vec<EwtEstimate>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryEstimateStore::new("ewt-integration"),
            writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed a row without counting it as a write
    pub async fn seed(&self, queue_id: &str, wait_seconds: i64, observed_at_millis: i64) {
        let _ = self
            .inner
            .put(EwtEstimate::new(
                QueueId::from(queue_id),
                wait_seconds,
                observed_at_millis,
            ))
            .await;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<EwtEstimate> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EstimateStore for FlakyStore {
    async fn get(&self, queue_id: &QueueId) -> Result<Option<EwtEstimate>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EwtError::StoreRead {
                message: "throttled".to_string(),
            }
            .into());
        }
        self.inner.get(queue_id).await
    }

    async fn put(&self, estimate: EwtEstimate) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EwtError::InternalError {
                message: "write rejected".to_string(),
            }
            .into());
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(estimate.clone());
        }
        self.inner.put(estimate).await
    }

    fn table_name(&self) -> &str {
        self.inner.table_name()
    }
}

/// Shared handles for a resolver under test
pub struct TestSystem {
    pub metrics_source: Arc<CountingMetricsSource>,
    pub store: Arc<FlakyStore>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self {
            metrics_source: Arc::new(CountingMetricsSource::new()),
            store: Arc::new(FlakyStore::new()),
        }
    }
}
