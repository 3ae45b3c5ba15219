//! Snapshot-backed metrics source
//!
//! Serves per-queue signals that are seeded programmatically or from a JSON
//! file. Queues without an entry report an empty live snapshot and no
//! historical data.

use crate::error::{EwtError, Result};
use crate::telemetry::MetricsSource;
use crate::types::{Channel, LiveSnapshot, QueueId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// Signals reported for one queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSignals {
    pub live: LiveSnapshot,
    pub historical_average_seconds: Option<f64>,
}

/// Metrics source answering from an in-process table of queue signals
#[derive(Debug)]
pub struct StaticMetricsSource {
    instance_id: String,
    queues: RwLock<HashMap<QueueId, QueueSignals>>,
}

impl StaticMetricsSource {
    /// Create an empty source scoped to a metrics backend instance
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Load signals from a JSON object keyed by queue id
    pub fn from_json_file(instance_id: impl Into<String>, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EwtError::ConfigurationError {
            message: format!("Failed to read snapshot file {}: {}", path.display(), e),
        })?;
        let queues: HashMap<QueueId, QueueSignals> =
            serde_json::from_str(&content).map_err(|e| EwtError::ConfigurationError {
                message: format!("Invalid snapshot file {}: {}", path.display(), e),
            })?;

        info!(
            "Loaded signals for {} queues from {}",
            queues.len(),
            path.display()
        );

        Ok(Self {
            instance_id: instance_id.into(),
            queues: RwLock::new(queues),
        })
    }

    /// Builder-style seeding of one queue
    pub fn with_queue(self, queue_id: impl Into<QueueId>, signals: QueueSignals) -> Self {
        if let Ok(mut queues) = self.queues.write() {
            queues.insert(queue_id.into(), signals);
        }
        self
    }

    /// Replace the signals of one queue
    pub fn set_signals(&self, queue_id: QueueId, signals: QueueSignals) -> Result<()> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| EwtError::InternalError {
                message: "Failed to acquire queue signals write lock".to_string(),
            })?;

        queues.insert(queue_id, signals);
        Ok(())
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn signals_for(&self, queue_id: &QueueId) -> Result<Option<QueueSignals>> {
        let queues = self
            .queues
            .read()
            .map_err(|_| EwtError::InternalError {
                message: "Failed to acquire queue signals read lock".to_string(),
            })?;

        Ok(queues.get(queue_id).cloned())
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    async fn live_snapshot(&self, queue_id: &QueueId, channel: &Channel) -> Result<LiveSnapshot> {
        let snapshot = self
            .signals_for(queue_id)?
            .map(|signals| signals.live)
            .unwrap_or_default();

        debug!(
            "Live snapshot for '{}'/{} on instance '{}': {:?}",
            queue_id, channel, self.instance_id, snapshot
        );

        Ok(snapshot)
    }

    async fn historical_average(
        &self,
        queue_id: &QueueId,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let average = self
            .signals_for(queue_id)?
            .and_then(|signals| signals.historical_average_seconds);

        debug!(
            "Historical average for '{}'/{} over {} - {}: {:?}",
            queue_id, channel, start, end, average
        );

        Ok(average)
    }
}
