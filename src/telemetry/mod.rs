//! Metrics source port
//!
//! The telemetry backend is an external collaborator. This module defines the
//! interface the resolver consumes and a snapshot-backed implementation used by
//! the standalone service and tests.

pub mod static_source;

pub use static_source::{QueueSignals, StaticMetricsSource};

use crate::error::Result;
use crate::types::{Channel, LiveSnapshot, QueueId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Supplier of live and historical queue metrics
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Current queue depth, oldest contact age and available agents
    async fn live_snapshot(&self, queue_id: &QueueId, channel: &Channel) -> Result<LiveSnapshot>;

    /// Average wait in seconds over `[start, end)`, `None` when the backend has no data
    async fn historical_average(
        &self,
        queue_id: &QueueId,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>>;
}
