//! Estimate store port
//!
//! The persistence engine is an external collaborator keyed by queue id that
//! holds the last computed estimate. Rows are never expired by the store;
//! freshness is judged by the resolver at read time.

pub mod memory;

pub use memory::{InMemoryEstimateStore, MockEstimateStore};

use crate::error::Result;
use crate::types::{EwtEstimate, QueueId};
use async_trait::async_trait;

/// Key-value store of the last estimate per queue
#[async_trait]
pub trait EstimateStore: Send + Sync {
    /// Fetch the last estimate for a queue, if any
    async fn get(&self, queue_id: &QueueId) -> Result<Option<EwtEstimate>>;

    /// Upsert the estimate, replacing any prior row for its queue
    async fn put(&self, estimate: EwtEstimate) -> Result<()>;

    /// Name of the backing collection
    fn table_name(&self) -> &str;
}
