//! In-memory estimate store implementations

use crate::error::{EwtError, Result};
use crate::store::EstimateStore;
use crate::types::{EwtEstimate, QueueId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// In-memory estimate store, one row per queue
#[derive(Debug)]
pub struct InMemoryEstimateStore {
    table_name: String,
    rows: RwLock<HashMap<QueueId, EwtEstimate>>,
}

impl InMemoryEstimateStore {
    /// Create a new in-memory store for the given collection name
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored rows
    pub fn len(&self) -> Result<usize> {
        let rows = self.rows.read().map_err(|_| EwtError::InternalError {
            message: "Failed to acquire estimate rows read lock".to_string(),
        })?;

        Ok(rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryEstimateStore {
    fn default() -> Self {
        Self::new("ewt-estimates")
    }
}

#[async_trait]
impl EstimateStore for InMemoryEstimateStore {
    async fn get(&self, queue_id: &QueueId) -> Result<Option<EwtEstimate>> {
        let rows = self.rows.read().map_err(|_| EwtError::InternalError {
            message: "Failed to acquire estimate rows read lock".to_string(),
        })?;

        Ok(rows.get(queue_id).cloned())
    }

    async fn put(&self, estimate: EwtEstimate) -> Result<()> {
        let mut rows = self.rows.write().map_err(|_| EwtError::InternalError {
            message: "Failed to acquire estimate rows write lock".to_string(),
        })?;

        rows.insert(estimate.queue_id.clone(), estimate);
        Ok(())
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// Mock estimate store for testing
///
/// Records every `put` and can be switched into failing reads or writes.
#[derive(Debug, Default)]
pub struct MockEstimateStore {
    rows: RwLock<HashMap<QueueId, EwtEstimate>>,
    put_calls: RwLock<Vec<EwtEstimate>>,
    get_calls: RwLock<Vec<QueueId>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockEstimateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a row, bypassing call recording
    pub fn preset(&self, estimate: EwtEstimate) -> Result<()> {
        let mut rows = self.rows.write().map_err(|_| EwtError::InternalError {
            message: "Failed to acquire estimate rows write lock".to_string(),
        })?;

        rows.insert(estimate.queue_id.clone(), estimate);
        Ok(())
    }

    /// Make subsequent reads fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Get all put calls made (for testing)
    pub fn get_put_calls(&self) -> Vec<EwtEstimate> {
        self.put_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Get all queue ids read (for testing)
    pub fn get_get_calls(&self) -> Vec<QueueId> {
        self.get_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Current row for a queue, bypassing call recording
    pub fn row(&self, queue_id: &QueueId) -> Option<EwtEstimate> {
        self.rows
            .read()
            .ok()
            .and_then(|rows| rows.get(queue_id).cloned())
    }
}

#[async_trait]
impl EstimateStore for MockEstimateStore {
    async fn get(&self, queue_id: &QueueId) -> Result<Option<EwtEstimate>> {
        if let Ok(mut calls) = self.get_calls.write() {
            calls.push(queue_id.clone());
        }

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EwtError::StoreRead {
                message: "simulated read failure".to_string(),
            }
            .into());
        }

        Ok(self.row(queue_id))
    }

    async fn put(&self, estimate: EwtEstimate) -> Result<()> {
        if let Ok(mut calls) = self.put_calls.write() {
            calls.push(estimate.clone());
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EwtError::StorePersist {
                queue_id: estimate.queue_id.to_string(),
                message: "simulated write failure".to_string(),
            }
            .into());
        }

        self.preset(estimate)
    }

    fn table_name(&self) -> &str {
        "mock-estimates"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_upserts() {
        let store = InMemoryEstimateStore::new("estimates");
        let queue = QueueId::from("q1");

        assert!(store.get(&queue).await.unwrap().is_none());
        assert!(store.is_empty().unwrap());

        store
            .put(EwtEstimate::new(queue.clone(), 120, 1_000))
            .await
            .unwrap();
        store
            .put(EwtEstimate::new(queue.clone(), 300, 2_000))
            .await
            .unwrap();

        let row = store.get(&queue).await.unwrap().unwrap();
        assert_eq!(row.wait_seconds, 300);
        assert_eq!(row.observed_at_millis, 2_000);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.table_name(), "estimates");
    }

    #[tokio::test]
    async fn test_empty_queue_id_is_a_valid_key() {
        let store = InMemoryEstimateStore::default();
        let empty = QueueId::default();

        store
            .put(EwtEstimate::new(empty.clone(), 60, 5))
            .await
            .unwrap();

        assert_eq!(store.get(&empty).await.unwrap().unwrap().wait_seconds, 60);
    }

    #[tokio::test]
    async fn test_mock_store_records_and_fails() {
        let store = MockEstimateStore::new();
        let queue = QueueId::from("q1");

        store
            .put(EwtEstimate::new(queue.clone(), 90, 10))
            .await
            .unwrap();
        assert_eq!(store.get_put_calls().len(), 1);
        assert!(store.get(&queue).await.unwrap().is_some());
        assert_eq!(store.get_get_calls(), vec![queue.clone()]);

        store.fail_writes(true);
        let err = store
            .put(EwtEstimate::new(queue.clone(), 600, 20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("simulated write failure"));
        // Failed write is still recorded but leaves the row untouched
        assert_eq!(store.get_put_calls().len(), 2);
        assert_eq!(store.row(&queue).unwrap().wait_seconds, 90);

        store.fail_reads(true);
        assert!(store.get(&queue).await.is_err());
    }
}
