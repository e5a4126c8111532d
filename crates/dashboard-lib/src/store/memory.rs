//! In-memory state store for tests and demo mode

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PauseRecord, StoreError, WorkloadId, WorkloadStateStore};

/// Process-local pause records; contents are lost on restart
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<RwLock<BTreeMap<WorkloadId, PauseRecord>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl WorkloadStateStore for MemoryStateStore {
    async fn put(&self, id: &WorkloadId, record: &PauseRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &WorkloadId) -> Result<Option<PauseRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &WorkloadId) -> Result<(), StoreError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(WorkloadId, PauseRecord)>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}
