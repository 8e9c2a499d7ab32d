use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{RegistryError, WorkerRegistry};
use crate::membership::{Worker, WorkerGroupId, WorkerId};

fn default_healthy() -> bool {
    true
}

/// A worker entry as stored in a registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    #[serde(flatten)]
    pub worker: Worker,
    #[serde(default = "default_healthy")]
    pub healthy: bool,
}

impl From<Worker> for WorkerRecord {
    fn from(worker: Worker) -> Self {
        Self {
            worker,
            healthy: true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    workers: Vec<WorkerRecord>,
}

/// Registry backed by an in-memory worker list.
///
/// Member order is insertion order (document order when loaded from a file).
/// Re-inserting an existing id keeps its position.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    records: RwLock<Vec<WorkerRecord>>,
}

impl SnapshotRegistry {
    pub fn new(records: Vec<WorkerRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn from_workers(workers: impl IntoIterator<Item = Worker>) -> Self {
        Self::new(workers.into_iter().map(WorkerRecord::from).collect())
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let doc: SnapshotDocument = serde_json::from_str(json)?;
        Ok(Self::new(doc.workers))
    }

    /// Load a snapshot document from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let registry = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            workers = registry.records.read().await.len(),
            "Loaded registry snapshot"
        );
        Ok(registry)
    }

    pub async fn to_json(&self) -> Result<String, RegistryError> {
        let doc = SnapshotDocument {
            workers: self.records.read().await.clone(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Insert a worker, or replace the record with the same id in place.
    pub async fn upsert(&self, record: WorkerRecord) {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|r| r.worker.id == record.worker.id)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Remove a worker. Returns false if it was not registered.
    pub async fn remove(&self, id: WorkerId) -> bool {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.worker.id != id);
        records.len() != before
    }

    /// Update a worker's health. Returns false if it was not registered.
    pub async fn set_healthy(&self, id: WorkerId, healthy: bool) -> bool {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.worker.id == id) {
            Some(record) => {
                record.healthy = healthy;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl WorkerRegistry for SnapshotRegistry {
    async fn list_workers(&self) -> Result<Vec<Worker>, RegistryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|r| r.worker.clone())
            .collect())
    }

    async fn list_workers_in_groups(
        &self,
        groups: &[WorkerGroupId],
    ) -> Result<Vec<Worker>, RegistryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| groups.contains(&r.worker.group_id))
            .map(|r| r.worker.clone())
            .collect())
    }

    async fn get_worker(&self, id: WorkerId) -> Result<Option<Worker>, RegistryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.worker.id == id)
            .map(|r| r.worker.clone()))
    }

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool, RegistryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .any(|r| r.worker.id == id && r.healthy))
    }
}
