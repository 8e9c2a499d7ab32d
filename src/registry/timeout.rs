use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::{RegistryError, WorkerRegistry};
use crate::membership::{Worker, WorkerGroupId, WorkerId};

/// Bounds every query against the wrapped registry.
///
/// An expired query is reported as [`RegistryError::Timeout`]; nothing is
/// retried here.
#[derive(Debug)]
pub struct TimeoutRegistry<R> {
    inner: R,
    timeout: Duration,
}

impl<R: WorkerRegistry> TimeoutRegistry<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        query: &'static str,
        fut: impl Future<Output = Result<T, RegistryError>> + Send,
    ) -> Result<T, RegistryError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(query, timeout = ?self.timeout, "Registry query timed out");
                Err(RegistryError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl<R: WorkerRegistry> WorkerRegistry for TimeoutRegistry<R> {
    async fn list_workers(&self) -> Result<Vec<Worker>, RegistryError> {
        self.bounded("list_workers", self.inner.list_workers()).await
    }

    async fn list_workers_in_groups(
        &self,
        groups: &[WorkerGroupId],
    ) -> Result<Vec<Worker>, RegistryError> {
        self.bounded(
            "list_workers_in_groups",
            self.inner.list_workers_in_groups(groups),
        )
        .await
    }

    async fn get_worker(&self, id: WorkerId) -> Result<Option<Worker>, RegistryError> {
        self.bounded("get_worker", self.inner.get_worker(id)).await
    }

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool, RegistryError> {
        self.bounded("is_worker_healthy", self.inner.is_worker_healthy(id))
            .await
    }
}
