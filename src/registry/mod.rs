//! Client-side boundary to the external worker registry.
//!
//! The registry is the sole owner of worker identity, group membership and
//! health. This crate only reads from it through [`WorkerRegistry`]:
//!
//! - [`SnapshotRegistry`]: registry backed by a JSON snapshot, for development
//!   setups and tests
//! - [`TimeoutRegistry`]: wraps any registry and bounds every query
//!
//! Failures are reported as [`RegistryError`]. The membership layer translates
//! them into its own error type before they reach placement callers.

pub mod snapshot;
pub mod timeout;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::membership::{Worker, WorkerGroupId, WorkerId};

pub use snapshot::{SnapshotRegistry, WorkerRecord};
pub use timeout::TimeoutRegistry;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Registry query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid registry snapshot: {0}")]
    InvalidSnapshot(#[from] serde_json::Error),

    #[error("Failed to read registry snapshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only query surface of the worker registry.
///
/// Member lists are returned in the registry's order; the order is stable for
/// an unchanged membership and is what round-robin selection walks.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    async fn list_workers(&self) -> Result<Vec<Worker>, RegistryError>;

    async fn list_workers_in_groups(
        &self,
        groups: &[WorkerGroupId],
    ) -> Result<Vec<Worker>, RegistryError>;

    /// Absence is `Ok(None)`; errors are reserved for transport failures.
    async fn get_worker(&self, id: WorkerId) -> Result<Option<Worker>, RegistryError>;

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool, RegistryError>;
}

#[async_trait]
impl<R: WorkerRegistry + ?Sized> WorkerRegistry for std::sync::Arc<R> {
    async fn list_workers(&self) -> Result<Vec<Worker>, RegistryError> {
        (**self).list_workers().await
    }

    async fn list_workers_in_groups(
        &self,
        groups: &[WorkerGroupId],
    ) -> Result<Vec<Worker>, RegistryError> {
        (**self).list_workers_in_groups(groups).await
    }

    async fn get_worker(&self, id: WorkerId) -> Result<Option<Worker>, RegistryError> {
        (**self).get_worker(id).await
    }

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool, RegistryError> {
        (**self).is_worker_healthy(id).await
    }
}
