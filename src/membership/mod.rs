//! Worker membership as seen by placement and execution.
//!
//! The surface is split by capability:
//!
//! - [`MembershipService`]: read queries (worker lists, lookups, health)
//! - [`MembershipAdmin`]: membership mutations issued by DDL or journal replay
//! - [`MembershipImage`]: legacy image save/load hooks
//! - [`CapacityHooks`]: disk-capacity and report bookkeeping
//!
//! [`LakeMembership`] implements all four for shared-data deployments, where
//! the external registry owns membership. There, mutations are rejected and
//! the image and capacity hooks do nothing.

pub mod lake;
pub mod worker;

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MembershipError, Result};

pub use lake::LakeMembership;
pub use worker::{NetworkAddress, Worker, WorkerGroupId, WorkerId};

#[async_trait]
pub trait MembershipService: Send + Sync {
    /// All workers, in registry order.
    async fn workers(&self) -> Result<Vec<Worker>>;

    /// Members of `group`, in registry order.
    async fn workers_in_group(&self, group: WorkerGroupId) -> Result<Vec<Worker>>;

    /// Look up a worker. Unknown ids are `Ok(None)`.
    async fn worker(&self, id: WorkerId) -> Result<Option<Worker>>;

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool>;

    async fn worker_count(&self) -> Result<usize> {
        Ok(self.workers().await?.len())
    }

    async fn worker_count_in_group(&self, group: WorkerGroupId) -> Result<usize> {
        Ok(self.workers_in_group(group).await?.len())
    }

    async fn is_single_worker_group(&self, group: WorkerGroupId) -> Result<bool> {
        Ok(self.worker_count_in_group(group).await? == 1)
    }

    /// True if the registry knows the worker.
    async fn is_worker_available(&self, id: WorkerId) -> Result<bool> {
        Ok(self.worker(id).await?.is_some())
    }

    /// True if the registry knows the worker and reports it alive.
    async fn is_worker_alive(&self, id: WorkerId) -> Result<bool> {
        Ok(self.worker(id).await?.is_some_and(|w| w.alive))
    }

    async fn worker_ids(&self, need_alive: bool) -> Result<Vec<WorkerId>> {
        Ok(filter_ids(self.workers().await?, need_alive))
    }

    async fn worker_ids_in_group(
        &self,
        group: WorkerGroupId,
        need_alive: bool,
    ) -> Result<Vec<WorkerId>> {
        Ok(filter_ids(self.workers_in_group(group).await?, need_alive))
    }

    async fn id_to_worker(&self) -> Result<BTreeMap<WorkerId, Worker>> {
        Ok(self.workers().await?.into_iter().map(|w| (w.id, w)).collect())
    }

    async fn id_to_worker_in_group(
        &self,
        group: WorkerGroupId,
    ) -> Result<BTreeMap<WorkerId, Worker>> {
        Ok(self
            .workers_in_group(group)
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect())
    }

    /// Find the worker serving data-path traffic on `host:data_port`.
    async fn worker_with_data_port(&self, host: &str, data_port: u16) -> Result<Option<Worker>> {
        Ok(self
            .workers()
            .await?
            .into_iter()
            .find(|w| w.host == host && w.data_port == data_port))
    }

    /// Map a worker's data-path address to its administrative address.
    ///
    /// # Errors
    ///
    /// [`MembershipError::WorkerNotFound`] if no worker serves `data_addr`.
    async fn to_admin_address(&self, data_addr: &NetworkAddress) -> Result<NetworkAddress> {
        self.worker_with_data_port(&data_addr.host, data_addr.port)
            .await?
            .map(|w| w.admin_address())
            .ok_or_else(|| MembershipError::WorkerNotFound(data_addr.to_string()))
    }
}

fn filter_ids(workers: Vec<Worker>, need_alive: bool) -> Vec<WorkerId> {
    workers
        .into_iter()
        .filter(|w| !need_alive || w.alive)
        .map(|w| w.id)
        .collect()
}

/// Membership mutations.
///
/// Implementations that do not own membership must reject every call with
/// [`MembershipError::Unsupported`] rather than ignore it.
pub trait MembershipAdmin {
    fn add_workers(&self, addrs: &[NetworkAddress]) -> Result<()>;
    fn add_compute_nodes(&self, addrs: &[NetworkAddress]) -> Result<()>;
    fn drop_worker(&self, id: WorkerId) -> Result<()>;
    /// Drop the worker whose heartbeat endpoint is `addr`.
    fn drop_worker_by_address(&self, addr: &NetworkAddress, force: bool) -> Result<()>;
    fn drop_workers(&self, addrs: &[NetworkAddress]) -> Result<()>;
    fn drop_compute_node(&self, addr: &NetworkAddress) -> Result<()>;
    fn drop_compute_nodes(&self, addrs: &[NetworkAddress]) -> Result<()>;
    fn drop_all_workers(&self) -> Result<()>;
    fn modify_worker_host(&self, from: &str, to: &str) -> Result<()>;
    fn replay_add_worker(&self, worker: &Worker) -> Result<()>;
    fn replay_drop_worker(&self, id: WorkerId) -> Result<()>;
}

/// Save/load hooks invoked for every membership implementation when the
/// engine writes or reads its metadata image.
///
/// Each hook receives the running image checksum and returns the updated one.
pub trait MembershipImage {
    fn save_workers(&self, out: &mut dyn Write, checksum: u64) -> std::io::Result<u64>;
    fn load_workers(&self, input: &mut dyn Read, checksum: u64) -> std::io::Result<u64>;
    fn save_compute_nodes(&self, out: &mut dyn Write, checksum: u64) -> std::io::Result<u64>;
    fn load_compute_nodes(&self, input: &mut dyn Read, checksum: u64) -> std::io::Result<u64>;
    /// Drop any image-derived state.
    fn clear(&self);
}

/// A storage path on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub root_path: String,
    pub total_capacity_bytes: u64,
    pub available_capacity_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityStatus {
    Ok,
    Exceeded(String),
}

impl CapacityStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, CapacityStatus::Ok)
    }
}

pub trait CapacityHooks {
    /// Check whether writing to the given worker paths would exceed disk
    /// limits. `paths` maps worker id to path hashes.
    fn check_disk_capacity(
        &self,
        paths: &HashMap<WorkerId, Vec<u64>>,
        flood_stage: bool,
    ) -> CapacityStatus;
    fn update_path_info(&self, added: &[DiskInfo], removed: &[DiskInfo]);
    fn check_cluster_capacity(&self) -> Result<()>;
    fn update_worker_state(&self, worker: &Worker);
    /// Last tablet report version of a worker, if it reports at all.
    fn report_version(&self, id: WorkerId) -> Option<u64>;
    fn update_report_version(&self, id: WorkerId, version: u64, db_id: u64);
}
