use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    CapacityHooks, CapacityStatus, DiskInfo, MembershipAdmin, MembershipImage, MembershipService,
    NetworkAddress, Worker, WorkerGroupId, WorkerId,
};
use crate::config::MembershipConfig;
use crate::error::{MembershipError, Result};
use crate::registry::{RegistryError, SnapshotRegistry, TimeoutRegistry, WorkerRegistry};
use crate::selector::WorkerSelector;

fn resolution_failure(query: &'static str) -> impl FnOnce(RegistryError) -> MembershipError {
    move |e| {
        tracing::warn!(query, error = %e, "Registry query failed");
        MembershipError::Resolution(e.to_string())
    }
}

fn reject(operation: &'static str) -> Result<()> {
    tracing::warn!(operation, "Rejected membership mutation in shared-data mode");
    Err(MembershipError::unsupported(operation))
}

/// Membership for shared-data deployments.
///
/// Workers come from the external registry. This type only reads from it,
/// keeps round-robin cursors for worker selection, and rejects every attempt
/// to change membership.
#[derive(Debug)]
pub struct LakeMembership<R> {
    registry: R,
    selector: WorkerSelector,
    default_group: WorkerGroupId,
}

impl<R: WorkerRegistry> LakeMembership<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            selector: WorkerSelector::new(),
            default_group: WorkerGroupId::DEFAULT,
        }
    }

    pub fn with_default_group(mut self, group: WorkerGroupId) -> Self {
        self.default_group = group;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn selector(&self) -> &WorkerSelector {
        &self.selector
    }

    pub fn default_group(&self) -> WorkerGroupId {
        self.default_group
    }

    /// Choose `count` distinct workers of `group` for new work, round-robin
    /// across calls.
    ///
    /// An empty result with `count > 0` means the group could not supply
    /// enough workers.
    pub async fn choose_workers(
        &self,
        count: usize,
        group: WorkerGroupId,
    ) -> Result<Vec<WorkerId>> {
        self.selector.choose(self, group, count).await
    }

    /// [`choose_workers`](Self::choose_workers) against the configured
    /// default group.
    pub async fn choose_default_workers(&self, count: usize) -> Result<Vec<WorkerId>> {
        self.choose_workers(count, self.default_group).await
    }
}

impl LakeMembership<TimeoutRegistry<SnapshotRegistry>> {
    /// Build membership over a snapshot registry as described by `config`.
    ///
    /// Without a snapshot path the registry starts empty.
    pub async fn from_config(
        config: &MembershipConfig,
    ) -> std::result::Result<Self, RegistryError> {
        let snapshot = match &config.registry.snapshot_path {
            Some(path) => SnapshotRegistry::load(path).await?,
            None => SnapshotRegistry::default(),
        };
        let registry = TimeoutRegistry::new(
            snapshot,
            Duration::from_millis(config.registry.query_timeout_ms),
        );
        Ok(Self::new(registry).with_default_group(config.default_worker_group))
    }
}

#[async_trait]
impl<R: WorkerRegistry> MembershipService for LakeMembership<R> {
    async fn workers(&self) -> Result<Vec<Worker>> {
        self.registry
            .list_workers()
            .await
            .map_err(resolution_failure("list_workers"))
    }

    async fn workers_in_group(&self, group: WorkerGroupId) -> Result<Vec<Worker>> {
        self.registry
            .list_workers_in_groups(&[group])
            .await
            .map_err(resolution_failure("list_workers_in_groups"))
    }

    async fn worker(&self, id: WorkerId) -> Result<Option<Worker>> {
        self.registry
            .get_worker(id)
            .await
            .map_err(resolution_failure("get_worker"))
    }

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool> {
        self.registry
            .is_worker_healthy(id)
            .await
            .map_err(resolution_failure("is_worker_healthy"))
    }
}

impl<R> MembershipAdmin for LakeMembership<R> {
    fn add_workers(&self, _addrs: &[NetworkAddress]) -> Result<()> {
        reject("add_workers")
    }

    fn add_compute_nodes(&self, _addrs: &[NetworkAddress]) -> Result<()> {
        reject("add_compute_nodes")
    }

    fn drop_worker(&self, _id: WorkerId) -> Result<()> {
        reject("drop_worker")
    }

    fn drop_worker_by_address(&self, _addr: &NetworkAddress, _force: bool) -> Result<()> {
        reject("drop_worker_by_address")
    }

    fn drop_workers(&self, _addrs: &[NetworkAddress]) -> Result<()> {
        reject("drop_workers")
    }

    fn drop_compute_node(&self, _addr: &NetworkAddress) -> Result<()> {
        reject("drop_compute_node")
    }

    fn drop_compute_nodes(&self, _addrs: &[NetworkAddress]) -> Result<()> {
        reject("drop_compute_nodes")
    }

    fn drop_all_workers(&self) -> Result<()> {
        reject("drop_all_workers")
    }

    fn modify_worker_host(&self, _from: &str, _to: &str) -> Result<()> {
        reject("modify_worker_host")
    }

    fn replay_add_worker(&self, _worker: &Worker) -> Result<()> {
        reject("replay_add_worker")
    }

    fn replay_drop_worker(&self, _id: WorkerId) -> Result<()> {
        reject("replay_drop_worker")
    }
}

// Membership is never engine-owned here, so there is nothing to write into or
// read from the image.
impl<R> MembershipImage for LakeMembership<R> {
    fn save_workers(&self, _out: &mut dyn Write, checksum: u64) -> std::io::Result<u64> {
        Ok(checksum)
    }

    fn load_workers(&self, _input: &mut dyn Read, checksum: u64) -> std::io::Result<u64> {
        Ok(checksum)
    }

    fn save_compute_nodes(&self, _out: &mut dyn Write, checksum: u64) -> std::io::Result<u64> {
        Ok(checksum)
    }

    fn load_compute_nodes(&self, _input: &mut dyn Read, checksum: u64) -> std::io::Result<u64> {
        Ok(checksum)
    }

    fn clear(&self) {}
}

impl<R> CapacityHooks for LakeMembership<R> {
    fn check_disk_capacity(
        &self,
        _paths: &HashMap<WorkerId, Vec<u64>>,
        _flood_stage: bool,
    ) -> CapacityStatus {
        CapacityStatus::Ok
    }

    fn update_path_info(&self, _added: &[DiskInfo], _removed: &[DiskInfo]) {}

    fn check_cluster_capacity(&self) -> Result<()> {
        Ok(())
    }

    fn update_worker_state(&self, _worker: &Worker) {}

    fn report_version(&self, _id: WorkerId) -> Option<u64> {
        None
    }

    fn update_report_version(&self, _id: WorkerId, _version: u64, _db_id: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: u64) -> Worker {
        Worker {
            id: WorkerId(id),
            group_id: WorkerGroupId::DEFAULT,
            host: format!("10.0.0.{}", id),
            heartbeat_port: 9050,
            data_port: 9060,
            rpc_port: 8060,
            alive: id % 2 == 1,
            last_heartbeat: None,
        }
    }

    fn membership() -> LakeMembership<SnapshotRegistry> {
        LakeMembership::new(SnapshotRegistry::from_workers([worker(1), worker(2), worker(3)]))
    }

    #[tokio::test]
    async fn alive_filtering() {
        let m = membership();
        assert_eq!(m.worker_ids(false).await.unwrap().len(), 3);
        assert_eq!(
            m.worker_ids(true).await.unwrap(),
            vec![WorkerId(1), WorkerId(3)]
        );
        assert!(m.is_worker_alive(WorkerId(1)).await.unwrap());
        assert!(!m.is_worker_alive(WorkerId(2)).await.unwrap());
        assert!(m.is_worker_available(WorkerId(2)).await.unwrap());
        assert!(!m.is_worker_available(WorkerId(9)).await.unwrap());
    }

    #[tokio::test]
    async fn choose_uses_default_group() {
        let m = membership();
        assert_eq!(
            m.choose_default_workers(2).await.unwrap(),
            vec![WorkerId(1), WorkerId(2)]
        );
        assert_eq!(
            m.selector().cursor(WorkerGroupId::DEFAULT).await,
            Some(WorkerId(2))
        );
    }

    #[test]
    fn hooks_are_inert() {
        let m = membership();
        assert!(m.check_cluster_capacity().is_ok());
        assert!(m.check_disk_capacity(&HashMap::new(), true).is_ok());
        assert_eq!(m.report_version(WorkerId(1)), None);
        m.update_report_version(WorkerId(1), 10, 1);
        assert_eq!(m.report_version(WorkerId(1)), None);
    }
}
