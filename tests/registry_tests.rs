//! Tests for the snapshot registry and config-driven construction.


use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lake_membership::config::MembershipConfig;
use lake_membership::membership::{
    LakeMembership, MembershipService, NetworkAddress, Worker, WorkerGroupId, WorkerId,
};
use lake_membership::registry::{RegistryError, SnapshotRegistry, TimeoutRegistry, WorkerRegistry};
use lake_membership::MembershipError;
use tempfile::NamedTempFile;
use test_harness::{ids, worker, ScriptedRegistry};

const SNAPSHOT: &str = r#"{
  "workers": [
    {"id": 10001, "group_id": 0, "host": "10.1.0.1", "heartbeat_port": 9050,
     "data_port": 9060, "rpc_port": 8060, "alive": true,
     "last_heartbeat": "2026-10-01T12:00:00Z"},
    {"id": 10002, "group_id": 0, "host": "10.1.0.2", "heartbeat_port": 9050,
     "data_port": 9060, "rpc_port": 8060, "alive": true, "healthy": false},
    {"id": 10003, "group_id": 2, "host": "10.1.0.3", "heartbeat_port": 9050,
     "data_port": 9060, "rpc_port": 8060, "alive": false}
  ]
}"#;

fn write_snapshot(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_load_snapshot_file() {
    let file = write_snapshot(SNAPSHOT);
    let registry = SnapshotRegistry::load(file.path()).await.unwrap();

    assert_eq!(registry.len().await, 3);
    let w = registry.get_worker(WorkerId(10001)).await.unwrap().unwrap();
    assert!(w.last_heartbeat.is_some());
    assert!(registry.is_worker_healthy(WorkerId(10001)).await.unwrap());
    assert!(!registry.is_worker_healthy(WorkerId(10002)).await.unwrap());
}

#[tokio::test]
async fn test_load_missing_file() {
    let err = SnapshotRegistry::load("/nonexistent/workers.json")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Io(_)));
}

#[tokio::test]
async fn test_load_malformed_file() {
    let file = write_snapshot(r#"{"workers": [{"id": "not-a-number"}]}"#);
    let err = SnapshotRegistry::load(file.path()).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSnapshot(_)));
}

#[tokio::test]
async fn test_snapshot_json_roundtrip_keeps_order() {
    let registry = SnapshotRegistry::from_workers([worker(3, 0), worker(1, 0), worker(2, 0)]);
    registry.set_healthy(WorkerId(1), false).await;

    let json = registry.to_json().await.unwrap();
    let reloaded = SnapshotRegistry::from_json(&json).unwrap();

    let order: Vec<WorkerId> = reloaded
        .list_workers()
        .await
        .unwrap()
        .iter()
        .map(|w| w.id)
        .collect();
    assert_eq!(order, ids(&[3, 1, 2]));
    assert!(!reloaded.is_worker_healthy(WorkerId(1)).await.unwrap());
}

#[tokio::test]
async fn test_membership_from_config() {
    let file = write_snapshot(SNAPSHOT);
    let config = MembershipConfig::new(file.path()).with_default_group(WorkerGroupId(0));
    let membership = LakeMembership::from_config(&config).await.unwrap();

    assert_eq!(membership.default_group(), WorkerGroupId(0));
    assert_eq!(
        membership.registry().timeout(),
        Duration::from_millis(5000)
    );
    assert_eq!(membership.worker_count().await.unwrap(), 3);
    assert_eq!(
        membership.choose_default_workers(2).await.unwrap(),
        ids(&[10001, 10002])
    );
    assert_eq!(
        membership
            .to_admin_address(&NetworkAddress::new("10.1.0.3", 9060))
            .await
            .unwrap(),
        NetworkAddress::new("10.1.0.3", 8060)
    );
}

#[tokio::test]
async fn test_membership_from_empty_config() {
    let membership = LakeMembership::from_config(&MembershipConfig::default())
        .await
        .unwrap();
    assert_eq!(membership.worker_count().await.unwrap(), 0);
    assert!(membership.choose_default_workers(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_churn_visible_to_selection() {
    let registry = Arc::new(SnapshotRegistry::from_workers([
        worker(1, 0),
        worker(2, 0),
        worker(3, 0),
    ]));
    let membership = LakeMembership::new(registry.clone());

    assert_eq!(membership.choose_default_workers(1).await.unwrap(), ids(&[1]));

    registry.remove(WorkerId(1)).await;
    registry
        .upsert(worker(4, 0).into())
        .await;

    assert_eq!(
        membership.choose_default_workers(3).await.unwrap(),
        ids(&[2, 3, 4])
    );
}

/// Registry that answers after a fixed delay.
struct SlowRegistry {
    inner: ScriptedRegistry,
    delay: Duration,
}

#[async_trait]
impl WorkerRegistry for SlowRegistry {
    async fn list_workers(&self) -> Result<Vec<Worker>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_workers().await
    }

    async fn list_workers_in_groups(
        &self,
        groups: &[WorkerGroupId],
    ) -> Result<Vec<Worker>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_workers_in_groups(groups).await
    }

    async fn get_worker(&self, id: WorkerId) -> Result<Option<Worker>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_worker(id).await
    }

    async fn is_worker_healthy(&self, id: WorkerId) -> Result<bool, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.is_worker_healthy(id).await
    }
}

#[tokio::test]
async fn test_registry_timeout_surfaces_as_resolution_failure() {
    let slow = SlowRegistry {
        inner: ScriptedRegistry::new(vec![worker(1, 0), worker(2, 0)]),
        delay: Duration::from_millis(500),
    };
    let membership = LakeMembership::new(TimeoutRegistry::new(slow, Duration::from_millis(20)));

    let err = membership.choose_default_workers(1).await.unwrap_err();
    assert!(matches!(err, MembershipError::Resolution(ref msg) if msg.contains("timed out")));
    assert_eq!(membership.selector().cursor(WorkerGroupId(0)).await, None);

    assert!(matches!(
        membership.worker(WorkerId(1)).await,
        Err(MembershipError::Resolution(_))
    ));
}
