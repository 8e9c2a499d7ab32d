use std::path::PathBuf;

use crate::membership::WorkerGroupId;

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5000;

/// How to reach the worker registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// JSON snapshot to serve membership from. `None` starts with an empty
    /// registry.
    pub snapshot_path: Option<PathBuf>,

    /// Upper bound on a single registry query. Expired queries fail the
    /// request that issued them.
    pub query_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MembershipConfig {
    /// Group used when a caller does not name one.
    pub default_worker_group: WorkerGroupId,
    pub registry: RegistryConfig,
}

impl MembershipConfig {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            registry: RegistryConfig {
                snapshot_path: Some(snapshot_path.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_default_group(mut self, group: WorkerGroupId) -> Self {
        self.default_worker_group = group;
        self
    }

    pub fn with_query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.registry.query_timeout_ms = timeout_ms;
        self
    }
}
