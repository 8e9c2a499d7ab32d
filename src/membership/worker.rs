use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a single worker process, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a logical pool of workers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorkerGroupId(pub u64);

impl WorkerGroupId {
    pub const DEFAULT: WorkerGroupId = WorkerGroupId(0);
}

impl fmt::Display for WorkerGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub host: String,
    pub port: u16,
}

impl NetworkAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NetworkAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got {:?}", s))?;
        if host.is_empty() {
            return Err(format!("missing host in {:?}", s));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in {:?}: {}", s, e))?;
        Ok(Self::new(host, port))
    }
}

/// Read-only view of a worker as reported by the registry.
///
/// The registry owns these records. Callers get a snapshot per query and
/// should not hold on to it across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub group_id: WorkerGroupId,
    pub host: String,
    pub heartbeat_port: u16,
    /// Port serving data-path (execution) traffic.
    pub data_port: u16,
    /// Port serving administrative RPC traffic.
    pub rpc_port: u16,
    pub alive: bool,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Worker {
    pub fn data_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.host.clone(), self.data_port)
    }

    pub fn admin_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.host.clone(), self.rpc_port)
    }

    pub fn heartbeat_address(&self) -> NetworkAddress {
        NetworkAddress::new(self.host.clone(), self.heartbeat_port)
    }
}
