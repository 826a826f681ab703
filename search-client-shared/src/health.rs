//! Cluster health as reported by the `_cluster/health` endpoint.

use serde::{Deserialize, Serialize};

/// Traffic-light status of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

/// Subset of the cluster health response used by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    /// Name of the cluster.
    pub cluster_name: String,
    /// Overall status.
    pub status: HealthStatus,
    /// Whether the health request timed out server side.
    #[serde(default)]
    pub timed_out: bool,
    /// Number of nodes in the cluster.
    pub number_of_nodes: u32,
    /// Number of data nodes in the cluster.
    #[serde(default)]
    pub number_of_data_nodes: u32,
    /// Number of active primary shards.
    #[serde(default)]
    pub active_primary_shards: u32,
    /// Number of active shards, primaries and replicas.
    #[serde(default)]
    pub active_shards: u32,
    /// Number of unassigned shards.
    #[serde(default)]
    pub unassigned_shards: u32,
}

impl ClusterHealth {
    /// A cluster is usable for reads and writes unless it is red.
    pub fn is_usable(&self) -> bool {
        self.status != HealthStatus::Red
    }
}
