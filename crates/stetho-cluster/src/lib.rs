//! Cluster API access seam.
//!
//! Everything in stetho that talks to the cluster goes through the
//! [`ClusterClient`] trait. The production implementation wraps a kube
//! client; tests use the in-memory [`fake::FakeCluster`] (feature `fake`).
//! No other crate in the workspace names a kube type.

pub mod error;
#[cfg(feature = "fake")]
pub mod fake;
pub mod kube_client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{AccessError, ClusterError};

/// Server version as reported by the API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterVersion {
    pub major: String,
    pub minor: String,
    /// Full git version, e.g. `v1.27.0`.
    pub git_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// A discovered API resource the cluster can list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResourceInfo {
    /// API group; empty for the core group.
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Lowercase plural, used in bundle paths and access checks.
    pub plural: String,
    pub namespaced: bool,
}

/// A pod reference with enough detail to fetch its logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<String>,
}

/// Bounds applied to a log fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogWindow {
    pub since_seconds: Option<i64>,
    /// RFC3339 lower bound.
    pub since_time: Option<String>,
    pub tail_lines: Option<i64>,
}

/// Ephemeral workload scheduled on a single node by a remote collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRun {
    pub node: String,
    pub namespace: String,
    pub image: String,
    pub pull_policy: Option<String>,
    pub command: Vec<String>,
    pub timeout_seconds: u64,
}

/// Operations the core needs from a cluster.
///
/// Implementations must be cheap to clone behind an `Arc`; every method is
/// a suspension point and must respect the caller's cancellation.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// API server version, used by cluster-info collection.
    async fn server_version(&self) -> Result<ClusterVersion, ClusterError>;

    /// Read all data keys of a secret. Values are the decoded bytes.
    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ClusterError>;

    /// Read all data keys of a config map.
    async fn read_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, ClusterError>;

    /// Find spec payloads stored in labeled secrets/config maps.
    ///
    /// `selector` is a list of `key=value` requirements ANDed together;
    /// `keys` names the data keys whose values are spec documents. Results
    /// come back in a stable namespace/name order.
    async fn find_spec_payloads(
        &self,
        selector: &[String],
        keys: &[&str],
    ) -> Result<Vec<String>, ClusterError>;

    /// Enumerate listable resources via API discovery.
    async fn discover_resources(&self) -> Result<Vec<ApiResourceInfo>, ClusterError>;

    /// List a resource as a JSON `List` object; `namespace` of `None`
    /// lists cluster-wide.
    async fn list_resource(
        &self,
        resource: &ApiResourceInfo,
        namespace: Option<&str>,
    ) -> Result<serde_json::Value, ClusterError>;

    /// All namespace names.
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    /// Dry-run access review: may the current identity `verb` the
    /// `plural` resource in `namespace` (empty = cluster-wide)?
    async fn can_i(
        &self,
        verb: &str,
        group: &str,
        plural: &str,
        namespace: &str,
    ) -> Result<bool, ClusterError>;

    /// Node names matching a label selector; empty selector = all nodes.
    async fn list_nodes(&self, selector: &[String]) -> Result<Vec<String>, ClusterError>;

    /// Pods matching a label selector; empty namespace = all namespaces.
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &[String],
    ) -> Result<Vec<PodRef>, ClusterError>;

    /// Fetch one container's logs.
    async fn pod_logs(
        &self,
        pod: &PodRef,
        container: &str,
        window: &LogWindow,
    ) -> Result<String, ClusterError>;

    /// Run a one-shot workload pinned to a node and return its stdout.
    ///
    /// The workload is deleted afterwards regardless of outcome.
    async fn run_node_payload(&self, run: &RemoteRun) -> Result<Vec<u8>, ClusterError>;
}
