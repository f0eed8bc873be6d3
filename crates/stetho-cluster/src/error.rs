//! Cluster access error types.

use thiserror::Error;

/// Errors returned by [`crate::ClusterClient`] implementations.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("forbidden: cannot {verb} {resource} in namespace {namespace:?}")]
    Forbidden {
        verb: String,
        resource: String,
        namespace: String,
    },

    #[error("cluster API error: {0}")]
    Api(String),

    #[error("no cluster client configured")]
    NoClient,

    #[error("remote workload on node {node} timed out after {seconds}s")]
    RemoteTimeout { node: String, seconds: u64 },

    #[error("remote workload on node {node} failed: {reason}")]
    RemoteFailed { node: String, reason: String },
}

#[cfg(any(feature = "fake", test))]
impl ClusterError {
    /// Shorthand used by the fake cluster and tests.
    #[must_use]
    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

/// An advisory access-check failure surfaced by the RBAC gate.
///
/// Access errors are aggregated before any collector runs; whether they
/// abort the run is the scheduler's decision, not the checker's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessError {
    /// Title of the collector that needs the permission.
    pub collector: String,
    pub verb: String,
    pub resource: String,
    /// Empty string means cluster-wide.
    pub namespace: String,
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(
                f,
                "{}: cannot {} {} at cluster scope",
                self.collector, self.verb, self.resource
            )
        } else {
            write!(
                f,
                "{}: cannot {} {} in namespace {}",
                self.collector, self.verb, self.resource, self.namespace
            )
        }
    }
}
