//! Spec loading error types.
//!
//! Everything here maps to the "spec issue" exit path (exit 2): the run
//! never started collecting because its inputs could not be resolved.

use thiserror::Error;

use stetho_cluster::ClusterError;

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("failed to parse spec document: {reason}")]
    Parse { reason: String },

    #[error("unknown document kind {kind:?}")]
    UnknownKind { kind: String },

    #[error("unsupported apiVersion {api_version:?}")]
    UnsupportedVersion { api_version: String },

    #[error("unrecognized spec source {value:?}")]
    UnknownSource { value: String },

    #[error("spec references cluster objects but no cluster client is configured")]
    MissingClusterClient,

    #[error("failed to resolve {reference}: {reason}")]
    Reference { reference: String, reason: String },

    #[error("failed to fetch {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("no release found for {reference}")]
    OciNoRelease { reference: String },

    #[error("registry error for {reference}: {reason}")]
    Oci { reference: String, reason: String },

    #[error("template rendering failed: {reason}")]
    Template { reason: String },

    #[error("log collector {collector:?} sets both since and sinceTime")]
    AmbiguousLogWindow { collector: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl SpecError {
    pub(crate) fn parse(err: impl std::fmt::Display) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}
