//! Collection error types.

use thiserror::Error;

use stetho_cluster::{AccessError, ClusterError};
use stetho_redact::RedactError;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("invalid bundle path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("bundle path {path:?} already written")]
    DuplicatePath { path: String },

    #[error("insufficient permissions for {} collector target(s)", errors.len())]
    Rbac { errors: Vec<AccessError> },

    #[error("collector {title} failed: {reason}")]
    Collector { title: String, reason: String },

    #[error("no cluster client available for collector {title}")]
    NoClusterClient { title: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to archive bundle: {reason}")]
    Archive { reason: String },

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Redact(#[from] RedactError),

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CollectError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn collector(title: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Collector {
            title: title.into(),
            reason: reason.to_string(),
        }
    }
}
