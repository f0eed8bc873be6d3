//! Top-level error type.
//!
//! Each subsystem keeps its own error enum; this aggregates them for the
//! CLI, which maps every variant to an exit code in `exit_codes`.

use thiserror::Error;

use stetho_analyze::AnalyzeError;
use stetho_cluster::ClusterError;
use stetho_collect::CollectError;
use stetho_specs::SpecError;

#[derive(Error, Debug)]
pub enum StethoError {
    #[error("spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("collection error: {0}")]
    Collect(#[from] CollectError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("analysis error: {0}")]
    Analyze(#[from] AnalyzeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted")]
    Interrupted,
}
