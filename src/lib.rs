//! stetho - cluster diagnostics bundles
//!
//! Collects a structured evidence bundle from a cluster or host per a
//! declarative spec, redacts it, evaluates analyzers against it, and
//! maps the aggregate verdict to CI-friendly exit codes.

/// Returns the stetho version string.
#[must_use]
pub fn stetho_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod cli;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod run;

// Core types re-exported for library consumers.
pub use error::StethoError;
pub use run::{run_pipeline, PipelineOptions, PipelineOutcome};
