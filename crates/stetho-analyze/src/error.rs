//! Analyzer error types.
//!
//! Analyzer errors never abort the engine: each one becomes a synthetic
//! fail result. They exist as a typed enum so the synthetic result can
//! carry a precise reason.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("file not collected: {path}")]
    FileNotCollected { path: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid when expression {expr:?}: {reason}")]
    InvalidWhen { expr: String, reason: String },

    #[error("invalid glob {pattern:?}: {reason}")]
    Glob { pattern: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
