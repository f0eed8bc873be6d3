//! Analyzer engine for stetho bundles.
//!
//! Reads a finalized bundle tree, evaluates rule-based analyzers with
//! versioned `when` predicates, and produces ordered pass/warn/fail
//! results plus the persisted `analysis.json` form.

pub mod analyzers;
pub mod engine;
pub mod error;
pub mod quantity;
pub mod reader;
pub mod results;
pub mod when;

pub use engine::{evaluate, ANALYZER_FAILED_TITLE};
pub use error::AnalyzeError;
pub use reader::BundleReader;
pub use results::{render_analysis, AnalyzeResult, Verdict};

/// Logical path of the persisted analysis results inside a bundle.
pub const ANALYSIS_PATH: &str = "analysis.json";
