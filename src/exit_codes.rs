//! Exit code constants and verdict/error mapping.
//!
//! The exit code is the machine-readable verdict of a run; CI pipelines
//! branch on it. Analyzer results map through `from_results`, failures
//! through `from_error`.

use crate::error::StethoError;
use stetho_analyze::AnalyzeResult;
use stetho_collect::CollectError;

/// Exit code constants for stetho
pub mod codes {
    /// Every analyzer passed.
    pub const PASS: i32 = 0;

    /// Unhandled error, interrupted run, or a run with no results.
    pub const GENERIC: i32 = 1;

    /// Spec loading or normalization failed.
    pub const SPEC_ISSUES: i32 = 2;

    /// At least one analyzer failed (strict or not), or the RBAC gate
    /// aborted the run.
    pub const FAIL: i32 = 3;

    /// At least one warning and no failures.
    pub const WARN: i32 = 4;
}

/// Derive the exit code from the aggregate analyzer results.
#[must_use]
pub fn from_results(results: &[AnalyzeResult]) -> i32 {
    if results.is_empty() {
        return codes::GENERIC;
    }
    if results.iter().any(AnalyzeResult::is_fail) {
        return codes::FAIL;
    }
    if results.iter().any(AnalyzeResult::is_warn) {
        return codes::WARN;
    }
    codes::PASS
}

/// Map a pipeline error to its exit code.
#[must_use]
pub fn from_error(error: &StethoError) -> i32 {
    match error {
        StethoError::Spec(_) => codes::SPEC_ISSUES,
        StethoError::Collect(CollectError::Rbac { .. }) => codes::FAIL,
        _ => codes::GENERIC,
    }
}
