//! Redaction error types.

use thiserror::Error;

/// Errors raised while compiling redactor rules. Rule application itself
/// never fails: misbehaving rules are skipped with a warning.
#[derive(Error, Debug)]
pub enum RedactError {
    #[error("invalid redactor regex {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid redactor file glob {glob:?}: {reason}")]
    InvalidGlob { glob: String, reason: String },
}
