//! `stetho redact`: apply redactors to a captured bundle in place.
//!
//! Redaction is idempotent, so re-running over an already-redacted
//! bundle is a no-op.

use std::path::Path;

use tracing::info;

use stetho_redact::RedactionEngine;

use crate::cli::args::RedactArgs;
use crate::cli::commands::common;
use crate::config::RuntimeConfig;
use crate::error::StethoError;
use crate::exit_codes;
use crate::run::load_specs;

pub async fn run(args: &RedactArgs, config: &RuntimeConfig) -> Result<i32, StethoError> {
    let sources = common::parse_sources(&args.load.sources)?;
    let specs = load_specs(&sources, common::load_options(&args.load, config), None).await?;
    let engine = RedactionEngine::new(&specs.all_redactors())
        .map_err(stetho_collect::CollectError::from)?;

    let mut files = 0_u64;
    let mut replacements = 0_u64;
    for entry in walkdir::WalkDir::new(&args.bundle)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let logical = logical_path(entry.path(), &args.bundle);
        let content = std::fs::read(entry.path())?;
        let outcome = engine.redact(&logical, content);
        let count = outcome.total_replacements();
        if count > 0 {
            std::fs::write(entry.path(), &outcome.content)?;
            files += 1;
            replacements += count;
        }
    }

    info!(files, replacements, "redaction finished");
    println!("redacted {replacements} value(s) across {files} file(s)");
    Ok(exit_codes::codes::PASS)
}

fn logical_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
