//! `stetho analyze`: re-run analyzers against an existing bundle.

use std::path::PathBuf;

use stetho_analyze::{evaluate, render_analysis, BundleReader, ANALYSIS_PATH};
use stetho_collect::unpack_archive;

use crate::cli::args::AnalyzeArgs;
use crate::cli::commands::common;
use crate::config::RuntimeConfig;
use crate::error::StethoError;
use crate::exit_codes;
use crate::run::load_specs;

pub async fn run(args: &AnalyzeArgs, config: &RuntimeConfig) -> Result<i32, StethoError> {
    let sources = common::parse_sources(&args.load.sources)?;
    let specs = load_specs(&sources, common::load_options(&args.load, config), None).await?;

    // Archives are unpacked next to themselves; directories are read in
    // place. The unpacked tree is kept, like any working directory.
    let bundle_root: PathBuf = if args.bundle.is_file() {
        let dest = args
            .bundle
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join(format!(
                "{}-unpacked",
                args.bundle
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "bundle".to_string())
            ));
        std::fs::create_dir_all(&dest)?;
        unpack_archive(&args.bundle, &dest)?
    } else {
        args.bundle.clone()
    };

    let reader = BundleReader::new(&bundle_root);
    let results = evaluate(&specs, &reader);

    let analysis = render_analysis(&results)
        .map_err(|e| StethoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| bundle_root.join(ANALYSIS_PATH));
    std::fs::write(&output, analysis)?;

    for result in &results {
        println!(
            "{}: {} - {}",
            result.verdict.as_str().to_uppercase(),
            result.title,
            result.message
        );
    }

    Ok(exit_codes::from_results(&results))
}
