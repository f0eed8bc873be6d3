//! Shared helpers for subcommands.

use stetho_specs::types::SpecSet;
use stetho_specs::{LoadOptions, SpecError, SpecSource};

use crate::cli::args::LoadArgs;
use crate::config::RuntimeConfig;
use crate::error::StethoError;

pub fn parse_sources(args: &[String]) -> Result<Vec<SpecSource>, StethoError> {
    if args.is_empty() {
        return Err(StethoError::Spec(SpecError::UnknownSource {
            value: "<no sources given>".to_string(),
        }));
    }
    args.iter()
        .map(|arg| SpecSource::parse(arg).map_err(StethoError::Spec))
        .collect()
}

pub fn load_options(args: &LoadArgs, config: &RuntimeConfig) -> LoadOptions {
    let mut options = LoadOptions {
        strict: args.strict,
        no_uri: args.no_uri,
        values_files: args.values.clone(),
        set_values: args.set.clone(),
        http_timeout: config.http_timeout,
        ..LoadOptions::default()
    };
    if !args.selector.is_empty() {
        options.selector = args.selector.clone();
    }
    options
}

pub fn print_specs(specs: &SpecSet) -> Result<(), StethoError> {
    let rendered = serde_yaml::to_string(specs)
        .map_err(|e| StethoError::Spec(SpecError::Parse {
            reason: e.to_string(),
        }))?;
    println!("{rendered}");
    Ok(())
}
