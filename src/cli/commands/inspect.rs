//! `stetho inspect`: print the fully-resolved spec set.

use crate::cli::args::InspectArgs;
use crate::cli::commands::common;
use crate::config::RuntimeConfig;
use crate::error::StethoError;
use crate::exit_codes;
use crate::run::{connect_cluster, load_specs};

pub async fn run(args: &InspectArgs, config: &RuntimeConfig) -> Result<i32, StethoError> {
    let sources = common::parse_sources(&args.load.sources)?;
    let client = connect_cluster().await;
    let specs = load_specs(&sources, common::load_options(&args.load, config), client).await?;
    common::print_specs(&specs)?;
    Ok(exit_codes::codes::PASS)
}
