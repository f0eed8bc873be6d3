//! CLI entrypoint: parse arguments, initialize logging, dispatch.

pub mod args;
pub mod commands;

use clap::Parser as _;

use crate::config::RuntimeConfig;
use crate::exit_codes;

pub use args::{Cli, Command};

/// Run the CLI and return the process exit code.
///
/// All output, including error reporting, happens here; `main` only maps
/// the returned code to `process::exit`.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    if let Err(e) = crate::logging::init_tracing(cli.debug) {
        eprintln!("failed to initialize logging: {e}");
    }
    let config = RuntimeConfig::from_env();

    let result = match &cli.command {
        Command::Collect(args) => commands::collect::run(args, cli.interactive, &config).await,
        Command::Analyze(args) => commands::analyze::run(args, &config).await,
        Command::Redact(args) => commands::redact::run(args, &config).await,
        Command::Inspect(args) => commands::inspect::run(args, &config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            exit_codes::from_error(&e)
        }
    }
}
