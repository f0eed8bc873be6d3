//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// stetho - cluster diagnostics bundles
#[derive(Parser)]
#[command(name = "stetho")]
#[command(about = "Collect, redact and analyze cluster diagnostics bundles")]
#[command(long_about = r#"
stetho points at a running cluster (or a previously captured bundle),
gathers a structured evidence bundle according to a declarative spec,
redacts sensitive values, evaluates analyzers and exits with a
CI-friendly verdict.

EXAMPLES:
  # Collect a bundle from specs stored in the cluster
  stetho collect cluster

  # Collect from a local spec, ignoring missing permissions
  stetho collect ./support-bundle.yaml --collect-without-permissions

  # Re-run analyzers against a captured archive
  stetho analyze --bundle support-bundle.tar.gz ./support-bundle.yaml

  # Apply redactors to a captured bundle in place
  stetho redact --bundle ./support-bundle ./redactors.yaml

  # Show the fully-resolved spec set
  stetho inspect secret/default/bundle-spec

EXIT CODES:
  0  every analyzer passed
  1  unhandled error, interrupted, or no results
  2  spec loading failed
  3  at least one analyzer failed (or permissions were missing)
  4  warnings only
"#)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Render progress on the terminal instead of the log
    #[arg(long, global = true)]
    pub interactive: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Collect a bundle, redact it, analyze it, archive it
    Collect(CollectArgs),
    /// Evaluate analyzers against an existing bundle
    Analyze(AnalyzeArgs),
    /// Apply redactors to a captured bundle in place
    Redact(RedactArgs),
    /// Load specs and print the normalized result
    Inspect(InspectArgs),
}

/// Flags shared by every spec-loading command.
#[derive(Args, Clone)]
pub struct LoadArgs {
    /// Spec sources: files, `-`, URLs, oci://, secret/…, configmap/…,
    /// or `cluster` for label discovery
    pub sources: Vec<String>,

    /// Fail on unknown document kinds and parse errors
    #[arg(long)]
    pub strict: bool,

    /// Do not download follow-up specs referenced by spec.uri
    #[arg(long = "no-uri")]
    pub no_uri: bool,

    /// Label selector for cluster discovery (repeatable, ANDed)
    #[arg(long)]
    pub selector: Vec<String>,

    /// Values files for templated specs (merged in order)
    #[arg(long)]
    pub values: Vec<PathBuf>,

    /// Value overrides for templated specs, key=value dotted paths
    #[arg(long = "set")]
    pub set: Vec<String>,
}

#[derive(Args)]
pub struct CollectArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Archive output path (defaults to <bundle-name>.tar.gz)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Keep going when collector permissions are missing
    #[arg(long = "collect-without-permissions")]
    pub collect_without_permissions: bool,

    /// Relative log window for log collectors, e.g. 24h
    #[arg(long, conflicts_with = "since_time")]
    pub since: Option<String>,

    /// Absolute RFC3339 log lower bound
    #[arg(long = "since-time")]
    pub since_time: Option<String>,

    /// Restrict cluster-resources collection to one namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Load and print the resolved specs without collecting
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Bundle directory or .tar.gz archive to analyze
    #[arg(long)]
    pub bundle: PathBuf,

    /// Where to write analysis.json (defaults to inside the bundle)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RedactArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Bundle directory to redact in place
    #[arg(long)]
    pub bundle: PathBuf,
}

#[derive(Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub load: LoadArgs,
}
