//! Pipeline wiring: load specs, schedule collectors, redact on write,
//! analyze, archive.
//!
//! Control flow is strictly sequential across stages; failures inside a
//! stage follow that stage's own semantics (collector failures are
//! non-fatal, spec failures abort, the RBAC gate aborts unless told
//! otherwise). Cancellation is cooperative and the partial bundle is
//! always finalized.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stetho_analyze::{evaluate, render_analysis, AnalyzeResult, BundleReader, ANALYSIS_PATH};
use stetho_cluster::ClusterClient;
use stetho_collect::{scheduler, BundleStore, ProgressSender, RunSummary, ScheduleOptions};
use stetho_redact::RedactionEngine;
use stetho_specs::types::{CollectorSpec, LogLimits, SpecSet};
use stetho_specs::{LoadOptions, SpecLoader, SpecSource};

use crate::error::StethoError;

pub struct PipelineOptions {
    pub load: LoadOptions,
    pub schedule: ScheduleOptions,
    /// Archive destination; defaults to `<bundle-name>.tar.gz` in the
    /// current directory.
    pub output: Option<PathBuf>,
    /// Bundle working directory parent; defaults to a fresh directory
    /// under the system temp dir, left intact for debugging.
    pub workdir: Option<PathBuf>,
    /// Relative log window applied to log collectors that set none.
    pub since: Option<String>,
    pub since_time: Option<String>,
    /// Restrict cluster-resources collection to one namespace.
    pub namespace: Option<String>,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub results: Vec<AnalyzeResult>,
    pub bundle_dir: PathBuf,
    pub archive: PathBuf,
    pub summary: RunSummary,
    pub interrupted: bool,
}

/// Load and normalize specs from the given sources.
pub async fn load_specs(
    sources: &[SpecSource],
    load: LoadOptions,
    client: Option<Arc<dyn ClusterClient>>,
) -> Result<SpecSet, StethoError> {
    let mut loader = SpecLoader::new(load, client)?;
    Ok(loader.load(sources).await?)
}

/// Run the full collect → redact → analyze → archive pipeline.
pub async fn run_pipeline(
    sources: &[SpecSource],
    client: Option<Arc<dyn ClusterClient>>,
    options: PipelineOptions,
    progress: ProgressSender,
    cancel: CancellationToken,
) -> Result<PipelineOutcome, StethoError> {
    let mut specs = load_specs(sources, options.load, client.clone()).await?;
    apply_log_window(
        &mut specs,
        options.since.as_deref(),
        options.since_time.as_deref(),
    );
    if let Some(namespace) = &options.namespace {
        restrict_namespace(&mut specs, namespace);
    }
    specs.validate().map_err(StethoError::Spec)?;

    let redaction =
        RedactionEngine::new(&specs.all_redactors()).map_err(stetho_collect::CollectError::from)?;

    let name = specs.bundle_name();
    let workdir = match &options.workdir {
        Some(dir) => dir.clone(),
        None => {
            let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
            std::env::temp_dir().join(format!("stetho-{stamp}"))
        }
    };
    let mut store = BundleStore::create(&workdir, &name, redaction)?;
    info!(bundle = %store.root().display(), "collecting into working directory");

    let summary = scheduler::run(
        &specs,
        &mut store,
        client,
        &options.schedule,
        progress,
        cancel.clone(),
    )
    .await?;

    let reader = BundleReader::new(store.root());
    let results = evaluate(&specs, &reader);
    let analysis = render_analysis(&results)
        .map_err(|e| StethoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    store.emit(ANALYSIS_PATH, analysis)?;

    let archive = options
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{name}.tar.gz")));
    store.archive(&archive)?;
    info!(archive = %archive.display(), "bundle archived");

    Ok(PipelineOutcome {
        results,
        bundle_dir: store.root().to_path_buf(),
        archive,
        summary,
        interrupted: cancel.is_cancelled(),
    })
}

/// Connect to the ambient cluster, if any.
pub async fn connect_cluster() -> Option<Arc<dyn ClusterClient>> {
    match stetho_cluster::kube_client::KubeClusterClient::connect().await {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "no cluster client; cluster collectors will fail");
            None
        }
    }
}

/// Narrow cluster-resources collectors that cover every namespace down to
/// one namespace. Collectors that already name namespaces keep them.
fn restrict_namespace(specs: &mut SpecSet, namespace: &str) {
    let apply = |collectors: &mut Vec<CollectorSpec>| {
        for collector in collectors {
            if let CollectorSpec::ClusterResources(resources) = collector {
                if resources.namespaces.is_empty() {
                    resources.namespaces = vec![namespace.to_string()];
                }
            }
        }
    };
    for bundle in &mut specs.support_bundles {
        apply(&mut bundle.spec.collectors);
    }
    for preflight in &mut specs.preflights {
        apply(&mut preflight.spec.collectors);
    }
    apply(&mut specs.collectors);
}

/// Apply CLI-level log bounds to log collectors that set none.
fn apply_log_window(specs: &mut SpecSet, since: Option<&str>, since_time: Option<&str>) {
    if since.is_none() && since_time.is_none() {
        return;
    }
    let apply = |collectors: &mut Vec<CollectorSpec>| {
        for collector in collectors {
            if let CollectorSpec::Logs(logs) = collector {
                let limits = logs.limits.get_or_insert_with(LogLimits::default);
                if limits.since.is_none() && limits.since_time.is_none() {
                    limits.since = since.map(str::to_string);
                    limits.since_time = since_time.map(str::to_string);
                }
            }
        }
    };

    for bundle in &mut specs.support_bundles {
        apply(&mut bundle.spec.collectors);
    }
    for preflight in &mut specs.preflights {
        apply(&mut preflight.spec.collectors);
    }
    apply(&mut specs.collectors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_specs::types::{LogsCollect, SupportBundleDoc};

    fn specs_with_logs(limits: Option<LogLimits>) -> SpecSet {
        let mut doc = SupportBundleDoc::default();
        doc.spec.collectors = vec![CollectorSpec::Logs(LogsCollect {
            namespace: "default".to_string(),
            limits,
            ..LogsCollect::default()
        })];
        let mut set = SpecSet::default();
        set.support_bundles.push(doc);
        set
    }

    fn logs_limits(specs: &SpecSet) -> Option<LogLimits> {
        match &specs.support_bundles[0].spec.collectors[0] {
            CollectorSpec::Logs(logs) => logs.limits.clone(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn cli_window_fills_unset_limits() {
        let mut specs = specs_with_logs(None);
        apply_log_window(&mut specs, Some("24h"), None);
        assert_eq!(logs_limits(&specs).unwrap().since.as_deref(), Some("24h"));
    }

    #[test]
    fn spec_level_limits_win_over_cli() {
        let mut specs = specs_with_logs(Some(LogLimits {
            since: Some("1h".to_string()),
            ..LogLimits::default()
        }));
        apply_log_window(&mut specs, Some("24h"), None);
        assert_eq!(logs_limits(&specs).unwrap().since.as_deref(), Some("1h"));
    }
}
