//! Collector scheduling: plan construction, the RBAC gate, and the
//! sequential execution loop.
//!
//! Collectors run one at a time in deterministic order; concurrency lives
//! inside individual collectors. Collector failures are never fatal to
//! the run; they surface as `failed` progress events and the loop moves
//! on. Cancellation is cooperative: remaining collectors are skipped and
//! the partial bundle is kept.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stetho_cluster::{AccessError, ClusterClient};
use stetho_specs::types::SpecSet;

use crate::bundle::BundleStore;
use crate::collector::{CollectContext, Collector};
use crate::error::CollectError;
use crate::progress::{CollectorPhase, ProgressSender, ProgressTracker};
use crate::version;

#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// Report access errors but keep going, skipping affected collectors.
    pub ignore_permission_errors: bool,
    /// Bound on in-flight API calls within one collector.
    pub concurrency: usize,
    pub remote_image: String,
    pub remote_namespace: String,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            ignore_permission_errors: false,
            concurrency: 8,
            remote_image: "ghcr.io/stetho-dev/stetho:latest".to_string(),
            remote_namespace: "default".to_string(),
        }
    }
}

/// What happened, collector by collector.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Titles in execution order.
    pub executed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
    /// Aggregated access errors from the gate (empty unless tolerated).
    pub access_errors: Vec<AccessError>,
}

/// Translate a spec set into the ordered execution plan.
///
/// Steps, in order: mandatory inclusion of cluster-info and
/// cluster-resources for cluster-scoped runs, structural deduplication,
/// mergeable folding, cluster-resources promotion, exclusion.
#[must_use]
pub fn build_plan(specs: &SpecSet) -> Vec<Collector> {
    let mut plan: Vec<Collector> = specs
        .all_collectors()
        .into_iter()
        .map(Collector::from_spec)
        .collect();

    if specs.has_cluster_scope() {
        if !plan.iter().any(|c| matches!(c, Collector::ClusterResources(_))) {
            plan.insert(0, Collector::ClusterResources(Default::default()));
        }
        if !plan.iter().any(|c| matches!(c, Collector::ClusterInfo(_))) {
            plan.insert(0, Collector::ClusterInfo(Default::default()));
        }
    }

    for host in specs.all_host_collectors() {
        plan.push(Collector::Host(host));
    }
    for remote in specs.all_remote_collectors() {
        plan.push(Collector::Remote(remote));
    }

    // Structural dedup, first occurrence wins.
    let mut deduped: Vec<Collector> = Vec::with_capacity(plan.len());
    for collector in plan {
        if !deduped.contains(&collector) {
            deduped.push(collector);
        }
    }

    // Fold mergeable collectors into earlier peers.
    let mut merged: Vec<Collector> = Vec::with_capacity(deduped.len());
    for collector in deduped {
        if let Collector::Logs(incoming) = &collector {
            let target = merged.iter_mut().find_map(|existing| match existing {
                Collector::Logs(logs) if logs.accepts(incoming) => Some(logs),
                _ => None,
            });
            if let Some(existing) = target {
                existing.fold(incoming.clone());
                continue;
            }
        }
        merged.push(collector);
    }

    // Cluster-resources runs first so analyzers can contextualize early;
    // everything else keeps spec order.
    if let Some(pos) = merged
        .iter()
        .position(|c| matches!(c, Collector::ClusterResources(_)))
    {
        let promoted = merged.remove(pos);
        merged.insert(0, promoted);
    }

    merged.retain(|c| !c.is_excluded());
    merged
}

/// Execute the plan against the bundle store.
pub async fn run(
    specs: &SpecSet,
    store: &mut BundleStore,
    client: Option<Arc<dyn ClusterClient>>,
    options: &ScheduleOptions,
    progress: ProgressSender,
    cancel: CancellationToken,
) -> Result<RunSummary, CollectError> {
    let plan = build_plan(specs);
    let titles: Vec<String> = plan.iter().map(Collector::title).collect();
    let mut tracker = ProgressTracker::new(progress, &titles);
    let mut summary = RunSummary::default();

    // Access-control gate: aggregate every collector's advisory errors
    // before anything runs.
    let mut tolerated: Vec<AccessError> = Vec::new();
    let mut gated: HashSet<String> = HashSet::new();
    if let Some(client) = &client {
        let mut errors: Vec<AccessError> = Vec::new();
        for collector in &plan {
            errors.extend(collector.check_access(client).await);
        }
        if !errors.is_empty() {
            summary.access_errors = errors.clone();
            for error in &errors {
                tracker.warn(&error.collector, error.to_string());
            }
            if !options.ignore_permission_errors {
                warn!(
                    count = errors.len(),
                    "aborting: missing collector permissions"
                );
                return Err(CollectError::Rbac { errors });
            }
            // Cluster-resources always runs; it documents the denials in
            // its cani-list manifest instead.
            for error in &errors {
                if error.collector != "cluster-resources" {
                    gated.insert(error.collector.clone());
                }
            }
            tolerated = errors;
        }
    }

    let ctx = CollectContext {
        client: client.clone(),
        cancel: cancel.clone(),
        concurrency: options.concurrency,
        denied: tolerated,
        remote_image: options.remote_image.clone(),
        remote_namespace: options.remote_namespace.clone(),
    };

    for collector in &plan {
        let title = collector.title();

        if cancel.is_cancelled() {
            debug!(collector = %title, "skipped after cancellation");
            tracker.update(&title, CollectorPhase::Skipped);
            summary.skipped.push(title);
            continue;
        }
        if gated.contains(&title) {
            tracker.update(&title, CollectorPhase::Skipped);
            summary.skipped.push(title);
            continue;
        }

        tracker.update(&title, CollectorPhase::Running);
        match collector.collect(&ctx).await {
            Ok(files) => {
                let mut write_failure: Option<String> = None;
                for (path, content) in files {
                    if let Err(e) = store.emit(&path, content) {
                        write_failure = Some(e.to_string());
                        break;
                    }
                }
                for warning in store.take_warnings() {
                    tracker.warn(&title, warning);
                }
                match write_failure {
                    None => {
                        info!(collector = %title, "collector completed");
                        tracker.update(&title, CollectorPhase::Completed);
                        summary.executed.push(title);
                    }
                    Some(reason) => {
                        tracker.update_with_message(
                            &title,
                            CollectorPhase::Failed,
                            Some(reason.clone()),
                        );
                        summary.failed.push((title, reason));
                    }
                }
            }
            Err(e) => {
                warn!(collector = %title, error = %e, "collector failed");
                tracker.update_with_message(&title, CollectorPhase::Failed, Some(e.to_string()));
                summary.failed.push((title, e.to_string()));
            }
        }
    }

    store.emit(version::VERSION_PATH, version::version_file_bytes()?)?;
    store.write_redaction_report()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;
    use stetho_cluster::ApiResourceInfo;
    use stetho_redact::RedactionEngine;
    use stetho_specs::types::{
        ClusterInfoCollect, CollectorSpec, Flag, LogsCollect, SecretCollect, SupportBundleDoc,
    };

    fn specs_with(collectors: Vec<CollectorSpec>) -> SpecSet {
        let mut doc = SupportBundleDoc::default();
        doc.metadata.name = "test".to_string();
        doc.spec.collectors = collectors;
        let mut set = SpecSet::default();
        set.support_bundles.push(doc);
        set
    }

    fn store() -> (tempfile::TempDir, BundleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BundleStore::create(dir.path(), "test", RedactionEngine::empty()).unwrap();
        (dir, store)
    }

    fn base_cluster() -> FakeCluster {
        FakeCluster::new("v1.27.0").with_resource(
            ApiResourceInfo {
                group: String::new(),
                version: "v1".to_string(),
                kind: "Node".to_string(),
                plural: "nodes".to_string(),
                namespaced: false,
            },
            vec![("", serde_json::json!({"metadata": {"name": "node-a"}}))],
        )
    }

    #[test]
    fn mandatory_collectors_are_added_and_resources_run_first() {
        let plan = build_plan(&specs_with(vec![CollectorSpec::Secret(SecretCollect {
            namespace: "default".to_string(),
            name: "creds".to_string(),
            ..SecretCollect::default()
        })]));

        let titles: Vec<String> = plan.iter().map(Collector::title).collect();
        assert_eq!(titles[0], "cluster-resources");
        assert!(titles.contains(&"cluster-info".to_string()));
        assert!(titles.contains(&"secret/default/creds".to_string()));
    }

    #[test]
    fn plan_is_deterministic() {
        let specs = specs_with(vec![
            CollectorSpec::Logs(LogsCollect {
                namespace: "default".to_string(),
                selector: vec!["app=web".to_string()],
                ..LogsCollect::default()
            }),
            CollectorSpec::Secret(SecretCollect {
                namespace: "default".to_string(),
                name: "creds".to_string(),
                ..SecretCollect::default()
            }),
        ]);
        let a: Vec<String> = build_plan(&specs).iter().map(Collector::title).collect();
        let b: Vec<String> = build_plan(&specs).iter().map(Collector::title).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn identical_specs_are_deduplicated() {
        let duplicate = CollectorSpec::Secret(SecretCollect {
            namespace: "default".to_string(),
            name: "creds".to_string(),
            ..SecretCollect::default()
        });
        let plan = build_plan(&specs_with(vec![duplicate.clone(), duplicate]));
        let count = plan
            .iter()
            .filter(|c| c.title() == "secret/default/creds")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn equivalent_log_collectors_merge() {
        let plan = build_plan(&specs_with(vec![
            CollectorSpec::Logs(LogsCollect {
                namespace: "default".to_string(),
                selector: vec!["app=web".to_string()],
                ..LogsCollect::default()
            }),
            CollectorSpec::Logs(LogsCollect {
                namespace: "default".to_string(),
                selector: vec!["app=api".to_string()],
                ..LogsCollect::default()
            }),
        ]));
        let logs: Vec<&Collector> = plan
            .iter()
            .filter(|c| matches!(c, Collector::Logs(_)))
            .collect();
        assert_eq!(logs.len(), 1);
        match logs[0] {
            Collector::Logs(merged) => assert_eq!(merged.selectors.len(), 2),
            _ => unreachable!(),
        }
    }

    #[test]
    fn excluded_collectors_are_dropped() {
        let plan = build_plan(&specs_with(vec![CollectorSpec::ClusterInfo(
            ClusterInfoCollect {
                exclude: Some(Flag(true)),
            },
        )]));
        assert!(!plan.iter().any(|c| matches!(c, Collector::ClusterInfo(_))));
    }

    #[tokio::test]
    async fn rbac_gate_aborts_without_ignore_flag() {
        let cluster = base_cluster().with_denied("secrets", "restricted");
        let specs = specs_with(vec![CollectorSpec::Secret(SecretCollect {
            namespace: "restricted".to_string(),
            name: "creds".to_string(),
            ..SecretCollect::default()
        })]);
        let (_dir, mut store) = store();
        let (tx, _rx) = crate::progress::channel();

        let err = run(
            &specs,
            &mut store,
            Some(Arc::new(cluster)),
            &ScheduleOptions::default(),
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CollectError::Rbac { .. }));
        assert!(!store.contains("version.yaml"));
    }

    #[tokio::test]
    async fn rbac_gate_skips_with_ignore_flag_and_documents_denials() {
        let cluster = base_cluster().with_denied("secrets", "restricted");
        let specs = specs_with(vec![CollectorSpec::Secret(SecretCollect {
            namespace: "restricted".to_string(),
            name: "creds".to_string(),
            ..SecretCollect::default()
        })]);
        let (_dir, mut store) = store();
        let (tx, mut rx) = crate::progress::channel();

        let options = ScheduleOptions {
            ignore_permission_errors: true,
            ..ScheduleOptions::default()
        };
        let summary = run(
            &specs,
            &mut store,
            Some(Arc::new(cluster)),
            &options,
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(summary
            .skipped
            .contains(&"secret/restricted/creds".to_string()));
        assert!(summary.executed.contains(&"cluster-resources".to_string()));
        assert!(store.contains(crate::cluster_resources::CANI_LIST_PATH));
        assert!(store.contains("version.yaml"));

        let mut saw_skip_event = false;
        while let Ok(event) = rx.try_recv() {
            if event.collectors.get("secret/restricted/creds")
                == Some(&CollectorPhase::Skipped)
            {
                saw_skip_event = true;
            }
        }
        assert!(saw_skip_event);
    }

    #[tokio::test]
    async fn collector_failure_is_not_fatal() {
        // No cluster client at all: every cluster collector fails, the
        // run still completes and writes version.yaml.
        let specs = specs_with(vec![CollectorSpec::ClusterInfo(
            ClusterInfoCollect::default(),
        )]);
        let (_dir, mut store) = store();
        let (tx, _rx) = crate::progress::channel();

        let summary = run(
            &specs,
            &mut store,
            None,
            &ScheduleOptions::default(),
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!summary.failed.is_empty());
        assert!(store.contains("version.yaml"));
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_collectors() {
        let specs = specs_with(vec![CollectorSpec::ClusterInfo(
            ClusterInfoCollect::default(),
        )]);
        let (_dir, mut store) = store();
        let (tx, _rx) = crate::progress::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run(
            &specs,
            &mut store,
            Some(Arc::new(base_cluster())),
            &ScheduleOptions::default(),
            tx,
            cancel,
        )
        .await
        .unwrap();

        assert!(summary.executed.is_empty());
        assert_eq!(summary.skipped.len(), 2);
        // The partial bundle is still finalized for debugging.
        assert!(store.contains("version.yaml"));
    }

    #[tokio::test]
    async fn execution_order_matches_plan_order() {
        let cluster = base_cluster()
            .with_secret("default", "creds", &[("token", b"x")]);
        let specs = specs_with(vec![CollectorSpec::Secret(SecretCollect {
            namespace: "default".to_string(),
            name: "creds".to_string(),
            ..SecretCollect::default()
        })]);
        let (_dir, mut store) = store();
        let (tx, _rx) = crate::progress::channel();

        let summary = run(
            &specs,
            &mut store,
            Some(Arc::new(cluster)),
            &ScheduleOptions::default(),
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary.executed,
            vec![
                "cluster-resources".to_string(),
                "cluster-info".to_string(),
                "secret/default/creds".to_string(),
            ]
        );
    }
}
