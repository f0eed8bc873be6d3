//! Analyzer engine: evaluate a spec set's analyzers against a bundle.
//!
//! Results come back in spec order; host analyzers run once per remote
//! node subtree, grouped by node, with the node name suffixed to the
//! title. An analyzer that errors contributes a synthetic fail result
//! instead of aborting the engine.

use serde_json::Value;
use tracing::{debug, warn};

use stetho_specs::types::{AnalyzerSpec, HostAnalyzerSpec, OutcomeBody, SpecSet};

use crate::analyzers;
use crate::error::AnalyzeError;
use crate::reader::BundleReader;
use crate::results::{AnalyzeResult, Verdict};

/// Title used for synthetic results when an analyzer itself fails.
pub const ANALYZER_FAILED_TITLE: &str = "Analyzer Failed";

const NODE_LIST_PATH: &str = "host-collectors/remote/node-list.json";
const HOST_SCOPE: &str = "host-collectors";

/// Evaluate every non-excluded analyzer.
#[must_use]
pub fn evaluate(specs: &SpecSet, reader: &BundleReader) -> Vec<AnalyzeResult> {
    let mut results = Vec::new();

    for analyzer in specs.all_analyzers() {
        if analyzer.is_excluded() {
            debug!(analyzer = %analyzer.title(), "analyzer excluded");
            continue;
        }
        let outcome = run_cluster_analyzer(&analyzer, reader);
        results.push(finish(analyzer.title(), analyzer.is_strict(), outcome));
    }

    let host_analyzers = specs.all_host_analyzers();
    if host_analyzers.is_empty() {
        return results;
    }

    match remote_nodes(reader) {
        Some(nodes) if !nodes.is_empty() => {
            for node in nodes {
                let node_scope = format!("{HOST_SCOPE}/{node}");
                // A single-node run keeps bare paths; fall back to the
                // shared subtree when no per-node directory exists.
                let scoped = if reader.dir_exists(&node_scope) {
                    reader.scoped(&node_scope)
                } else {
                    reader.scoped(HOST_SCOPE)
                };
                for analyzer in &host_analyzers {
                    if analyzer.is_excluded() {
                        continue;
                    }
                    let outcome = run_host_analyzer(analyzer, &scoped);
                    results.push(finish(
                        format!("{} ({node})", analyzer.title()),
                        analyzer.is_strict(),
                        outcome,
                    ));
                }
            }
        }
        _ => {
            let scoped = reader.scoped(HOST_SCOPE);
            for analyzer in &host_analyzers {
                if analyzer.is_excluded() {
                    continue;
                }
                let outcome = run_host_analyzer(analyzer, &scoped);
                results.push(finish(analyzer.title(), analyzer.is_strict(), outcome));
            }
        }
    }

    results
}

fn run_cluster_analyzer(
    analyzer: &AnalyzerSpec,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    match analyzer {
        AnalyzerSpec::ClusterVersion(spec) => analyzers::cluster_version(spec, reader),
        AnalyzerSpec::NodeResources(spec) => analyzers::node_resources(spec, reader),
        AnalyzerSpec::TextAnalyze(spec) => analyzers::text_analyze(spec, reader),
    }
}

fn run_host_analyzer(
    analyzer: &HostAnalyzerSpec,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    match analyzer {
        HostAnalyzerSpec::Cpu(spec) => analyzers::host_cpu(spec, reader),
        HostAnalyzerSpec::Memory(spec) => analyzers::host_memory(spec, reader),
    }
}

fn finish(
    title: String,
    strict: bool,
    outcome: Result<(Verdict, OutcomeBody), AnalyzeError>,
) -> AnalyzeResult {
    match outcome {
        Ok((verdict, body)) => AnalyzeResult {
            title,
            verdict,
            message: body.message.unwrap_or_default(),
            uri: body.uri,
            strict,
            involved_object: None,
            icon_key: None,
            error: None,
        },
        Err(e) => {
            warn!(analyzer = %title, error = %e, "analyzer failed");
            AnalyzeResult {
                title: ANALYZER_FAILED_TITLE.to_string(),
                verdict: Verdict::Fail,
                message: format!("{title}: {e}"),
                uri: None,
                strict,
                involved_object: None,
                icon_key: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Node names recorded by remote collection, if any.
fn remote_nodes(reader: &BundleReader) -> Option<Vec<String>> {
    let value = reader.get_json(NODE_LIST_PATH).ok()?;
    let nodes = value
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    Some(nodes)
}
