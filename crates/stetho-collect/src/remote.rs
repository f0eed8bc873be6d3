//! Remote collectors: one-shot workloads on each selected node.
//!
//! The workload image runs the host collector and prints a JSON object of
//! `path → content` on stdout. Per-node result maps are merged; a path
//! produced by more than one node is disambiguated by prefixing the node
//! name. The node list itself is recorded so analyzers can evaluate each
//! node's subtree independently.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use stetho_cluster::{ClusterClient, RemoteRun};
use stetho_specs::types::RemoteCollectorSpec;

use crate::collector::{CollectContext, CollectedFiles};
use crate::error::CollectError;
use crate::parse_duration_seconds;

pub const HOST_ROOT: &str = "host-collectors";

/// Manifest of nodes that produced remote results.
pub const NODE_LIST_PATH: &str = "host-collectors/remote/node-list.json";

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

pub async fn collect(
    client: &Arc<dyn ClusterClient>,
    spec: &RemoteCollectorSpec,
    ctx: &CollectContext,
) -> Result<CollectedFiles, CollectError> {
    let shared = spec.shared();
    let title = spec.title();

    let nodes = client.list_nodes(&shared.label_selector).await?;
    if nodes.is_empty() {
        return Err(CollectError::collector(
            format!("remote/{title}"),
            "no nodes matched the label selector",
        ));
    }

    let timeout_seconds = match &shared.timeout {
        Some(text) => parse_duration_seconds(text)
            .map_err(|reason| CollectError::collector(format!("remote/{title}"), reason))?,
        None => DEFAULT_TIMEOUT_SECONDS,
    };
    let image = shared
        .image
        .clone()
        .unwrap_or_else(|| ctx.remote_image.clone());
    let namespace = shared
        .namespace
        .clone()
        .unwrap_or_else(|| ctx.remote_namespace.clone());

    let mut per_node: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
    for node in &nodes {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let run = RemoteRun {
            node: node.clone(),
            namespace: namespace.clone(),
            image: image.clone(),
            pull_policy: shared.pull_policy.clone(),
            command: vec![
                "stetho".to_string(),
                "host".to_string(),
                "collect".to_string(),
                "--collector".to_string(),
                title.to_string(),
                "--json".to_string(),
            ],
            timeout_seconds,
        };
        match client.run_node_payload(&run).await {
            Ok(payload) => match parse_payload(&payload) {
                Ok(map) => {
                    per_node.insert(node.clone(), map);
                }
                Err(e) => warn!(node = %node, error = %e, "unparseable remote payload"),
            },
            Err(e) => warn!(node = %node, error = %e, "remote collection failed"),
        }
    }

    if per_node.is_empty() {
        return Err(CollectError::collector(
            format!("remote/{title}"),
            "no node produced a result",
        ));
    }

    Ok(merge_node_results(&per_node)?)
}

/// Payload format: a JSON object mapping relative paths to file content.
fn parse_payload(payload: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, serde_json::Error> {
    let map: BTreeMap<String, String> = serde_json::from_slice(payload)?;
    Ok(map
        .into_iter()
        .map(|(path, content)| (path, content.into_bytes()))
        .collect())
}

/// Merge per-node maps under `host-collectors/`, prefixing the node name
/// onto any path that more than one node produced.
fn merge_node_results(
    per_node: &BTreeMap<String, BTreeMap<String, Vec<u8>>>,
) -> Result<CollectedFiles, CollectError> {
    let mut ownership: BTreeMap<&str, usize> = BTreeMap::new();
    for results in per_node.values() {
        for path in results.keys() {
            *ownership.entry(path.as_str()).or_insert(0) += 1;
        }
    }

    let mut files = CollectedFiles::new();
    for (node, results) in per_node {
        for (path, content) in results {
            let logical = if ownership.get(path.as_str()).copied().unwrap_or(0) > 1 {
                format!("{HOST_ROOT}/{node}/{path}")
            } else {
                format!("{HOST_ROOT}/{path}")
            };
            files.insert(logical, content.clone());
        }
    }

    let nodes: Vec<&String> = per_node.keys().collect();
    files.insert(
        NODE_LIST_PATH.to_string(),
        serde_json::to_vec_pretty(&nodes).map_err(|e| CollectError::Serialize {
            path: NODE_LIST_PATH.to_string(),
            source: e,
        })?,
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;
    use stetho_specs::types::RemoteShared;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> CollectContext {
        CollectContext {
            client: None,
            cancel: CancellationToken::new(),
            concurrency: 8,
            denied: Vec::new(),
            remote_image: "stetho/collector:latest".to_string(),
            remote_namespace: "default".to_string(),
        }
    }

    fn payload(count: u32) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "system/cpu.json": format!("{{\"logicalCpuCount\": {count}}}"),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn conflicting_paths_get_node_prefixes() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_node("node-a", &[])
            .with_node("node-b", &[])
            .with_node("node-c", &[])
            .with_node_payload("node-a", &payload(2))
            .with_node_payload("node-b", &payload(4))
            .with_node_payload("node-c", &payload(8));
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let spec = RemoteCollectorSpec::Cpu(RemoteShared::default());
        let files = collect(&client, &spec, &ctx()).await.unwrap();

        for node in ["node-a", "node-b", "node-c"] {
            assert!(
                files.contains_key(&format!("host-collectors/{node}/system/cpu.json")),
                "missing subtree for {node}"
            );
        }
        let nodes: Vec<String> =
            serde_json::from_slice(files.get(NODE_LIST_PATH).unwrap()).unwrap();
        assert_eq!(nodes, vec!["node-a", "node-b", "node-c"]);
    }

    #[tokio::test]
    async fn single_node_keeps_bare_paths() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_node("node-a", &[])
            .with_node_payload("node-a", &payload(2));
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let spec = RemoteCollectorSpec::Cpu(RemoteShared::default());
        let files = collect(&client, &spec, &ctx()).await.unwrap();
        assert!(files.contains_key("host-collectors/system/cpu.json"));
    }

    #[tokio::test]
    async fn label_selector_restricts_nodes() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_node("node-a", &[("role", "worker")])
            .with_node("node-b", &[("role", "control-plane")])
            .with_node_payload("node-a", &payload(2));
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let spec = RemoteCollectorSpec::Cpu(RemoteShared {
            label_selector: vec!["role=worker".to_string()],
            ..RemoteShared::default()
        });
        let files = collect(&client, &spec, &ctx()).await.unwrap();
        let nodes: Vec<String> =
            serde_json::from_slice(files.get(NODE_LIST_PATH).unwrap()).unwrap();
        assert_eq!(nodes, vec!["node-a"]);
    }

    #[tokio::test]
    async fn no_matching_nodes_is_a_collector_error() {
        let client: Arc<dyn ClusterClient> = Arc::new(FakeCluster::new("v1.27.0"));
        let spec = RemoteCollectorSpec::Cpu(RemoteShared::default());
        assert!(collect(&client, &spec, &ctx()).await.is_err());
    }
}
