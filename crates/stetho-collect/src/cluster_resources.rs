//! Cluster-resources collector: a JSON dump of every listable resource.
//!
//! Namespaced resources land at `cluster-resources/<plural>/<ns>.json`,
//! cluster-scoped ones at `cluster-resources/<plural>.json`. Listing fans
//! out concurrently with a bounded number of in-flight API calls.
//! Forbidden resources never fail the collector: they are recorded in the
//! `auth-cani-list.json` manifest together with any denials the RBAC gate
//! already tolerated.

use std::sync::Arc;

use futures::stream::{self, StreamExt as _};
use serde::Serialize;
use tracing::warn;

use stetho_cluster::{ApiResourceInfo, ClusterClient, ClusterError};
use stetho_specs::types::ClusterResourcesCollect;

use crate::collector::{CollectContext, CollectedFiles};
use crate::error::CollectError;

pub const ROOT: &str = "cluster-resources";
pub const CANI_LIST_PATH: &str = "cluster-resources/auth-cani-list.json";

/// One permission denial recorded in the cani-list manifest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct CaniEntry {
    pub verb: String,
    pub resource: String,
    pub namespace: String,
    pub allowed: bool,
}

pub async fn collect(
    client: &Arc<dyn ClusterClient>,
    spec: &ClusterResourcesCollect,
    ctx: &CollectContext,
) -> Result<CollectedFiles, CollectError> {
    let resources = client.discover_resources().await?;

    let mut denied: Vec<CaniEntry> = ctx
        .denied
        .iter()
        .map(|e| CaniEntry {
            verb: e.verb.clone(),
            resource: e.resource.clone(),
            namespace: e.namespace.clone(),
            allowed: false,
        })
        .collect();

    let namespaces = if spec.namespaces.is_empty() {
        match client.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(ClusterError::Forbidden { .. }) => {
                denied.push(CaniEntry {
                    verb: "list".to_string(),
                    resource: "namespaces".to_string(),
                    namespace: String::new(),
                    allowed: false,
                });
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        spec.namespaces.clone()
    };

    // One listing task per (resource, namespace) pair.
    let mut tasks: Vec<(String, ApiResourceInfo, Option<String>)> = Vec::new();
    for resource in &resources {
        if resource.namespaced {
            for namespace in &namespaces {
                tasks.push((
                    format!("{ROOT}/{}/{namespace}.json", resource.plural),
                    resource.clone(),
                    Some(namespace.clone()),
                ));
            }
        } else {
            tasks.push((
                format!("{ROOT}/{}.json", resource.plural),
                resource.clone(),
                None,
            ));
        }
    }

    let cancel = ctx.cancel.clone();
    let results: Vec<(String, ApiResourceInfo, Option<String>, Result<serde_json::Value, ClusterError>)> =
        stream::iter(tasks.into_iter().map(|(path, resource, namespace)| {
            let client = Arc::clone(client);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return (
                        path,
                        resource,
                        namespace,
                        Err(ClusterError::Api("collection interrupted".to_string())),
                    );
                }
                let result = client
                    .list_resource(&resource, namespace.as_deref())
                    .await;
                (path, resource, namespace, result)
            }
        }))
        .buffer_unordered(ctx.concurrency.max(1))
        .collect()
        .await;

    let mut files = CollectedFiles::new();
    for (path, resource, namespace, result) in results {
        match result {
            Ok(list) => {
                files.insert(
                    path.clone(),
                    serde_json::to_vec_pretty(&list).map_err(|e| CollectError::Serialize {
                        path,
                        source: e,
                    })?,
                );
            }
            Err(ClusterError::Forbidden { verb, .. }) => {
                denied.push(CaniEntry {
                    verb,
                    resource: resource.plural.clone(),
                    namespace: namespace.unwrap_or_default(),
                    allowed: false,
                });
            }
            Err(e) => {
                warn!(resource = %resource.plural, error = %e, "resource listing failed");
            }
        }
    }

    if !denied.is_empty() {
        denied.sort();
        denied.dedup();
        files.insert(
            CANI_LIST_PATH.to_string(),
            serde_json::to_vec_pretty(&denied).map_err(|e| CollectError::Serialize {
                path: CANI_LIST_PATH.to_string(),
                source: e,
            })?,
        );
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> CollectContext {
        CollectContext {
            client: None,
            cancel: CancellationToken::new(),
            concurrency: 8,
            denied: Vec::new(),
            remote_image: String::new(),
            remote_namespace: "default".to_string(),
        }
    }

    fn pods_resource() -> ApiResourceInfo {
        ApiResourceInfo {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Pod".to_string(),
            plural: "pods".to_string(),
            namespaced: true,
        }
    }

    fn nodes_resource() -> ApiResourceInfo {
        ApiResourceInfo {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Node".to_string(),
            plural: "nodes".to_string(),
            namespaced: false,
        }
    }

    #[tokio::test]
    async fn writes_per_namespace_and_cluster_scoped_files() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_resource(
                pods_resource(),
                vec![("default", serde_json::json!({"metadata": {"name": "web"}}))],
            )
            .with_resource(
                nodes_resource(),
                vec![("", serde_json::json!({"metadata": {"name": "node-a"}}))],
            );
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let files = collect(&client, &ClusterResourcesCollect::default(), &ctx())
            .await
            .unwrap();
        assert!(files.contains_key("cluster-resources/pods/default.json"));
        assert!(files.contains_key("cluster-resources/nodes.json"));
        assert!(!files.contains_key(CANI_LIST_PATH));
    }

    #[tokio::test]
    async fn forbidden_resources_land_in_cani_list() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_resource(
                pods_resource(),
                vec![("default", serde_json::json!({"metadata": {"name": "web"}}))],
            )
            .with_denied("pods", "default");
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let files = collect(&client, &ClusterResourcesCollect::default(), &ctx())
            .await
            .unwrap();
        assert!(!files.contains_key("cluster-resources/pods/default.json"));

        let cani: Vec<CaniEntry> =
            serde_json::from_slice(files.get(CANI_LIST_PATH).unwrap()).unwrap();
        assert_eq!(cani.len(), 1);
        assert_eq!(cani[0].resource, "pods");
        assert!(!cani[0].allowed);
    }

    #[tokio::test]
    async fn namespace_allow_list_restricts_output() {
        let cluster = FakeCluster::new("v1.27.0").with_namespace("kube-system").with_resource(
            pods_resource(),
            vec![
                ("default", serde_json::json!({"metadata": {"name": "web"}})),
                ("kube-system", serde_json::json!({"metadata": {"name": "dns"}})),
            ],
        );
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let spec = ClusterResourcesCollect {
            namespaces: vec!["kube-system".to_string()],
            ..ClusterResourcesCollect::default()
        };
        let files = collect(&client, &spec, &ctx()).await.unwrap();
        assert!(files.contains_key("cluster-resources/pods/kube-system.json"));
        assert!(!files.contains_key("cluster-resources/pods/default.json"));
    }
}
