//! In-memory cluster double for tests.
//!
//! Built once with the `with_*` methods, then shared behind an `Arc`.
//! Listings come back in sorted order so scheduler runs are byte-equal
//! across repetitions.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ClusterError;
use crate::{ApiResourceInfo, ClusterClient, ClusterVersion, LogWindow, PodRef, RemoteRun};

/// One labeled secret/configmap carrying spec payloads.
#[derive(Debug, Clone)]
struct LabeledPayload {
    namespace: String,
    name: String,
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
}

/// A pod known to the fake, with canned per-container logs.
#[derive(Debug, Clone)]
struct FakePod {
    pod: PodRef,
    labels: BTreeMap<String, String>,
    logs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    version: Option<ClusterVersion>,
    secrets: BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>,
    configmaps: BTreeMap<(String, String), BTreeMap<String, String>>,
    labeled: Vec<LabeledPayload>,
    resources: Vec<ApiResourceInfo>,
    resource_items: BTreeMap<String, Vec<(String, serde_json::Value)>>,
    namespaces: Vec<String>,
    /// `(plural, namespace)` pairs the current identity may not touch.
    /// An empty namespace in the entry denies every namespace.
    denied: Vec<(String, String)>,
    nodes: Vec<(String, BTreeMap<String, String>)>,
    pods: Vec<FakePod>,
    node_payloads: BTreeMap<String, Vec<u8>>,
}

impl FakeCluster {
    #[must_use]
    pub fn new(git_version: &str) -> Self {
        let (major, minor) = git_version
            .trim_start_matches('v')
            .split_once('.')
            .map(|(maj, rest)| {
                (
                    maj.to_string(),
                    rest.split('.').next().unwrap_or("0").to_string(),
                )
            })
            .unwrap_or_else(|| ("1".to_string(), "0".to_string()));
        Self {
            version: Some(ClusterVersion {
                major,
                minor,
                git_version: git_version.to_string(),
                platform: Some("linux/amd64".to_string()),
            }),
            namespaces: vec!["default".to_string()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        if !self.namespaces.iter().any(|ns| ns == namespace) {
            self.namespaces.push(namespace.to_string());
            self.namespaces.sort();
        }
        self
    }

    #[must_use]
    pub fn with_secret(
        mut self,
        namespace: &str,
        name: &str,
        data: &[(&str, &[u8])],
    ) -> Self {
        self.secrets.insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| ((*k).to_string(), v.to_vec()))
                .collect(),
        );
        self.with_namespace(namespace)
    }

    #[must_use]
    pub fn with_configmap(
        mut self,
        namespace: &str,
        name: &str,
        data: &[(&str, &str)],
    ) -> Self {
        self.configmaps.insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        );
        self.with_namespace(namespace)
    }

    /// Register a labeled object whose data keys hold spec documents.
    #[must_use]
    pub fn with_labeled_spec(
        mut self,
        namespace: &str,
        name: &str,
        labels: &[(&str, &str)],
        data: &[(&str, &str)],
    ) -> Self {
        self.labeled.push(LabeledPayload {
            namespace: namespace.to_string(),
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            data: data
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
        self
    }

    /// Register a listable resource with canned per-namespace items.
    #[must_use]
    pub fn with_resource(
        mut self,
        info: ApiResourceInfo,
        items: Vec<(&str, serde_json::Value)>,
    ) -> Self {
        self.resource_items.insert(
            info.plural.clone(),
            items
                .into_iter()
                .map(|(ns, item)| (ns.to_string(), item))
                .collect(),
        );
        self.resources.push(info);
        self.resources
            .sort_by(|a, b| (&a.group, &a.plural).cmp(&(&b.group, &b.plural)));
        self
    }

    /// Deny all verbs on `plural` in `namespace` ("" denies everywhere).
    #[must_use]
    pub fn with_denied(mut self, plural: &str, namespace: &str) -> Self {
        self.denied
            .push((plural.to_string(), namespace.to_string()));
        self
    }

    #[must_use]
    pub fn with_node(mut self, name: &str, labels: &[(&str, &str)]) -> Self {
        self.nodes.push((
            name.to_string(),
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
        self.nodes.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    #[must_use]
    pub fn with_pod(
        mut self,
        namespace: &str,
        name: &str,
        labels: &[(&str, &str)],
        logs: &[(&str, &str)],
    ) -> Self {
        self.pods.push(FakePod {
            pod: PodRef {
                namespace: namespace.to_string(),
                name: name.to_string(),
                containers: logs.iter().map(|(c, _)| (*c).to_string()).collect(),
            },
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            logs: logs
                .iter()
                .map(|(c, text)| ((*c).to_string(), (*text).to_string()))
                .collect(),
        });
        self.with_namespace(namespace)
    }

    /// Canned stdout for a remote collector run on `node`.
    #[must_use]
    pub fn with_node_payload(mut self, node: &str, payload: &[u8]) -> Self {
        self.node_payloads.insert(node.to_string(), payload.to_vec());
        self
    }

    fn is_denied(&self, plural: &str, namespace: &str) -> bool {
        self.denied.iter().any(|(p, ns)| {
            p == plural && (ns.is_empty() || ns == namespace || namespace.is_empty())
        })
    }

    fn selector_matches(selector: &[String], labels: &BTreeMap<String, String>) -> bool {
        selector.iter().all(|req| {
            req.split_once('=')
                .map(|(k, v)| labels.get(k.trim()).map(String::as_str) == Some(v.trim()))
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn server_version(&self) -> Result<ClusterVersion, ClusterError> {
        self.version
            .clone()
            .ok_or_else(|| ClusterError::Api("no version configured".to_string()))
    }

    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ClusterError> {
        if self.is_denied("secrets", namespace) {
            return Err(ClusterError::Forbidden {
                verb: "get".to_string(),
                resource: "secrets".to_string(),
                namespace: namespace.to_string(),
            });
        }
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("secret", namespace, name))
    }

    async fn read_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, ClusterError> {
        if self.is_denied("configmaps", namespace) {
            return Err(ClusterError::Forbidden {
                verb: "get".to_string(),
                resource: "configmaps".to_string(),
                namespace: namespace.to_string(),
            });
        }
        self.configmaps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("configmap", namespace, name))
    }

    async fn find_spec_payloads(
        &self,
        selector: &[String],
        keys: &[&str],
    ) -> Result<Vec<String>, ClusterError> {
        let mut matches: Vec<&LabeledPayload> = self
            .labeled
            .iter()
            .filter(|p| Self::selector_matches(selector, &p.labels))
            .collect();
        matches.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

        let mut payloads = Vec::new();
        for payload in matches {
            for (key, value) in &payload.data {
                if keys.contains(&key.as_str()) {
                    payloads.push(value.clone());
                }
            }
        }
        Ok(payloads)
    }

    async fn discover_resources(&self) -> Result<Vec<ApiResourceInfo>, ClusterError> {
        Ok(self.resources.clone())
    }

    async fn list_resource(
        &self,
        resource: &ApiResourceInfo,
        namespace: Option<&str>,
    ) -> Result<serde_json::Value, ClusterError> {
        let namespace_str = namespace.unwrap_or("");
        if self.is_denied(&resource.plural, namespace_str) {
            return Err(ClusterError::Forbidden {
                verb: "list".to_string(),
                resource: resource.plural.clone(),
                namespace: namespace_str.to_string(),
            });
        }
        let items: Vec<serde_json::Value> = self
            .resource_items
            .get(&resource.plural)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(ns, _)| namespace.is_none() || namespace == Some(ns.as_str()))
                    .map(|(_, item)| item.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(serde_json::json!({
            "apiVersion": "v1",
            "kind": format!("{}List", resource.kind),
            "items": items,
        }))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.namespaces.clone())
    }

    async fn can_i(
        &self,
        _verb: &str,
        _group: &str,
        plural: &str,
        namespace: &str,
    ) -> Result<bool, ClusterError> {
        Ok(!self.is_denied(plural, namespace))
    }

    async fn list_nodes(&self, selector: &[String]) -> Result<Vec<String>, ClusterError> {
        Ok(self
            .nodes
            .iter()
            .filter(|(_, labels)| Self::selector_matches(selector, labels))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &[String],
    ) -> Result<Vec<PodRef>, ClusterError> {
        if self.is_denied("pods", namespace) {
            return Err(ClusterError::Forbidden {
                verb: "list".to_string(),
                resource: "pods".to_string(),
                namespace: namespace.to_string(),
            });
        }
        let mut pods: Vec<PodRef> = self
            .pods
            .iter()
            .filter(|p| namespace.is_empty() || p.pod.namespace == namespace)
            .filter(|p| Self::selector_matches(selector, &p.labels))
            .map(|p| p.pod.clone())
            .collect();
        pods.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(pods)
    }

    async fn pod_logs(
        &self,
        pod: &PodRef,
        container: &str,
        _window: &LogWindow,
    ) -> Result<String, ClusterError> {
        self.pods
            .iter()
            .find(|p| p.pod.namespace == pod.namespace && p.pod.name == pod.name)
            .and_then(|p| p.logs.get(container).cloned())
            .ok_or_else(|| ClusterError::not_found("pod", &pod.namespace, &pod.name))
    }

    async fn run_node_payload(&self, run: &RemoteRun) -> Result<Vec<u8>, ClusterError> {
        self.node_payloads
            .get(&run.node)
            .cloned()
            .ok_or_else(|| ClusterError::RemoteFailed {
                node: run.node.clone(),
                reason: "no payload configured".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn secrets_round_trip() {
        let cluster =
            FakeCluster::new("v1.27.0").with_secret("default", "creds", &[("token", b"abc")]);
        let data = cluster.read_secret("default", "creds").await.unwrap();
        assert_eq!(data.get("token").unwrap(), b"abc");
        assert!(matches!(
            cluster.read_secret("default", "missing").await,
            Err(ClusterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn denial_covers_namespace_and_wildcard() {
        let cluster = FakeCluster::new("v1.27.0").with_denied("secrets", "restricted");
        assert!(!cluster.can_i("list", "", "secrets", "restricted").await.unwrap());
        assert!(cluster.can_i("list", "", "secrets", "default").await.unwrap());

        let cluster = cluster.with_denied("pods", "");
        assert!(!cluster.can_i("list", "", "pods", "anything").await.unwrap());
    }

    #[tokio::test]
    async fn labeled_specs_filter_on_selector_and_keys() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_labeled_spec(
                "default",
                "bundle",
                &[("stetho.dev/kind", "support-bundle")],
                &[("support-bundle-spec", "kind: SupportBundle"), ("other", "junk")],
            )
            .with_labeled_spec("default", "unrelated", &[("app", "web")], &[]);

        let payloads = cluster
            .find_spec_payloads(
                &["stetho.dev/kind=support-bundle".to_string()],
                &["support-bundle-spec"],
            )
            .await
            .unwrap();
        assert_eq!(payloads, vec!["kind: SupportBundle".to_string()]);
    }
}
