//! kube-backed [`ClusterClient`] implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{ConfigMap, Container, Namespace, Node, Pod, PodSpec, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, LogParams, PostParams};
use kube::core::ApiResource;
use kube::discovery::{verbs, Discovery, Scope};
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::error::ClusterError;
use crate::{ApiResourceInfo, ClusterClient, ClusterVersion, LogWindow, PodRef, RemoteRun};

/// Production client wrapping `kube::Client`.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
}

impl KubeClusterClient {
    /// Connect using the ambient kubeconfig / in-cluster environment.
    pub async fn connect() -> Result<Self, ClusterError> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn list_params(selector: &[String]) -> ListParams {
        if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&selector.join(","))
        }
    }

    fn map_err(err: kube::Error) -> ClusterError {
        match &err {
            kube::Error::Api(resp) if resp.code == 403 => ClusterError::Forbidden {
                verb: "get".to_string(),
                resource: resp.reason.clone(),
                namespace: String::new(),
            },
            _ => ClusterError::Api(err.to_string()),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn server_version(&self) -> Result<ClusterVersion, ClusterError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(Self::map_err)?;
        Ok(ClusterVersion {
            major: info.major,
            minor: info.minor,
            git_version: info.git_version,
            platform: Some(info.platform),
        })
    }

    async fn read_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound {
                kind: "secret".to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => Self::map_err(other),
        })?;
        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }

    async fn read_configmap(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let cm = api.get(name).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound {
                kind: "configmap".to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => Self::map_err(other),
        })?;
        Ok(cm.data.unwrap_or_default())
    }

    async fn find_spec_payloads(
        &self,
        selector: &[String],
        keys: &[&str],
    ) -> Result<Vec<String>, ClusterError> {
        let params = Self::list_params(selector);
        let mut found: Vec<(String, String, String)> = Vec::new();

        let secrets: Api<Secret> = Api::all(self.client.clone());
        match secrets.list(&params).await {
            Ok(list) => {
                for secret in list {
                    let ns = secret.namespace().unwrap_or_default();
                    let name = secret.name_any();
                    for (key, value) in secret.data.unwrap_or_default() {
                        if keys.contains(&key.as_str()) {
                            if let Ok(text) = String::from_utf8(value.0) {
                                found.push((ns.clone(), name.clone(), text));
                            }
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "listing labeled secrets failed"),
        }

        let configmaps: Api<ConfigMap> = Api::all(self.client.clone());
        match configmaps.list(&params).await {
            Ok(list) => {
                for cm in list {
                    let ns = cm.namespace().unwrap_or_default();
                    let name = cm.name_any();
                    for (key, value) in cm.data.unwrap_or_default() {
                        if keys.contains(&key.as_str()) {
                            found.push((ns.clone(), name.clone(), value));
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "listing labeled configmaps failed"),
        }

        found.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        Ok(found.into_iter().map(|(_, _, payload)| payload).collect())
    }

    async fn discover_resources(&self) -> Result<Vec<ApiResourceInfo>, ClusterError> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(Self::map_err)?;

        let mut resources = Vec::new();
        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if !caps.supports_operation(verbs::LIST) {
                    continue;
                }
                resources.push(ApiResourceInfo {
                    group: ar.group.clone(),
                    version: ar.version.clone(),
                    kind: ar.kind.clone(),
                    plural: ar.plural.clone(),
                    namespaced: caps.scope == Scope::Namespaced,
                });
            }
        }
        resources.sort_by(|a, b| (&a.group, &a.plural).cmp(&(&b.group, &b.plural)));
        Ok(resources)
    }

    async fn list_resource(
        &self,
        resource: &ApiResourceInfo,
        namespace: Option<&str>,
    ) -> Result<serde_json::Value, ClusterError> {
        let api_version = if resource.group.is_empty() {
            resource.version.clone()
        } else {
            format!("{}/{}", resource.group, resource.version)
        };
        let ar = ApiResource {
            group: resource.group.clone(),
            version: resource.version.clone(),
            api_version,
            kind: resource.kind.clone(),
            plural: resource.plural.clone(),
        };
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };
        let list = api.list(&ListParams::default()).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 403 => ClusterError::Forbidden {
                verb: "list".to_string(),
                resource: resource.plural.clone(),
                namespace: namespace.unwrap_or_default().to_string(),
            },
            other => Self::map_err(other),
        })?;
        serde_json::to_value(&list).map_err(|e| ClusterError::Api(e.to_string()))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(Self::map_err)?;
        let mut names: Vec<String> = list.into_iter().map(|ns| ns.name_any()).collect();
        names.sort();
        Ok(names)
    }

    async fn can_i(
        &self,
        verb: &str,
        group: &str,
        plural: &str,
        namespace: &str,
    ) -> Result<bool, ClusterError> {
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    verb: Some(verb.to_string()),
                    group: Some(group.to_string()),
                    resource: Some(plural.to_string()),
                    namespace: if namespace.is_empty() {
                        None
                    } else {
                        Some(namespace.to_string())
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let created = api
            .create(&PostParams::default(), &review)
            .await
            .map_err(Self::map_err)?;
        Ok(created.status.map(|s| s.allowed).unwrap_or(false))
    }

    async fn list_nodes(&self, selector: &[String]) -> Result<Vec<String>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&Self::list_params(selector))
            .await
            .map_err(Self::map_err)?;
        let mut names: Vec<String> = list.into_iter().map(|n| n.name_any()).collect();
        names.sort();
        Ok(names)
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &[String],
    ) -> Result<Vec<PodRef>, ClusterError> {
        let api: Api<Pod> = if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        };
        let list = api
            .list(&Self::list_params(selector))
            .await
            .map_err(|e| match e {
                kube::Error::Api(resp) if resp.code == 403 => ClusterError::Forbidden {
                    verb: "list".to_string(),
                    resource: "pods".to_string(),
                    namespace: namespace.to_string(),
                },
                other => Self::map_err(other),
            })?;

        let mut pods: Vec<PodRef> = list
            .into_iter()
            .map(|pod| {
                let containers = pod
                    .spec
                    .as_ref()
                    .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
                    .unwrap_or_default();
                PodRef {
                    namespace: pod.namespace().unwrap_or_default(),
                    name: pod.name_any(),
                    containers,
                }
            })
            .collect();
        pods.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(pods)
    }

    async fn pod_logs(
        &self,
        pod: &PodRef,
        container: &str,
        window: &LogWindow,
    ) -> Result<String, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let since_time = window
            .since_time
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&chrono::Utc));
        let params = LogParams {
            container: Some(container.to_string()),
            since_seconds: window.since_seconds,
            since_time,
            tail_lines: window.tail_lines,
            timestamps: true,
            ..LogParams::default()
        };
        api.logs(&pod.name, &params).await.map_err(Self::map_err)
    }

    async fn run_node_payload(&self, run: &RemoteRun) -> Result<Vec<u8>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &run.namespace);
        let pod = Pod {
            metadata: ObjectMeta {
                generate_name: Some(format!("stetho-remote-{}-", run.node)),
                labels: Some(
                    [("app.kubernetes.io/managed-by".to_string(), "stetho".to_string())]
                        .into_iter()
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(run.node.clone()),
                restart_policy: Some("Never".to_string()),
                containers: vec![Container {
                    name: "collector".to_string(),
                    image: Some(run.image.clone()),
                    image_pull_policy: run.pull_policy.clone(),
                    command: if run.command.is_empty() {
                        None
                    } else {
                        Some(run.command.clone())
                    },
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = api
            .create(&PostParams::default(), &pod)
            .await
            .map_err(Self::map_err)?;
        let name = created.name_any();
        debug!(node = %run.node, pod = %name, "remote collector pod scheduled");

        let result = self.await_pod_completion(&api, &name, run).await;

        if let Err(e) = api.delete(&name, &DeleteParams::default()).await {
            warn!(pod = %name, error = %e, "failed to delete remote collector pod");
        }

        result
    }
}

impl KubeClusterClient {
    async fn await_pod_completion(
        &self,
        api: &Api<Pod>,
        name: &str,
        run: &RemoteRun,
    ) -> Result<Vec<u8>, ClusterError> {
        let deadline = Duration::from_secs(run.timeout_seconds);
        let poll = async {
            loop {
                let pod = api.get(name).await.map_err(Self::map_err)?;
                let phase = pod
                    .status
                    .as_ref()
                    .and_then(|s| s.phase.clone())
                    .unwrap_or_default();
                match phase.as_str() {
                    "Succeeded" => break Ok(()),
                    "Failed" => {
                        break Err(ClusterError::RemoteFailed {
                            node: run.node.clone(),
                            reason: pod
                                .status
                                .and_then(|s| s.message)
                                .unwrap_or_else(|| "pod failed".to_string()),
                        })
                    }
                    _ => tokio::time::sleep(Duration::from_secs(1)).await,
                }
            }
        };

        match tokio::time::timeout(deadline, poll).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ClusterError::RemoteTimeout {
                    node: run.node.clone(),
                    seconds: run.timeout_seconds,
                })
            }
        }

        let logs = api
            .logs(
                name,
                &LogParams {
                    container: Some("collector".to_string()),
                    ..LogParams::default()
                },
            )
            .await
            .map_err(Self::map_err)?;
        Ok(logs.into_bytes())
    }
}
