//! Secret, config-map and static-data collectors.
//!
//! Secret and config-map collection records existence and key metadata;
//! values are only included when the spec explicitly opts in, and even
//! then they pass through the redaction pipeline like everything else.

use std::sync::Arc;

use serde::Serialize;

use stetho_cluster::{ClusterClient, ClusterError};
use stetho_specs::types::{flag_set, ConfigMapCollect, DataCollect, SecretCollect};

use crate::collector::CollectedFiles;
use crate::error::CollectError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectFile {
    namespace: String,
    name: String,
    exists: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

pub async fn collect_secret(
    client: &Arc<dyn ClusterClient>,
    spec: &SecretCollect,
) -> Result<CollectedFiles, CollectError> {
    let path = format!("secrets/{}/{}.json", spec.namespace, spec.name);
    let file = match client.read_secret(&spec.namespace, &spec.name).await {
        Ok(data) => {
            let value = if flag_set(spec.include_value) {
                spec.key.as_ref().and_then(|key| {
                    data.get(key)
                        .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
                })
            } else {
                None
            };
            ObjectFile {
                namespace: spec.namespace.clone(),
                name: spec.name.clone(),
                exists: true,
                keys: data.keys().cloned().collect(),
                key: spec.key.clone(),
                value,
            }
        }
        Err(ClusterError::NotFound { .. }) => ObjectFile {
            namespace: spec.namespace.clone(),
            name: spec.name.clone(),
            exists: false,
            keys: Vec::new(),
            key: spec.key.clone(),
            value: None,
        },
        Err(e) => return Err(e.into()),
    };

    emit_one(path, &file)
}

pub async fn collect_configmap(
    client: &Arc<dyn ClusterClient>,
    spec: &ConfigMapCollect,
) -> Result<CollectedFiles, CollectError> {
    let path = format!("configmaps/{}/{}.json", spec.namespace, spec.name);
    let file = match client.read_configmap(&spec.namespace, &spec.name).await {
        Ok(data) => {
            let value = if flag_set(spec.include_value) {
                spec.key.as_ref().and_then(|key| data.get(key).cloned())
            } else {
                None
            };
            ObjectFile {
                namespace: spec.namespace.clone(),
                name: spec.name.clone(),
                exists: true,
                keys: data.keys().cloned().collect(),
                key: spec.key.clone(),
                value,
            }
        }
        Err(ClusterError::NotFound { .. }) => ObjectFile {
            namespace: spec.namespace.clone(),
            name: spec.name.clone(),
            exists: false,
            keys: Vec::new(),
            key: spec.key.clone(),
            value: None,
        },
        Err(e) => return Err(e.into()),
    };

    emit_one(path, &file)
}

/// Static data pass-through: the spec carries the file content verbatim.
pub fn collect_data(spec: &DataCollect) -> Result<CollectedFiles, CollectError> {
    let dir = spec
        .collector_name
        .clone()
        .unwrap_or_else(|| "static-data".to_string());
    let path = format!("{dir}/{}", spec.name);
    let mut files = CollectedFiles::new();
    files.insert(path, spec.data.clone().into_bytes());
    Ok(files)
}

fn emit_one<T: Serialize>(path: String, value: &T) -> Result<CollectedFiles, CollectError> {
    let mut files = CollectedFiles::new();
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| CollectError::Serialize {
        path: path.clone(),
        source: e,
    })?;
    files.insert(path, bytes);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;
    use stetho_specs::types::Flag;

    #[tokio::test]
    async fn secret_metadata_without_value_by_default() {
        let cluster =
            FakeCluster::new("v1.27.0").with_secret("default", "creds", &[("token", b"s3cr3t")]);
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let spec = SecretCollect {
            namespace: "default".to_string(),
            name: "creds".to_string(),
            key: Some("token".to_string()),
            ..SecretCollect::default()
        };
        let files = collect_secret(&client, &spec).await.unwrap();
        let content = files.get("secrets/default/creds.json").unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(content).unwrap();
        assert_eq!(parsed["exists"], true);
        assert_eq!(parsed["keys"][0], "token");
        assert!(parsed.get("value").is_none());
        assert!(!String::from_utf8_lossy(content).contains("s3cr3t"));
    }

    #[tokio::test]
    async fn secret_value_requires_opt_in() {
        let cluster =
            FakeCluster::new("v1.27.0").with_secret("default", "creds", &[("token", b"s3cr3t")]);
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        let spec = SecretCollect {
            namespace: "default".to_string(),
            name: "creds".to_string(),
            key: Some("token".to_string()),
            include_value: Some(Flag(true)),
            ..SecretCollect::default()
        };
        let files = collect_secret(&client, &spec).await.unwrap();
        let parsed: serde_json::Value =
            serde_json::from_slice(files.get("secrets/default/creds.json").unwrap()).unwrap();
        assert_eq!(parsed["value"], "s3cr3t");
    }

    #[tokio::test]
    async fn missing_secret_reports_absence() {
        let client: Arc<dyn ClusterClient> = Arc::new(FakeCluster::new("v1.27.0"));
        let spec = SecretCollect {
            namespace: "default".to_string(),
            name: "ghost".to_string(),
            ..SecretCollect::default()
        };
        let files = collect_secret(&client, &spec).await.unwrap();
        let parsed: serde_json::Value =
            serde_json::from_slice(files.get("secrets/default/ghost.json").unwrap()).unwrap();
        assert_eq!(parsed["exists"], false);
    }

    #[tokio::test]
    async fn forbidden_secret_is_a_collector_error() {
        let cluster = FakeCluster::new("v1.27.0").with_denied("secrets", "restricted");
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);
        let spec = SecretCollect {
            namespace: "restricted".to_string(),
            name: "creds".to_string(),
            ..SecretCollect::default()
        };
        assert!(collect_secret(&client, &spec).await.is_err());
    }

    #[test]
    fn data_collector_places_content() {
        let spec = DataCollect {
            name: "config.yaml".to_string(),
            collector_name: Some("app".to_string()),
            data: "key: value\n".to_string(),
            ..DataCollect::default()
        };
        let files = collect_data(&spec).unwrap();
        assert_eq!(files.get("app/config.yaml").unwrap(), b"key: value\n");
    }
}
