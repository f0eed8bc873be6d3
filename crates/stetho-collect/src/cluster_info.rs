//! Cluster-info collector: API server version and platform.

use std::sync::Arc;

use serde::Serialize;

use stetho_cluster::ClusterClient;

use crate::collector::CollectedFiles;
use crate::error::CollectError;

pub const VERSION_PATH: &str = "cluster-info/cluster_version.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterVersionFile {
    info: VersionInfo,
    /// Convenience copy of the git version for analyzers.
    string: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    major: String,
    minor: String,
    git_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<String>,
}

pub async fn collect(client: &Arc<dyn ClusterClient>) -> Result<CollectedFiles, CollectError> {
    let version = client.server_version().await?;
    let file = ClusterVersionFile {
        string: version.git_version.clone(),
        info: VersionInfo {
            major: version.major,
            minor: version.minor,
            git_version: version.git_version,
            platform: version.platform,
        },
    };

    let mut files = CollectedFiles::new();
    files.insert(
        VERSION_PATH.to_string(),
        serde_json::to_vec_pretty(&file).map_err(|e| CollectError::Serialize {
            path: VERSION_PATH.to_string(),
            source: e,
        })?,
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;

    #[tokio::test]
    async fn emits_version_file() {
        let client: Arc<dyn ClusterClient> = Arc::new(FakeCluster::new("v1.27.0"));
        let files = collect(&client).await.unwrap();
        let content = files.get(VERSION_PATH).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(content).unwrap();
        assert_eq!(parsed["string"], "v1.27.0");
        assert_eq!(parsed["info"]["minor"], "27");
    }
}
