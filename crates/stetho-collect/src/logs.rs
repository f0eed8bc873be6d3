//! Pod log collector.
//!
//! Each selector group lists pods independently; a pod selected by more
//! than one group is fetched once. Log files land at
//! `<name>/<namespace>/<pod>/<container>.log`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use stetho_cluster::{ClusterClient, LogWindow, PodRef};

use crate::collector::{CollectedFiles, LogsCollector};
use crate::error::CollectError;
use crate::parse_duration_seconds;

pub async fn collect(
    client: &Arc<dyn ClusterClient>,
    spec: &LogsCollector,
) -> Result<CollectedFiles, CollectError> {
    let dir = spec.name.clone().unwrap_or_else(|| "logs".to_string());
    let window = window_from_limits(spec)?;

    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut pods: Vec<PodRef> = Vec::new();
    for selector in &spec.selectors {
        for pod in client.list_pods(&spec.namespace, selector).await? {
            if seen.insert((pod.namespace.clone(), pod.name.clone())) {
                pods.push(pod);
            }
        }
    }

    let mut files = CollectedFiles::new();
    for pod in &pods {
        let containers: Vec<String> = if spec.container_names.is_empty() {
            pod.containers.clone()
        } else {
            spec.container_names.clone()
        };
        for container in containers {
            match client.pod_logs(pod, &container, &window).await {
                Ok(text) => {
                    let path =
                        format!("{dir}/{}/{}/{container}.log", pod.namespace, pod.name);
                    files.insert(path, text.into_bytes());
                }
                Err(e) => {
                    warn!(
                        pod = %pod.name,
                        container = %container,
                        error = %e,
                        "log fetch failed"
                    );
                }
            }
        }
    }

    Ok(files)
}

fn window_from_limits(spec: &LogsCollector) -> Result<LogWindow, CollectError> {
    let Some(limits) = &spec.limits else {
        return Ok(LogWindow::default());
    };
    let since_seconds = match &limits.since {
        Some(text) => Some(parse_duration_seconds(text).map_err(|reason| {
            CollectError::collector(
                spec.name.clone().unwrap_or_else(|| "logs".to_string()),
                reason,
            )
        })? as i64),
        None => None,
    };
    Ok(LogWindow {
        since_seconds,
        since_time: limits.since_time.clone(),
        tail_lines: limits.max_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;
    use stetho_specs::types::{LogLimits, LogsCollect};

    fn collector(selectors: Vec<Vec<&str>>) -> LogsCollector {
        let mut spec: LogsCollector = LogsCollect {
            name: Some("pods/logs".to_string()),
            namespace: "default".to_string(),
            ..LogsCollect::default()
        }
        .into();
        spec.selectors = selectors
            .into_iter()
            .map(|group| group.into_iter().map(str::to_string).collect())
            .collect();
        spec
    }

    #[tokio::test]
    async fn fetches_each_selected_pod_once() {
        let cluster = FakeCluster::new("v1.27.0")
            .with_pod(
                "default",
                "web-1",
                &[("app", "web"), ("tier", "frontend")],
                &[("nginx", "GET / 200\n")],
            )
            .with_pod("default", "api-1", &[("app", "api")], &[("api", "ready\n")]);
        let client: Arc<dyn ClusterClient> = Arc::new(cluster);

        // Two groups select web-1; it must appear once.
        let spec = collector(vec![vec!["app=web"], vec!["tier=frontend"], vec!["app=api"]]);
        let files = collect(&client, &spec).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains_key("pods/logs/default/web-1/nginx.log"));
        assert!(files.contains_key("pods/logs/default/api-1/api.log"));
    }

    #[test]
    fn since_window_parses_duration() {
        let mut spec = collector(vec![vec!["app=web"]]);
        spec.limits = Some(LogLimits {
            since: Some("24h".to_string()),
            max_lines: Some(500),
            ..LogLimits::default()
        });
        let window = window_from_limits(&spec).unwrap();
        assert_eq!(window.since_seconds, Some(24 * 3600));
        assert_eq!(window.tail_lines, Some(500));
    }

    #[test]
    fn bad_duration_is_a_collector_error() {
        let mut spec = collector(vec![]);
        spec.limits = Some(LogLimits {
            since: Some("soon".to_string()),
            ..LogLimits::default()
        });
        assert!(window_from_limits(&spec).is_err());
    }
}
