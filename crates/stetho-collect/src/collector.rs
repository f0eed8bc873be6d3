//! The collector capability contract.
//!
//! Collectors are a closed set: one enum variant per supported kind, with
//! the four capability operations (`title`, `is_excluded`, `check_access`,
//! `collect`) dispatched by match. Host and remote collectors share the
//! contract; they simply have no access-check requirements (host) or only
//! a workload-creation check (remote).

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use stetho_cluster::{AccessError, ClusterClient};
use stetho_specs::types::{
    ClusterInfoCollect, ClusterResourcesCollect, CollectorSpec, ConfigMapCollect, DataCollect,
    HostCollectorSpec, LogLimits, LogsCollect, RemoteCollectorSpec, SecretCollect,
};

use crate::error::CollectError;
use crate::{cluster_info, cluster_resources, host, logs, objects, remote};

/// Files produced by one collector, keyed by logical bundle path.
pub type CollectedFiles = BTreeMap<String, Vec<u8>>;

/// Shared state handed to every collector.
pub struct CollectContext {
    pub client: Option<Arc<dyn ClusterClient>>,
    pub cancel: CancellationToken,
    /// Bound on in-flight API calls within a single collector.
    pub concurrency: usize,
    /// Access errors the RBAC gate chose to tolerate; cluster-resources
    /// documents them in its cani-list manifest.
    pub denied: Vec<AccessError>,
    pub remote_image: String,
    pub remote_namespace: String,
}

impl CollectContext {
    pub fn client(&self, title: &str) -> Result<&Arc<dyn ClusterClient>, CollectError> {
        self.client.as_ref().ok_or_else(|| CollectError::NoClusterClient {
            title: title.to_string(),
        })
    }
}

/// Runtime form of the logs collector.
///
/// This is the one mergeable collector kind: equivalent specs fold their
/// selectors into a single collector, each selector group selecting pods
/// independently.
#[derive(Debug, Clone, PartialEq)]
pub struct LogsCollector {
    pub name: Option<String>,
    pub namespace: String,
    pub selectors: Vec<Vec<String>>,
    pub container_names: Vec<String>,
    pub limits: Option<LogLimits>,
}

impl From<LogsCollect> for LogsCollector {
    fn from(spec: LogsCollect) -> Self {
        Self {
            name: spec.name,
            namespace: spec.namespace,
            selectors: vec![spec.selector],
            container_names: spec.container_names,
            limits: spec.limits,
        }
    }
}

impl LogsCollector {
    /// Can `other` fold into this collector? Same output directory, same
    /// namespace, same bounds.
    #[must_use]
    pub fn accepts(&self, other: &Self) -> bool {
        self.name == other.name
            && self.namespace == other.namespace
            && self.container_names == other.container_names
            && self.limits == other.limits
    }

    pub fn fold(&mut self, other: Self) {
        for selector in other.selectors {
            if !self.selectors.contains(&selector) {
                self.selectors.push(selector);
            }
        }
    }
}

/// One schedulable collector.
#[derive(Debug, Clone, PartialEq)]
pub enum Collector {
    ClusterInfo(ClusterInfoCollect),
    ClusterResources(ClusterResourcesCollect),
    Secret(SecretCollect),
    ConfigMap(ConfigMapCollect),
    Logs(LogsCollector),
    Data(DataCollect),
    Host(HostCollectorSpec),
    Remote(RemoteCollectorSpec),
}

impl Collector {
    #[must_use]
    pub fn from_spec(spec: CollectorSpec) -> Self {
        match spec {
            CollectorSpec::ClusterInfo(c) => Self::ClusterInfo(c),
            CollectorSpec::ClusterResources(c) => Self::ClusterResources(c),
            CollectorSpec::Secret(c) => Self::Secret(c),
            CollectorSpec::ConfigMap(c) => Self::ConfigMap(c),
            CollectorSpec::Logs(c) => Self::Logs(c.into()),
            CollectorSpec::Data(c) => Self::Data(c),
        }
    }

    /// Stable identifier used in progress events and run summaries.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::ClusterInfo(_) => "cluster-info".to_string(),
            Self::ClusterResources(_) => "cluster-resources".to_string(),
            Self::Secret(c) => format!("secret/{}/{}", c.namespace, c.name),
            Self::ConfigMap(c) => format!("configmap/{}/{}", c.namespace, c.name),
            Self::Logs(c) => c.name.clone().unwrap_or_else(|| "logs".to_string()),
            Self::Data(c) => c.name.clone(),
            Self::Host(h) => format!("host/{}", h.title()),
            Self::Remote(r) => format!("remote/{}", r.title()),
        }
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        match self {
            Self::ClusterInfo(c) => stetho_specs::types::flag_set(c.exclude),
            Self::ClusterResources(c) => stetho_specs::types::flag_set(c.exclude),
            Self::Secret(c) => stetho_specs::types::flag_set(c.exclude),
            Self::ConfigMap(c) => stetho_specs::types::flag_set(c.exclude),
            Self::Logs(_) => false,
            Self::Data(c) => stetho_specs::types::flag_set(c.exclude),
            Self::Host(h) => h.is_excluded(),
            Self::Remote(r) => r.is_excluded(),
        }
    }

    /// Dry-run the permissions this collector needs. The result is
    /// advisory; the scheduler decides whether it aborts the run.
    pub async fn check_access(&self, client: &Arc<dyn ClusterClient>) -> Vec<AccessError> {
        let title = self.title();
        let mut errors = Vec::new();
        let mut check = |verb: &str, plural: &str, namespace: &str, allowed: bool| {
            if !allowed {
                errors.push(AccessError {
                    collector: title.clone(),
                    verb: verb.to_string(),
                    resource: plural.to_string(),
                    namespace: namespace.to_string(),
                });
            }
        };

        match self {
            Self::ClusterInfo(_) | Self::Data(_) | Self::Host(_) => {}
            Self::ClusterResources(_) => {
                let allowed = client
                    .can_i("list", "", "namespaces", "")
                    .await
                    .unwrap_or(false);
                check("list", "namespaces", "", allowed);
            }
            Self::Secret(c) => {
                let allowed = client
                    .can_i("get", "", "secrets", &c.namespace)
                    .await
                    .unwrap_or(false);
                check("get", "secrets", &c.namespace, allowed);
            }
            Self::ConfigMap(c) => {
                let allowed = client
                    .can_i("get", "", "configmaps", &c.namespace)
                    .await
                    .unwrap_or(false);
                check("get", "configmaps", &c.namespace, allowed);
            }
            Self::Logs(c) => {
                let allowed = client
                    .can_i("list", "", "pods", &c.namespace)
                    .await
                    .unwrap_or(false);
                check("list", "pods", &c.namespace, allowed);
            }
            Self::Remote(r) => {
                let namespace = r.shared().namespace.clone().unwrap_or_default();
                let allowed = client
                    .can_i("create", "", "pods", &namespace)
                    .await
                    .unwrap_or(false);
                check("create", "pods", &namespace, allowed);
            }
        }

        errors
    }

    /// Gather files. Failures are collector-scoped: the scheduler reports
    /// them and moves on.
    pub async fn collect(&self, ctx: &CollectContext) -> Result<CollectedFiles, CollectError> {
        let title = self.title();
        match self {
            Self::ClusterInfo(_) => cluster_info::collect(ctx.client(&title)?).await,
            Self::ClusterResources(spec) => {
                cluster_resources::collect(ctx.client(&title)?, spec, ctx).await
            }
            Self::Secret(spec) => objects::collect_secret(ctx.client(&title)?, spec).await,
            Self::ConfigMap(spec) => objects::collect_configmap(ctx.client(&title)?, spec).await,
            Self::Logs(spec) => logs::collect(ctx.client(&title)?, spec).await,
            Self::Data(spec) => objects::collect_data(spec),
            Self::Host(spec) => host::collect(spec),
            Self::Remote(spec) => remote::collect(ctx.client(&title)?, spec, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_specs_fold_when_equivalent() {
        let a: LogsCollector = LogsCollect {
            namespace: "default".to_string(),
            selector: vec!["app=web".to_string()],
            ..LogsCollect::default()
        }
        .into();
        let b: LogsCollector = LogsCollect {
            namespace: "default".to_string(),
            selector: vec!["app=api".to_string()],
            ..LogsCollect::default()
        }
        .into();
        let other_ns: LogsCollector = LogsCollect {
            namespace: "kube-system".to_string(),
            selector: vec!["app=api".to_string()],
            ..LogsCollect::default()
        }
        .into();

        assert!(a.accepts(&b));
        assert!(!a.accepts(&other_ns));

        let mut merged = a;
        merged.fold(b.clone());
        assert_eq!(merged.selectors.len(), 2);

        // Folding the same selector twice is a no-op.
        merged.fold(b);
        assert_eq!(merged.selectors.len(), 2);
    }

    #[test]
    fn titles_are_stable() {
        let c = Collector::from_spec(CollectorSpec::Secret(SecretCollect {
            namespace: "restricted".to_string(),
            name: "db".to_string(),
            ..SecretCollect::default()
        }));
        assert_eq!(c.title(), "secret/restricted/db");
        assert_eq!(
            Collector::from_spec(CollectorSpec::ClusterInfo(ClusterInfoCollect::default()))
                .title(),
            "cluster-info"
        );
    }
}
