//! Spec loading: fetch, split, classify, upgrade, follow, expand.
//!
//! The loader turns a list of [`SpecSource`]s into a single normalized
//! [`SpecSet`]. Per-document failures skip-and-continue by default and
//! become fatal in strict mode; network failures while following
//! follow-up URIs are always non-fatal.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize as _;
use serde_yaml::Value;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use stetho_cluster::ClusterClient;

use crate::error::SpecError;
use crate::source::SpecSource;
use crate::template;
use crate::types::{
    AnalyzerSpec, CollectorSpec, HostAnalyzerSpec, HostCollectorSpec, PreflightDoc,
    RedactorEntry, RemoteCollectorSpec, SpecSet, SupportBundleDoc, CANONICAL_VERSION,
    LABEL_KEY, LEGACY_LABEL_KEY, LEGACY_VERSION, NESTED_SPEC_KEYS, TEMPLATED_VERSION,
};

/// Hitting the vendor spec host requires an identifying client header.
const VENDOR_HOST: &str = "spec.stetho.dev";
const VENDOR_HEADER: &str = "x-stetho-client";

const USER_AGENT: &str = concat!("stetho/", env!("CARGO_PKG_VERSION"));

/// Nested spec documents are followed one level deep.
const MAX_NESTING: usize = 1;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Fail on unknown kinds and parse errors instead of skipping.
    pub strict: bool,
    /// Do not download follow-up `spec.uri` documents.
    pub no_uri: bool,
    /// Label requirements for cluster discovery, ANDed together.
    pub selector: Vec<String>,
    pub values_files: Vec<PathBuf>,
    pub set_values: Vec<String>,
    pub http_timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strict: false,
            no_uri: false,
            selector: vec!["kind=support-bundle".to_string()],
            values_files: Vec::new(),
            set_values: Vec::new(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

pub struct SpecLoader {
    options: LoadOptions,
    client: Option<Arc<dyn ClusterClient>>,
    http: reqwest::Client,
    values: serde_json::Value,
    visited_uris: HashSet<String>,
}

impl SpecLoader {
    pub fn new(
        options: LoadOptions,
        client: Option<Arc<dyn ClusterClient>>,
    ) -> Result<Self, SpecError> {
        let http = reqwest::Client::builder()
            .timeout(options.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SpecError::Http {
                url: String::new(),
                reason: e.to_string(),
            })?;

        let mut documents = Vec::new();
        for path in &options.values_files {
            documents.push(template::parse_values_file(path)?);
        }
        let values = template::merge_values(&documents, &options.set_values)?;

        Ok(Self {
            options,
            client,
            http,
            values,
            visited_uris: HashSet::new(),
        })
    }

    /// Load every source, in order, into one normalized set.
    pub async fn load(&mut self, sources: &[SpecSource]) -> Result<SpecSet, SpecError> {
        let mut set = SpecSet::default();
        for source in sources {
            let raw = self.fetch(source).await?;
            let contributed = self.ingest(&raw).await?;
            set.merge(contributed);
        }
        self.follow_uris(&mut set).await?;
        set.validate()?;
        Ok(set)
    }

    // -- fetch ------------------------------------------------------------

    async fn fetch(&self, source: &SpecSource) -> Result<String, SpecError> {
        match source {
            SpecSource::Inline(text) => Ok(text.clone()),
            SpecSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| SpecError::Io {
                        path: path.display().to_string(),
                        source: e,
                    })
            }
            SpecSource::Stdin => {
                let mut buffer = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut buffer)
                    .await
                    .map_err(|e| SpecError::Io {
                        path: "<stdin>".to_string(),
                        source: e,
                    })?;
                Ok(buffer)
            }
            SpecSource::Uri(url) => self.fetch_uri(url).await,
            SpecSource::Oci(reference) => crate::oci::pull(&self.http, reference).await,
            SpecSource::Secret {
                namespace,
                name,
                key,
            } => {
                let client = self.client.as_ref().ok_or(SpecError::MissingClusterClient)?;
                let data = client.read_secret(namespace, name).await?;
                let reference = format!("secret/{namespace}/{name}");
                match key {
                    Some(key) => {
                        let bytes =
                            data.get(key).ok_or_else(|| SpecError::Reference {
                                reference: format!("{reference}/{key}"),
                                reason: "data key not found".to_string(),
                            })?;
                        String::from_utf8(bytes.clone()).map_err(|_| SpecError::Reference {
                            reference: format!("{reference}/{key}"),
                            reason: "data is not valid UTF-8".to_string(),
                        })
                    }
                    None => {
                        let mut docs = Vec::new();
                        for (key, bytes) in data {
                            match String::from_utf8(bytes) {
                                Ok(text) => docs.push(text),
                                Err(_) => warn!(
                                    reference = %reference,
                                    key = %key,
                                    "skipping non-UTF-8 secret data key"
                                ),
                            }
                        }
                        Ok(docs.join("\n---\n"))
                    }
                }
            }
            SpecSource::ConfigMap {
                namespace,
                name,
                key,
            } => {
                let client = self.client.as_ref().ok_or(SpecError::MissingClusterClient)?;
                let data = client.read_configmap(namespace, name).await?;
                match key {
                    Some(key) => data.get(key).cloned().ok_or_else(|| SpecError::Reference {
                        reference: format!("configmap/{namespace}/{name}/{key}"),
                        reason: "data key not found".to_string(),
                    }),
                    None => Ok(data.into_values().collect::<Vec<_>>().join("\n---\n")),
                }
            }
            SpecSource::Cluster => self.fetch_from_cluster().await,
        }
    }

    async fn fetch_uri(&self, url: &str) -> Result<String, SpecError> {
        let mut request = self.http.get(url);
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if host.as_deref() == Some(VENDOR_HOST) {
            request = request.header(VENDOR_HEADER, "cli");
        }
        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SpecError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .text()
            .await
            .map_err(|e| SpecError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Discover labeled specs in the cluster.
    ///
    /// The `kind=` requirement of the selector is expanded to both the
    /// current and the legacy label key; any other requirements are kept
    /// and ANDed with each expansion.
    async fn fetch_from_cluster(&self) -> Result<String, SpecError> {
        let client = self.client.as_ref().ok_or(SpecError::MissingClusterClient)?;
        let mut payloads = Vec::new();
        for selector in expand_selectors(&self.options.selector) {
            let found = client
                .find_spec_payloads(&selector, NESTED_SPEC_KEYS)
                .await?;
            payloads.extend(found);
        }
        Ok(payloads.join("\n---\n"))
    }

    // -- split + classify -------------------------------------------------

    async fn ingest(&self, raw: &str) -> Result<SpecSet, SpecError> {
        let rendered = if template::is_templated(raw) {
            template::render(raw, &self.values)?
        } else {
            raw.to_string()
        };

        let mut set = SpecSet::default();
        for document in split_documents(&rendered)? {
            self.classify(document, &mut set, 0).await?;
        }
        Ok(set)
    }

    /// Route one parsed document into the set.
    ///
    /// `depth` tracks nested-spec recursion (secret/configmap data keys);
    /// nesting is followed one level deep.
    async fn classify(
        &self,
        mut document: Value,
        set: &mut SpecSet,
        depth: usize,
    ) -> Result<(), SpecError> {
        let kind = match document.get("kind").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => {
                return self.skip_or_fail(SpecError::Parse {
                    reason: "document has no kind".to_string(),
                })
            }
        };

        match kind.as_str() {
            "Secret" | "ConfigMap" => {
                if depth >= MAX_NESTING {
                    debug!(kind = %kind, "ignoring nested cluster object beyond one level");
                    return Ok(());
                }
                for payload in nested_spec_payloads(&document, &kind) {
                    for nested in split_documents(&payload)? {
                        Box::pin(self.classify(nested, set, depth + 1)).await?;
                    }
                }
                Ok(())
            }
            "SupportBundle" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match from_value::<SupportBundleDoc>(document) {
                    Ok(doc) => {
                        set.support_bundles.push(doc);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "Preflight" | "HostPreflight" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match from_value::<PreflightDoc>(document) {
                    Ok(doc) => {
                        set.preflights.push(doc);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "Collector" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match spec_list::<CollectorSpec>(document, "collectors") {
                    Ok(entries) => {
                        set.collectors.extend(entries);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "HostCollector" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match spec_list::<HostCollectorSpec>(document, "collectors") {
                    Ok(entries) => {
                        set.host_collectors.extend(entries);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "RemoteCollector" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match spec_list::<RemoteCollectorSpec>(document, "collectors") {
                    Ok(entries) => {
                        set.remote_collectors.extend(entries);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "Analyzer" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match spec_list::<AnalyzerSpec>(document, "analyzers") {
                    Ok(entries) => {
                        set.analyzers.extend(entries);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "HostAnalyzer" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match spec_list::<HostAnalyzerSpec>(document, "analyzers") {
                    Ok(entries) => {
                        set.host_analyzers.extend(entries);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            "Redactor" => {
                if !self.upgraded(&mut document).await? {
                    return Ok(());
                }
                match spec_list::<RedactorEntry>(document, "redactors") {
                    Ok(entries) => {
                        set.redactors.extend(entries);
                        Ok(())
                    }
                    Err(e) => self.skip_or_fail(e),
                }
            }
            other => self.skip_or_fail(SpecError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }

    fn skip_or_fail(&self, error: SpecError) -> Result<(), SpecError> {
        if self.options.strict {
            Err(error)
        } else {
            warn!(error = %error, "skipping spec document");
            Ok(())
        }
    }

    // -- upgrade ----------------------------------------------------------

    /// Upgrade a document, applying skip-or-fail semantics.
    ///
    /// Returns false when the document was skipped (non-strict mode).
    /// Missing-client and reference-resolution failures are always fatal:
    /// the spec demands something the environment cannot provide.
    async fn upgraded(&self, document: &mut Value) -> Result<bool, SpecError> {
        match self.upgrade(document).await {
            Ok(()) => Ok(true),
            Err(
                e @ (SpecError::MissingClusterClient
                | SpecError::Reference { .. }
                | SpecError::Cluster(_)),
            ) => Err(e),
            Err(e) => self.skip_or_fail(e).map(|()| false),
        }
    }

    /// Convert a document to the canonical schema in place.
    ///
    /// Legacy documents only get their apiVersion rewritten; templated
    /// documents additionally have `valueFrom` references resolved to
    /// literals, which requires a cluster client.
    async fn upgrade(&self, document: &mut Value) -> Result<(), SpecError> {
        let api_version = document
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match api_version.as_str() {
            CANONICAL_VERSION => Ok(()),
            LEGACY_VERSION => {
                set_api_version(document, CANONICAL_VERSION);
                Ok(())
            }
            TEMPLATED_VERSION => {
                self.resolve_value_refs(document).await?;
                set_api_version(document, CANONICAL_VERSION);
                Ok(())
            }
            other => Err(SpecError::UnsupportedVersion {
                api_version: other.to_string(),
            }),
        }
    }

    /// Replace every `{valueFrom: {secretKeyRef|configMapKeyRef: …}}` node
    /// with its resolved literal value.
    async fn resolve_value_refs(&self, document: &mut Value) -> Result<(), SpecError> {
        let mut refs = Vec::new();
        collect_value_refs(document, &mut Vec::new(), &mut refs);
        if refs.is_empty() {
            return Ok(());
        }

        let client = self.client.as_ref().ok_or(SpecError::MissingClusterClient)?;
        for (path, reference) in refs {
            let literal = match &reference {
                ValueRef::Secret {
                    namespace,
                    name,
                    key,
                } => {
                    let data = client.read_secret(namespace, name).await?;
                    let bytes = data.get(key).ok_or_else(|| SpecError::Reference {
                        reference: format!("secret/{namespace}/{name}/{key}"),
                        reason: "data key not found".to_string(),
                    })?;
                    String::from_utf8(bytes.clone()).map_err(|_| SpecError::Reference {
                        reference: format!("secret/{namespace}/{name}/{key}"),
                        reason: "data is not valid UTF-8".to_string(),
                    })?
                }
                ValueRef::ConfigMap {
                    namespace,
                    name,
                    key,
                } => {
                    let data = client.read_configmap(namespace, name).await?;
                    data.get(key).cloned().ok_or_else(|| SpecError::Reference {
                        reference: format!("configmap/{namespace}/{name}/{key}"),
                        reason: "data key not found".to_string(),
                    })?
                }
            };
            if let Some(node) = node_at_path_mut(document, &path) {
                *node = Value::String(literal);
            }
        }
        Ok(())
    }

    // -- URI following ----------------------------------------------------

    /// Download and merge follow-up specs referenced by `spec.uri`.
    ///
    /// The `uri` field is cleared before fetching and a visited set keyed
    /// by the resolved URL guards against reference cycles. Network
    /// failures are reported and skipped; parse failures obey strict mode.
    async fn follow_uris(&mut self, set: &mut SpecSet) -> Result<(), SpecError> {
        loop {
            let uris = set.take_uris();
            if uris.is_empty() {
                return Ok(());
            }
            if self.options.no_uri {
                debug!("follow-up spec downloads disabled");
                return Ok(());
            }
            for uri in uris {
                if !self.visited_uris.insert(uri.clone()) {
                    continue;
                }
                let raw = match self.fetch_uri(&uri).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(uri = %uri, error = %e, "failed to fetch follow-up spec");
                        continue;
                    }
                };
                match self.ingest(&raw).await {
                    Ok(extra) => set.merge(extra),
                    Err(e) if self.options.strict => return Err(e),
                    Err(e) => warn!(uri = %uri, error = %e, "skipping follow-up spec"),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Split a multi-document YAML stream into parsed documents.
pub fn split_documents(raw: &str) -> Result<Vec<Value>, SpecError> {
    let mut documents = Vec::new();
    for deserializer in serde_yaml::Deserializer::from_str(raw) {
        let value = Value::deserialize(deserializer).map_err(SpecError::parse)?;
        if !matches!(value, Value::Null) {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Expand the `kind=` requirement to both supported label keys.
fn expand_selectors(selector: &[String]) -> Vec<Vec<String>> {
    let mut kind_value = None;
    let mut rest = Vec::new();
    for requirement in selector {
        match requirement.split_once('=') {
            Some(("kind", value)) => kind_value = Some(value.to_string()),
            _ => rest.push(requirement.clone()),
        }
    }

    match kind_value {
        Some(value) => [LABEL_KEY, LEGACY_LABEL_KEY]
            .iter()
            .map(|key| {
                let mut expanded = vec![format!("{key}={value}")];
                expanded.extend(rest.iter().cloned());
                expanded
            })
            .collect(),
        None => vec![rest],
    }
}

/// Extract recognized nested spec payloads from a Secret/ConfigMap object.
fn nested_spec_payloads(document: &Value, kind: &str) -> Vec<String> {
    let mut payloads = Vec::new();

    if let Some(Value::Mapping(data)) = document.get("data") {
        for key in NESTED_SPEC_KEYS {
            if let Some(Value::String(raw)) = data.get(*key) {
                if kind == "Secret" {
                    match base64::engine::general_purpose::STANDARD.decode(raw.trim()) {
                        Ok(bytes) => match String::from_utf8(bytes) {
                            Ok(text) => payloads.push(text),
                            Err(_) => warn!(key = %key, "nested secret spec is not UTF-8"),
                        },
                        Err(_) => warn!(key = %key, "nested secret spec is not base64"),
                    }
                } else {
                    payloads.push(raw.clone());
                }
            }
        }
    }

    // stringData carries plain text on both kinds.
    if let Some(Value::Mapping(data)) = document.get("stringData") {
        for key in NESTED_SPEC_KEYS {
            if let Some(Value::String(raw)) = data.get(*key) {
                payloads.push(raw.clone());
            }
        }
    }

    payloads
}

fn set_api_version(document: &mut Value, version: &str) {
    if let Value::Mapping(map) = document {
        map.insert(
            Value::String("apiVersion".to_string()),
            Value::String(version.to_string()),
        );
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, SpecError> {
    serde_yaml::from_value(value).map_err(SpecError::parse)
}

/// Deserialize `spec.<field>` of a standalone document as a list.
fn spec_list<T: serde::de::DeserializeOwned>(
    document: Value,
    field: &str,
) -> Result<Vec<T>, SpecError> {
    match document.get("spec").and_then(|spec| spec.get(field)) {
        Some(list) => serde_yaml::from_value(list.clone()).map_err(SpecError::parse),
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSeg {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ValueRef {
    Secret {
        namespace: String,
        name: String,
        key: String,
    },
    ConfigMap {
        namespace: String,
        name: String,
        key: String,
    },
}

/// Find every node shaped `{valueFrom: {secretKeyRef|configMapKeyRef: …}}`.
fn collect_value_refs(
    value: &Value,
    path: &mut Vec<PathSeg>,
    out: &mut Vec<(Vec<PathSeg>, ValueRef)>,
) {
    match value {
        Value::Mapping(map) => {
            if let Some(reference) = map.get("valueFrom").and_then(parse_value_ref) {
                out.push((path.clone(), reference));
                return;
            }
            for (key, child) in map {
                if let Value::String(key) = key {
                    path.push(PathSeg::Key(key.clone()));
                    collect_value_refs(child, path, out);
                    path.pop();
                }
            }
        }
        Value::Sequence(items) => {
            for (idx, child) in items.iter().enumerate() {
                path.push(PathSeg::Index(idx));
                collect_value_refs(child, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn parse_value_ref(value: &Value) -> Option<ValueRef> {
    let map = value.as_mapping()?;
    for (kind, constructor) in [
        ("secretKeyRef", true),
        ("configMapKeyRef", false),
    ] {
        if let Some(reference) = map.get(kind).and_then(Value::as_mapping) {
            let name = reference.get("name")?.as_str()?.to_string();
            let key = reference.get("key")?.as_str()?.to_string();
            let namespace = reference
                .get("namespace")
                .and_then(Value::as_str)
                .unwrap_or("default")
                .to_string();
            return Some(if constructor {
                ValueRef::Secret {
                    namespace,
                    name,
                    key,
                }
            } else {
                ValueRef::ConfigMap {
                    namespace,
                    name,
                    key,
                }
            });
        }
    }
    None
}

fn node_at_path_mut<'a>(root: &'a mut Value, path: &[PathSeg]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = match segment {
            PathSeg::Key(key) => current.as_mapping_mut()?.get_mut(key.as_str())?,
            PathSeg::Index(idx) => current.as_sequence_mut()?.get_mut(*idx)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stetho_cluster::fake::FakeCluster;

    const BUNDLE: &str = r"
apiVersion: stetho.dev/v1beta2
kind: SupportBundle
metadata:
  name: example
spec:
  collectors:
    - clusterInfo: {}
  analyzers:
    - clusterVersion:
        outcomes:
          - pass:
              when: '>= 1.20.0'
              message: supported
";

    fn loader(options: LoadOptions) -> SpecLoader {
        SpecLoader::new(options, None).unwrap()
    }

    fn loader_with(options: LoadOptions, cluster: FakeCluster) -> SpecLoader {
        SpecLoader::new(options, Some(Arc::new(cluster))).unwrap()
    }

    #[tokio::test]
    async fn canonical_spec_round_trips() {
        let mut l = loader(LoadOptions::default());
        let set = l
            .load(&[SpecSource::Inline(BUNDLE.to_string())])
            .await
            .unwrap();

        let serialized = serde_yaml::to_string(&set).unwrap();
        let reparsed: SpecSet = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(set, reparsed);

        assert_eq!(set.support_bundles.len(), 1);
        assert_eq!(set.all_collectors().len(), 1);
        assert_eq!(set.all_analyzers().len(), 1);
    }

    #[tokio::test]
    async fn loading_twice_is_additive() {
        let mut l = loader(LoadOptions::default());
        let source = SpecSource::Inline(BUNDLE.to_string());
        let once = l.load(&[source.clone()]).await.unwrap();
        let twice = l.load(&[source.clone(), source]).await.unwrap();
        assert_eq!(twice.support_bundles.len(), 2 * once.support_bundles.len());
        assert_eq!(twice.support_bundles[0], once.support_bundles[0]);
    }

    #[tokio::test]
    async fn legacy_api_version_is_upgraded() {
        let legacy = BUNDLE.replace("v1beta2", "v1beta1");
        let mut l = loader(LoadOptions::default());
        let set = l.load(&[SpecSource::Inline(legacy)]).await.unwrap();
        assert_eq!(set.support_bundles.len(), 1);
    }

    #[tokio::test]
    async fn unknown_kind_skips_by_default_and_fails_strict() {
        let raw = format!("{BUNDLE}---\napiVersion: v1\nkind: Widget\n");

        let mut l = loader(LoadOptions::default());
        let set = l
            .load(&[SpecSource::Inline(raw.clone())])
            .await
            .unwrap();
        assert_eq!(set.support_bundles.len(), 1);

        let mut strict = loader(LoadOptions {
            strict: true,
            ..LoadOptions::default()
        });
        let err = strict.load(&[SpecSource::Inline(raw)]).await.unwrap_err();
        assert!(matches!(err, SpecError::UnknownKind { .. }));
    }

    #[tokio::test]
    async fn secret_key_ref_resolves_against_cluster() {
        let templated = r"
apiVersion: stetho.dev/v1beta3
kind: SupportBundle
metadata:
  name: with-ref
spec:
  collectors:
    - data:
        name: static
        data:
          valueFrom:
            secretKeyRef:
              namespace: default
              name: creds
              key: token
";
        let cluster =
            FakeCluster::new("v1.27.0").with_secret("default", "creds", &[("token", b"s3cr3t")]);
        let mut l = loader_with(LoadOptions::default(), cluster);
        let set = l
            .load(&[SpecSource::Inline(templated.to_string())])
            .await
            .unwrap();

        let collectors = set.all_collectors();
        match &collectors[0] {
            CollectorSpec::Data(data) => assert_eq!(data.data, "s3cr3t"),
            other => panic!("unexpected collector {other:?}"),
        }
    }

    #[tokio::test]
    async fn secret_key_ref_without_client_is_a_spec_issue() {
        let templated = r"
apiVersion: stetho.dev/v1beta3
kind: SupportBundle
spec:
  collectors:
    - data:
        name: static
        data:
          valueFrom:
            secretKeyRef:
              name: creds
              key: token
";
        let mut l = loader(LoadOptions {
            strict: true,
            ..LoadOptions::default()
        });
        let err = l
            .load(&[SpecSource::Inline(templated.to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, SpecError::MissingClusterClient));
    }

    #[tokio::test]
    async fn nested_configmap_payloads_contribute_documents() {
        let wrapper = format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: holder\ndata:\n  support-bundle-spec: |\n{}",
            BUNDLE
                .lines()
                .map(|line| format!("    {line}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let mut l = loader(LoadOptions::default());
        let set = l.load(&[SpecSource::Inline(wrapper)]).await.unwrap();
        assert_eq!(set.support_bundles.len(), 1);
    }

    #[tokio::test]
    async fn cluster_discovery_expands_legacy_label_key() {
        let cluster = FakeCluster::new("v1.27.0").with_labeled_spec(
            "default",
            "old-style",
            &[(LEGACY_LABEL_KEY, "support-bundle")],
            &[("support-bundle-spec", BUNDLE)],
        );
        let mut l = loader_with(LoadOptions::default(), cluster);
        let set = l.load(&[SpecSource::Cluster]).await.unwrap();
        assert_eq!(set.support_bundles.len(), 1);
    }

    #[tokio::test]
    async fn secret_source_reads_one_or_all_keys() {
        let cluster = FakeCluster::new("v1.27.0").with_secret(
            "default",
            "specs",
            &[("support-bundle-spec", BUNDLE.as_bytes())],
        );
        let mut l = loader_with(LoadOptions::default(), cluster);

        let set = l
            .load(&[SpecSource::Secret {
                namespace: "default".to_string(),
                name: "specs".to_string(),
                key: Some("support-bundle-spec".to_string()),
            }])
            .await
            .unwrap();
        assert_eq!(set.support_bundles.len(), 1);

        let set = l
            .load(&[SpecSource::Secret {
                namespace: "default".to_string(),
                name: "specs".to_string(),
                key: None,
            }])
            .await
            .unwrap();
        assert_eq!(set.support_bundles.len(), 1);
    }

    #[tokio::test]
    async fn expand_selectors_covers_both_label_keys() {
        let expanded = expand_selectors(&[
            "kind=support-bundle".to_string(),
            "team=payments".to_string(),
        ]);
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].contains(&format!("{LABEL_KEY}=support-bundle")));
        assert!(expanded[1].contains(&format!("{LEGACY_LABEL_KEY}=support-bundle")));
        for selector in &expanded {
            assert!(selector.contains(&"team=payments".to_string()));
        }
    }

    #[tokio::test]
    async fn both_since_bounds_fail_validation() {
        let raw = r"
apiVersion: stetho.dev/v1beta2
kind: SupportBundle
spec:
  collectors:
    - logs:
        namespace: default
        limits:
          since: 24h
          sinceTime: '2026-01-01T00:00:00Z'
";
        let mut l = loader(LoadOptions::default());
        let err = l
            .load(&[SpecSource::Inline(raw.to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, SpecError::AmbiguousLogWindow { .. }));
    }
}
