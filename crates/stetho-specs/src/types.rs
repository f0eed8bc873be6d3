//! Canonical spec document types.
//!
//! Every supported input schema is normalized into the shapes defined here
//! (apiVersion `stetho.dev/v1beta2`). Collector, analyzer and redactor
//! entries are externally-tagged unions: a YAML list item is a single-key
//! map whose key selects the kind.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SpecError;

/// apiVersion group shared by every stetho document.
pub const API_GROUP: &str = "stetho.dev";

/// The canonical schema version documents are normalized to.
pub const CANONICAL_VERSION: &str = "stetho.dev/v1beta2";

/// Legacy schema accepted on input and rewritten during upgrade.
pub const LEGACY_VERSION: &str = "stetho.dev/v1beta1";

/// Templated schema: rendered, then value references are resolved.
pub const TEMPLATED_VERSION: &str = "stetho.dev/v1beta3";

/// Current discovery label key (`stetho.dev/kind=support-bundle`).
pub const LABEL_KEY: &str = "stetho.dev/kind";

/// Legacy discovery label key, still honored when listing cluster specs.
pub const LEGACY_LABEL_KEY: &str = "stetho.sh/kind";

/// Secret/ConfigMap data keys whose values are nested spec documents.
pub const NESTED_SPEC_KEYS: &[&str] =
    &["support-bundle-spec", "preflight-spec", "redactor-spec"];

/// Tri-valued boolean as it appears on the wire.
///
/// Accepts `true`/`false`, the strings `"true"`/`"false"` and `"1"`/`"0"`.
/// Anything else is a deserialization error, which the loader surfaces as a
/// spec issue. Serializes back as a plain bool, so normalized documents are
/// single-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flag(pub bool);

impl Flag {
    #[must_use]
    pub const fn as_bool(self) -> bool {
        self.0
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(Flag(b)),
            Raw::Text(s) => match s.as_str() {
                "true" | "1" => Ok(Flag(true)),
                "false" | "0" => Ok(Flag(false)),
                other => Err(D::Error::custom(format!(
                    "invalid boolean string {other:?} (expected true/false/1/0)"
                ))),
            },
        }
    }
}

/// Returns true when an optional exclude flag is set.
#[must_use]
pub fn flag_set(flag: Option<Flag>) -> bool {
    flag.map(Flag::as_bool).unwrap_or(false)
}

/// Document metadata: name plus free-form labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Collectors
// ---------------------------------------------------------------------------

/// A cluster-scoped collector entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectorSpec {
    ClusterInfo(ClusterInfoCollect),
    ClusterResources(ClusterResourcesCollect),
    Secret(SecretCollect),
    ConfigMap(ConfigMapCollect),
    Logs(LogsCollect),
    Data(DataCollect),
}

impl CollectorSpec {
    /// Stable human-readable identifier used in progress and status output.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::ClusterInfo(_) => "cluster-info".to_string(),
            Self::ClusterResources(_) => "cluster-resources".to_string(),
            Self::Secret(s) => format!("secret/{}/{}", s.namespace, s.name),
            Self::ConfigMap(c) => format!("configmap/{}/{}", c.namespace, c.name),
            Self::Logs(l) => l
                .name
                .clone()
                .unwrap_or_else(|| "logs".to_string()),
            Self::Data(d) => d.name.clone(),
        }
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        let exclude = match self {
            Self::ClusterInfo(c) => c.exclude,
            Self::ClusterResources(c) => c.exclude,
            Self::Secret(c) => c.exclude,
            Self::ConfigMap(c) => c.exclude,
            Self::Logs(c) => c.exclude,
            Self::Data(c) => c.exclude,
        };
        flag_set(exclude)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfoCollect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResourcesCollect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    /// Namespace allow-list; empty means every namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretCollect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    /// Empty string means all namespaces; the RBAC gate reports denials.
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Secret values are only collected when explicitly requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_value: Option<Flag>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapCollect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_value: Option<Flag>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsCollect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    /// Output directory under the bundle root; defaults to `logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: String,
    /// Pod label selector requirements, ANDed together.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selector: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<LogLimits>,
}

/// Bounds on log fetch volume. `since` and `since_time` are mutually
/// exclusive; the loader rejects specs carrying both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLimits {
    /// Relative window, e.g. `24h`, `30m`, `120s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Absolute RFC3339 lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCollect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_name: Option<String>,
    #[serde(default)]
    pub data: String,
}

// ---------------------------------------------------------------------------
// Host and remote collectors
// ---------------------------------------------------------------------------

/// A collector that runs in the invoking process and reads the host OS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostCollectorSpec {
    Cpu(HostProbe),
    Memory(HostProbe),
    #[serde(rename = "hostOS")]
    HostOs(HostProbe),
    Ipv4Interfaces(HostProbe),
}

impl HostCollectorSpec {
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Cpu(_) => "cpu",
            Self::Memory(_) => "memory",
            Self::HostOs(_) => "host-os",
            Self::Ipv4Interfaces(_) => "ipv4-interfaces",
        }
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        let probe = match self {
            Self::Cpu(p) | Self::Memory(p) | Self::HostOs(p) | Self::Ipv4Interfaces(p) => p,
        };
        flag_set(probe.exclude)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
}

/// Configuration shared by every remote collector: the ephemeral workload
/// image and placement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteShared {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
    /// Node label selector requirements; empty selects every node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_selector: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Per-node timeout, e.g. `60s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// A collector scheduled as a one-shot workload on each selected node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteCollectorSpec {
    Cpu(RemoteShared),
    Memory(RemoteShared),
}

impl RemoteCollectorSpec {
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Cpu(_) => "cpu",
            Self::Memory(_) => "memory",
        }
    }

    #[must_use]
    pub fn shared(&self) -> &RemoteShared {
        match self {
            Self::Cpu(s) | Self::Memory(s) => s,
        }
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        flag_set(self.shared().exclude)
    }
}

// ---------------------------------------------------------------------------
// Analyzers
// ---------------------------------------------------------------------------

/// One entry of an analyzer's outcome sequence.
///
/// Outcomes are evaluated in order; the first one whose `when` predicate
/// matches wins, and a missing predicate is an unconditional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Pass(OutcomeBody),
    Warn(OutcomeBody),
    Fail(OutcomeBody),
}

impl Outcome {
    #[must_use]
    pub fn body(&self) -> &OutcomeBody {
        match self {
            Self::Pass(b) | Self::Warn(b) | Self::Fail(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Fields common to every analyzer entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Flag>,
    /// A strict analyzer's fail result dominates the process exit code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<Flag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyzerSpec {
    ClusterVersion(ClusterVersionAnalyze),
    NodeResources(NodeResourcesAnalyze),
    TextAnalyze(TextAnalyze),
}

impl AnalyzerSpec {
    #[must_use]
    pub fn meta(&self) -> &AnalyzeMeta {
        match self {
            Self::ClusterVersion(a) => &a.meta,
            Self::NodeResources(a) => &a.meta,
            Self::TextAnalyze(a) => &a.meta,
        }
    }

    #[must_use]
    pub fn title(&self) -> String {
        if let Some(name) = &self.meta().check_name {
            return name.clone();
        }
        match self {
            Self::ClusterVersion(_) => "Cluster Version".to_string(),
            Self::NodeResources(_) => "Node Resources".to_string(),
            Self::TextAnalyze(_) => "Text Analyze".to_string(),
        }
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        flag_set(self.meta().exclude)
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        flag_set(self.meta().strict)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionAnalyze {
    #[serde(flatten)]
    pub meta: AnalyzeMeta,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResourcesAnalyze {
    #[serde(flatten)]
    pub meta: AnalyzeMeta,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalyze {
    #[serde(flatten)]
    pub meta: AnalyzeMeta,
    /// Glob over bundle logical paths.
    #[serde(default)]
    pub file_name: String,
    /// Pattern searched in each matching file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

/// Host analyzer entries evaluate against `host-collectors/…` subtrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostAnalyzerSpec {
    Cpu(HostResourceAnalyze),
    Memory(HostResourceAnalyze),
}

impl HostAnalyzerSpec {
    #[must_use]
    pub fn meta(&self) -> &AnalyzeMeta {
        match self {
            Self::Cpu(a) | Self::Memory(a) => &a.meta,
        }
    }

    #[must_use]
    pub fn title(&self) -> String {
        if let Some(name) = &self.meta().check_name {
            return name.clone();
        }
        match self {
            Self::Cpu(_) => "CPU Count".to_string(),
            Self::Memory(_) => "Memory".to_string(),
        }
    }

    #[must_use]
    pub fn is_excluded(&self) -> bool {
        flag_set(self.meta().exclude)
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        flag_set(self.meta().strict)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResourceAnalyze {
    #[serde(flatten)]
    pub meta: AnalyzeMeta,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

// ---------------------------------------------------------------------------
// Redactors
// ---------------------------------------------------------------------------

/// A single redactor document entry: scope plus ordered removal rules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_selector: Option<FileSelector>,
    #[serde(default)]
    pub removals: Removals,
}

/// File-glob scope for a redactor; both fields are unioned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl FileSelector {
    /// All configured globs, in declaration order.
    #[must_use]
    pub fn globs(&self) -> Vec<&str> {
        let mut globs = Vec::new();
        if let Some(file) = &self.file {
            globs.push(file.as_str());
        }
        globs.extend(self.files.iter().map(String::as_str));
        globs
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Removals {
    /// Literal values replaced wholesale.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex: Vec<RegexRemoval>,
    /// Dotted paths into YAML documents whose leaves are overwritten.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub yaml_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexRemoval {
    pub redactor: String,
    /// 1-based capture group kept in clear while the rest of the match is
    /// replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve: Option<usize>,
}

// ---------------------------------------------------------------------------
// Top-level documents
// ---------------------------------------------------------------------------

/// `kind: SupportBundle`: collectors, analyzers and redactors bundled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportBundleDoc {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: SupportBundleSpec,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportBundleSpec {
    /// Optional follow-up spec; cleared after the first resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Preserved through normalization; never dispatched by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_results_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_host_collectors_in_pod: Option<Flag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collectors: Vec<CollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_collectors: Vec<HostCollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_collectors: Vec<RemoteCollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyzers: Vec<AnalyzerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_analyzers: Vec<HostAnalyzerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redactors: Vec<RedactorEntry>,
}

/// `kind: Preflight`: collectors and analyzers, no redactors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightDoc {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: PreflightSpec,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collectors: Vec<CollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_collectors: Vec<HostCollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyzers: Vec<AnalyzerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_analyzers: Vec<HostAnalyzerSpec>,
}

/// The normalized bag of loaded documents.
///
/// `merge` is additive and order-preserving: loading the same documents
/// twice produces the same set twice over, and merging an empty set is the
/// identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub support_bundles: Vec<SupportBundleDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preflights: Vec<PreflightDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collectors: Vec<CollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_collectors: Vec<HostCollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_collectors: Vec<RemoteCollectorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyzers: Vec<AnalyzerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_analyzers: Vec<HostAnalyzerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redactors: Vec<RedactorEntry>,
}

impl SpecSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.support_bundles.is_empty()
            && self.preflights.is_empty()
            && self.collectors.is_empty()
            && self.host_collectors.is_empty()
            && self.remote_collectors.is_empty()
            && self.analyzers.is_empty()
            && self.host_analyzers.is_empty()
            && self.redactors.is_empty()
    }

    /// Append every document of `other`, preserving order.
    pub fn merge(&mut self, other: SpecSet) {
        self.support_bundles.extend(other.support_bundles);
        self.preflights.extend(other.preflights);
        self.collectors.extend(other.collectors);
        self.host_collectors.extend(other.host_collectors);
        self.remote_collectors.extend(other.remote_collectors);
        self.analyzers.extend(other.analyzers);
        self.host_analyzers.extend(other.host_analyzers);
        self.redactors.extend(other.redactors);
    }

    /// Flattened collector list: bundled specs first (in document order),
    /// then standalone collector documents.
    #[must_use]
    pub fn all_collectors(&self) -> Vec<CollectorSpec> {
        let mut out = Vec::new();
        for sb in &self.support_bundles {
            out.extend(sb.spec.collectors.iter().cloned());
        }
        for pf in &self.preflights {
            out.extend(pf.spec.collectors.iter().cloned());
        }
        out.extend(self.collectors.iter().cloned());
        out
    }

    #[must_use]
    pub fn all_host_collectors(&self) -> Vec<HostCollectorSpec> {
        let mut out = Vec::new();
        for sb in &self.support_bundles {
            out.extend(sb.spec.host_collectors.iter().cloned());
        }
        for pf in &self.preflights {
            out.extend(pf.spec.host_collectors.iter().cloned());
        }
        out.extend(self.host_collectors.iter().cloned());
        out
    }

    #[must_use]
    pub fn all_remote_collectors(&self) -> Vec<RemoteCollectorSpec> {
        let mut out = Vec::new();
        for sb in &self.support_bundles {
            out.extend(sb.spec.remote_collectors.iter().cloned());
        }
        out.extend(self.remote_collectors.iter().cloned());
        out
    }

    #[must_use]
    pub fn all_analyzers(&self) -> Vec<AnalyzerSpec> {
        let mut out = Vec::new();
        for sb in &self.support_bundles {
            out.extend(sb.spec.analyzers.iter().cloned());
        }
        for pf in &self.preflights {
            out.extend(pf.spec.analyzers.iter().cloned());
        }
        out.extend(self.analyzers.iter().cloned());
        out
    }

    #[must_use]
    pub fn all_host_analyzers(&self) -> Vec<HostAnalyzerSpec> {
        let mut out = Vec::new();
        for sb in &self.support_bundles {
            out.extend(sb.spec.host_analyzers.iter().cloned());
        }
        for pf in &self.preflights {
            out.extend(pf.spec.host_analyzers.iter().cloned());
        }
        out.extend(self.host_analyzers.iter().cloned());
        out
    }

    #[must_use]
    pub fn all_redactors(&self) -> Vec<RedactorEntry> {
        let mut out = Vec::new();
        for sb in &self.support_bundles {
            out.extend(sb.spec.redactors.iter().cloned());
        }
        out.extend(self.redactors.iter().cloned());
        out
    }

    /// Does any bundle schedule cluster-scoped collection?
    #[must_use]
    pub fn has_cluster_scope(&self) -> bool {
        !self.support_bundles.is_empty()
            || !self.preflights.is_empty()
            || !self.collectors.is_empty()
    }

    /// Take every pending `spec.uri`, clearing the field on the way out.
    ///
    /// Clearing before the follow-up download is what breaks reference
    /// cycles: a re-loaded primary can never contribute the same URI twice.
    pub fn take_uris(&mut self) -> Vec<String> {
        let mut uris = Vec::new();
        for sb in &mut self.support_bundles {
            if let Some(uri) = sb.spec.uri.take() {
                uris.push(uri);
            }
        }
        uris
    }

    /// The bundle name used for the archive root directory.
    #[must_use]
    pub fn bundle_name(&self) -> String {
        self.support_bundles
            .iter()
            .map(|sb| sb.metadata.name.as_str())
            .find(|name| !name.is_empty())
            .unwrap_or("support-bundle")
            .to_string()
    }

    /// Validate cross-field invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), SpecError> {
        for collector in self.all_collectors() {
            if let CollectorSpec::Logs(logs) = collector {
                if let Some(limits) = &logs.limits {
                    if limits.since.is_some() && limits.since_time.is_some() {
                        return Err(SpecError::AmbiguousLogWindow {
                            collector: logs
                                .name
                                .unwrap_or_else(|| "logs".to_string()),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
