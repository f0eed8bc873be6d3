//! Spec source grammar.
//!
//! A source argument is one of: a filesystem path, the stdin marker `-`,
//! an `http(s)://` URI, an `oci://` registry reference, a
//! `secret/<ns>/<name>[/<key>]` or `configmap/<ns>/<name>[/<key>]`
//! cluster reference, the pseudo-source `cluster` (label discovery), or
//! inline YAML.

use std::path::PathBuf;

use crate::error::SpecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// Raw YAML handed over directly.
    Inline(String),
    File(PathBuf),
    Stdin,
    Uri(String),
    Oci(String),
    /// `secret/<ns>/<name>[/<key>]`; a missing key reads every data key.
    Secret {
        namespace: String,
        name: String,
        key: Option<String>,
    },
    ConfigMap {
        namespace: String,
        name: String,
        key: Option<String>,
    },
    /// Discover labeled specs in the cluster.
    Cluster,
}

impl SpecSource {
    /// Parse a CLI source argument.
    pub fn parse(arg: &str) -> Result<Self, SpecError> {
        if arg == "-" {
            return Ok(Self::Stdin);
        }
        if arg == "cluster" {
            return Ok(Self::Cluster);
        }
        if arg.starts_with("http://") || arg.starts_with("https://") {
            return Ok(Self::Uri(arg.to_string()));
        }
        if arg.starts_with("oci://") {
            return Ok(Self::Oci(arg.to_string()));
        }
        if let Some(rest) = arg.strip_prefix("secret/") {
            let (namespace, name, key) = split_reference(arg, rest)?;
            return Ok(Self::Secret {
                namespace,
                name,
                key,
            });
        }
        if let Some(rest) = arg.strip_prefix("configmap/") {
            let (namespace, name, key) = split_reference(arg, rest)?;
            return Ok(Self::ConfigMap {
                namespace,
                name,
                key,
            });
        }

        let path = PathBuf::from(arg);
        if path.exists() {
            return Ok(Self::File(path));
        }

        // Multi-line text that names a kind is accepted as inline YAML.
        if arg.contains('\n') || arg.contains("kind:") {
            return Ok(Self::Inline(arg.to_string()));
        }

        Err(SpecError::UnknownSource {
            value: arg.to_string(),
        })
    }
}

/// Split `<ns>/<name>[/<key>]`; two segments read every data key, three
/// read a single key.
fn split_reference(
    original: &str,
    rest: &str,
) -> Result<(String, String, Option<String>), SpecError> {
    let segments: Vec<&str> = rest.split('/').collect();
    match segments.as_slice() {
        [ns, name] if !ns.is_empty() && !name.is_empty() => {
            Ok(((*ns).to_string(), (*name).to_string(), None))
        }
        [ns, name, key] if !ns.is_empty() && !name.is_empty() && !key.is_empty() => Ok((
            (*ns).to_string(),
            (*name).to_string(),
            Some((*key).to_string()),
        )),
        _ => Err(SpecError::UnknownSource {
            value: original.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_markers_and_uris() {
        assert_eq!(SpecSource::parse("-").unwrap(), SpecSource::Stdin);
        assert_eq!(SpecSource::parse("cluster").unwrap(), SpecSource::Cluster);
        assert_eq!(
            SpecSource::parse("https://example.com/spec.yaml").unwrap(),
            SpecSource::Uri("https://example.com/spec.yaml".to_string())
        );
        assert_eq!(
            SpecSource::parse("oci://registry.example.com/acme/bundle:1.2.0").unwrap(),
            SpecSource::Oci("oci://registry.example.com/acme/bundle:1.2.0".to_string())
        );
    }

    #[test]
    fn parses_cluster_references() {
        assert_eq!(
            SpecSource::parse("secret/default/bundle-spec").unwrap(),
            SpecSource::Secret {
                namespace: "default".to_string(),
                name: "bundle-spec".to_string(),
                key: None,
            }
        );
        assert_eq!(
            SpecSource::parse("configmap/kube-system/specs/preflight-spec").unwrap(),
            SpecSource::ConfigMap {
                namespace: "kube-system".to_string(),
                name: "specs".to_string(),
                key: Some("preflight-spec".to_string()),
            }
        );
        assert!(SpecSource::parse("secret/only-ns").is_err());
        assert!(SpecSource::parse("secret/a/b/c/d").is_err());
    }

    #[test]
    fn inline_yaml_is_recognized() {
        let source = SpecSource::parse("apiVersion: stetho.dev/v1beta2\nkind: SupportBundle")
            .unwrap();
        assert!(matches!(source, SpecSource::Inline(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SpecSource::parse("no-such-file.yaml").is_err());
    }
}
