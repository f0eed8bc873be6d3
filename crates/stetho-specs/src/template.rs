//! Rendering for templated (v1beta3) specs.
//!
//! A single renderer handles all templated input: handlebars in strict
//! mode, so a reference to an undefined nested key fails rendering instead
//! of silently producing an empty document. Values files merge in order
//! and `--set key=value` dotted-path overrides apply last.

use handlebars::Handlebars;
use serde_json::{Map, Value};

use crate::error::SpecError;
use crate::types::TEMPLATED_VERSION;

/// Release identity exposed to templates.
const RELEASE_NAME: &str = "stetho";
const RELEASE_NAMESPACE: &str = "default";

/// Does this raw blob need rendering before the YAML split?
#[must_use]
pub fn is_templated(raw: &str) -> bool {
    raw.contains(TEMPLATED_VERSION) && raw.contains("{{")
}

/// Render a templated blob against merged values.
pub fn render(raw: &str, values: &Value) -> Result<String, SpecError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);

    let context = serde_json::json!({
        "Values": values,
        "Release": {
            "Name": RELEASE_NAME,
            "Namespace": RELEASE_NAMESPACE,
        },
    });

    registry
        .render_template(raw, &context)
        .map_err(|e| SpecError::Template {
            reason: e.to_string(),
        })
}

/// Merge values documents in order, later documents winning per key, then
/// apply `--set` overrides.
pub fn merge_values(documents: &[Value], set_overrides: &[String]) -> Result<Value, SpecError> {
    let mut merged = Value::Object(Map::new());
    for doc in documents {
        deep_merge(&mut merged, doc);
    }
    for entry in set_overrides {
        let (path, raw_value) = entry.split_once('=').ok_or_else(|| SpecError::Template {
            reason: format!("--set entry {entry:?} is not key=value"),
        })?;
        set_path(&mut merged, path, parse_scalar(raw_value))?;
    }
    Ok(merged)
}

/// Parse a YAML values file into a JSON value tree.
pub fn parse_values_file(path: &std::path::Path) -> Result<Value, SpecError> {
    let text = std::fs::read_to_string(path).map_err(|e| SpecError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&text).map_err(SpecError::parse)
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Walk a dotted path, creating intermediate objects, and set the leaf.
fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), SpecError> {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (idx, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(SpecError::Template {
                reason: format!("--set path {path:?} has an empty segment"),
            });
        }
        let map = match current {
            Value::Object(map) => map,
            other => {
                *other = Value::Object(Map::new());
                match other {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                }
            }
        };
        if idx == segments.len() - 1 {
            map.insert((*segment).to_string(), value);
            return Ok(());
        }
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

fn parse_scalar(raw: &str) -> Value {
    if raw == "true" {
        return Value::Bool(true);
    }
    if raw == "false" {
        return Value::Bool(false);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_templated_blobs() {
        assert!(is_templated(
            "apiVersion: stetho.dev/v1beta3\nkind: SupportBundle\nname: {{ .x }}"
        ));
        assert!(!is_templated("apiVersion: stetho.dev/v1beta2\nkind: SupportBundle"));
    }

    #[test]
    fn values_merge_in_order_with_set_last() {
        let base: Value = serde_yaml::from_str("replicas: 1\nimage:\n  tag: v1").unwrap();
        let overlay: Value = serde_yaml::from_str("image:\n  tag: v2").unwrap();
        let merged = merge_values(
            &[base, overlay],
            &["image.pullPolicy=Always".to_string(), "replicas=3".to_string()],
        )
        .unwrap();

        assert_eq!(merged["replicas"], 3);
        assert_eq!(merged["image"]["tag"], "v2");
        assert_eq!(merged["image"]["pullPolicy"], "Always");
    }

    #[test]
    fn renders_values_and_release_name() {
        let values = serde_json::json!({"namespace": "apps"});
        let out = render(
            "apiVersion: stetho.dev/v1beta3\nnamespace: {{Values.namespace}}\nrelease: {{Release.Name}}",
            &values,
        )
        .unwrap();
        assert!(out.contains("namespace: apps"));
        assert!(out.contains("release: stetho"));
    }

    #[test]
    fn undefined_nested_key_is_rejected() {
        let values = serde_json::json!({});
        let err = render("x: {{Values.missing.deeper}}", &values).unwrap_err();
        assert!(matches!(err, SpecError::Template { .. }));
    }

    #[test]
    fn guarded_conditional_renders_empty() {
        let values = serde_json::json!({"flags": {"verbose": false}});
        let out = render(
            "{{#if Values.flags.verbose}}debug: true{{/if}}",
            &values,
        )
        .unwrap();
        assert_eq!(out, "");
    }
}
