//! The built-in analyzer set.
//!
//! Every analyzer is the same small machine: read bundle files, walk the
//! outcome sequence in order, return the first outcome whose predicate
//! matches. Predicates without a symbol compare the analyzer's primary
//! value; aggregate symbols are analyzer-specific.

use regex::Regex;
use serde_json::Value;

use stetho_specs::types::{
    ClusterVersionAnalyze, HostResourceAnalyze, NodeResourcesAnalyze, Outcome, OutcomeBody,
    TextAnalyze,
};

use crate::error::AnalyzeError;
use crate::quantity::parse_quantity;
use crate::reader::BundleReader;
use crate::results::Verdict;
use crate::when::{compare_quantity, compare_versions, parse_when};

/// Walk outcomes in order; the first match wins and an absent predicate
/// is an unconditional default. An exhausted sequence fails closed.
pub(crate) fn select_outcome<F>(
    outcomes: &[Outcome],
    mut eval: F,
) -> Result<(Verdict, OutcomeBody), AnalyzeError>
where
    F: FnMut(&str) -> Result<bool, AnalyzeError>,
{
    for outcome in outcomes {
        let (verdict, body) = match outcome {
            Outcome::Pass(body) => (Verdict::Pass, body),
            Outcome::Warn(body) => (Verdict::Warn, body),
            Outcome::Fail(body) => (Verdict::Fail, body),
        };
        match &body.when {
            None => return Ok((verdict, body.clone())),
            Some(when) => {
                if eval(when)? {
                    return Ok((verdict, body.clone()));
                }
            }
        }
    }
    Ok((
        Verdict::Fail,
        OutcomeBody {
            when: None,
            message: Some("no outcome matched".to_string()),
            uri: None,
        },
    ))
}

pub fn cluster_version(
    spec: &ClusterVersionAnalyze,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    let file = reader.get_json("cluster-info/cluster_version.json")?;
    let actual = file
        .get("string")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalyzeError::Parse {
            path: "cluster-info/cluster_version.json".to_string(),
            reason: "missing version string".to_string(),
        })?
        .to_string();

    select_outcome(&spec.outcomes, |when| {
        let expr = parse_when(when)?;
        compare_versions(&actual, expr.op, &expr.value)
    })
}

pub fn node_resources(
    spec: &NodeResourcesAnalyze,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    let list = reader.get_json("cluster-resources/nodes.json")?;
    let nodes: Vec<Value> = list
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    select_outcome(&spec.outcomes, |when| {
        let expr = parse_when(when)?;
        let symbol = expr.symbol.as_deref().ok_or_else(|| AnalyzeError::InvalidWhen {
            expr: when.to_string(),
            reason: "node-resources predicates need an aggregate symbol".to_string(),
        })?;
        let actual = aggregate(symbol, &nodes).ok_or_else(|| AnalyzeError::InvalidWhen {
            expr: when.to_string(),
            reason: format!("unknown aggregate {symbol:?}"),
        })?;
        compare_quantity(actual, expr.op, &expr.value)
    })
}

/// Evaluate `count()`, `sum(field)`, `min(field)` or `max(field)`.
fn aggregate(symbol: &str, nodes: &[Value]) -> Option<f64> {
    if symbol == "count()" || symbol == "count" {
        return Some(nodes.len() as f64);
    }
    let (func, field) = symbol.strip_suffix(')')?.split_once('(')?;
    let values: Vec<f64> = nodes.iter().filter_map(|n| node_field(n, field)).collect();
    if values.is_empty() {
        return Some(0.0);
    }
    match func {
        "sum" => Some(values.iter().sum()),
        "min" => values.iter().copied().reduce(f64::min),
        "max" => values.iter().copied().reduce(f64::max),
        _ => None,
    }
}

fn node_field(node: &Value, field: &str) -> Option<f64> {
    let (section, key) = match field {
        "cpuCapacity" => ("capacity", "cpu"),
        "memoryCapacity" => ("capacity", "memory"),
        "cpuAllocatable" => ("allocatable", "cpu"),
        "memoryAllocatable" => ("allocatable", "memory"),
        _ => return None,
    };
    let raw = node.get("status")?.get(section)?.get(key)?;
    match raw {
        Value::String(text) => parse_quantity(text).ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub fn text_analyze(
    spec: &TextAnalyze,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    let files = reader.glob(&spec.file_name)?;

    let matched = match &spec.regex {
        Some(pattern) => {
            let regex = Regex::new(pattern).map_err(|e| AnalyzeError::InvalidWhen {
                expr: pattern.clone(),
                reason: e.to_string(),
            })?;
            files.values().any(|content| {
                std::str::from_utf8(content)
                    .map(|text| regex.is_match(text))
                    .unwrap_or(false)
            })
        }
        None => !files.is_empty(),
    };

    select_outcome(&spec.outcomes, |when| match when.trim() {
        "true" => Ok(matched),
        "false" => Ok(!matched),
        other => Err(AnalyzeError::InvalidWhen {
            expr: other.to_string(),
            reason: "text predicates are true or false".to_string(),
        }),
    })
}

/// Host CPU analyzer; the reader is scoped to one host subtree.
pub fn host_cpu(
    spec: &HostResourceAnalyze,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    let file = reader.get_json("system/cpu.json")?;
    let count = file
        .get("logicalCpuCount")
        .and_then(Value::as_f64)
        .ok_or_else(|| AnalyzeError::Parse {
            path: "system/cpu.json".to_string(),
            reason: "missing logicalCpuCount".to_string(),
        })?;

    select_outcome(&spec.outcomes, |when| {
        let expr = parse_when(when)?;
        compare_quantity(count, expr.op, &expr.value)
    })
}

/// Host memory analyzer over `system/memory.json` totals.
pub fn host_memory(
    spec: &HostResourceAnalyze,
    reader: &BundleReader,
) -> Result<(Verdict, OutcomeBody), AnalyzeError> {
    let file = reader.get_json("system/memory.json")?;
    let total = file
        .get("total")
        .and_then(Value::as_f64)
        .ok_or_else(|| AnalyzeError::Parse {
            path: "system/memory.json".to_string(),
            reason: "missing total".to_string(),
        })?;

    select_outcome(&spec.outcomes, |when| {
        let expr = parse_when(when)?;
        compare_quantity(total, expr.op, &expr.value)
    })
}
