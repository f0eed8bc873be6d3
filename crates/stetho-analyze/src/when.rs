//! The `when` predicate grammar.
//!
//! A predicate is `[symbol] <op> <value>`: comparison operators
//! `< <= == != >= >`, version literals compared semantically, numeric
//! literals with quantity suffixes, and analyzer-specific aggregate
//! symbols like `count()` or `sum(cpuCapacity)`.

use std::cmp::Ordering;

use crate::error::AnalyzeError;
use crate::quantity::parse_quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CompareOp {
    /// Does `ordering` (actual vs expected) satisfy this operator?
    #[must_use]
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
        }
    }
}

/// A parsed predicate: optional leading symbol, operator, value literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhenExpr {
    pub symbol: Option<String>,
    pub op: CompareOp,
    pub value: String,
}

/// Split `[symbol] <op> <value>` on the first operator occurrence.
pub fn parse_when(expr: &str) -> Result<WhenExpr, AnalyzeError> {
    // Two-character operators first so `<=` is not read as `<` + `=`.
    const OPS: &[(&str, CompareOp)] = &[
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("=", CompareOp::Eq),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];

    let trimmed = expr.trim();
    for (token, op) in OPS {
        if let Some(idx) = trimmed.find(token) {
            let symbol = trimmed[..idx].trim();
            let value = trimmed[idx + token.len()..].trim();
            if value.is_empty() {
                return Err(AnalyzeError::InvalidWhen {
                    expr: expr.to_string(),
                    reason: "missing comparison value".to_string(),
                });
            }
            return Ok(WhenExpr {
                symbol: if symbol.is_empty() {
                    None
                } else {
                    Some(symbol.to_string())
                },
                op: *op,
                value: value.to_string(),
            });
        }
    }

    Err(AnalyzeError::InvalidWhen {
        expr: expr.to_string(),
        reason: "no comparison operator".to_string(),
    })
}

/// Compare two version literals semantically (major.minor.patch).
///
/// Accepts the forms clusters actually report: a leading `v`, missing
/// minor/patch components, and build metadata like `1.27.3+k3s1`.
pub fn compare_versions(actual: &str, op: CompareOp, expected: &str) -> Result<bool, AnalyzeError> {
    let actual = lenient_version(actual)?;
    let expected = lenient_version(expected)?;
    Ok(op.matches(actual.cmp(&expected)))
}

fn lenient_version(text: &str) -> Result<semver::Version, AnalyzeError> {
    let cleaned = text.trim().trim_start_matches('v');
    let mut parts = [0_u64; 3];
    for (idx, component) in cleaned.split('.').take(3).enumerate() {
        let digits: String = component
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        parts[idx] = digits.parse().map_err(|_| AnalyzeError::InvalidWhen {
            expr: text.to_string(),
            reason: "not a version literal".to_string(),
        })?;
    }
    Ok(semver::Version::new(parts[0], parts[1], parts[2]))
}

/// Compare a numeric actual against a quantity literal.
pub fn compare_quantity(actual: f64, op: CompareOp, expected: &str) -> Result<bool, AnalyzeError> {
    let expected = parse_quantity(expected)?;
    let ordering = actual
        .partial_cmp(&expected)
        .unwrap_or(Ordering::Equal);
    Ok(op.matches(ordering))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_symbol_predicates() {
        let bare = parse_when(">= 1.22.0").unwrap();
        assert_eq!(bare.symbol, None);
        assert_eq!(bare.op, CompareOp::Ge);
        assert_eq!(bare.value, "1.22.0");

        let agg = parse_when("sum(cpuCapacity) < 4").unwrap();
        assert_eq!(agg.symbol.as_deref(), Some("sum(cpuCapacity)"));
        assert_eq!(agg.op, CompareOp::Lt);
        assert_eq!(agg.value, "4");

        let le = parse_when("count() <= 3").unwrap();
        assert_eq!(le.op, CompareOp::Le);
    }

    #[test]
    fn rejects_operatorless_expressions() {
        assert!(parse_when("1.22.0").is_err());
        assert!(parse_when("count() <").is_err());
    }

    #[test]
    fn versions_compare_semantically_not_lexically() {
        // Lexically "1.9.0" > "1.22.0"; semantically it is older.
        assert!(compare_versions("1.22.0", CompareOp::Gt, "1.9.0").unwrap());
        assert!(compare_versions("v1.27.0", CompareOp::Ge, "1.20.0").unwrap());
        assert!(compare_versions("1.27.3+k3s1", CompareOp::Ge, "1.27.0").unwrap());
        assert!(!compare_versions("1.19.5", CompareOp::Ge, "1.20.0").unwrap());
        assert!(compare_versions("1.27", CompareOp::Eq, "1.27.0").unwrap());
    }

    #[test]
    fn quantities_compare_with_suffixes() {
        let eight_gib = 8.0 * 1024.0 * 1024.0 * 1024.0;
        assert!(compare_quantity(eight_gib, CompareOp::Ge, "8Gi").unwrap());
        assert!(compare_quantity(eight_gib - 1.0, CompareOp::Lt, "8Gi").unwrap());
        assert!(compare_quantity(4.0, CompareOp::Ne, "5").unwrap());
    }
}
