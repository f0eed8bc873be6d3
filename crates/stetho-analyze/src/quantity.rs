//! Kubernetes-style quantity parsing.
//!
//! Binary suffixes (`Ki`, `Mi`, `Gi`, …) are base-1024, SI suffixes
//! (`k`, `M`, `G`, …) base-1000, and `m` is milli (CPU quantities).

use crate::error::AnalyzeError;

/// Parse a quantity literal like `4`, `8Gi`, `512Mi`, `100m` or `1.5`.
pub fn parse_quantity(text: &str) -> Result<f64, AnalyzeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid(text, "empty quantity"));
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| invalid(text, "not a number"))?;

    let multiplier = match suffix {
        "" => 1.0,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0_f64.powi(4),
        "Pi" => 1024.0_f64.powi(5),
        "Ei" => 1024.0_f64.powi(6),
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "m" => 1e-3,
        other => return Err(invalid(text, &format!("unknown suffix {other:?}"))),
    };

    Ok(value * multiplier)
}

fn invalid(text: &str, reason: &str) -> AnalyzeError {
    AnalyzeError::InvalidWhen {
        expr: text.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_suffixes_are_base_1024() {
        assert_eq!(parse_quantity("8Gi").unwrap(), 8.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(parse_quantity("512Mi").unwrap(), 512.0 * 1024.0 * 1024.0);
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024.0);
    }

    #[test]
    fn si_and_milli_suffixes() {
        assert_eq!(parse_quantity("2k").unwrap(), 2000.0);
        assert_eq!(parse_quantity("100m").unwrap(), 0.1);
        assert_eq!(parse_quantity("4").unwrap(), 4.0);
        assert_eq!(parse_quantity("1.5").unwrap(), 1.5);
    }

    #[test]
    fn junk_is_rejected() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("Gi").is_err());
        assert!(parse_quantity("8Qi").is_err());
    }
}
