//! Evidence collection for stetho: the bundle store, the collector set,
//! and the scheduler that runs them.

pub mod bundle;
pub mod cluster_info;
pub mod cluster_resources;
pub mod collector;
pub mod error;
pub mod host;
pub mod logs;
pub mod objects;
pub mod progress;
pub mod remote;
pub mod scheduler;
pub mod version;

pub use bundle::{unpack_archive, BundleStore};
pub use collector::{CollectContext, CollectedFiles, Collector};
pub use error::CollectError;
pub use progress::{channel, CollectorPhase, ProgressEvent, ProgressReceiver, ProgressSender};
pub use scheduler::{build_plan, run, RunSummary, ScheduleOptions};

/// Parse a relative duration like `24h`, `30m`, `45s` or plain seconds.
pub(crate) fn parse_duration_seconds(text: &str) -> Result<u64, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty duration".to_string());
    }
    let (number, multiplier) = match trimmed.chars().last() {
        Some('s') => (&trimmed[..trimmed.len() - 1], 1),
        Some('m') => (&trimmed[..trimmed.len() - 1], 60),
        Some('h') => (&trimmed[..trimmed.len() - 1], 3600),
        Some(c) if c.is_ascii_digit() => (trimmed, 1),
        Some(c) => return Err(format!("unsupported duration suffix {c:?} in {text:?}")),
        None => return Err("empty duration".to_string()),
    };
    number
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| format!("invalid duration {text:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_with_and_without_suffix() {
        assert_eq!(parse_duration_seconds("45s").unwrap(), 45);
        assert_eq!(parse_duration_seconds("30m").unwrap(), 1800);
        assert_eq!(parse_duration_seconds("24h").unwrap(), 86400);
        assert_eq!(parse_duration_seconds("90").unwrap(), 90);
        assert!(parse_duration_seconds("soon").is_err());
        assert!(parse_duration_seconds("").is_err());
        assert!(parse_duration_seconds("h").is_err());
    }
}
