//! Runtime configuration from the environment.
//!
//! No environment variable is required; each knob has a default. CLI
//! flags override nothing here; the two layers cover different concerns
//! (flags select behavior per invocation, env tunes infrastructure).

use std::time::Duration;

const HTTP_TIMEOUT_VAR: &str = "STETHO_HTTP_TIMEOUT_SECONDS";
const REMOTE_IMAGE_VAR: &str = "STETHO_REMOTE_IMAGE";
const REMOTE_NAMESPACE_VAR: &str = "STETHO_REMOTE_NAMESPACE";

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_REMOTE_IMAGE: &str = "ghcr.io/stetho-dev/stetho:latest";
const DEFAULT_REMOTE_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Deadline on every outbound HTTP call.
    pub http_timeout: Duration,
    /// Default image for remote collector workloads.
    pub remote_image: String,
    /// Default namespace remote collector pods are scheduled in.
    pub remote_namespace: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
            remote_image: DEFAULT_REMOTE_IMAGE.to_string(),
            remote_namespace: DEFAULT_REMOTE_NAMESPACE.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let http_timeout = lookup(HTTP_TIMEOUT_VAR)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);
        Self {
            http_timeout,
            remote_image: lookup(REMOTE_IMAGE_VAR).unwrap_or(defaults.remote_image),
            remote_namespace: lookup(REMOTE_NAMESPACE_VAR).unwrap_or(defaults.remote_namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let config = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.remote_namespace, "default");
    }

    #[test]
    fn environment_overrides_apply() {
        let config = RuntimeConfig::from_lookup(|name| match name {
            HTTP_TIMEOUT_VAR => Some("5".to_string()),
            REMOTE_IMAGE_VAR => Some("registry.example.com/collector:v2".to_string()),
            _ => None,
        });
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.remote_image, "registry.example.com/collector:v2");
        assert_eq!(config.remote_namespace, "default");
    }

    #[test]
    fn unparseable_timeout_falls_back() {
        let config = RuntimeConfig::from_lookup(|name| match name {
            HTTP_TIMEOUT_VAR => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }
}
