//! Producer version manifest written to every bundle.

use serde::{Deserialize, Serialize};

use crate::error::CollectError;

pub const VERSION_PATH: &str = "version.yaml";

/// Bundle layout version; bumped when path conventions change.
const LAYOUT_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFile {
    pub api_version: String,
    pub kind: String,
    pub spec: VersionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSpec {
    pub version_number: String,
    pub layout: String,
}

/// Render the `version.yaml` payload for this build.
pub fn version_file_bytes() -> Result<Vec<u8>, CollectError> {
    let file = VersionFile {
        api_version: stetho_specs::types::CANONICAL_VERSION.to_string(),
        kind: "SupportBundle".to_string(),
        spec: VersionSpec {
            version_number: env!("CARGO_PKG_VERSION").to_string(),
            layout: LAYOUT_VERSION.to_string(),
        },
    };
    serde_yaml::to_string(&file)
        .map(String::into_bytes)
        .map_err(|e| CollectError::Archive {
            reason: format!("failed to render version.yaml: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_file_round_trips() {
        let bytes = version_file_bytes().unwrap();
        let parsed: VersionFile = serde_yaml::from_slice(&bytes).unwrap();
        assert_eq!(parsed.kind, "SupportBundle");
        assert_eq!(parsed.spec.version_number, env!("CARGO_PKG_VERSION"));
        assert_eq!(parsed.spec.layout, "1");
    }
}
