//! Read-only access to a finalized bundle tree.
//!
//! Analyzers are pure readers: two accessors, exact `get` and
//! prefix-or-glob `glob`, both over logical slash-separated paths. A
//! scoped reader confines a host analyzer to one node's subtree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::Glob;

use crate::error::AnalyzeError;

#[derive(Debug, Clone)]
pub struct BundleReader {
    root: PathBuf,
    prefix: Option<String>,
}

impl BundleReader {
    /// Read from a bundle working directory (the tree that holds
    /// `version.yaml` at its top).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: None,
        }
    }

    /// A reader confined to `prefix` within the same bundle.
    #[must_use]
    pub fn scoped(&self, prefix: &str) -> Self {
        let combined = match &self.prefix {
            Some(existing) => format!("{existing}/{prefix}"),
            None => prefix.to_string(),
        };
        Self {
            root: self.root.clone(),
            prefix: Some(combined),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.prefix {
            Some(prefix) => self.root.join(prefix).join(path),
            None => self.root.join(path),
        }
    }

    /// Exact-path read; a missing file is a `FileNotCollected` error.
    pub fn get(&self, path: &str) -> Result<Vec<u8>, AnalyzeError> {
        let target = self.resolve(path);
        match std::fs::read(&target) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AnalyzeError::FileNotCollected {
                    path: path.to_string(),
                })
            }
            Err(e) => Err(AnalyzeError::Io {
                path: target.display().to_string(),
                source: e,
            }),
        }
    }

    /// Parse a JSON file.
    pub fn get_json(&self, path: &str) -> Result<serde_json::Value, AnalyzeError> {
        let bytes = self.get(path)?;
        serde_json::from_slice(&bytes).map_err(|e| AnalyzeError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// All files whose logical path matches `pattern`: a glob when the
    /// pattern carries meta characters, a prefix match otherwise.
    pub fn glob(&self, pattern: &str) -> Result<BTreeMap<String, Vec<u8>>, AnalyzeError> {
        let matcher = if pattern.contains(['*', '?', '[']) {
            Some(
                Glob::new(pattern)
                    .map_err(|e| AnalyzeError::Glob {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })?
                    .compile_matcher(),
            )
        } else {
            None
        };

        let scope = match &self.prefix {
            Some(prefix) => self.root.join(prefix),
            None => self.root.clone(),
        };

        let mut files = BTreeMap::new();
        for entry in walkdir::WalkDir::new(&scope)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let Ok(relative) = entry.path().strip_prefix(&scope) else {
                continue;
            };
            let logical = logical_path(relative);
            let matched = match &matcher {
                Some(matcher) => matcher.is_match(&logical),
                None => logical.starts_with(pattern),
            };
            if matched {
                let bytes = std::fs::read(entry.path()).map_err(|e| AnalyzeError::Io {
                    path: entry.path().display().to_string(),
                    source: e,
                })?;
                files.insert(logical, bytes);
            }
        }
        Ok(files)
    }

    /// Does a directory exist at this logical path?
    #[must_use]
    pub fn dir_exists(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }
}

fn logical_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> (tempfile::TempDir, BundleReader) {
        let dir = tempfile::tempdir().unwrap();
        let write = |rel: &str, content: &str| {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        };
        write("cluster-info/cluster_version.json", r#"{"string":"v1.27.0"}"#);
        write("pods/logs/default/web/nginx.log", "GET / 200");
        write("pods/logs/default/api/api.log", "ready");
        write("host-collectors/node-a/system/cpu.json", r#"{"logicalCpuCount":2}"#);
        let reader = BundleReader::new(dir.path());
        (dir, reader)
    }

    #[test]
    fn get_reads_exact_paths() {
        let (_dir, reader) = bundle();
        assert!(reader.get("cluster-info/cluster_version.json").is_ok());
        assert!(matches!(
            reader.get("cluster-info/missing.json"),
            Err(AnalyzeError::FileNotCollected { .. })
        ));
    }

    #[test]
    fn glob_matches_patterns_and_prefixes() {
        let (_dir, reader) = bundle();

        let by_glob = reader.glob("pods/logs/*/*/*.log").unwrap();
        assert_eq!(by_glob.len(), 2);

        let by_prefix = reader.glob("pods/logs/default/web").unwrap();
        assert_eq!(by_prefix.len(), 1);
        assert!(by_prefix.contains_key("pods/logs/default/web/nginx.log"));
    }

    #[test]
    fn scoped_reader_confines_access() {
        let (_dir, reader) = bundle();
        let node = reader.scoped("host-collectors/node-a");
        let parsed = node.get_json("system/cpu.json").unwrap();
        assert_eq!(parsed["logicalCpuCount"], 2);
        assert!(node.get("cluster-info/cluster_version.json").is_err());
        assert!(reader.dir_exists("host-collectors/node-a"));
        assert!(!reader.dir_exists("host-collectors/node-b"));
    }
}
