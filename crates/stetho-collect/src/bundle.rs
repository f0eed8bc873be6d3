//! Write-once bundle store and archive serialization.
//!
//! The store owns a working directory rooted at `<workdir>/<name>`. Every
//! emit runs the redaction engine before bytes reach disk, so raw secrets
//! are never persisted in clear form, even transiently. Duplicate emits
//! are rejected; an interrupted run leaves the directory intact for
//! debugging.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use stetho_redact::{RedactionEngine, RedactionReport};

use crate::error::CollectError;

/// Logical path of the redaction count report inside the bundle.
pub const REDACTION_REPORT_PATH: &str = "static-data/redaction-report.json";

pub struct BundleStore {
    root: PathBuf,
    name: String,
    redaction: RedactionEngine,
    emitted: BTreeSet<String>,
    report: RedactionReport,
    warnings: Vec<String>,
}

impl BundleStore {
    /// Create the working tree at `<workdir>/<name>`.
    pub fn create(
        workdir: &Path,
        name: &str,
        redaction: RedactionEngine,
    ) -> Result<Self, CollectError> {
        let root = workdir.join(name);
        fs::create_dir_all(&root).map_err(|e| CollectError::io(root.display().to_string(), e))?;
        Ok(Self {
            root,
            name: name.to_string(),
            redaction,
            emitted: BTreeSet::new(),
            report: RedactionReport::default(),
            warnings: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Warnings accumulated from redaction (drained by the scheduler).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.emitted.contains(path)
    }

    /// Paths written so far, lexicographically sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.emitted.iter().cloned().collect()
    }

    /// Write one file through the redaction pipeline.
    pub fn emit(&mut self, path: &str, content: Vec<u8>) -> Result<(), CollectError> {
        validate_path(path)?;
        if self.emitted.contains(path) {
            return Err(CollectError::DuplicatePath {
                path: path.to_string(),
            });
        }

        let outcome = self.redaction.redact(path, content);
        self.report.record(&outcome);
        self.warnings.extend(outcome.warnings);

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CollectError::io(parent.display().to_string(), e))?;
        }
        fs::write(&target, &outcome.content)
            .map_err(|e| CollectError::io(target.display().to_string(), e))?;

        self.emitted.insert(path.to_string());
        debug!(path = %path, bytes = outcome.content.len(), "bundle file written");
        Ok(())
    }

    /// Serialize a value as pretty JSON and emit it.
    pub fn emit_json<T: serde::Serialize>(
        &mut self,
        path: &str,
        value: &T,
    ) -> Result<(), CollectError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| CollectError::Serialize {
            path: path.to_string(),
            source: e,
        })?;
        self.emit(path, bytes)
    }

    /// Read back a finalized file.
    pub fn open(&self, path: &str) -> Result<Vec<u8>, CollectError> {
        validate_path(path)?;
        let target = self.root.join(path);
        fs::read(&target).map_err(|e| CollectError::io(target.display().to_string(), e))
    }

    /// Persist the redaction count report into the bundle.
    pub fn write_redaction_report(&mut self) -> Result<(), CollectError> {
        let report = self.report.clone();
        self.emit_json(REDACTION_REPORT_PATH, &report)
    }

    /// Serialize the tree into a gzip-compressed tar at `output`.
    ///
    /// Entry order is lexicographic over logical paths, and every entry is
    /// rooted at the bundle name, so two runs over identical content
    /// produce structurally identical archives.
    pub fn archive(&self, output: &Path) -> Result<(), CollectError> {
        let file = fs::File::create(output)
            .map_err(|e| CollectError::io(output.display().to_string(), e))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();
        entries.sort();

        for entry in entries {
            let relative = entry
                .strip_prefix(&self.root)
                .map_err(|e| CollectError::Archive {
                    reason: e.to_string(),
                })?;
            let archive_path = Path::new(&self.name).join(relative);
            builder
                .append_path_with_name(&entry, &archive_path)
                .map_err(|e| CollectError::Archive {
                    reason: e.to_string(),
                })?;
        }

        let encoder = builder.into_inner().map_err(|e| CollectError::Archive {
            reason: e.to_string(),
        })?;
        let mut file = encoder.finish().map_err(|e| CollectError::Archive {
            reason: e.to_string(),
        })?;
        file.flush()
            .map_err(|e| CollectError::io(output.display().to_string(), e))?;
        Ok(())
    }
}

/// Unpack a gzip tar archive into `dest` and return the bundle root (the
/// single top-level directory named after the bundle).
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<PathBuf, CollectError> {
    let file = fs::File::open(archive)
        .map_err(|e| CollectError::io(archive.display().to_string(), e))?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(dest).map_err(|e| CollectError::Archive {
        reason: e.to_string(),
    })?;

    let mut dirs: Vec<PathBuf> = fs::read_dir(dest)
        .map_err(|e| CollectError::io(dest.display().to_string(), e))?
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .map(|e| e.path())
        .collect();
    dirs.sort();
    match dirs.as_slice() {
        [root] => Ok(root.clone()),
        _ => Err(CollectError::Archive {
            reason: "archive does not contain a single bundle root".to_string(),
        }),
    }
}

/// Logical paths are slash-separated, relative, and never escape the root.
fn validate_path(path: &str) -> Result<(), CollectError> {
    if path.is_empty() {
        return Err(CollectError::InvalidPath {
            path: path.to_string(),
            reason: "empty path".to_string(),
        });
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(CollectError::InvalidPath {
            path: path.to_string(),
            reason: "paths are relative and slash-separated".to_string(),
        });
    }
    if path.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Err(CollectError::InvalidPath {
            path: path.to_string(),
            reason: "path traversal is not allowed".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn store(dir: &Path) -> BundleStore {
        BundleStore::create(dir, "test-bundle", RedactionEngine::empty()).unwrap()
    }

    #[test]
    fn emit_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store
            .emit("cluster-info/cluster_version.json", b"{}".to_vec())
            .unwrap();
        assert_eq!(store.open("cluster-info/cluster_version.json").unwrap(), b"{}");
        assert!(store.contains("cluster-info/cluster_version.json"));
    }

    #[test]
    fn duplicate_emit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store.emit("a.txt", b"one".to_vec()).unwrap();
        let err = store.emit("a.txt", b"two".to_vec()).unwrap_err();
        assert!(matches!(err, CollectError::DuplicatePath { .. }));
        assert_eq!(store.open("a.txt").unwrap(), b"one");
    }

    #[test]
    fn hostile_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        for path in ["/etc/passwd", "../escape", "a/../../b", "a//b", ""] {
            let err = store.emit(path, b"x".to_vec()).unwrap_err();
            assert!(matches!(err, CollectError::InvalidPath { .. }), "{path}");
        }
    }

    #[test]
    fn redaction_runs_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BundleStore::create(
            dir.path(),
            "test-bundle",
            RedactionEngine::new(&[]).unwrap(),
        )
        .unwrap();
        store
            .emit("pods/logs/app.log", b"token Bearer abcdefghijklmnopqrstuvwx".to_vec())
            .unwrap();
        let content = store.open("pods/logs/app.log").unwrap();
        let text = String::from_utf8(content).unwrap();
        assert!(!text.contains("abcdefghijklmnopqrstuvwx"));
        assert!(text.contains(stetho_redact::HIDDEN));
    }

    #[test]
    fn archive_round_trips_through_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store.emit("cluster-info/version.json", b"{}".to_vec()).unwrap();
        let out = dir.path().join("bundle.tar.gz");
        store.archive(&out).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let root = unpack_archive(&out, dest.path()).unwrap();
        assert!(root.ends_with("test-bundle"));
        assert!(root.join("cluster-info/version.json").is_file());
    }

    #[test]
    fn archive_is_rooted_and_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());
        store.emit("b/second.txt", b"2".to_vec()).unwrap();
        store.emit("a/first.txt", b"1".to_vec()).unwrap();

        let out = dir.path().join("bundle.tar.gz");
        store.archive(&out).unwrap();

        let reader = GzDecoder::new(fs::File::open(&out).unwrap());
        let mut archive = tar::Archive::new(reader);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "test-bundle/a/first.txt".to_string(),
                "test-bundle/b/second.txt".to_string(),
            ]
        );
    }
}
