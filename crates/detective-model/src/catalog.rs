//! Project catalog: the set of tracked project identifiers.
//!
//! The catalog is loaded from a JSON array of slugs (`repos.json`). It is
//! read-mostly process state with explicit reload semantics:
//!
//! - `MetricCatalog` is immutable; every reload produces a new snapshot with a
//!   higher `version`.
//! - `CatalogHandle::snapshot()` hands out an `Arc` so the resolver never holds
//!   a lock while it works.
//! - `CatalogHandle::refresh()` compares the source file's modification time
//!   and swaps the snapshot only when it changed. A missing or unreadable file
//!   keeps the last good snapshot (or an empty one on first load).

use crate::ProjectId;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog {path} is not a JSON array of project ids: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable, versioned snapshot of known projects.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    version: u64,
    projects: Vec<ProjectId>,
}

impl MetricCatalog {
    /// Build a snapshot from raw ids. Blank and duplicate ids are dropped;
    /// projects are kept in sorted order so resolution is deterministic.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let projects: BTreeSet<ProjectId> = ids
            .into_iter()
            .map(|s| ProjectId::new(s.as_ref()))
            .filter(|p| !p.as_str().is_empty())
            .collect();
        Self {
            version: 0,
            projects: projects.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let ids: Vec<String> = serde_json::from_str(text)?;
        Ok(Self::new(ids))
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn projects(&self) -> &[ProjectId] {
        &self.projects
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.projects.binary_search(id).is_ok()
    }

    /// Case-insensitive lookup of a canonical id.
    pub fn find_ignore_case(&self, text: &str) -> Option<&ProjectId> {
        let needle = text.trim();
        self.projects
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(needle))
    }
}

struct CatalogSource {
    path: PathBuf,
    last_modified: Mutex<Option<SystemTime>>,
}

/// Process-wide holder of the current catalog snapshot.
pub struct CatalogHandle {
    current: RwLock<Arc<MetricCatalog>>,
    source: Option<CatalogSource>,
}

impl CatalogHandle {
    /// A handle over a fixed snapshot (no backing file).
    pub fn fixed(catalog: MetricCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog.with_version(1))),
            source: None,
        }
    }

    /// A handle backed by a JSON file. A missing or malformed file yields an
    /// empty catalog so resolution fails gracefully until it appears.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let handle = Self {
            current: RwLock::new(Arc::new(MetricCatalog::empty())),
            source: Some(CatalogSource {
                path: path.into(),
                last_modified: Mutex::new(None),
            }),
        };
        handle.refresh();
        handle
    }

    pub fn snapshot(&self) -> Arc<MetricCatalog> {
        self.current.read().clone()
    }

    /// Replace the snapshot. The new snapshot's version is one above the old.
    pub fn swap(&self, catalog: MetricCatalog) -> Arc<MetricCatalog> {
        let mut guard = self.current.write();
        let next = Arc::new(catalog.with_version(guard.version() + 1));
        *guard = next.clone();
        next
    }

    /// Reload from the backing file if its modification time changed.
    ///
    /// Returns `true` when a new snapshot was installed.
    pub fn refresh(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };

        let modified = match std::fs::metadata(&source.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(
                    path = %source.path.display(),
                    error = %err,
                    "catalog source unavailable; keeping current snapshot"
                );
                return false;
            }
        };

        {
            let last = source.last_modified.lock();
            if *last == Some(modified) {
                return false;
            }
        }

        match MetricCatalog::load(&source.path) {
            Ok(catalog) => {
                let installed = self.swap(catalog);
                *source.last_modified.lock() = Some(modified);
                tracing::info!(
                    path = %source.path.display(),
                    version = installed.version(),
                    projects = installed.len(),
                    "catalog loaded"
                );
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "catalog reload failed; keeping current snapshot");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn new_dedupes_and_sorts() {
        let c = MetricCatalog::new(["vuejs/core", "facebook/react", "vuejs/core", "  "]);
        let ids: Vec<&str> = c.projects().iter().map(|p| p.as_str()).collect();
        assert_eq!(ids, vec!["facebook/react", "vuejs/core"]);
        assert!(c.contains(&ProjectId::new("vuejs/core")));
        assert_eq!(
            c.find_ignore_case("VueJS/Core").map(|p| p.as_str()),
            Some("vuejs/core")
        );
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let dir = tempdir().unwrap();
        let handle = CatalogHandle::from_file(dir.path().join("repos.json"));
        assert!(handle.snapshot().is_empty());
    }

    #[test]
    fn refresh_swaps_snapshot_when_file_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repos.json");
        std::fs::write(&path, r#"["vuejs/core"]"#).unwrap();

        let handle = CatalogHandle::from_file(&path);
        let first = handle.snapshot();
        assert_eq!(first.len(), 1);

        // Unchanged file: no reload.
        assert!(!handle.refresh());

        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(br#"["vuejs/core", "facebook/react"]"#).unwrap();
        f.sync_all().unwrap();
        drop(f);
        // Force a distinct mtime even on coarse-grained filesystems.
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(handle.refresh());
        let second = handle.snapshot();
        assert_eq!(second.len(), 2);
        assert!(second.version() > first.version());
        // The old snapshot is untouched.
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn malformed_reload_keeps_last_good_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repos.json");
        std::fs::write(&path, r#"["vuejs/core"]"#).unwrap();
        let handle = CatalogHandle::from_file(&path);

        std::fs::write(&path, "not json").unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(!handle.refresh());
        assert_eq!(handle.snapshot().len(), 1);
    }
}
