//! Asset Store - Component and Shell Sources
//!
//! Constructed once at startup and handed to whatever loads components.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component as PathPart, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Invalid asset path: {0}")]
    InvalidPath(String),

    #[error("Failed to read asset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub trait AssetStore: Send + Sync {
    /// Read the asset at a relative, `/`-separated path.
    fn read(&self, path: &str) -> Result<String, AssetError>;
}

/// Assets housed under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let rel = Path::new(path);
        let clean = rel.components().all(|part| matches!(part, PathPart::Normal(_) | PathPart::CurDir));
        if path.is_empty() || !clean {
            return Err(AssetError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetStore for DirAssetStore {
    fn read(&self, path: &str) -> Result<String, AssetError> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AssetError::NotFound(path.to_string()),
            _ => AssetError::Io { path: path.to_string(), source: e },
        })
    }
}

/// In-memory assets, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetStore {
    files: HashMap<String, String>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn with(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }
}

impl AssetStore for MemoryAssetStore {
    fn read(&self, path: &str) -> Result<String, AssetError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_store_reads_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("components")).unwrap();
        fs::write(dir.path().join("components/pad.js"), "var x = 1;").unwrap();

        let store = DirAssetStore::new(dir.path());
        assert_eq!(store.read("components/pad.js").unwrap(), "var x = 1;");
        assert!(matches!(
            store.read("components/missing.js"),
            Err(AssetError::NotFound(p)) if p == "components/missing.js"
        ));
    }

    #[test]
    fn test_dir_store_rejects_traversal() {
        let store = DirAssetStore::new("/srv/assets");
        assert!(matches!(store.read("../etc/passwd"), Err(AssetError::InvalidPath(_))));
        assert!(matches!(store.read("/etc/passwd"), Err(AssetError::InvalidPath(_))));
        assert!(matches!(store.read(""), Err(AssetError::InvalidPath(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryAssetStore::new().with("components/a.css", "body{}");
        assert_eq!(store.read("components/a.css").unwrap(), "body{}");
        assert!(matches!(store.read("components/b.css"), Err(AssetError::NotFound(_))));
    }
}
