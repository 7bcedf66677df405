//! Durable media storage
//!
//! [`MediaStore`] is the seam to whatever persists logged media. Stores hand
//! back a [`StoredEntry`] (path, digest, size) that payloads reference and that
//! reconstruction later resolves.

use crate::hash::ContentHash;
use crate::path::MediaPath;
use dashmap::DashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of one stored file
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredEntry {
    /// Location relative to the store root
    pub path: MediaPath,
    /// Content digest
    pub digest: ContentHash,
    /// Size in bytes
    pub size: u64,
}

/// Persistence backend for logged media
///
/// Implementations decide where bytes live; callers only see [`MediaPath`]s.
pub trait MediaStore: Send + Sync + Debug {
    /// Persist `bytes` at `path`, replacing any previous content
    ///
    /// # Errors
    /// Returns error if the backend cannot write
    fn put(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError>;

    /// Read back the bytes stored at `path`
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if nothing is stored there
    fn fetch(&self, path: &MediaPath) -> Result<Vec<u8>, StoreError>;

    /// Check whether `path` holds content
    fn contains(&self, path: &MediaPath) -> bool;

    /// Read back bytes and check them against an expected digest
    ///
    /// # Errors
    /// Returns [`StoreError::DigestMismatch`] if the content changed
    fn fetch_verified(
        &self,
        path: &MediaPath,
        expected: &ContentHash,
    ) -> Result<Vec<u8>, StoreError> {
        let bytes = self.fetch(path)?;
        let actual = ContentHash::compute(&bytes);
        if actual != *expected {
            return Err(StoreError::DigestMismatch {
                path: path.clone(),
                expected: *expected,
                actual,
            });
        }
        Ok(bytes)
    }
}

/// In-memory store, deduplicating by path
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<MediaPath, Arc<[u8]>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All stored paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<MediaPath> {
        let mut paths: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

impl MediaStore for MemoryStore {
    fn put(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError> {
        let digest = ContentHash::compute(bytes);
        let unchanged = self
            .entries
            .get(path)
            .is_some_and(|existing| digest.matches(&existing));
        if !unchanged {
            self.entries.insert(path.clone(), Arc::from(bytes));
        }
        Ok(StoredEntry {
            path: path.clone(),
            digest,
            size: bytes.len() as u64,
        })
    }

    fn fetch(&self, path: &MediaPath) -> Result<Vec<u8>, StoreError> {
        self.entries
            .get(path)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| StoreError::NotFound(path.clone()))
    }

    fn contains(&self, path: &MediaPath) -> bool {
        self.entries.contains_key(path)
    }
}

/// Store rooted at a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at `root` (created lazily on first write)
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MediaStore for DirStore {
    fn put(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError> {
        let target = path.to_fs_path(&self.root);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        std::fs::write(&target, bytes).map_err(|e| StoreError::io(&target, e))?;
        tracing::debug!("stored {} ({} bytes)", path, bytes.len());
        Ok(StoredEntry {
            path: path.clone(),
            digest: ContentHash::compute(bytes),
            size: bytes.len() as u64,
        })
    }

    fn fetch(&self, path: &MediaPath) -> Result<Vec<u8>, StoreError> {
        let target = path.to_fs_path(&self.root);
        match std::fs::read(&target) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.clone()))
            }
            Err(e) => Err(StoreError::io(&target, e)),
        }
    }

    fn contains(&self, path: &MediaPath) -> bool {
        path.to_fs_path(&self.root).is_file()
    }
}

/// Errors raised by media stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing stored at path
    #[error("no media stored at {0}")]
    NotFound(MediaPath),

    /// Stored content does not match its recorded digest
    #[error("digest mismatch at {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: MediaPath,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Filesystem failure
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> MediaPath {
        s.parse().unwrap()
    }

    #[test]
    fn memory_store_put_and_fetch() {
        let store = MemoryStore::new();
        let entry = store.put(&path("media/a.bin"), b"abc").unwrap();
        assert_eq!(entry.size, 3);
        assert_eq!(entry.digest, ContentHash::compute(b"abc"));
        assert_eq!(store.fetch(&path("media/a.bin")).unwrap(), b"abc");
        assert!(store.contains(&path("media/a.bin")));
    }

    #[test]
    fn memory_store_missing_path() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.fetch(&path("media/none")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn memory_store_same_content_is_deduplicated() {
        let store = MemoryStore::new();
        store.put(&path("media/a"), b"x").unwrap();
        store.put(&path("media/a"), b"x").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fetch_verified_detects_tampering() {
        let store = MemoryStore::new();
        let entry = store.put(&path("media/a"), b"original").unwrap();
        store.put(&path("media/a"), b"tampered").unwrap();
        let result = store.fetch_verified(&entry.path, &entry.digest);
        assert!(matches!(result, Err(StoreError::DigestMismatch { .. })));
    }

    #[test]
    fn dir_store_writes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        let p = path("media/images/x.png");
        store.put(&p, b"png").unwrap();
        assert!(dir.path().join("media/images/x.png").is_file());
        assert_eq!(store.fetch(&p).unwrap(), b"png");
        assert!(matches!(
            store.fetch(&path("media/images/y.png")),
            Err(StoreError::NotFound(_))
        ));
    }
}
