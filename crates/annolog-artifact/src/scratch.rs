//! Scratch persistence for derived media
//!
//! Pixels derived from transient inputs (arrays, tensors, figures) are written
//! once to a scratch directory so the record never has to re-derive them.

use crate::hash::ContentHash;
use crate::store::StoreError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Local file backing a media record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Location on the local filesystem
    pub path: PathBuf,
    /// Whether the file lives in scratch space owned by this process
    pub is_tmp: bool,
    /// Content digest
    pub digest: ContentHash,
    /// Size in bytes
    pub size: u64,
    /// Extension without the dot (lowercase)
    pub extension: String,
}

impl MediaFile {
    /// Describe an existing file, hashing its contents
    ///
    /// # Errors
    /// Returns error if the file cannot be read
    pub fn from_path(path: impl Into<PathBuf>, is_tmp: bool) -> Result<Self, StoreError> {
        let path = path.into();
        let (digest, size) =
            ContentHash::compute_file(&path).map_err(|e| StoreError::io(&path, e))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Ok(Self {
            path,
            is_tmp,
            digest,
            size,
            extension,
        })
    }

    /// Read the full contents
    ///
    /// # Errors
    /// Returns error if the file has gone away
    pub fn read(&self) -> Result<Vec<u8>, StoreError> {
        std::fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}

#[derive(Debug)]
enum ScratchRoot {
    Owned(TempDir),
    Shared(PathBuf),
}

/// Directory for intermediate media files
///
/// Either a private temporary directory removed on drop, or a caller-chosen
/// directory that outlives the process.
#[derive(Debug)]
pub struct ScratchDir {
    root: ScratchRoot,
}

impl ScratchDir {
    /// Create a private temporary directory
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn temporary() -> Result<Self, StoreError> {
        let dir = tempfile::Builder::new()
            .prefix("annolog-media-")
            .tempdir()
            .map_err(|e| StoreError::io(std::env::temp_dir(), e))?;
        Ok(Self {
            root: ScratchRoot::Owned(dir),
        })
    }

    /// Use an existing directory, creating it if needed
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(Self {
            root: ScratchRoot::Shared(path),
        })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        match &self.root {
            ScratchRoot::Owned(dir) => dir.path(),
            ScratchRoot::Shared(path) => path,
        }
    }

    /// Write `bytes` under a fresh unique name with the given extension
    ///
    /// # Errors
    /// Returns error if the write fails
    pub fn persist(&self, bytes: &[u8], extension: &str) -> Result<MediaFile, StoreError> {
        let name = format!("{}.{}", uuid::Uuid::new_v4().simple(), extension);
        let path = self.path().join(name);
        std::fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!("persisted {} scratch bytes to {}", bytes.len(), path.display());
        Ok(MediaFile {
            path,
            is_tmp: true,
            digest: ContentHash::compute(bytes),
            size: bytes.len() as u64,
            extension: extension.to_ascii_lowercase(),
        })
    }
}
