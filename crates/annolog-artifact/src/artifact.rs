//! Versioned, content-addressed artifacts
//!
//! An [`Artifact`] records a manifest of every file added to it. Entries are
//! named by digest, so adding the same content twice yields one entry.

use crate::destination::{Destination, DestinationKind, DEFAULT_MEDIA_DIR};
use crate::hash::ContentHash;
use crate::path::MediaPath;
use crate::store::{MediaStore, StoreError, StoredEntry};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Content-addressed artifact under construction (or loaded for reading)
///
/// # Invariants
/// - Every manifest entry's digest matches the bytes placed at its path
/// - Entries are never removed
#[derive(Debug)]
pub struct Artifact {
    name: String,
    media_dir: MediaPath,
    store: Arc<dyn MediaStore>,
    manifest: RwLock<BTreeMap<MediaPath, StoredEntry>>,
}

impl Artifact {
    /// Create an empty artifact writing into `store`
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<dyn MediaStore>) -> Self {
        Self {
            name: name.into(),
            media_dir: MediaPath::root().child(DEFAULT_MEDIA_DIR).unwrap_or_default(),
            store,
            manifest: RwLock::new(BTreeMap::new()),
        }
    }

    /// Place media under a different root directory
    #[inline]
    #[must_use]
    pub fn with_media_dir(mut self, media_dir: MediaPath) -> Self {
        self.media_dir = media_dir;
        self
    }

    /// Reopen an artifact from a previously recorded manifest
    #[must_use]
    pub fn from_manifest(
        name: impl Into<String>,
        store: Arc<dyn MediaStore>,
        entries: impl IntoIterator<Item = StoredEntry>,
    ) -> Self {
        let artifact = Self::new(name, store);
        {
            let mut manifest = artifact.manifest.write();
            for entry in entries {
                manifest.insert(entry.path.clone(), entry);
            }
        }
        artifact
    }

    /// Artifact name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manifest entry for `path`
    #[must_use]
    pub fn entry(&self, path: &MediaPath) -> Option<StoredEntry> {
        self.manifest.read().get(path).cloned()
    }

    /// All manifest entries, sorted by path
    #[must_use]
    pub fn entries(&self) -> Vec<StoredEntry> {
        self.manifest.read().values().cloned().collect()
    }

    /// Number of manifest entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifest.read().len()
    }

    /// Check if artifact has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifest.read().is_empty()
    }

    /// Digest over the sorted manifest (the artifact's version identity)
    ///
    /// # Errors
    /// Returns error if the manifest cannot be encoded
    pub fn digest(&self) -> Result<ContentHash, crate::hash::HashError> {
        let manifest = self.manifest.read();
        let listing: Vec<(String, String)> = manifest
            .values()
            .map(|e| (e.path.to_string(), e.digest.to_string()))
            .collect();
        ContentHash::compute_serializable(&listing)
    }

    /// Re-read every entry and check it against its digest
    #[must_use]
    pub fn verify(&self) -> bool {
        self.manifest
            .read()
            .values()
            .all(|e| self.store.fetch_verified(&e.path, &e.digest).is_ok())
    }
}

impl Destination for Artifact {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Artifact
    }

    fn media_dir(&self) -> &MediaPath {
        &self.media_dir
    }

    fn file_name(&self, digest: &ContentHash, suffix: &str) -> String {
        format!("{}.{suffix}", digest.short())
    }

    fn add(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError> {
        let entry = self.store.put(path, bytes)?;
        self.manifest.write().insert(path.clone(), entry.clone());
        Ok(entry)
    }
}

/// Artifacts are also a source of truth for reconstruction: reads are checked
/// against the manifest when the path is known.
impl MediaStore for Artifact {
    fn put(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError> {
        self.add(path, bytes)
    }

    fn fetch(&self, path: &MediaPath) -> Result<Vec<u8>, StoreError> {
        match self.entry(path) {
            Some(entry) => self.store.fetch_verified(path, &entry.digest),
            None => self.store.fetch(path),
        }
    }

    fn contains(&self, path: &MediaPath) -> bool {
        self.manifest.read().contains_key(path) || self.store.contains(path)
    }
}
