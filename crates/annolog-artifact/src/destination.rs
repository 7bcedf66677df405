//! Serialization destinations
//!
//! A logged record is serialized either into a live run (bound to a key and
//! step) or into a versioned artifact. Both decide where media files go and
//! how they are named; the record only supplies bytes.

use crate::hash::ContentHash;
use crate::path::{MediaPath, PathError};
use crate::store::{MediaStore, StoreError, StoredEntry};
use std::fmt::Debug;
use std::sync::Arc;

/// Default directory under which all media is placed
pub const DEFAULT_MEDIA_DIR: &str = "media";

/// What kind of target a [`Destination`] is
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    /// Live tracked run; may rely on run-local context
    Run,
    /// Versioned, content-addressed artifact; references must be self-describing
    Artifact,
    /// Any other target (not a valid serialization target for media)
    Other(String),
}

impl DestinationKind {
    /// Check if destination is an artifact
    #[inline]
    #[must_use]
    pub fn is_artifact(&self) -> bool {
        matches!(self, Self::Artifact)
    }
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => f.write_str("run"),
            Self::Artifact => f.write_str("artifact"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Target that media records serialize into
pub trait Destination: Debug {
    /// Destination kind
    fn kind(&self) -> DestinationKind;

    /// Root directory for media (usually `media`)
    fn media_dir(&self) -> &MediaPath;

    /// File name for content with `digest`; `suffix` includes the extension
    /// (e.g. `png`, `boxes2D.json`)
    fn file_name(&self, digest: &ContentHash, suffix: &str) -> String;

    /// Place bytes at `path`
    ///
    /// # Errors
    /// Returns error if the underlying store fails
    fn add(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError>;

    /// Place bytes under `subdir` (relative to the media dir), named by digest
    ///
    /// # Errors
    /// Returns error if the path is invalid or the store fails
    fn add_media(
        &self,
        subdir: &[&str],
        bytes: &[u8],
        suffix: &str,
    ) -> Result<StoredEntry, DestinationError> {
        let digest = ContentHash::compute(bytes);
        let mut path = self.media_dir().clone();
        for seg in subdir {
            path = path.child(*seg)?;
        }
        let path = path.child(self.file_name(&digest, suffix))?;
        Ok(self.add(&path, bytes)?)
    }
}

/// Errors while placing media into a destination
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    /// Generated path was invalid
    #[error(transparent)]
    Path(#[from] PathError),

    /// Store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A live tracked run
#[derive(Debug, Clone)]
pub struct Run {
    id: String,
    media_dir: MediaPath,
    store: Arc<dyn MediaStore>,
}

impl Run {
    /// Create a run writing into `store`
    #[must_use]
    pub fn new(id: impl Into<String>, store: Arc<dyn MediaStore>) -> Self {
        Self {
            id: id.into(),
            media_dir: MediaPath::root().child(DEFAULT_MEDIA_DIR).unwrap_or_default(),
            store,
        }
    }

    /// Place media under a different root directory
    #[inline]
    #[must_use]
    pub fn with_media_dir(mut self, media_dir: MediaPath) -> Self {
        self.media_dir = media_dir;
        self
    }

    /// Run identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Backing store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.store
    }

    /// Bind to one logged key and step
    #[must_use]
    pub fn step(&self, key: impl Into<String>, step: u64) -> RunStep<'_> {
        RunStep {
            run: self,
            key: key.into(),
            step,
        }
    }
}

/// A run bound to a logging key and step
///
/// File names carry the key and step so media from different steps never
/// collide even when their content does.
#[derive(Debug, Clone)]
pub struct RunStep<'a> {
    run: &'a Run,
    key: String,
    step: u64,
}

impl RunStep<'_> {
    /// Logged key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Logged step
    #[inline]
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }
}

impl Destination for RunStep<'_> {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Run
    }

    fn media_dir(&self) -> &MediaPath {
        &self.run.media_dir
    }

    fn file_name(&self, digest: &ContentHash, suffix: &str) -> String {
        let key: String = self
            .key
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        format!("{key}_{}_{}.{suffix}", self.step, digest.short())
    }

    fn add(&self, path: &MediaPath, bytes: &[u8]) -> Result<StoredEntry, StoreError> {
        self.run.store.put(path, bytes)
    }
}
