//! Media logging configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest number of images serialized in one batch
pub const DEFAULT_MAX_ITEMS: usize = 108;

/// Largest width or height logged without a warning
pub const DEFAULT_MAX_DIMENSION: u32 = 65500;

/// Configuration for building and serializing images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory all media lives under; images go in `<media_root>/images`
    pub media_root: String,
    /// Scratch directory for derived pixels (private temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// Batches longer than this are truncated
    pub max_items: usize,
    /// Dimension above which a warning is logged
    pub max_dimension: u32,
    /// Drop decoded pixels once a durable file backs the record
    pub release_pixels: bool,
}

impl MediaConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns error if the document is not valid TOML for this struct
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// With media root
    #[inline]
    #[must_use]
    pub fn with_media_root(mut self, root: impl Into<String>) -> Self {
        self.media_root = root.into();
        self
    }

    /// With scratch directory
    #[inline]
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// With batch limit
    #[inline]
    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    /// With dimension warning threshold
    #[inline]
    #[must_use]
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// With pixel release policy
    #[inline]
    #[must_use]
    pub fn with_release_pixels(mut self, release: bool) -> Self {
        self.release_pixels = release;
        self
    }

    /// Conventional images directory, `<media_root>/images`
    #[must_use]
    pub fn images_dir(&self) -> String {
        format!("{}/images", self.media_root)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_root: annolog_artifact::DEFAULT_MEDIA_DIR.to_string(),
            scratch_dir: None,
            max_items: DEFAULT_MAX_ITEMS,
            max_dimension: DEFAULT_MAX_DIMENSION,
            release_pixels: true,
        }
    }
}
