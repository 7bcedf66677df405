//! Media paths inside runs and artifacts
//!
//! Provides [`MediaPath`], a relative, forward-slash path such as
//! `media/images/examples_3_1a2b3c4d5e6f7a8b.png`.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Relative path of a stored media file
///
/// Always rendered with `/` separators regardless of platform.
///
/// # Invariants
/// - No segment is empty, `.` or `..`
/// - No segment contains a path separator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaPath(Vec<String>);

impl MediaPath {
    /// Build a path from pre-validated segments
    ///
    /// # Errors
    /// Returns error if any segment is invalid
    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(|seg| validate_segment(seg.into()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }

    /// Empty path (store root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one segment, returning the new path
    ///
    /// # Errors
    /// Returns error if the segment is invalid
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let mut new = self.clone();
        new.0.push(validate_segment(segment.into())?);
        Ok(new)
    }

    /// Final segment (file name)
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Extension of the final segment, without the dot
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }

    /// Check if this path lies under `prefix` (or equals it)
    #[inline]
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Resolve against a filesystem root
    #[must_use]
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for seg in &self.0 {
            out.push(seg);
        }
        out
    }

    /// Convert a relative filesystem path, normalizing separators
    ///
    /// # Errors
    /// Returns error for absolute paths or paths that escape their root
    pub fn from_fs_path(path: &Path) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(seg) => {
                    let seg = seg
                        .to_str()
                        .ok_or_else(|| PathError::InvalidSegment(seg.to_string_lossy().into()))?;
                    // Windows-authored payloads may carry backslashes inside a component.
                    for part in seg.split('\\') {
                        segments.push(validate_segment(part.to_string())?);
                    }
                }
                Component::CurDir => {}
                _ => return Err(PathError::NotRelative(path.display().to_string())),
            }
        }
        Ok(Self(segments))
    }
}

fn validate_segment(seg: String) -> Result<String, PathError> {
    if seg.is_empty() {
        Err(PathError::EmptySegment)
    } else if seg == "." || seg == ".." || seg.contains(['/', '\\']) {
        Err(PathError::InvalidSegment(seg))
    } else {
        Ok(seg)
    }
}

impl Display for MediaPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for MediaPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        if s.starts_with('/') {
            return Err(PathError::NotRelative(s.to_string()));
        }
        Self::new(s.split(['/', '\\']))
    }
}

impl Default for MediaPath {
    fn default() -> Self {
        Self::root()
    }
}

impl serde::Serialize for MediaPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MediaPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors related to media paths
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Segment is a traversal or contains a separator
    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),

    /// Path is absolute or escapes its root
    #[error("path is not relative: {0}")]
    NotRelative(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_use_forward_slashes() {
        let path: MediaPath = "media/images/a.png".parse().unwrap();
        assert_eq!(path.segments(), &["media", "images", "a.png"]);
        assert_eq!(path.to_string(), "media/images/a.png");
    }

    #[test]
    fn backslashes_are_normalized() {
        let path: MediaPath = "media\\images\\a.png".parse().unwrap();
        assert_eq!(path.to_string(), "media/images/a.png");
    }

    #[test]
    fn rejects_traversal_and_absolute() {
        assert!(matches!(
            "media/../etc".parse::<MediaPath>(),
            Err(PathError::InvalidSegment(_))
        ));
        assert!(matches!(
            "/media".parse::<MediaPath>(),
            Err(PathError::NotRelative(_))
        ));
        assert!(matches!(
            "media//a".parse::<MediaPath>(),
            Err(PathError::EmptySegment)
        ));
    }

    #[test]
    fn starts_with_is_segment_wise() {
        let images: MediaPath = "media/images".parse().unwrap();
        let file: MediaPath = "media/images/mask/a.png".parse().unwrap();
        let lookalike: MediaPath = "media/images2/a.png".parse().unwrap();
        assert!(file.starts_with(&images));
        assert!(!lookalike.starts_with(&images));
        assert!(images.starts_with(&MediaPath::root()));
    }

    #[test]
    fn extension_of_last_segment() {
        let path: MediaPath = "media/classes/abc_cls.classes.json".parse().unwrap();
        assert_eq!(path.extension(), Some("json"));
        let dotfile: MediaPath = "media/.hidden".parse().unwrap();
        assert_eq!(dotfile.extension(), None);
    }

    #[test]
    fn fs_round_trip() {
        let path: MediaPath = "media/images/x.png".parse().unwrap();
        let fs = path.to_fs_path(Path::new("root"));
        let back = MediaPath::from_fs_path(fs.strip_prefix("root").unwrap()).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn child_validates() {
        let root = MediaPath::root();
        assert!(root.child("media").is_ok());
        assert!(root.child("a/b").is_err());
    }
}
