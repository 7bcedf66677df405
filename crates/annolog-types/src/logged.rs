//! Logged value types and assignability
//!
//! [`LoggedType`] is the closed set of structural types a column can hold.
//! Assigning one type to another yields their join, or [`LoggedType::Invalid`]
//! when the kinds differ.

use crate::descriptor::{ClassConflict, ImageFileType, IMAGE_FILE_KIND};
use serde_json::{json, Value};

/// Kind name of the unknown (not yet observed) type
pub const UNKNOWN_KIND: &str = "unknown";

/// Kind name of the invalid (incompatible) type
pub const INVALID_KIND: &str = "invalid";

/// Structural type of a logged column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoggedType {
    /// Nothing observed yet; identity for assignment
    #[default]
    Unknown,

    /// Image records with the given annotation shape
    ImageFile(ImageFileType),

    /// Incompatible kinds were mixed; absorbs every further assignment
    Invalid,
}

impl LoggedType {
    /// Kind name used in serialized form
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => UNKNOWN_KIND,
            Self::ImageFile(_) => IMAGE_FILE_KIND,
            Self::Invalid => INVALID_KIND,
        }
    }

    /// Check if this is the invalid type
    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Join with `other`
    ///
    /// # Rules
    /// - `Unknown` is the identity on either side
    /// - `Invalid` absorbs
    /// - two image descriptors merge (left name wins on class conflicts)
    #[must_use]
    pub fn assign(&self, other: &Self) -> Self {
        let (joined, conflicts) = self.assign_reporting(other);
        for conflict in &conflicts {
            tracing::warn!("class name conflict while assigning types: {}", conflict);
        }
        joined
    }

    /// Join with `other`, returning class-name conflicts instead of logging them
    #[must_use]
    pub fn assign_reporting(&self, other: &Self) -> (Self, Vec<ClassConflict>) {
        match (self, other) {
            (Self::Invalid, _) | (_, Self::Invalid) => (Self::Invalid, Vec::new()),
            (Self::Unknown, t) | (t, Self::Unknown) => (t.clone(), Vec::new()),
            (Self::ImageFile(a), Self::ImageFile(b)) => {
                let (merged, conflicts) = a.merge_reporting(b);
                (Self::ImageFile(merged), conflicts)
            }
        }
    }

    /// Check whether `other` can be assigned to this type
    #[inline]
    #[must_use]
    pub fn can_assign(&self, other: &Self) -> bool {
        !self.assign_reporting(other).0.is_invalid()
    }

    /// Join with `other`, failing on incompatible kinds
    ///
    /// # Errors
    /// Returns [`TypeError::IncompatibleType`] if the join is invalid
    pub fn try_assign(&self, other: &Self) -> Result<Self, TypeError> {
        let joined = self.assign(other);
        if joined.is_invalid() {
            return Err(TypeError::IncompatibleType {
                expected: self.name().to_string(),
                actual: other.name().to_string(),
            });
        }
        Ok(joined)
    }

    /// Serialized form: `{"wb_type": <name>, "params": {...}}`
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::ImageFile(descriptor) => json!({
                "wb_type": IMAGE_FILE_KIND,
                "params": descriptor,
            }),
            other => json!({ "wb_type": other.name() }),
        }
    }
}

impl From<ImageFileType> for LoggedType {
    fn from(descriptor: ImageFileType) -> Self {
        Self::ImageFile(descriptor)
    }
}

/// Errors raised by type inference and assignment
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// Heterogeneous values logged into one column
    #[error("incompatible type: column holds {expected}, got {actual}")]
    IncompatibleType { expected: String, actual: String },

    /// Serialized params do not describe the kind
    #[error("invalid params for {kind}: {reason}")]
    InvalidParams { kind: String, reason: String },

    /// Kind name not registered
    #[error("unknown type kind: {0}")]
    UnknownKind(String),

    /// Kind registered twice
    #[error("type kind already registered: {0}")]
    DuplicateKind(String),

    /// No registered kind recognizes the value
    #[error("no registered type can describe a value of {0}")]
    NotInferable(String),
}
