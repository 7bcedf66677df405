//! Serialized forms of image records
//!
//! Payloads reference stored files by path and digest; they never embed
//! pixel data.

use annolog_artifact::{ContentHash, MediaPath, StoredEntry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `_type` of a single image payload
pub const IMAGE_PAYLOAD_TYPE: &str = "image-file";

/// `_type` of a batch payload
pub const BATCH_PAYLOAD_TYPE: &str = "images/separated";

/// `type` of a class table reference
pub const CLASSES_REF_TYPE: &str = "classes-file";

/// `_type` of a box layer reference
pub const BOXES_REF_TYPE: &str = "boxes2D-file";

/// `_type` of a mask layer reference
pub const MASK_REF_TYPE: &str = "mask";

/// Reference to a stored class table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassesRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: MediaPath,
    pub digest: ContentHash,
}

impl ClassesRef {
    /// Reference the stored entry
    #[must_use]
    pub fn new(entry: StoredEntry) -> Self {
        Self {
            kind: CLASSES_REF_TYPE.to_string(),
            path: entry.path,
            digest: entry.digest,
        }
    }
}

/// Reference to a stored box layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxesRef {
    #[serde(rename = "_type")]
    pub kind: String,
    pub path: MediaPath,
    pub digest: ContentHash,
    pub size: u64,
}

impl BoxesRef {
    /// Reference the stored entry
    #[must_use]
    pub fn new(entry: StoredEntry) -> Self {
        Self {
            kind: BOXES_REF_TYPE.to_string(),
            path: entry.path,
            digest: entry.digest,
            size: entry.size,
        }
    }
}

/// Reference to a stored mask layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRef {
    #[serde(rename = "_type")]
    pub kind: String,
    pub path: MediaPath,
    pub digest: ContentHash,
    pub size: u64,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

impl MaskRef {
    /// Reference a stored PNG mask
    #[must_use]
    pub fn new(entry: StoredEntry, width: u32, height: u32) -> Self {
        Self {
            kind: MASK_REF_TYPE.to_string(),
            path: entry.path,
            digest: entry.digest,
            size: entry.size,
            format: "png".to_string(),
            width,
            height,
        }
    }
}

/// Serialized image record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(rename = "_type")]
    pub kind: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub path: MediaPath,
    pub digest: ContentHash,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<ClassesRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxes: Option<IndexMap<String, BoxesRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masks: Option<IndexMap<String, MaskRef>>,
}

/// Serialized batch of images logged under one key and step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    #[serde(rename = "_type")]
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_masks: Option<Vec<Option<IndexMap<String, MaskRef>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_boxes: Option<Vec<Option<IndexMap<String, BoxesRef>>>>,
}

/// Batch payload plus the non-fatal conditions met while building it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedBatch {
    pub payload: BatchPayload,
    pub warnings: Vec<String>,
}
