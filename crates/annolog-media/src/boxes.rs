//! Bounding box layers

use crate::classes::{ClassId, ClassTable};
use crate::error::MediaError;
use crate::payload::{BoxesRef, BOXES_REF_TYPE};
use annolog_artifact::{Destination, MediaStore};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Where a box sits on the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoxPosition {
    /// Corner coordinates
    Corners {
        #[serde(rename = "minX")]
        min_x: f64,
        #[serde(rename = "maxX")]
        max_x: f64,
        #[serde(rename = "minY")]
        min_y: f64,
        #[serde(rename = "maxY")]
        max_y: f64,
    },
    /// Center point plus extent
    Center {
        middle: [f64; 2],
        width: f64,
        height: f64,
    },
}

/// One box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxData {
    pub position: BoxPosition,
    pub class_id: ClassId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_caption: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scores: IndexMap<String, f64>,
    /// `"pixel"` when coordinates are pixels instead of fractions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl BoxData {
    /// Box from corner coordinates
    #[must_use]
    pub fn corners(class_id: impl Into<ClassId>, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            position: BoxPosition::Corners {
                min_x,
                max_x,
                min_y,
                max_y,
            },
            class_id: class_id.into(),
            box_caption: None,
            scores: IndexMap::new(),
            domain: None,
        }
    }

    /// With a named score
    #[must_use]
    pub fn with_score(mut self, name: impl Into<String>, value: f64) -> Self {
        self.scores.insert(name.into(), value);
        self
    }

    /// With a caption
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.box_caption = Some(caption.into());
        self
    }
}

/// A named layer of boxes on one image
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxes2D {
    key: String,
    boxes: Vec<BoxData>,
    class_labels: ClassTable,
}

impl BoundingBoxes2D {
    /// Create a layer
    #[must_use]
    pub fn new(key: impl Into<String>, boxes: Vec<BoxData>, class_labels: ClassTable) -> Self {
        Self {
            key: key.into(),
            boxes,
            class_labels,
        }
    }

    /// Build a layer from `{"box_data": [...], "class_labels": {...}}`
    ///
    /// # Errors
    /// Returns [`MediaError::InvalidArgument`] if the value is not shaped like a box layer
    pub fn from_value(key: impl Into<String>, value: &Value) -> Result<Self, MediaError> {
        let key = key.into();
        let Value::Object(obj) = value else {
            return Err(MediaError::InvalidArgument(format!(
                "box layer {key:?} must be a mapping with box_data"
            )));
        };
        let Some(Value::Array(raw_boxes)) = obj.get("box_data") else {
            return Err(MediaError::InvalidArgument(format!(
                "box layer {key:?} needs a box_data list"
            )));
        };
        let boxes = raw_boxes
            .iter()
            .map(|b| {
                serde_json::from_value::<BoxData>(b.clone()).map_err(|e| {
                    MediaError::InvalidArgument(format!("box layer {key:?}: invalid box: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let class_labels = match obj.get("class_labels") {
            None | Some(Value::Null) => ClassTable::new(),
            Some(labels) => ClassTable::from_value(labels)?,
        };
        Ok(Self::new(key, boxes, class_labels))
    }

    /// Layer name
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Rename the layer
    pub(crate) fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    /// Boxes in this layer
    #[inline]
    #[must_use]
    pub fn boxes(&self) -> &[BoxData] {
        &self.boxes
    }

    /// Layer-level class labels
    #[inline]
    #[must_use]
    pub fn class_labels(&self) -> &ClassTable {
        &self.class_labels
    }

    /// Class ids this layer declares
    pub fn class_ids(&self) -> impl Iterator<Item = &ClassId> {
        self.class_labels.ids()
    }

    /// Distinct score names across all boxes, in first-seen order
    #[must_use]
    pub fn score_keys(&self) -> IndexSet<&str> {
        self.boxes
            .iter()
            .flat_map(|b| b.scores.keys().map(String::as_str))
            .collect()
    }

    /// Layer file contents
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "box_data": self.boxes,
            "class_labels": self.class_labels.to_label_map(),
        })
    }

    /// Store the layer file and return its reference
    ///
    /// # Errors
    /// Returns error if the destination cannot store the file
    pub fn to_payload(&self, destination: &dyn Destination) -> Result<BoxesRef, MediaError> {
        let bytes = serde_json::to_vec(&self.to_value())?;
        let entry = destination.add_media(&["metadata", "boxes2D"], &bytes, "boxes2D.json")?;
        Ok(BoxesRef::new(entry))
    }

    /// Rebuild a layer from its reference
    ///
    /// # Errors
    /// Returns error if the file is missing, altered or malformed
    pub fn from_payload(
        key: impl Into<String>,
        reference: &BoxesRef,
        store: &dyn MediaStore,
    ) -> Result<Self, MediaError> {
        if reference.kind != BOXES_REF_TYPE {
            return Err(MediaError::InvalidArgument(format!(
                "expected a {BOXES_REF_TYPE} reference, got {}",
                reference.kind
            )));
        }
        let bytes = store.fetch_verified(&reference.path, &reference.digest)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Self::from_value(key, &value)
    }
}
