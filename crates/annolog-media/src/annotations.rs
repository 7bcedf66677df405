//! Per-image annotation canonicalization
//!
//! [`AnnotationSet::build`] turns user-supplied box layers, mask layers and
//! class lists into one set with a single class table. Input shapes are
//! checked before any layer is built, so a bad input never leaves a partially
//! built set behind.

use crate::boxes::BoundingBoxes2D;
use crate::classes::ClassTable;
use crate::error::MediaError;
use crate::mask::ImageMask;
use annolog_types::ImageFileType;
use indexmap::IndexMap;
use serde_json::Value;

/// One layer, either built or still raw JSON
#[derive(Debug, Clone)]
pub enum LayerInput<T> {
    Built(T),
    Raw(Value),
}

/// Layers for one annotation kind, keyed by layer name
#[derive(Debug, Clone)]
pub enum LayersInput<T> {
    /// Layer name → layer
    Layers(IndexMap<String, LayerInput<T>>),
    /// Unchecked JSON; must be an object of layer name → raw layer
    Raw(Value),
}

impl<T> Default for LayersInput<T> {
    fn default() -> Self {
        Self::Layers(IndexMap::new())
    }
}

/// Explicit class list
#[derive(Debug, Clone)]
pub enum ClassesInput {
    Table(ClassTable),
    Raw(Value),
}

/// Annotations as supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct AnnotationInput {
    pub boxes: Option<LayersInput<BoundingBoxes2D>>,
    pub masks: Option<LayersInput<ImageMask>>,
    pub classes: Option<ClassesInput>,
}

impl AnnotationInput {
    /// No annotations
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a built box layer under `name`
    #[must_use]
    pub fn with_box_layer(mut self, name: impl Into<String>, layer: BoundingBoxes2D) -> Self {
        push_layer(&mut self.boxes, name.into(), LayerInput::Built(layer));
        self
    }

    /// Add a raw box layer under `name`
    #[must_use]
    pub fn with_raw_box_layer(mut self, name: impl Into<String>, layer: Value) -> Self {
        push_layer(&mut self.boxes, name.into(), LayerInput::Raw(layer));
        self
    }

    /// Replace all box layers with an unchecked JSON value
    #[must_use]
    pub fn with_raw_boxes(mut self, boxes: Value) -> Self {
        self.boxes = Some(LayersInput::Raw(boxes));
        self
    }

    /// Add a built mask layer under `name`
    #[must_use]
    pub fn with_mask_layer(mut self, name: impl Into<String>, layer: ImageMask) -> Self {
        push_layer(&mut self.masks, name.into(), LayerInput::Built(layer));
        self
    }

    /// Add a raw mask layer under `name`
    #[must_use]
    pub fn with_raw_mask_layer(mut self, name: impl Into<String>, layer: Value) -> Self {
        push_layer(&mut self.masks, name.into(), LayerInput::Raw(layer));
        self
    }

    /// Replace all mask layers with an unchecked JSON value
    #[must_use]
    pub fn with_raw_masks(mut self, masks: Value) -> Self {
        self.masks = Some(LayersInput::Raw(masks));
        self
    }

    /// With an explicit class table
    #[must_use]
    pub fn with_classes(mut self, classes: ClassTable) -> Self {
        self.classes = Some(ClassesInput::Table(classes));
        self
    }

    /// With an unchecked class list
    #[must_use]
    pub fn with_raw_classes(mut self, classes: Value) -> Self {
        self.classes = Some(ClassesInput::Raw(classes));
        self
    }
}

fn push_layer<T>(slot: &mut Option<LayersInput<T>>, name: String, layer: LayerInput<T>) {
    let mut layers = match slot.take() {
        Some(LayersInput::Layers(layers)) => layers,
        Some(LayersInput::Raw(Value::Object(raw))) => raw
            .into_iter()
            .map(|(k, v)| (k, LayerInput::Raw(v)))
            .collect(),
        // A non-mapping raw value stays as is so building still rejects it.
        Some(raw @ LayersInput::Raw(_)) => {
            *slot = Some(raw);
            return;
        }
        None => IndexMap::new(),
    };
    layers.insert(name, layer);
    *slot = Some(LayersInput::Layers(layers));
}

/// A layer kind that can be read from raw JSON
trait Layer: Sized {
    const KIND: &'static str;
    fn from_raw(key: &str, value: &Value) -> Result<Self, MediaError>;
    fn rename(&mut self, key: &str);
    fn labels(&self) -> Option<&ClassTable>;
}

impl Layer for BoundingBoxes2D {
    const KIND: &'static str = "boxes";

    fn from_raw(key: &str, value: &Value) -> Result<Self, MediaError> {
        Self::from_value(key, value)
    }

    fn rename(&mut self, key: &str) {
        self.set_key(key);
    }

    fn labels(&self) -> Option<&ClassTable> {
        Some(self.class_labels())
    }
}

impl Layer for ImageMask {
    const KIND: &'static str = "masks";

    fn from_raw(key: &str, value: &Value) -> Result<Self, MediaError> {
        Self::from_value(key, value)
    }

    fn rename(&mut self, key: &str) {
        self.set_key(key);
    }

    fn labels(&self) -> Option<&ClassTable> {
        self.class_labels()
    }
}

/// Unpack the top-level mapping, without building anything yet
fn check_shape<T: Layer>(
    input: Option<LayersInput<T>>,
) -> Result<IndexMap<String, LayerInput<T>>, MediaError> {
    match input {
        None => Ok(IndexMap::new()),
        Some(LayersInput::Layers(layers)) => Ok(layers),
        Some(LayersInput::Raw(Value::Object(raw))) => Ok(raw
            .into_iter()
            .map(|(k, v)| (k, LayerInput::Raw(v)))
            .collect()),
        Some(LayersInput::Raw(Value::Null)) => Ok(IndexMap::new()),
        Some(LayersInput::Raw(other)) => Err(MediaError::InvalidArgument(format!(
            "image {} argument must be a mapping of layer name to layer, got {other}",
            T::KIND
        ))),
    }
}

fn build_layers<T: Layer>(
    layers: IndexMap<String, LayerInput<T>>,
) -> Result<IndexMap<String, T>, MediaError> {
    layers
        .into_iter()
        .map(|(name, input)| {
            let layer = match input {
                LayerInput::Built(mut layer) => {
                    layer.rename(&name);
                    layer
                }
                LayerInput::Raw(value) => T::from_raw(&name, &value)?,
            };
            Ok((name, layer))
        })
        .collect()
}

/// Canonical annotations of one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    boxes: IndexMap<String, BoundingBoxes2D>,
    masks: IndexMap<String, ImageMask>,
    classes: Option<ClassTable>,
}

impl AnnotationSet {
    /// No layers and no classes
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Canonicalize caller input
    ///
    /// The class table folds, last write winning per id: box layer labels,
    /// then mask layer labels, then the explicit classes.
    ///
    /// # Errors
    /// Returns [`MediaError::InvalidArgument`] if boxes or masks are not
    /// mapping-shaped, or if any layer or class list is malformed
    pub fn build(input: AnnotationInput) -> Result<Self, MediaError> {
        let raw_boxes = check_shape(input.boxes)?;
        let raw_masks = check_shape(input.masks)?;
        let explicit = match input.classes {
            None => None,
            Some(ClassesInput::Table(table)) => Some(table),
            Some(ClassesInput::Raw(value)) => Some(ClassTable::from_value(&value)?),
        };

        let boxes = build_layers(raw_boxes)?;
        let masks = build_layers(raw_masks)?;

        let table = boxes
            .values()
            .filter_map(|layer| layer.labels())
            .chain(masks.values().filter_map(|layer| layer.labels()))
            .chain(explicit.iter())
            .fold(ClassTable::new(), |acc, next| acc.overlay(next));

        tracing::debug!(
            "built annotations: {} box layers, {} mask layers, {} classes",
            boxes.len(),
            masks.len(),
            table.len()
        );
        Ok(Self {
            boxes,
            masks,
            classes: (!table.is_empty()).then_some(table),
        })
    }

    /// Box layers by name
    #[inline]
    #[must_use]
    pub fn boxes(&self) -> &IndexMap<String, BoundingBoxes2D> {
        &self.boxes
    }

    /// Mask layers by name
    #[inline]
    #[must_use]
    pub fn masks(&self) -> &IndexMap<String, ImageMask> {
        &self.masks
    }

    /// Combined class table, if any class is known
    #[inline]
    #[must_use]
    pub fn classes(&self) -> Option<&ClassTable> {
        self.classes.as_ref()
    }

    /// Check if any box or mask layer is present
    #[must_use]
    pub fn has_layers(&self) -> bool {
        !self.boxes.is_empty() || !self.masks.is_empty()
    }

    /// Check if there are no layers and no classes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_layers() && self.classes.is_none()
    }

    /// Structural descriptor of these annotations
    #[must_use]
    pub fn describe(&self) -> ImageFileType {
        let mut descriptor = ImageFileType::new();
        for (name, layer) in &self.boxes {
            descriptor = descriptor
                .with_box_layer(name.as_str(), layer.class_ids().map(ToString::to_string))
                .with_score_keys(layer.score_keys());
        }
        for (name, mask) in &self.masks {
            descriptor = descriptor.with_mask_layer(name.as_str(), mask.class_ids().map(ToString::to_string));
        }
        if let Some(classes) = &self.classes {
            for (id, name) in classes.iter() {
                descriptor = descriptor.with_class(id.to_string(), Some(name.to_string()));
            }
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::BoxData;
    use ndarray::Array2;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw_box_layer(labels: Value) -> Value {
        json!({
            "box_data": [{
                "position": { "minX": 0.0, "maxX": 0.5, "minY": 0.0, "maxY": 0.5 },
                "class_id": 1,
                "scores": { "confidence": 0.8 }
            }],
            "class_labels": labels
        })
    }

    #[test]
    fn empty_input_is_empty_set() {
        let set = AnnotationSet::build(AnnotationInput::new()).unwrap();
        assert!(set.is_empty());
        assert!(set.describe().is_identity());
    }

    #[test]
    fn classes_fold_boxes_then_masks_then_explicit() {
        let mask = ImageMask::new(
            "seg",
            Array2::zeros((2, 2)),
            Some(ClassTable::new().with_class(1, "mask-cat").with_class(3, "road")),
        );
        let input = AnnotationInput::new()
            .with_raw_box_layer("det", raw_box_layer(json!({ "1": "cat", "2": "dog" })))
            .with_mask_layer("seg", mask)
            .with_classes(ClassTable::new().with_class(2, "puppy"));
        let set = AnnotationSet::build(input).unwrap();
        let classes = set.classes().unwrap();
        assert_eq!(classes.get("1"), Some("mask-cat"));
        assert_eq!(classes.get("2"), Some("puppy"));
        assert_eq!(classes.get("3"), Some("road"));
        assert_eq!(classes.len(), 3);
    }

    #[test]
    fn layer_names_disambiguate_identical_content() {
        let layer = raw_box_layer(json!({ "1": "cat" }));
        let input = AnnotationInput::new()
            .with_raw_boxes(json!({ "predictions": layer.clone(), "ground_truth": layer }));
        let set = AnnotationSet::build(input).unwrap();
        assert_eq!(set.boxes().len(), 2);
        assert_eq!(set.boxes()["predictions"].key(), "predictions");
        assert_eq!(set.boxes()["ground_truth"].key(), "ground_truth");
    }

    #[test]
    fn built_layers_take_the_map_key() {
        let layer = BoundingBoxes2D::new("old", vec![BoxData::corners(1, 0.0, 1.0, 0.0, 1.0)], ClassTable::new());
        let set = AnnotationSet::build(AnnotationInput::new().with_box_layer("new", layer)).unwrap();
        assert_eq!(set.boxes()["new"].key(), "new");
        assert!(set.has_layers());
        assert!(set.classes().is_none());
    }

    #[test]
    fn non_mapping_inputs_fail_before_building() {
        let err = AnnotationSet::build(AnnotationInput::new().with_raw_boxes(json!([1, 2, 3]))).unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(ref m) if m.contains("boxes")));
        let err = AnnotationSet::build(AnnotationInput::new().with_raw_masks(json!("mask"))).unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(ref m) if m.contains("masks")));
        // Adding a layer to a non-mapping raw value does not hide the bad shape.
        let input = AnnotationInput::new()
            .with_raw_boxes(json!(5))
            .with_raw_box_layer("det", raw_box_layer(json!({})));
        assert!(AnnotationSet::build(input).is_err());
    }

    #[test]
    fn raw_classes_accept_map_or_list() {
        let set = AnnotationSet::build(AnnotationInput::new().with_raw_classes(json!({"3": "bird"}))).unwrap();
        assert_eq!(set.classes().and_then(|c| c.get("3")), Some("bird"));

        let input = AnnotationInput::new()
            .with_raw_box_layer("det", raw_box_layer(json!({"1": "cat"})))
            .with_raw_classes(json!([{"id": 1, "name": "kitten"}, {"id": 2, "name": "dog"}]));
        let set = AnnotationSet::build(input).unwrap();
        let classes = set.classes().unwrap();
        assert_eq!(classes.get("1"), Some("kitten"));
        assert_eq!(classes.len(), 2);

        let err = AnnotationSet::build(AnnotationInput::new().with_raw_classes(json!("bird"))).unwrap_err();
        assert!(matches!(err, MediaError::InvalidArgument(_)));
    }

    #[test]
    fn describe_collects_shape() {
        let input = AnnotationInput::new()
            .with_raw_box_layer("det", raw_box_layer(json!({ "1": "cat", "2": "dog" })))
            .with_raw_mask_layer("seg", json!({ "mask_data": [[0, 4]], "class_labels": { "4": "sky" } }));
        let descriptor = AnnotationSet::build(input).unwrap().describe();
        let det: Vec<_> = descriptor.box_layers["det"].iter().map(String::as_str).collect();
        assert_eq!(det, vec!["1", "2"]);
        assert!(descriptor.mask_layers["seg"].contains("4"));
        assert!(descriptor.box_score_keys.contains("confidence"));
        assert_eq!(descriptor.class_map["4"].as_deref(), Some("sky"));
        assert_eq!(descriptor.class_map.len(), 3);
    }
}
