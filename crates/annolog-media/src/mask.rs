//! Segmentation mask layers

use crate::classes::{ClassId, ClassTable};
use crate::error::MediaError;
use crate::payload::{MaskRef, MASK_REF_TYPE};
use crate::pixels;
use annolog_artifact::{Destination, MediaStore};
use image::{DynamicImage, GrayImage, ImageFormat};
use ndarray::Array2;
use serde_json::Value;

/// A named per-pixel class map on one image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMask {
    key: String,
    mask_data: Array2<u8>,
    class_labels: Option<ClassTable>,
}

impl ImageMask {
    /// Create a mask layer
    #[must_use]
    pub fn new(key: impl Into<String>, mask_data: Array2<u8>, class_labels: Option<ClassTable>) -> Self {
        Self {
            key: key.into(),
            mask_data,
            class_labels,
        }
    }

    /// Build a mask from `{"mask_data": [[...]], "class_labels": {...}}`
    ///
    /// # Errors
    /// Returns [`MediaError::InvalidArgument`] if the rows are ragged or hold
    /// values outside `0..=255`
    pub fn from_value(key: impl Into<String>, value: &Value) -> Result<Self, MediaError> {
        let key = key.into();
        let invalid = |why: &str| MediaError::InvalidArgument(format!("mask layer {key:?}: {why}"));

        let Value::Object(obj) = value else {
            return Err(invalid("must be a mapping with mask_data"));
        };
        let Some(Value::Array(rows)) = obj.get("mask_data") else {
            return Err(invalid("needs a 2-D mask_data list"));
        };

        let width = rows.first().and_then(Value::as_array).map_or(0, Vec::len);
        let mut samples = Vec::with_capacity(rows.len() * width);
        for row in rows {
            let row = row.as_array().ok_or_else(|| invalid("mask_data rows must be lists"))?;
            if row.len() != width {
                return Err(invalid("mask_data rows differ in length"));
            }
            for v in row {
                let id = v
                    .as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| invalid("mask values must be integers in 0..=255"))?;
                samples.push(id);
            }
        }
        let mask_data = Array2::from_shape_vec((rows.len(), width), samples)
            .map_err(|e| invalid(&e.to_string()))?;

        let class_labels = match obj.get("class_labels") {
            None | Some(Value::Null) => None,
            Some(labels) => Some(ClassTable::from_value(labels)?),
        };
        Ok(Self {
            key,
            mask_data,
            class_labels,
        })
    }

    /// Layer name
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    /// Class id per pixel, `(height, width)`
    #[inline]
    #[must_use]
    pub fn mask_data(&self) -> &Array2<u8> {
        &self.mask_data
    }

    /// Layer-level class labels, if supplied
    #[inline]
    #[must_use]
    pub fn class_labels(&self) -> Option<&ClassTable> {
        self.class_labels.as_ref()
    }

    /// Class ids declared by this layer's labels
    pub fn class_ids(&self) -> impl Iterator<Item = &ClassId> {
        self.class_labels.iter().flat_map(|labels| labels.ids())
    }

    fn dimensions(&self) -> Result<(u32, u32), MediaError> {
        let (rows, cols) = self.mask_data.dim();
        let too_large = || MediaError::InvalidArgument(format!("mask {:?} too large", self.key));
        Ok((
            u32::try_from(cols).map_err(|_| too_large())?,
            u32::try_from(rows).map_err(|_| too_large())?,
        ))
    }

    /// Encode as a grayscale PNG
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn to_png(&self) -> Result<Vec<u8>, MediaError> {
        let (width, height) = self.dimensions()?;
        let raw: Vec<u8> = self.mask_data.iter().copied().collect();
        let gray = GrayImage::from_raw(width, height, raw)
            .ok_or_else(|| MediaError::InvalidArgument(format!("mask {:?} is not contiguous", self.key)))?;
        pixels::encode_png(&DynamicImage::ImageLuma8(gray))
    }

    /// Store the mask PNG and return its reference
    ///
    /// # Errors
    /// Returns error if encoding or storage fails
    pub fn to_payload(&self, destination: &dyn Destination) -> Result<MaskRef, MediaError> {
        let (width, height) = self.dimensions()?;
        let png = self.to_png()?;
        let entry = destination.add_media(&["images", "mask"], &png, "png")?;
        Ok(MaskRef::new(entry, width, height))
    }

    /// Rebuild a mask from its reference
    ///
    /// The PNG holds only class ids, so the result has no class labels.
    ///
    /// # Errors
    /// Returns error if the file is missing, altered or not a PNG
    pub fn from_payload(
        key: impl Into<String>,
        reference: &MaskRef,
        store: &dyn MediaStore,
    ) -> Result<Self, MediaError> {
        if reference.kind != MASK_REF_TYPE {
            return Err(MediaError::InvalidArgument(format!(
                "expected a {MASK_REF_TYPE} reference, got {}",
                reference.kind
            )));
        }
        let bytes = store.fetch_verified(&reference.path, &reference.digest)?;
        let gray = pixels::decode(&bytes, ImageFormat::Png)?.to_luma8();
        let (width, height) = gray.dimensions();
        let mask_data = Array2::from_shape_vec((height as usize, width as usize), gray.into_raw())
            .map_err(|e| MediaError::InvalidArgument(e.to_string()))?;
        Ok(Self::new(key, mask_data, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annolog_artifact::{MemoryStore, Run};
    use ndarray::arr2;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn parses_raw_mask() {
        let mask = ImageMask::from_value(
            "seg",
            &json!({
                "mask_data": [[0, 1, 1], [2, 2, 0]],
                "class_labels": { "1": "road", "2": "car" }
            }),
        )
        .unwrap();
        assert_eq!(mask.mask_data(), &arr2(&[[0u8, 1, 1], [2, 2, 0]]));
        let ids: Vec<_> = mask.class_ids().map(ClassId::as_str).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn rejects_bad_masks() {
        for bad in [
            json!("nope"),
            json!({ "class_labels": {} }),
            json!({ "mask_data": [[0, 1], [1]] }),
            json!({ "mask_data": [[0, 300]] }),
            json!({ "mask_data": [[-1]] }),
            json!({ "mask_data": [0, 1] }),
        ] {
            assert!(
                matches!(ImageMask::from_value("m", &bad), Err(MediaError::InvalidArgument(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn mask_without_labels_has_no_ids() {
        let mask = ImageMask::new("m", Array2::zeros((2, 2)), None);
        assert_eq!(mask.class_ids().count(), 0);
    }

    #[test]
    fn stored_as_png_under_images_mask() {
        let store = Arc::new(MemoryStore::new());
        let run = Run::new("r", store.clone());
        let data = arr2(&[[0u8, 3, 3, 0], [1, 1, 0, 0], [0, 0, 0, 7]]);
        let mask = ImageMask::new("seg", data.clone(), Some(ClassTable::new().with_class(3, "x")));

        let reference = mask.to_payload(&run.step("val", 2)).unwrap();
        assert_eq!((reference.width, reference.height), (4, 3));
        assert!(reference.path.to_string().starts_with("media/images/mask/val_2_"));

        let back = ImageMask::from_payload("seg", &reference, store.as_ref()).unwrap();
        assert_eq!(back.mask_data(), &data);
        assert!(back.class_labels().is_none());
        assert_eq!(back.key(), "seg");
    }
}
