//! Batch serialization of images logged under one key and step

use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::payload::{BatchPayload, ImagePayload, SerializedBatch, BATCH_PAYLOAD_TYPE};
use crate::record::Image;
use annolog_artifact::{Destination, MediaPath};

/// Combines the images of one logging call into a [`BatchPayload`]
#[derive(Debug, Clone, Default)]
pub struct ColumnSerializer {
    config: MediaConfig,
}

impl ColumnSerializer {
    /// Create a serializer
    #[inline]
    #[must_use]
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Serialize `images` in order
    ///
    /// Dimensions and format come from the first image. Size mismatches and
    /// truncation past `max_items` are reported in
    /// [`SerializedBatch::warnings`] instead of failing the batch.
    ///
    /// # Errors
    /// - [`MediaError::InvalidArgument`] for an empty batch
    /// - [`MediaError::InvalidLayout`] if an image lands outside `<media_root>/images`
    /// - any error from serializing a single image
    pub fn serialize(&self, images: &[Image], destination: &dyn Destination) -> Result<SerializedBatch, MediaError> {
        let Some(first) = images.first() else {
            return Err(MediaError::InvalidArgument("cannot serialize an empty image batch".to_string()));
        };
        let mut warnings = Vec::new();

        let images = if images.len() > self.config.max_items {
            let msg = format!(
                "only {} images will be logged; {} were supplied",
                self.config.max_items,
                images.len()
            );
            tracing::warn!("{msg}");
            warnings.push(msg);
            &images[..self.config.max_items]
        } else {
            images
        };

        let expected: MediaPath = self.config.images_dir().parse()?;
        let payloads = images
            .iter()
            .map(|image| {
                let payload = image.to_payload(destination)?;
                if payload.path.starts_with(&expected) {
                    Ok(payload)
                } else {
                    Err(MediaError::InvalidLayout {
                        expected: expected.to_string(),
                        actual: payload.path.to_string(),
                    })
                }
            })
            .collect::<Result<Vec<ImagePayload>, MediaError>>()?;

        let (width, height) = (first.width(), first.height());
        if images.iter().any(|i| (i.width(), i.height()) != (width, height)) {
            let msg = format!("images sizes do not match; the batch is described as {width}x{height}");
            tracing::warn!("{msg}");
            warnings.push(msg);
        }

        let captions = images
            .iter()
            .any(|i| i.caption().is_some())
            .then(|| images.iter().map(|i| i.caption().map(str::to_string)).collect());
        let all_masks: Vec<_> = payloads.iter().map(|p| p.masks.clone()).collect();
        let all_boxes: Vec<_> = payloads.iter().map(|p| p.boxes.clone()).collect();

        tracing::debug!("serialized batch of {} images", payloads.len());
        Ok(SerializedBatch {
            payload: BatchPayload {
                kind: BATCH_PAYLOAD_TYPE.to_string(),
                width,
                height,
                format: first.format().to_string(),
                count: payloads.len(),
                captions,
                all_masks: all_masks.iter().any(Option::is_some).then_some(all_masks),
                all_boxes: all_boxes.iter().any(Option::is_some).then_some(all_boxes),
            },
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ImageLoader, ImageMeta};
    use annolog_artifact::{MemoryStore, Run};
    use ndarray::{ArrayD, IxDyn};
    use std::sync::Arc;

    fn image(loader: &ImageLoader, h: usize, w: usize, caption: Option<&str>) -> Image {
        let data = ArrayD::<f64>::zeros(IxDyn(&[h, w]));
        let meta = caption.map_or_else(ImageMeta::new, |c| ImageMeta::new().with_caption(c));
        loader.load_with(data, meta).unwrap()
    }

    #[test]
    fn truncates_past_max_items() {
        let config = MediaConfig::new().with_max_items(2);
        let loader = ImageLoader::new(config.clone()).unwrap();
        let images: Vec<_> = (0..3).map(|_| image(&loader, 2, 2, None)).collect();
        let run = Run::new("r", Arc::new(MemoryStore::new()));

        let batch = ColumnSerializer::new(config).serialize(&images, &run.step("k", 0)).unwrap();
        assert_eq!(batch.payload.count, 2);
        assert_eq!(batch.warnings.len(), 1);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let run = Run::new("r", Arc::new(MemoryStore::new()));
        assert!(matches!(
            ColumnSerializer::default().serialize(&[], &run.step("k", 0)),
            Err(MediaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn no_captions_no_annotations_omits_fields() {
        let loader = ImageLoader::new(MediaConfig::new()).unwrap();
        let images = vec![image(&loader, 2, 2, None), image(&loader, 2, 2, None)];
        let run = Run::new("r", Arc::new(MemoryStore::new()));
        let batch = ColumnSerializer::default().serialize(&images, &run.step("k", 1)).unwrap();
        assert!(batch.payload.captions.is_none());
        assert!(batch.payload.all_masks.is_none());
        assert!(batch.payload.all_boxes.is_none());
        assert!(batch.warnings.is_empty());
        assert_eq!(batch.payload.format, "png");
    }
}
