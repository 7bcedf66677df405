//! Image records
//!
//! An [`Image`] is built once by an [`ImageLoader`] from an [`ImageSource`]
//! and is immutable afterwards. Derived pixels are written to scratch space
//! as PNG, so the decoded buffer can be dropped and re-read on demand.

use crate::annotations::{AnnotationInput, AnnotationSet};
use crate::boxes::BoundingBoxes2D;
use crate::classes::ClassTable;
use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::mask::ImageMask;
use crate::payload::{ClassesRef, ImagePayload, IMAGE_PAYLOAD_TYPE};
use crate::pixels::{self, ColorMode};
use crate::source::ImageSource;
use crate::tensor;
use annolog_artifact::{ContentHash, Destination, DestinationKind, MediaFile, MediaStore, ScratchDir};
use annolog_types::ImageFileType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Caption, grouping and annotations supplied alongside the pixels
#[derive(Debug, Clone, Default)]
pub struct ImageMeta {
    pub caption: Option<String>,
    pub grouping: Option<String>,
    pub annotations: AnnotationInput,
}

impl ImageMeta {
    /// No caption, grouping or annotations
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With caption
    #[inline]
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// With grouping tag
    #[inline]
    #[must_use]
    pub fn with_grouping(mut self, grouping: impl Into<String>) -> Self {
        self.grouping = Some(grouping.into());
        self
    }

    /// With annotations
    #[inline]
    #[must_use]
    pub fn with_annotations(mut self, annotations: AnnotationInput) -> Self {
        self.annotations = annotations;
        self
    }
}

/// A logged image with its annotations
#[derive(Debug)]
pub struct Image {
    format: String,
    width: u32,
    height: u32,
    caption: Option<String>,
    grouping: Option<String>,
    annotations: AnnotationSet,
    file: MediaFile,
    pixels: Mutex<Option<Arc<DynamicImage>>>,
    release_after_use: bool,
    // Keeps a private scratch directory alive while records point into it.
    scratch: Arc<ScratchDir>,
}

impl Image {
    /// File format (extension of the backing file)
    #[inline]
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Width in pixels
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Caption, if any
    #[inline]
    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Grouping tag, if any
    #[inline]
    #[must_use]
    pub fn grouping(&self) -> Option<&str> {
        self.grouping.as_deref()
    }

    /// Canonical annotations
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// Combined class table
    #[inline]
    #[must_use]
    pub fn classes(&self) -> Option<&ClassTable> {
        self.annotations.classes()
    }

    /// Durable local file backing the pixels
    #[inline]
    #[must_use]
    pub fn file(&self) -> &MediaFile {
        &self.file
    }

    /// Check if decoded pixels are held in memory
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.pixels.lock().is_some()
    }

    /// Decoded pixels, re-reading the backing file if they were released
    ///
    /// # Errors
    /// Returns error if the backing file is gone or cannot be decoded
    pub fn pixels(&self) -> Result<Arc<DynamicImage>, MediaError> {
        let mut slot = self.pixels.lock();
        if let Some(image) = slot.as_ref() {
            return Ok(Arc::clone(image));
        }
        let bytes = self.file.read()?;
        let image = Arc::new(pixels::decode(&bytes, pixels::format_for_extension(&self.file.extension)?)?);
        *slot = Some(Arc::clone(&image));
        tracing::debug!("re-acquired pixels from {}", self.file.path.display());
        Ok(image)
    }

    /// Drop the decoded pixels; they are re-read from the backing file on demand
    pub fn release_pixels(&self) {
        *self.pixels.lock() = None;
    }

    /// Pixels as `height` rows of `width` sample vectors
    ///
    /// # Errors
    /// Returns error if the pixels cannot be re-acquired
    pub fn to_data_array(&self) -> Result<Vec<Vec<Vec<u8>>>, MediaError> {
        let was_loaded = self.is_loaded();
        let image = self.pixels()?;
        let channels = usize::from(image.color().channel_count()).max(1);
        let (width, _) = GenericImageView::dimensions(image.as_ref());
        let row_len = (width as usize * channels).max(1);
        let rows = image
            .as_bytes()
            .chunks(row_len)
            .map(|row| row.chunks(channels).map(<[u8]>::to_vec).collect())
            .collect();
        if !was_loaded && self.release_after_use {
            self.release_pixels();
        }
        Ok(rows)
    }

    /// Structural descriptor of this image's annotations
    #[must_use]
    pub fn describe(&self) -> ImageFileType {
        self.annotations.describe()
    }

    /// Serialize into a run or an artifact
    ///
    /// Artifacts also receive the class table; run payloads omit it.
    ///
    /// # Errors
    /// - [`MediaError::DestinationTypeError`] if the destination is neither a run nor an artifact
    /// - [`MediaError::MissingClassTable`] for an annotated image without classes sent to an artifact
    /// - storage errors from the destination
    pub fn to_payload(&self, destination: &dyn Destination) -> Result<ImagePayload, MediaError> {
        let kind = destination.kind();
        if let DestinationKind::Other(name) = kind {
            return Err(MediaError::DestinationTypeError(name));
        }
        let is_artifact = kind.is_artifact();
        let classes = self.annotations.classes();
        if is_artifact && self.annotations.has_layers() && classes.is_none() {
            return Err(MediaError::MissingClassTable);
        }

        let bytes = self.file.read()?;
        let entry = destination.add_media(&["images"], &bytes, &self.file.extension)?;

        let classes = match classes {
            Some(table) if is_artifact => Some(store_classes(destination, table)?),
            _ => None,
        };
        let boxes = self.annotations.boxes();
        let boxes = if boxes.is_empty() {
            None
        } else {
            Some(
                boxes
                    .iter()
                    .map(|(name, layer)| Ok((name.clone(), layer.to_payload(destination)?)))
                    .collect::<Result<IndexMap<_, _>, MediaError>>()?,
            )
        };
        let masks = self.annotations.masks();
        let masks = if masks.is_empty() {
            None
        } else {
            Some(
                masks
                    .iter()
                    .map(|(name, mask)| Ok((name.clone(), mask.to_payload(destination)?)))
                    .collect::<Result<IndexMap<_, _>, MediaError>>()?,
            )
        };

        tracing::debug!("serialized image to {} at {}", kind, entry.path);
        Ok(ImagePayload {
            kind: IMAGE_PAYLOAD_TYPE.to_string(),
            format: self.format.clone(),
            width: self.width,
            height: self.height,
            path: entry.path,
            digest: entry.digest,
            size: entry.size,
            caption: non_blank(self.caption.as_deref()),
            grouping: non_blank(self.grouping.as_deref()),
            classes,
            boxes,
            masks,
        })
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

fn store_classes(destination: &dyn Destination, table: &ClassTable) -> Result<ClassesRef, MediaError> {
    let bytes = serde_json::to_vec(&table.to_class_file())?;
    let digest = ContentHash::compute(&bytes);
    let path = destination
        .media_dir()
        .child("classes")?
        .child(format!("{digest}_cls"))?;
    Ok(ClassesRef::new(destination.add(&path, &bytes)?))
}

impl Clone for Image {
    fn clone(&self) -> Self {
        Self {
            format: self.format.clone(),
            width: self.width,
            height: self.height,
            caption: self.caption.clone(),
            grouping: self.grouping.clone(),
            annotations: self.annotations.clone(),
            file: self.file.clone(),
            pixels: Mutex::new(self.pixels.lock().clone()),
            release_after_use: self.release_after_use,
            scratch: Arc::clone(&self.scratch),
        }
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.grouping == other.grouping
            && self.caption == other.caption
            && self.width == other.width
            && self.height == other.height
            && self.annotations.classes() == other.annotations.classes()
            && self.same_pixels(other)
    }
}

impl Image {
    fn same_pixels(&self, other: &Self) -> bool {
        if self.file.digest == other.file.digest {
            return true;
        }
        match (self.pixels(), other.pixels()) {
            (Ok(a), Ok(b)) => a.color() == b.color() && a.as_bytes() == b.as_bytes(),
            _ => false,
        }
    }
}

/// Builds [`Image`] records under one configuration
#[derive(Debug, Clone)]
pub struct ImageLoader {
    config: MediaConfig,
    scratch: Arc<ScratchDir>,
}

impl ImageLoader {
    /// Create a loader, opening its scratch directory
    ///
    /// # Errors
    /// Returns error if the scratch directory cannot be created
    pub fn new(config: MediaConfig) -> Result<Self, MediaError> {
        let scratch = match &config.scratch_dir {
            Some(dir) => ScratchDir::at(dir)?,
            None => ScratchDir::temporary()?,
        };
        Ok(Self {
            config,
            scratch: Arc::new(scratch),
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Scratch directory for derived pixels
    #[inline]
    #[must_use]
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Build an image with no caption, grouping or annotations
    ///
    /// # Errors
    /// See [`load_with`](Self::load_with)
    pub fn load(&self, source: impl Into<ImageSource>) -> Result<Image, MediaError> {
        self.load_with(source, ImageMeta::new())
    }

    /// Build an image
    ///
    /// Annotations are canonicalized before any pixels are touched. A copy
    /// of another record keeps its pixels, caption and grouping but none of
    /// its annotations.
    ///
    /// # Errors
    /// - [`MediaError::InvalidArgument`] for malformed annotations
    /// - [`MediaError::UnsupportedShape`] for arrays with no color mode
    /// - [`MediaError::MissingDependency`] when no codec handles the input
    pub fn load_with(&self, source: impl Into<ImageSource>, meta: ImageMeta) -> Result<Image, MediaError> {
        let annotations = AnnotationSet::build(meta.annotations)?;
        let source = source.into();
        tracing::debug!("loading image from {} source", source.kind());

        let mut image = match source {
            // Annotations are replaced below, never inherited.
            ImageSource::Record(record) => *record,
            ImageSource::Path(path) => {
                let file = MediaFile::from_path(path, false)?;
                let format = pixels::format_for_extension(&file.extension)?;
                let decoded = pixels::decode(&file.read()?, format)?;
                self.assemble(file, decoded)
            }
            ImageSource::Decoded(decoded) => self.persist(pixels::to_8bit(decoded))?,
            ImageSource::Encoded { bytes, extension } => {
                let format = pixels::format_for_extension(&extension)?;
                self.persist(pixels::decode(&bytes, format)?)?
            }
            ImageSource::Array { data, mode } => self.persist(pixels::normalize_array(data, mode)?)?,
            ImageSource::Tensor(tensor) => {
                if tensor.requires_grad() {
                    tracing::debug!("detaching tensor from its gradient graph");
                }
                let grid = tensor::make_grid(tensor.detach())?;
                let mode: ColorMode = pixels::guess_mode(grid.shape())?;
                self.persist(pixels::array_to_image(&grid, mode)?)?
            }
            ImageSource::Figure(figure) => {
                let png = figure.render_png()?;
                self.persist(pixels::decode(&png, ImageFormat::Png)?)?
            }
        };

        if meta.caption.is_some() {
            image.caption = meta.caption;
        }
        if meta.grouping.is_some() {
            image.grouping = meta.grouping;
        }
        image.annotations = annotations;
        Ok(self.finish(image))
    }

    /// Rebuild an image from a payload, resolving references through `store`
    ///
    /// Every fetched file is checked against the digest recorded in the
    /// payload. Layer names come from the payload's mapping keys.
    ///
    /// # Errors
    /// Returns error if a referenced file is missing, altered or malformed
    pub fn reconstruct(&self, payload: &ImagePayload, store: &dyn MediaStore) -> Result<Image, MediaError> {
        if payload.kind != IMAGE_PAYLOAD_TYPE {
            return Err(MediaError::InvalidArgument(format!(
                "expected an {IMAGE_PAYLOAD_TYPE} payload, got {}",
                payload.kind
            )));
        }
        let bytes = store.fetch_verified(&payload.path, &payload.digest)?;
        let decoded = pixels::decode(&bytes, pixels::format_for_extension(&payload.format)?)?;
        let file = self.scratch.persist(&bytes, &payload.format)?;

        let mut input = AnnotationInput::new();
        if let Some(reference) = &payload.classes {
            let bytes = store.fetch_verified(&reference.path, &reference.digest)?;
            let value: Value = serde_json::from_slice(&bytes)?;
            input = input.with_classes(ClassTable::from_class_file(&value)?);
        }
        for (name, reference) in payload.boxes.iter().flatten() {
            input = input.with_box_layer(name.as_str(), BoundingBoxes2D::from_payload(name.as_str(), reference, store)?);
        }
        for (name, reference) in payload.masks.iter().flatten() {
            input = input.with_mask_layer(name.as_str(), ImageMask::from_payload(name.as_str(), reference, store)?);
        }

        let mut image = self.assemble(file, decoded);
        if (image.width, image.height) != (payload.width, payload.height) {
            tracing::warn!(
                "payload for {} records {}x{} but the file decodes to {}x{}",
                payload.path,
                payload.width,
                payload.height,
                image.width,
                image.height
            );
        }
        image.caption = payload.caption.clone();
        image.grouping = payload.grouping.clone();
        image.annotations = AnnotationSet::build(input)?;
        Ok(self.finish(image))
    }

    fn persist(&self, decoded: DynamicImage) -> Result<Image, MediaError> {
        let png = pixels::encode_png(&decoded)?;
        let file = self.scratch.persist(&png, "png")?;
        Ok(self.assemble(file, decoded))
    }

    fn assemble(&self, file: MediaFile, decoded: DynamicImage) -> Image {
        let (width, height) = GenericImageView::dimensions(&decoded);
        Image {
            format: file.extension.clone(),
            width,
            height,
            caption: None,
            grouping: None,
            annotations: AnnotationSet::empty(),
            file,
            pixels: Mutex::new(Some(Arc::new(decoded))),
            release_after_use: self.config.release_pixels,
            scratch: Arc::clone(&self.scratch),
        }
    }

    fn finish(&self, image: Image) -> Image {
        let max = self.config.max_dimension;
        if image.width > max || image.height > max {
            tracing::warn!(
                "image is {}x{}, larger than the {} pixel limit; it may not display",
                image.width,
                image.height,
                max
            );
        }
        if self.config.release_pixels {
            image.release_pixels();
        }
        image
    }
}
