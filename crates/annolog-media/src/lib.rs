//! Annolog Media
//!
//! Annotated image records: pixel normalization, per-image class tables,
//! batch serialization into runs and artifacts, and reconstruction from
//! stored payloads.
//!
//! # Core Concepts
//!
//! - [`ImageSource`]: Closed set of inputs, one normalization path each
//! - [`ImageLoader`]: Builds [`Image`] records, persisting derived pixels to scratch
//! - [`AnnotationSet`]: Box and mask layers sharing one [`ClassTable`]
//! - [`ColumnSerializer`]: Folds the images of one step into a [`BatchPayload`]
//! - [`image_type_entry`]: The `image-file` kind for a [`TypeRegistry`](annolog_types::TypeRegistry)
//!
//! # Example
//!
//! ```rust,ignore
//! use annolog_media::{AnnotationInput, ColumnSerializer, ImageLoader, ImageMeta, MediaConfig};
//! use annolog_artifact::{MemoryStore, Run};
//!
//! let loader = ImageLoader::new(MediaConfig::new())?;
//! let image = loader.load_with(
//!     pixels,
//!     ImageMeta::new()
//!         .with_caption("frame 0")
//!         .with_annotations(AnnotationInput::new().with_raw_box_layer("predictions", boxes)),
//! )?;
//!
//! let run = Run::new("run-1", Arc::new(MemoryStore::new()));
//! let batch = ColumnSerializer::new(loader.config().clone())
//!     .serialize(&[image], &run.step("examples", 0))?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod annotations;
mod boxes;
mod classes;
mod config;
mod error;
mod mask;
mod payload;
mod pixels;
mod record;
mod serializer;
mod source;
mod tensor;
mod type_entry;

pub use annotations::{AnnotationInput, AnnotationSet, ClassesInput, LayerInput, LayersInput};
pub use boxes::{BoundingBoxes2D, BoxData, BoxPosition};
pub use classes::{ClassId, ClassTable};
pub use config::{MediaConfig, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_ITEMS};
pub use error::MediaError;
pub use mask::ImageMask;
pub use payload::{
    BatchPayload, BoxesRef, ClassesRef, ImagePayload, MaskRef, SerializedBatch, BATCH_PAYLOAD_TYPE,
    BOXES_REF_TYPE, CLASSES_REF_TYPE, IMAGE_PAYLOAD_TYPE, MASK_REF_TYPE,
};
pub use pixels::{
    array_to_image, decode, encode_png, format_for_extension, guess_mode, normalize_array, squeeze, to_8bit,
    to_uint8, ColorMode,
};
pub use record::{Image, ImageLoader, ImageMeta};
pub use serializer::ColumnSerializer;
pub use source::ImageSource;
pub use tensor::{make_grid, ArrayTensor, Figure, TensorLike, GRID_PADDING, GRID_ROW_LEN};
pub use type_entry::{image_type_entry, infer_image, media_registry, LEGACY_IMAGE_KIND};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
