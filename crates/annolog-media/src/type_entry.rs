//! Registration of the `image-file` kind

use crate::record::Image;
use annolog_types::{construct_image_file, LoggedType, TypeEntry, TypeError, TypeRegistry, IMAGE_FILE_KIND};
use std::any::Any;

/// Name older payloads used for the image kind
pub const LEGACY_IMAGE_KIND: &str = "wandb.Image";

/// Describe an [`Image`] by its annotation shape
#[must_use]
pub fn infer_image(value: &dyn Any) -> Option<LoggedType> {
    value
        .downcast_ref::<Image>()
        .map(|image| LoggedType::ImageFile(image.describe()))
}

/// Registry entry for images
#[must_use]
pub fn image_type_entry() -> TypeEntry {
    TypeEntry {
        name: IMAGE_FILE_KIND,
        legacy_names: &[LEGACY_IMAGE_KIND],
        construct: construct_image_file,
        infer: infer_image,
    }
}

/// Registry holding every kind this crate logs
///
/// # Errors
/// Returns error if registration collides, which cannot happen for a fresh registry
pub fn media_registry() -> Result<TypeRegistry, TypeError> {
    TypeRegistry::with_entries([image_type_entry()])
}
