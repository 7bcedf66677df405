//! Error types for media records

use annolog_artifact::{DestinationError, PathError, StoreError};
use annolog_types::TypeError;

/// Errors raised while building, serializing or reconstructing media records
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Boxes, masks or classes input has the wrong shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Numeric array has no color-mode mapping
    #[error("un-supported shape for image conversion: {shape:?}")]
    UnsupportedShape { shape: Vec<usize> },

    /// Codec or adapter required for this input is not available
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// Batch members do not share the media directory convention
    #[error("invalid layout: expected images under {expected}, got {actual}")]
    InvalidLayout { expected: String, actual: String },

    /// Descriptor join across mismatched kinds
    #[error(transparent)]
    IncompatibleType(#[from] TypeError),

    /// Annotated image serialized to an artifact without a class table
    #[error("annotated images logged to an artifact must carry a class table")]
    MissingClassTable,

    /// Serialization target is neither a run nor an artifact
    #[error("cannot serialize media to destination of kind {0}")]
    DestinationTypeError(String),

    /// Durable storage failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Pixel decoding or encoding failed
    #[error("image codec error: {0}")]
    Decode(#[source] image::ImageError),

    /// Payload JSON failed to (de)serialize
    #[error("payload json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<image::ImageError> for MediaError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => Self::MissingDependency(e.to_string()),
            other => Self::Decode(other),
        }
    }
}

impl From<DestinationError> for MediaError {
    fn from(err: DestinationError) -> Self {
        match err {
            DestinationError::Store(e) => Self::Store(e),
            DestinationError::Path(e) => Self::InvalidArgument(e.to_string()),
        }
    }
}

impl From<PathError> for MediaError {
    fn from(err: PathError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_codec_is_missing_dependency() {
        let err = image::ImageError::Unsupported(image::error::UnsupportedError::from_format_and_kind(
            image::error::ImageFormatHint::Name("tiff".into()),
            image::error::UnsupportedErrorKind::Format(image::error::ImageFormatHint::Name(
                "tiff".into(),
            )),
        ));
        assert!(matches!(MediaError::from(err), MediaError::MissingDependency(_)));
    }

    #[test]
    fn type_error_converts() {
        let err: MediaError = TypeError::UnknownKind("audio".into()).into();
        assert!(matches!(err, MediaError::IncompatibleType(_)));
    }
}
