//! Inputs an image record can be built from

use crate::record::Image;
use crate::pixels::ColorMode;
use crate::tensor::{Figure, TensorLike};
use image::DynamicImage;
use ndarray::ArrayD;
use std::path::PathBuf;

/// Closed set of image inputs, one normalization path per variant
#[derive(Debug)]
pub enum ImageSource {
    /// Copy of another record; annotations are not carried over
    Record(Box<Image>),
    /// Encoded file on disk; format comes from the extension
    Path(PathBuf),
    /// Already decoded pixels
    Decoded(DynamicImage),
    /// Encoded bytes in a known format (e.g. a rendered plot)
    Encoded { bytes: Vec<u8>, extension: String },
    /// Raw numeric samples with an optional explicit color mode
    Array {
        data: ArrayD<f64>,
        mode: Option<ColorMode>,
    },
    /// Tensor, tiled into a grid
    Tensor(Box<dyn TensorLike>),
    /// Plotting figure, rasterized to PNG
    Figure(Box<dyn Figure>),
}

impl ImageSource {
    /// Short name of the variant, for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Path(_) => "path",
            Self::Decoded(_) => "decoded",
            Self::Encoded { .. } => "encoded",
            Self::Array { .. } => "array",
            Self::Tensor(_) => "tensor",
            Self::Figure(_) => "figure",
        }
    }

    /// Raw array with an explicit color mode
    #[must_use]
    pub fn array_with_mode(data: ArrayD<f64>, mode: ColorMode) -> Self {
        Self::Array {
            data,
            mode: Some(mode),
        }
    }
}

impl From<&Image> for ImageSource {
    fn from(image: &Image) -> Self {
        Self::Record(Box::new(image.clone()))
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for ImageSource {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

impl From<ArrayD<f64>> for ImageSource {
    fn from(data: ArrayD<f64>) -> Self {
        Self::Array { data, mode: None }
    }
}

impl From<Box<dyn TensorLike>> for ImageSource {
    fn from(tensor: Box<dyn TensorLike>) -> Self {
        Self::Tensor(tensor)
    }
}

impl From<Box<dyn Figure>> for ImageSource {
    fn from(figure: Box<dyn Figure>) -> Self {
        Self::Figure(figure)
    }
}
