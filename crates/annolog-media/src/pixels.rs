//! Pixel normalization
//!
//! Numeric arrays become 8-bit images in three steps: degenerate axes are
//! squeezed, samples are mapped to `0..=255` by [`to_uint8`], and the color
//! mode is read off the remaining shape by [`guess_mode`].

use crate::error::MediaError;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use ndarray::{ArrayD, Axis};
use std::io::Cursor;

/// Color layout of an 8-bit image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Single channel
    L,
    /// Three channels
    Rgb,
    /// Three channels plus alpha
    Rgba,
}

impl ColorMode {
    /// Samples per pixel
    #[inline]
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::L => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Conventional mode name (`L`, `RGB`, `RGBA`)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L => "L",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColorMode {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L" => Ok(Self::L),
            "RGB" => Ok(Self::Rgb),
            "RGBA" => Ok(Self::Rgba),
            other => Err(MediaError::InvalidArgument(format!(
                "unknown color mode {other:?}"
            ))),
        }
    }
}

/// Infer the color mode of an array from its shape
///
/// # Errors
/// Returns [`MediaError::UnsupportedShape`] unless the shape is `(h, w)`,
/// `(h, w, 3)` or `(h, w, 4)`
pub fn guess_mode(shape: &[usize]) -> Result<ColorMode, MediaError> {
    match shape {
        [_, _] => Ok(ColorMode::L),
        [_, _, 3] => Ok(ColorMode::Rgb),
        [_, _, 4] => Ok(ColorMode::Rgba),
        _ => Err(MediaError::UnsupportedShape {
            shape: shape.to_vec(),
        }),
    }
}

/// Drop leading and trailing size-1 axes while more than two axes remain
#[must_use]
pub fn squeeze<T>(mut data: ArrayD<T>) -> ArrayD<T> {
    while data.ndim() > 2 && data.shape()[0] == 1 {
        data = data.index_axis_move(Axis(0), 0);
    }
    while data.ndim() > 2 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    data
}

/// Map numeric samples to 8-bit values
///
/// A negative minimum first rescales the array onto `[0, 1]` by its
/// peak-to-peak range. If the maximum is then at most 1 the samples are
/// treated as fractions and multiplied by 255. The result is clipped to
/// `0..=255` and truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_uint8(data: &ArrayD<f64>) -> ArrayD<u8> {
    if data.is_empty() {
        return data.mapv(|_| 0);
    }
    let mut data = data.clone();
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    if min < 0.0 {
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ptp = max - min;
        data.mapv_inplace(|x| if ptp > 0.0 { (x - min) / ptp } else { 0.0 });
    }
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= 1.0 {
        data.mapv_inplace(|x| (x * 255.0).trunc());
    }
    data.mapv(|x| x.clamp(0.0, 255.0) as u8)
}

/// Build an image from 8-bit samples laid out as `(h, w)` or `(h, w, c)`
///
/// # Errors
/// Returns [`MediaError::UnsupportedShape`] if the shape does not carry
/// `mode`'s channel count
pub fn array_to_image(data: &ArrayD<u8>, mode: ColorMode) -> Result<DynamicImage, MediaError> {
    let shape = data.shape();
    let channels = match shape {
        [_, _] => 1,
        [_, _, c] => *c,
        _ => 0,
    };
    if channels != mode.channels() {
        return Err(MediaError::UnsupportedShape {
            shape: shape.to_vec(),
        });
    }
    let too_large = || MediaError::InvalidArgument(format!("image too large: {shape:?}"));
    let height = u32::try_from(shape[0]).map_err(|_| too_large())?;
    let width = u32::try_from(shape[1]).map_err(|_| too_large())?;
    let raw: Vec<u8> = data.iter().copied().collect();
    let image = match mode {
        ColorMode::L => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
        ColorMode::Rgb => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        ColorMode::Rgba => RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8),
    };
    image.ok_or_else(|| MediaError::InvalidArgument(format!("sample buffer does not fill {shape:?}")))
}

/// Normalize a numeric array into an image
///
/// # Errors
/// Returns error if no color mode fits the squeezed shape
pub fn normalize_array(data: ArrayD<f64>, mode: Option<ColorMode>) -> Result<DynamicImage, MediaError> {
    let data = squeeze(data);
    let mode = match mode {
        Some(mode) => mode,
        None => guess_mode(data.shape())?,
    };
    array_to_image(&to_uint8(&data), mode)
}

/// Reduce any decoded image to 8 bits per sample
#[must_use]
pub fn to_8bit(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Encode as PNG
///
/// # Errors
/// Returns error if encoding fails
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, MediaError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Decoder for a file extension
///
/// # Errors
/// Returns [`MediaError::MissingDependency`] if no decoder handles `extension`
pub fn format_for_extension(extension: &str) -> Result<ImageFormat, MediaError> {
    ImageFormat::from_extension(extension.to_ascii_lowercase())
        .ok_or_else(|| MediaError::MissingDependency(format!("no image codec for .{extension} files")))
}

/// Decode bytes in the given format, reduced to 8 bits per sample
///
/// # Errors
/// Returns error if the codec is unavailable or the bytes are not an image
pub fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, MediaError> {
    Ok(to_8bit(image::load_from_memory_with_format(bytes, format)?))
}
