//! Tensor and figure adapters
//!
//! Tensors are laid out as `(h, w)`, `(c, h, w)` or `(n, c, h, w)`. A batch
//! is tiled into one grid image the way `torchvision.utils.make_grid` does
//! with `normalize=True`.

use crate::error::MediaError;
use ndarray::{s, Array3, Array4, ArrayD, Axis, Ix4};
use std::fmt::Debug;

/// Images per grid row
pub const GRID_ROW_LEN: usize = 8;

/// Pixels between grid cells
pub const GRID_PADDING: usize = 2;

/// A tensor from some numeric library
pub trait TensorLike: Debug {
    /// Whether the tensor is attached to a gradient graph
    fn requires_grad(&self) -> bool {
        false
    }

    /// Sample values, detached from any gradient graph
    fn detach(&self) -> ArrayD<f32>;
}

/// Plain `ndarray` tensor
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayTensor {
    data: ArrayD<f32>,
    requires_grad: bool,
}

impl ArrayTensor {
    /// Wrap an array
    #[must_use]
    pub fn new(data: ArrayD<f32>) -> Self {
        Self {
            data,
            requires_grad: false,
        }
    }

    /// Mark as attached to a gradient graph
    #[must_use]
    pub fn with_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }
}

impl TensorLike for ArrayTensor {
    fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    fn detach(&self) -> ArrayD<f32> {
        self.data.clone()
    }
}

/// A plotting-library figure that can rasterize itself
pub trait Figure: Debug {
    /// Render to PNG bytes
    ///
    /// # Errors
    /// Returns [`MediaError::MissingDependency`] if no rasterizer is available
    fn render_png(&self) -> Result<Vec<u8>, MediaError>;
}

fn as_batch(tensor: ArrayD<f32>) -> Result<Array4<f32>, MediaError> {
    let shape = tensor.shape().to_vec();
    let batch = match shape.len() {
        2 => tensor.insert_axis(Axis(0)).insert_axis(Axis(0)),
        3 => tensor.insert_axis(Axis(0)),
        4 => tensor,
        _ => return Err(MediaError::UnsupportedShape { shape }),
    };
    let batch = batch
        .into_dimensionality::<Ix4>()
        .map_err(|_| MediaError::UnsupportedShape { shape: shape.clone() })?;
    if batch.shape()[1] == 1 {
        let view = batch.view();
        return ndarray::concatenate(Axis(1), &[view, view, view])
            .map_err(|_| MediaError::UnsupportedShape { shape });
    }
    Ok(batch)
}

/// Tile a tensor into one `(h, w, c)` image of 8-bit samples
///
/// Samples are min-max normalized over the whole tensor, single-channel
/// input is repeated to three channels, and a one-image batch is returned
/// without padding.
///
/// # Errors
/// Returns [`MediaError::UnsupportedShape`] for tensors that are not 2-, 3-
/// or 4-dimensional, or that hold no images or no pixels
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn make_grid(tensor: ArrayD<f32>) -> Result<ArrayD<u8>, MediaError> {
    let mut batch = as_batch(tensor)?;
    let (n, c, h, w) = batch.dim();
    if n == 0 || h == 0 || w == 0 {
        return Err(MediaError::UnsupportedShape { shape: vec![n, c, h, w] });
    }

    let min = batch.iter().copied().fold(f32::INFINITY, f32::min);
    let max = batch.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    batch.mapv_inplace(|x| (x.clamp(min, max) - min) / (max - min + 1e-5));

    let grid: Array3<f32> = if n == 1 {
        batch.index_axis_move(Axis(0), 0)
    } else {
        let cols = n.min(GRID_ROW_LEN);
        let rows = n.div_ceil(cols);
        let (cell_h, cell_w) = (h + GRID_PADDING, w + GRID_PADDING);
        let mut grid = Array3::zeros((c, rows * cell_h + GRID_PADDING, cols * cell_w + GRID_PADDING));
        for (k, image) in batch.outer_iter().enumerate() {
            let (y, x) = (k / cols * cell_h + GRID_PADDING, k % cols * cell_w + GRID_PADDING);
            grid.slice_mut(s![.., y..y + h, x..x + w]).assign(&image);
        }
        grid
    };

    Ok(grid
        .permuted_axes([1, 2, 0])
        .mapv(|x| (x * 255.0).clamp(0.0, 255.0) as u8)
        .into_dyn())
}
