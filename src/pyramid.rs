// pyramid.rs — Scaled Gaussian image pyramid for coarse-to-fine flow.
//
// Level k has size round(w · s^k) × round(h · s^k) for a pyramid scale s in
// (0, 1). Unlike a 2× cascade, every level is produced from the original
// image in one step:
//
//   1. Gaussian blur with σ = (1/scale − 1) / 2 and kernel size
//      max(3, round(5σ) | 1). A zero σ falls back to the σ implied by a
//      3-tap kernel (0.8), so even level 0 is lightly smoothed.
//   2. Bilinear resize to the level size.
//
// Levels are only added while both dimensions stay at or above `min_size`;
// level 0 always exists.

use crate::convert::resize_bilinear;
use crate::convolution::{convolve_separable, gaussian_kernel_1d};
use crate::image::{Image, Pixel};

/// A scaled pyramid, finest level first.
pub struct Pyramid {
    /// Index 0 is full resolution.
    pub levels: Vec<Image<f32>>,
    /// Scale of each level relative to the source.
    pub scales: Vec<f32>,
}

impl Pyramid {
    /// Build up to `extra_levels` coarser levels above the full-resolution one.
    ///
    /// # Panics
    /// Panics unless `0 < pyr_scale < 1`.
    pub fn build<T: Pixel>(src: &Image<T>, pyr_scale: f32, extra_levels: usize, min_size: usize) -> Self {
        assert!(
            pyr_scale > 0.0 && pyr_scale < 1.0,
            "pyramid scale must be in (0, 1), got {pyr_scale}"
        );
        let n = level_count(src.width(), src.height(), pyr_scale, extra_levels, min_size);
        let mut levels = Vec::with_capacity(n);
        let mut scales = Vec::with_capacity(n);
        let mut scale = 1.0f32;
        for _ in 0..n {
            levels.push(scaled_level(src, scale));
            scales.push(scale);
            scale *= pyr_scale;
        }
        Pyramid { levels, scales }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// # Panics
    /// Panics if `k >= num_levels()`.
    pub fn level(&self, k: usize) -> &Image<f32> {
        &self.levels[k]
    }
}

/// Total level count (including level 0) for the given source size.
pub fn level_count(width: usize, height: usize, pyr_scale: f32, extra_levels: usize, min_size: usize) -> usize {
    let mut scale = 1.0f32;
    let mut k = 0;
    while k < extra_levels {
        scale *= pyr_scale;
        if (width as f32 * scale) < min_size as f32 || (height as f32 * scale) < min_size as f32 {
            break;
        }
        k += 1;
    }
    k + 1
}

/// Blur-then-resize a single level at `scale` of the source.
pub fn scaled_level<T: Pixel>(src: &Image<T>, scale: f32) -> Image<f32> {
    let mut sigma = (1.0 / scale - 1.0) * 0.5;
    let ksize = ((sigma * 5.0).round() as usize | 1).max(3);
    if sigma <= 0.0 {
        sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    }
    let kernel = gaussian_kernel_1d(ksize / 2, sigma);
    let blurred = convolve_separable(src, &kernel, &kernel);

    let w = ((src.width() as f32 * scale).round() as usize).max(1);
    let h = ((src.height() as f32 * scale).round() as usize).max(1);
    resize_bilinear(&blurred, w, h)
}
