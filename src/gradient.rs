// gradient.rs — Sobel gradients for edge detection.
//
// Sobel kernels are separable:
//   Sobel_x: row [-1, 0, 1] (derivative), col [1, 2, 1] (smoothing)
//   Sobel_y: row [ 1, 2, 1] (smoothing),  col [-1, 0, 1] (derivative)
//
// convolve_separable supplies the clamp border, so the outermost ring of a
// frame sees replicated neighbours instead of zeros. Canny consumes the
// pair through `Gradients`, which also carries the L1 magnitude.

use crate::convolution::convolve_separable;
use crate::image::{Image, Pixel};

const SOBEL_DERIV: [f32; 3] = [-1.0, 0.0, 1.0];
const SOBEL_SMOOTH: [f32; 3] = [1.0, 2.0, 1.0];

/// Horizontal gradient Ix. Positive means intensity increases to the right.
/// Unnormalized: roughly [-1020, 1020] for u8 input.
pub fn sobel_x<T: Pixel>(src: &Image<T>) -> Image<f32> {
    convolve_separable(src, &SOBEL_DERIV, &SOBEL_SMOOTH)
}

/// Vertical gradient Iy. Positive means intensity increases downward.
pub fn sobel_y<T: Pixel>(src: &Image<T>) -> Image<f32> {
    convolve_separable(src, &SOBEL_SMOOTH, &SOBEL_DERIV)
}

/// Both Sobel derivatives plus the L1 magnitude |Ix| + |Iy|.
pub struct Gradients {
    pub gx: Image<f32>,
    pub gy: Image<f32>,
    pub magnitude: Image<f32>,
}

impl Gradients {
    pub fn compute<T: Pixel>(src: &Image<T>) -> Self {
        let gx = sobel_x(src);
        let gy = sobel_y(src);
        let data = gx
            .as_slice()
            .iter()
            .zip(gy.as_slice())
            .map(|(a, b)| a.abs() + b.abs())
            .collect();
        let magnitude = Image::from_vec(src.width(), src.height(), data);
        Gradients { gx, gy, magnitude }
    }
}

/// Quantized gradient orientation used by non-maximum suppression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sector {
    /// Edge normal points along x; compare left and right neighbours.
    Horizontal,
    /// Edge normal points along y; compare up and down neighbours.
    Vertical,
    /// Normal along the (+1,+1) diagonal.
    Diagonal,
    /// Normal along the (+1,-1) diagonal.
    AntiDiagonal,
}

/// tan(22.5°)
const TAN_22_5: f32 = 0.414_213_56;
/// tan(67.5°)
const TAN_67_5: f32 = 2.414_213_6;

/// Bin a gradient vector into one of four orientation sectors.
pub fn sector(gx: f32, gy: f32) -> Sector {
    let ax = gx.abs();
    let ay = gy.abs();
    if ay <= ax * TAN_22_5 {
        Sector::Horizontal
    } else if ay >= ax * TAN_67_5 {
        Sector::Vertical
    } else if (gx > 0.0) == (gy > 0.0) {
        Sector::Diagonal
    } else {
        Sector::AntiDiagonal
    }
}
