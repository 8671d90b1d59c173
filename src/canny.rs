// canny.rs — Dual-threshold hysteresis edge detection.
//
// No Gaussian pre-blur: the detector runs directly on the luminance plane.
//
// Stages:
//   1. Sobel gradients and L1 magnitude (gradient.rs).
//   2. Non-maximum suppression across the quantized gradient direction.
//      Ties are broken toward the "earlier" neighbour (strict > against the
//      preceding pixel, >= against the following one) so a two-pixel-wide
//      plateau on a step edge thins to a single pixel.
//   3. Hysteresis: pixels above `high` seed edges; 8-connected pixels above
//      `low` that touch a seed (directly or transitively) join them.
//
// Thresholds are given in raw L1 magnitude units, as in the usual 0–255
// slider convention. The pair is order-independent: the larger one is the
// seed threshold.

use crate::gradient::{sector, Gradients, Sector};
use crate::image::Image;

pub const EDGE: u8 = 255;

/// Binary edge map (0 or 255) of a luminance plane.
pub fn canny(src: &Image<u8>, threshold1: f32, threshold2: f32) -> Image<u8> {
    let low = threshold1.min(threshold2);
    let high = threshold1.max(threshold2);
    let (w, h) = src.dimensions();
    let mut edges = Image::<u8>::new(w, h);
    if w == 0 || h == 0 {
        return edges;
    }

    let g = Gradients::compute(src);
    let mag = &g.magnitude;

    // 0 = suppressed, 1 = weak candidate, 2 = strong seed.
    let mut class = Image::<u8>::new(w, h);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let m = mag.get(x, y);
            if m <= low {
                continue;
            }
            let (dx, dy) = match sector(g.gx.get(x, y), g.gy.get(x, y)) {
                Sector::Horizontal => (1, 0),
                Sector::Vertical => (0, 1),
                Sector::Diagonal => (1, 1),
                Sector::AntiDiagonal => (1, -1),
            };
            let before = neighbour(mag, x, y, -dx, -dy);
            let after = neighbour(mag, x, y, dx, dy);
            if !(m > before && m >= after) {
                continue;
            }
            if m > high {
                class.set(x, y, 2);
                stack.push((x, y));
            } else {
                class.set(x, y, 1);
            }
        }
    }

    // Flood from every seed through weak pixels.
    while let Some((x, y)) = stack.pop() {
        if edges.get(x, y) == EDGE {
            continue;
        }
        edges.set(x, y, EDGE);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if class.get(nx, ny) != 0 && edges.get(nx, ny) == 0 {
                    stack.push((nx, ny));
                }
            }
        }
    }

    edges
}

/// Magnitude of the neighbour at offset (dx, dy); zero outside the image.
#[inline]
fn neighbour(mag: &Image<f32>, x: usize, y: usize, dx: isize, dy: isize) -> f32 {
    let nx = x as isize + dx;
    let ny = y as isize + dy;
    if nx < 0 || ny < 0 || nx >= mag.width() as isize || ny >= mag.height() as isize {
        return 0.0;
    }
    mag.get(nx as usize, ny as usize)
}
