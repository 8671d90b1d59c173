// convert.rs — Colour and resolution conversions between frames and planes.
//
//   BGRA frame  → luminance plane   (luma_from_view)
//   any plane   → smaller plane     (resize_area, box-average downsample)
//   f32 plane   → any size          (resize_bilinear, pixel-centre aligned)
//   BGRA frame  → any size          (resize_bilinear_bgra)
//   HSV         → BGR               (hsv_to_bgr, flow colour wheel)
//
// Luma uses the ITU-R BT.601 weights in 14-bit fixed point so the result is
// exact and reproducible: Y = (4899·R + 9617·G + 1868·B + 2^13) >> 14.

use rayon::prelude::*;

use crate::image::{Image, Pixel};
use crate::pixel::{PixelBuffer, PixelView, CHANNELS};

const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// BT.601 luma of one BGRA texel.
#[inline]
pub fn luma(b: u8, g: u8, r: u8) -> u8 {
    ((LUMA_B * b as u32 + LUMA_G * g as u32 + LUMA_R * r as u32 + (1 << (LUMA_SHIFT - 1)))
        >> LUMA_SHIFT) as u8
}

/// Luminance plane of a BGRA view. Alpha is ignored.
///
/// # Panics
/// Panics if the view is invalid; callers gate on `is_valid()` first.
pub fn luma_from_view(view: &PixelView<'_>) -> Image<u8> {
    assert!(view.is_valid(), "luma_from_view needs a valid view");
    let (w, h) = (view.width(), view.height());
    let mut dst = Image::<u8>::new(w, h);
    dst.as_mut_slice()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, out)| {
            for (o, px) in out.iter_mut().zip(view.row(y).chunks_exact(CHANNELS)) {
                *o = luma(px[0], px[1], px[2]);
            }
        });
    dst
}

/// Convert a raw-valued plane to any other pixel type.
pub fn convert_image<S: Pixel, D: Pixel>(src: &Image<S>) -> Image<D> {
    let data = src.as_slice().iter().map(|&v| D::from_f32(v.to_f32())).collect();
    Image::from_vec(src.width(), src.height(), data)
}

// ---------------------------------------------------------------------------
// Area (box-average) downsampling
// ---------------------------------------------------------------------------

/// Source taps for one destination index: (source index, weight).
type AreaTaps = Vec<Vec<(usize, f32)>>;

/// Fractional-coverage weights along one axis. Destination cell `d` covers
/// source interval `[d·s, (d+1)·s)` with `s = src_len / dst_len`; each source
/// cell contributes its overlap, normalized so the weights sum to 1.
fn area_taps(src_len: usize, dst_len: usize) -> AreaTaps {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let lo = d as f64 * scale;
            let hi = ((d + 1) as f64 * scale).min(src_len as f64);
            let first = lo.floor() as usize;
            let last = (hi.ceil() as usize).min(src_len);
            (first..last)
                .filter_map(|s| {
                    let overlap = (hi.min(s as f64 + 1.0) - lo.max(s as f64)).max(0.0);
                    (overlap > 1e-9).then(|| (s, (overlap / (hi - lo)) as f32))
                })
                .collect()
        })
        .collect()
}

/// Downsample by averaging every source pixel under each destination cell.
/// Upsampling requests fall back to bilinear.
pub fn resize_area<T: Pixel>(src: &Image<T>, dst_w: usize, dst_h: usize) -> Image<f32> {
    let (sw, sh) = src.dimensions();
    if dst_w > sw || dst_h > sh {
        return resize_bilinear(&convert_image(src), dst_w, dst_h);
    }
    let xt = area_taps(sw, dst_w);
    let yt = area_taps(sh, dst_h);

    // Horizontal pass: sh × dst_w.
    let mut horiz = Image::<f32>::new(dst_w, sh);
    horiz
        .as_mut_slice()
        .par_chunks_mut(dst_w.max(1))
        .enumerate()
        .for_each(|(y, out)| {
            let row = src.row(y);
            for (o, taps) in out.iter_mut().zip(&xt) {
                *o = taps.iter().map(|&(s, wt)| row[s].to_f32() * wt).sum();
            }
        });

    let mut dst = Image::<f32>::new(dst_w, dst_h);
    dst.as_mut_slice()
        .par_chunks_mut(dst_w.max(1))
        .enumerate()
        .for_each(|(y, out)| {
            for &(s, wt) in &yt[y] {
                for (o, &v) in out.iter_mut().zip(horiz.row(s)) {
                    *o += v * wt;
                }
            }
        });
    dst
}

// ---------------------------------------------------------------------------
// Bilinear resampling
// ---------------------------------------------------------------------------

/// (lower index, upper index, upper weight) per destination index, with
/// pixel centres aligned: src = (dst + 0.5) · src_len / dst_len − 0.5.
fn bilinear_taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = src_len as f32 / dst_len as f32;
    let max = src_len.saturating_sub(1);
    (0..dst_len)
        .map(|d| {
            let s = ((d as f32 + 0.5) * scale - 0.5).clamp(0.0, max as f32);
            let i0 = s.floor() as usize;
            let i1 = (i0 + 1).min(max);
            (i0, i1, s - i0 as f32)
        })
        .collect()
}

/// Resample a float plane to `dst_w × dst_h` with bilinear interpolation.
pub fn resize_bilinear(src: &Image<f32>, dst_w: usize, dst_h: usize) -> Image<f32> {
    if src.dimensions() == (dst_w, dst_h) {
        return src.clone();
    }
    let xt = bilinear_taps(src.width(), dst_w);
    let yt = bilinear_taps(src.height(), dst_h);

    let mut dst = Image::<f32>::new(dst_w, dst_h);
    dst.as_mut_slice()
        .par_chunks_mut(dst_w.max(1))
        .enumerate()
        .for_each(|(y, out)| {
            let (y0, y1, fy) = yt[y];
            let r0 = src.row(y0);
            let r1 = src.row(y1);
            for (o, &(x0, x1, fx)) in out.iter_mut().zip(&xt) {
                let top = r0[x0] + (r0[x1] - r0[x0]) * fx;
                let bot = r1[x0] + (r1[x1] - r1[x0]) * fx;
                *o = top + (bot - top) * fy;
            }
        });
    dst
}

/// Resample a BGRA buffer into `dst` (already sized) bilinearly, per channel.
pub fn resize_bilinear_bgra(src: &PixelBuffer, dst: &mut PixelBuffer) {
    let (dw, dh) = dst.dimensions();
    if src.dimensions() == (dw, dh) {
        dst.as_bytes_mut().copy_from_slice(src.as_bytes());
        return;
    }
    let xt = bilinear_taps(src.width(), dw);
    let yt = bilinear_taps(src.height(), dh);

    dst.par_rows_mut().enumerate().for_each(|(y, out)| {
        let (y0, y1, fy) = yt[y];
        let r0 = src.row(y0);
        let r1 = src.row(y1);
        for (px, &(x0, x1, fx)) in out.chunks_exact_mut(CHANNELS).zip(&xt) {
            for c in 0..CHANNELS {
                let a = r0[x0 * CHANNELS + c] as f32;
                let b = r0[x1 * CHANNELS + c] as f32;
                let d = r1[x0 * CHANNELS + c] as f32;
                let e = r1[x1 * CHANNELS + c] as f32;
                let top = a + (b - a) * fx;
                let bot = d + (e - d) * fx;
                px[c] = u8::from_f32(top + (bot - top) * fy);
            }
        }
    });
}

// ---------------------------------------------------------------------------
// HSV
// ---------------------------------------------------------------------------

/// HSV → BGR. `hue` in degrees (wrapped into [0, 360)), `sat` in [0, 1],
/// `val` in [0, 255].
pub fn hsv_to_bgr(hue: f32, sat: f32, val: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let sector = (h.floor() as i32).clamp(0, 5);
    let f = h - sector as f32;
    let v = val.clamp(0.0, 255.0);
    let s = sat.clamp(0.0, 1.0);
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [u8::from_f32(b), u8::from_f32(g), u8::from_f32(r)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        // Pure red → 0.299 · 255 ≈ 76.
        assert_eq!(luma(0, 0, 255), 76);
        // Pure green → 0.587 · 255 ≈ 150.
        assert_eq!(luma(0, 255, 0), 150);
        // Pure blue → 0.114 · 255 ≈ 29.
        assert_eq!(luma(255, 0, 0), 29);
    }

    #[test]
    fn test_luma_from_view_ignores_alpha() {
        let buf = PixelBuffer::from_vec(2, 1, vec![255, 255, 255, 0, 0, 0, 0, 255]);
        let gray = luma_from_view(&buf.view());
        assert_eq!(gray.as_slice(), &[255, 0]);
    }

    #[test]
    fn test_resize_area_integer_factor() {
        // 4×2 → 2×1: each output is the mean of a 2×2 block.
        let img = Image::from_vec(4, 2, vec![0u8, 4, 8, 8, 4, 0, 8, 8]);
        let out = resize_area(&img, 2, 1);
        assert!((out.get(0, 0) - 2.0).abs() < 1e-5);
        assert!((out.get(1, 0) - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_resize_area_fractional_preserves_mean() {
        let data: Vec<u8> = (0..100).map(|i| (i * 7 % 256) as u8).collect();
        let img = Image::from_vec(10, 10, data);
        let out = resize_area(&img, 3, 3);
        let mean_in: f32 = img.as_slice().iter().map(|&v| v as f32).sum::<f32>() / 100.0;
        let mean_out: f32 = out.as_slice().iter().sum::<f32>() / 9.0;
        assert!((mean_in - mean_out).abs() < 1e-2, "{mean_in} vs {mean_out}");
    }

    #[test]
    fn test_area_taps_sum_to_one() {
        for taps in area_taps(37, 5) {
            let s: f32 = taps.iter().map(|t| t.1).sum();
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_resize_bilinear_constant() {
        let img = Image::filled(5, 3, 7.5f32);
        let up = resize_bilinear(&img, 17, 11);
        assert!(up.as_slice().iter().all(|&v| (v - 7.5).abs() < 1e-5));
    }

    #[test]
    fn test_resize_bilinear_midpoint() {
        // 2×1 → 4×1: centres at src -0.25, 0.25, 0.75, 1.25 (clamped).
        let img = Image::from_vec(2, 1, vec![0.0f32, 8.0]);
        let up = resize_bilinear(&img, 4, 1);
        assert_eq!(up.as_slice(), &[0.0, 2.0, 6.0, 8.0]);
    }

    #[test]
    fn test_resize_bilinear_bgra_constant() {
        let src = PixelBuffer::filled(3, 3, [10, 20, 30, 255]);
        let mut dst = PixelBuffer::new(8, 5);
        resize_bilinear_bgra(&src, &mut dst);
        assert_eq!(dst.pixel(7, 4), [10, 20, 30, 255]);
        assert_eq!(dst.pixel(0, 0), [10, 20, 30, 255]);
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_bgr(0.0, 1.0, 255.0), [0, 0, 255]);
        assert_eq!(hsv_to_bgr(120.0, 1.0, 255.0), [0, 255, 0]);
        assert_eq!(hsv_to_bgr(240.0, 1.0, 255.0), [255, 0, 0]);
        assert_eq!(hsv_to_bgr(360.0, 1.0, 255.0), [0, 0, 255]);
        assert_eq!(hsv_to_bgr(77.0, 1.0, 0.0), [0, 0, 0]);
    }
}
