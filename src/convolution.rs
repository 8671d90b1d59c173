// convolution.rs — Separable filtering with replicated borders.
//
// Callers:
//   gradient.rs  Sobel pair for Canny
//   pyramid.rs   Gaussian pre-blur of each flow pyramid level
//   farneback.rs box averaging of the per-pixel normal equations
//
// Horizontal pass: each source row is copied once into a line padded by
// `k / 2` replicated samples on both sides, then every output sample is a
// plain dot product over that line. Vertical pass: output row y accumulates
// whole source rows y - k/2 ..= y + k/2, clamped to the plane.
//
// Both passes are row-parallel through rayon. Kernels must have odd length
// so the centre tap is well defined.

use rayon::prelude::*;

use crate::image::{Image, Pixel};

/// Filter `src` with `kx` along rows, then `ky` along columns.
///
/// # Panics
/// Panics if either kernel is empty or of even length.
pub fn convolve_separable<T: Pixel>(src: &Image<T>, kx: &[f32], ky: &[f32]) -> Image<f32> {
    assert_odd(kx);
    assert_odd(ky);
    let horizontal = filter_rows(src, kx);
    filter_cols(&horizontal, ky)
}

fn filter_rows<T: Pixel>(src: &Image<T>, k: &[f32]) -> Image<f32> {
    let (w, h) = src.dimensions();
    let mut dst = Image::new(w, h);
    if w == 0 || h == 0 {
        return dst;
    }
    let half = k.len() / 2;
    dst.as_mut_slice().par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        let row = src.row(y);
        let first = row[0].to_f32();
        let last = row[w - 1].to_f32();
        let line: Vec<f32> = std::iter::repeat(first)
            .take(half)
            .chain(row.iter().map(|v| v.to_f32()))
            .chain(std::iter::repeat(last).take(half))
            .collect();
        for (o, window) in out.iter_mut().zip(line.windows(k.len())) {
            *o = window.iter().zip(k).map(|(a, b)| a * b).sum();
        }
    });
    dst
}

fn filter_cols(src: &Image<f32>, k: &[f32]) -> Image<f32> {
    let (w, h) = src.dimensions();
    let mut dst = Image::new(w, h);
    if w == 0 || h == 0 {
        return dst;
    }
    let half = k.len() as isize / 2;
    let last = h as isize - 1;
    dst.as_mut_slice().par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        for (i, &tap) in k.iter().enumerate() {
            let sy = (y as isize + i as isize - half).clamp(0, last) as usize;
            for (o, s) in out.iter_mut().zip(src.row(sy)) {
                *o += s * tap;
            }
        }
    });
    dst
}

/// Normalized Gaussian taps `exp(-x² / 2σ²)` for x in -half..=half.
///
/// # Panics
/// Panics unless `sigma > 0`.
pub fn gaussian_kernel_1d(half: usize, sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "Gaussian sigma must be positive, got {sigma}");
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (0..=2 * half)
        .map(|i| {
            let x = i as f32 - half as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let total: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / total).collect()
}

/// Averaging kernel of odd length `len`.
pub fn box_kernel_1d(len: usize) -> Vec<f32> {
    assert!(len % 2 == 1, "box kernel length must be odd, got {len}");
    vec![(len as f32).recip(); len]
}

fn assert_odd(k: &[f32]) {
    assert!(k.len() % 2 == 1, "kernel length must be odd, got {}", k.len());
}
