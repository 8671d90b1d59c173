// farneback.rs — Dense optical flow by polynomial expansion (Farnebäck 2003).
//
// Each neighbourhood of an image is approximated by a quadratic polynomial
//
//     f(x) ≈ xᵀA x + bᵀx + c
//
// fitted by Gaussian-weighted least squares (the "polynomial expansion").
// If the second frame is the first displaced by d, then A is shared and
// b₂ = b₁ − 2A d, so each pixel yields a 2×2 linear system A d = −½Δb.
// The systems are box-averaged over a window before solving, and the
// solution is refined by re-sampling the second frame's expansion at the
// current displacement estimate. Coarse-to-fine over a scaled pyramid
// extends the capture range.
//
// Coefficient layout per pixel (5 floats): [b_y, b_x, a_yy, a_xx, a_xy].
//
// Normal-equation layout per pixel (5 floats): [g11, g12, g22, h1, h2],
// with the flow solved as
//
//     dx = (g11·h2 − g12·h1) / det,   dy = (g22·h1 − g12·h2) / det,
//     det = g11·g22 − g12² + 1e-3.
//
// Identical input frames produce an all-zero right-hand side and therefore
// exactly zero flow at every level.

use rayon::prelude::*;

use crate::convert::resize_bilinear;
use crate::convolution::{box_kernel_1d, convolve_separable};
use crate::image::{Image, Pixel};
use crate::pyramid::Pyramid;

/// Coarsest pyramid level size accepted (either dimension).
const MIN_LEVEL_SIZE: usize = 32;

/// Pixels from the image edge over which the data term is attenuated.
const BORDER: usize = 5;
const BORDER_WEIGHTS: [f32; BORDER] = [0.14, 0.14, 0.4472, 0.4472, 0.4472];

/// Estimator parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FarnebackParams {
    /// Scale between successive pyramid levels, in (0, 1).
    pub pyr_scale: f32,
    /// Coarser levels added above full resolution.
    pub levels: usize,
    /// Averaging window side.
    pub win_size: usize,
    /// Refinement passes per level.
    pub iterations: usize,
    /// Polynomial expansion half-width; the window is 2n + 1.
    pub poly_n: usize,
    /// Gaussian σ weighting the expansion window.
    pub poly_sigma: f32,
}

impl Default for FarnebackParams {
    fn default() -> Self {
        FarnebackParams {
            pyr_scale: 0.5,
            levels: 1,
            win_size: 9,
            iterations: 1,
            poly_n: 5,
            poly_sigma: 1.1,
        }
    }
}

/// Per-pixel 2-vector flow, split into x and y planes.
#[derive(Clone, Debug)]
pub struct FlowField {
    pub u: Image<f32>,
    pub v: Image<f32>,
}

impl FlowField {
    pub fn zeros(width: usize, height: usize) -> Self {
        FlowField { u: Image::new(width, height), v: Image::new(width, height) }
    }

    pub fn width(&self) -> usize {
        self.u.width()
    }

    pub fn height(&self) -> usize {
        self.u.height()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.u.dimensions()
    }

    /// Flow vector at (x, y).
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> (f32, f32) {
        (self.u.get(x, y), self.v.get(x, y))
    }

    /// Largest vector length in the field.
    pub fn max_magnitude(&self) -> f32 {
        self.u
            .as_slice()
            .iter()
            .zip(self.v.as_slice())
            .map(|(a, b)| (a * a + b * b).sqrt())
            .fold(0.0, f32::max)
    }

    /// Bilinear resize of both components, vectors multiplied by `gain`.
    pub fn resized(&self, width: usize, height: usize, gain: f32) -> FlowField {
        let mut u = resize_bilinear(&self.u, width, height);
        let mut v = resize_bilinear(&self.v, width, height);
        if gain != 1.0 {
            u.as_mut_slice().iter_mut().for_each(|x| *x *= gain);
            v.as_mut_slice().iter_mut().for_each(|x| *x *= gain);
        }
        FlowField { u, v }
    }
}

/// Dense flow from `prev` to `next`, which must share dimensions.
///
/// # Panics
/// Panics if the frames differ in size.
pub fn calc_flow<T: Pixel>(prev: &Image<T>, next: &Image<T>, params: &FarnebackParams) -> FlowField {
    assert_eq!(prev.dimensions(), next.dimensions(), "flow frames must share dimensions");
    let (w, h) = prev.dimensions();
    let pyr_scale = params.pyr_scale.clamp(0.05, 0.95);
    let prev_pyr = Pyramid::build(prev, pyr_scale, params.levels, MIN_LEVEL_SIZE);
    let next_pyr = Pyramid::build(next, pyr_scale, params.levels, MIN_LEVEL_SIZE);
    let basis = ExpansionBasis::new(params.poly_n.max(1), params.poly_sigma.max(0.1));
    let win = 2 * (params.win_size / 2) + 1;
    let iterations = params.iterations.max(1);

    let mut flow: Option<FlowField> = None;
    for k in (0..prev_pyr.num_levels()).rev() {
        let r0 = basis.expand(prev_pyr.level(k));
        let r1 = basis.expand(next_pyr.level(k));
        let (lw, lh) = (r0.width, r0.height);

        let mut level_flow = match flow.take() {
            Some(coarser) => coarser.resized(lw, lh, 1.0 / pyr_scale),
            None => FlowField::zeros(lw, lh),
        };

        let mut m = update_matrices(&r0, &r1, &level_flow);
        for i in 0..iterations {
            solve_blurred(&m, win, &mut level_flow);
            if i + 1 < iterations {
                m = update_matrices(&r0, &r1, &level_flow);
            }
        }
        flow = Some(level_flow);
    }
    flow.unwrap_or_else(|| FlowField::zeros(w, h))
}

// ---------------------------------------------------------------------------
// Polynomial expansion
// ---------------------------------------------------------------------------

/// Five-channel coefficient plane.
struct Coeffs {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl Coeffs {
    #[inline]
    fn px(&self, x: usize, y: usize) -> &[f32] {
        let i = (y * self.width + x) * 5;
        &self.data[i..i + 5]
    }
}

/// Separable Gaussian basis and the entries of the inverse Gram matrix the
/// expansion needs.
struct ExpansionBasis {
    n: usize,
    g: Vec<f32>,
    xg: Vec<f32>,
    xxg: Vec<f32>,
    ig11: f64,
    ig03: f64,
    ig33: f64,
    ig34: f64,
    ig55: f64,
}

impl ExpansionBasis {
    fn new(n: usize, sigma: f32) -> Self {
        let len = 2 * n + 1;
        let sigma = sigma as f64;
        let raw: Vec<f64> = (0..len)
            .map(|i| {
                let x = i as f64 - n as f64;
                (-x * x / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        let g: Vec<f64> = raw.iter().map(|v| v / sum).collect();

        // Gram matrix entries of the basis {1, x, y, x², y², xy}.
        let (mut g00, mut g11, mut g33, mut g55) = (0.0, 0.0, 0.0, 0.0);
        for (iy, &gy) in g.iter().enumerate() {
            let y = iy as f64 - n as f64;
            for (ix, &gx) in g.iter().enumerate() {
                let x = ix as f64 - n as f64;
                let wgt = gy * gx;
                g00 += wgt;
                g11 += wgt * x * x;
                g33 += wgt * x * x * x * x;
                g55 += wgt * x * x * y * y;
            }
        }

        // The {1, x², y²} block is coupled:
        //   [g00 g11 g11]
        //   [g11 g33 g55]
        //   [g11 g55 g33]
        let (a, b, c, d) = (g00, g11, g33, g55);
        let det = a * (c * c - d * d) - b * (b * c - b * d) + b * (b * d - c * b);
        let ig03 = (b * d - b * c) / det;
        let ig33 = (a * c - b * b) / det;
        let ig34 = (b * b - a * d) / det;

        let at = |i: usize| g[i] as f32;
        ExpansionBasis {
            n,
            g: (0..len).map(at).collect(),
            xg: (0..len).map(|i| (i as f64 - n as f64) as f32 * at(i)).collect(),
            xxg: (0..len).map(|i| ((i as f64 - n as f64).powi(2)) as f32 * at(i)).collect(),
            ig11: 1.0 / g11,
            ig03,
            ig33,
            ig34,
            ig55: 1.0 / g55,
        }
    }

    /// Expansion coefficients of every pixel (replicated borders).
    fn expand(&self, src: &Image<f32>) -> Coeffs {
        let (w, h) = src.dimensions();
        let n = self.n;
        let mut data = vec![0.0f32; w * h * 5];

        data.par_chunks_mut(w * 5).enumerate().for_each(|(y, drow)| {
            // Vertical pass: [Σg·I, Σxg·ΔI, Σxxg·I] per column, with n
            // replicated columns on each side.
            let mut row = vec![0.0f32; (w + 2 * n) * 3];
            let center = src.row(y);
            for x in 0..w {
                let base = (x + n) * 3;
                row[base] = center[x] * self.g[n];
            }
            for k in 1..=n {
                let up = src.row(y.saturating_sub(k));
                let down = src.row((y + k).min(h - 1));
                let (g0, g1, g2) = (self.g[n + k], self.xg[n + k], self.xxg[n + k]);
                for x in 0..w {
                    let p = up[x] + down[x];
                    let base = (x + n) * 3;
                    row[base] += g0 * p;
                    row[base + 1] += g1 * (down[x] - up[x]);
                    row[base + 2] += g2 * p;
                }
            }
            for k in 0..n {
                for c in 0..3 {
                    row[k * 3 + c] = row[n * 3 + c];
                    row[(w + n + k) * 3 + c] = row[(w + n - 1) * 3 + c];
                }
            }

            // Horizontal pass.
            for x in 0..w {
                let at = |dx: isize, c: usize| row[((x + n) as isize + dx) as usize * 3 + c] as f64;
                let g0 = self.g[n] as f64;
                let mut b1 = at(0, 0) * g0;
                let mut b2 = 0.0;
                let mut b3 = at(0, 1) * g0;
                let mut b4 = 0.0;
                let mut b5 = at(0, 2) * g0;
                let mut b6 = 0.0;
                for k in 1..=n {
                    let ki = k as isize;
                    let (g, xg, xxg) = (self.g[n + k] as f64, self.xg[n + k] as f64, self.xxg[n + k] as f64);
                    let t0 = at(ki, 0) + at(-ki, 0);
                    b1 += t0 * g;
                    b4 += t0 * xxg;
                    b2 += (at(ki, 0) - at(-ki, 0)) * xg;
                    b3 += (at(ki, 1) + at(-ki, 1)) * g;
                    b6 += (at(ki, 1) - at(-ki, 1)) * xg;
                    b5 += (at(ki, 2) + at(-ki, 2)) * g;
                }
                let out = &mut drow[x * 5..x * 5 + 5];
                out[0] = (b3 * self.ig11) as f32;
                out[1] = (b2 * self.ig11) as f32;
                out[2] = (b1 * self.ig03 + b5 * self.ig33 + b4 * self.ig34) as f32;
                out[3] = (b1 * self.ig03 + b4 * self.ig33 + b5 * self.ig34) as f32;
                out[4] = (b6 * self.ig55) as f32;
            }
        });

        Coeffs { data, width: w, height: h }
    }
}

// ---------------------------------------------------------------------------
// Normal equations
// ---------------------------------------------------------------------------

/// Five planes [g11, g12, g22, h1, h2].
fn update_matrices(r0: &Coeffs, r1: &Coeffs, flow: &FlowField) -> [Image<f32>; 5] {
    let (w, h) = (r0.width, r0.height);
    let mut packed = vec![0.0f32; w * h * 5];

    packed.par_chunks_mut(w * 5).enumerate().for_each(|(y, mrow)| {
        for x in 0..w {
            let (dx, dy) = flow.at(x, y);
            let c0 = r0.px(x, y);
            let fx = x as f32 + dx;
            let fy = y as f32 + dy;
            let x1 = fx.floor();
            let y1 = fy.floor();
            let (ax, ay) = (fx - x1, fy - y1);

            let (mut r2, mut r3, mut r4, mut r5, mut r6);
            if x1 >= 0.0 && y1 >= 0.0 && (x1 as usize) < w - 1 && (y1 as usize) < h - 1 {
                let (xi, yi) = (x1 as usize, y1 as usize);
                let p00 = r1.px(xi, yi);
                let p01 = r1.px(xi + 1, yi);
                let p10 = r1.px(xi, yi + 1);
                let p11 = r1.px(xi + 1, yi + 1);
                let (a00, a01, a10, a11) = ((1.0 - ax) * (1.0 - ay), ax * (1.0 - ay), (1.0 - ax) * ay, ax * ay);
                let s = |c: usize| a00 * p00[c] + a01 * p01[c] + a10 * p10[c] + a11 * p11[c];
                r2 = s(0);
                r3 = s(1);
                r4 = (c0[2] + s(2)) * 0.5;
                r5 = (c0[3] + s(3)) * 0.5;
                r6 = (c0[4] + s(4)) * 0.25;
            } else {
                r2 = 0.0;
                r3 = 0.0;
                r4 = c0[2];
                r5 = c0[3];
                r6 = c0[4] * 0.5;
            }
            r2 = (c0[0] - r2) * 0.5;
            r3 = (c0[1] - r3) * 0.5;
            r2 += r4 * dy + r6 * dx;
            r3 += r6 * dy + r5 * dx;

            let scale = border_weight(x, w) * border_weight(y, h);
            if scale != 1.0 {
                r2 *= scale;
                r3 *= scale;
                r4 *= scale;
                r5 *= scale;
                r6 *= scale;
            }

            let out = &mut mrow[x * 5..x * 5 + 5];
            out[0] = r4 * r4 + r6 * r6;
            out[1] = (r4 + r5) * r6;
            out[2] = r5 * r5 + r6 * r6;
            out[3] = r4 * r2 + r6 * r3;
            out[4] = r6 * r2 + r5 * r3;
        }
    });

    std::array::from_fn(|c| {
        let plane = packed.iter().skip(c).step_by(5).copied().collect();
        Image::from_vec(w, h, plane)
    })
}

/// Attenuation for a coordinate within `BORDER` of either edge.
#[inline]
fn border_weight(i: usize, len: usize) -> f32 {
    let mut s = 1.0;
    if i < BORDER {
        s *= BORDER_WEIGHTS[i];
    }
    if i + BORDER >= len {
        s *= BORDER_WEIGHTS[len - i - 1];
    }
    s
}

/// Box-average the normal equations over `win × win` and solve per pixel.
fn solve_blurred(m: &[Image<f32>; 5], win: usize, flow: &mut FlowField) {
    let k = box_kernel_1d(win);
    let [g11, g12, g22, h1, h2] = m.each_ref().map(|plane| convolve_separable(plane, &k, &k));

    let FlowField { u, v } = flow;
    u.as_mut_slice()
        .par_iter_mut()
        .zip(v.as_mut_slice().par_iter_mut())
        .enumerate()
        .for_each(|(i, (fu, fv))| {
            let (a, b, c) = (g11.as_slice()[i] as f64, g12.as_slice()[i] as f64, g22.as_slice()[i] as f64);
            let (p, q) = (h1.as_slice()[i] as f64, h2.as_slice()[i] as f64);
            let idet = 1.0 / (a * c - b * b + 1e-3);
            *fu = ((a * q - b * p) * idet) as f32;
            *fv = ((c * p - b * q) * idet) as f32;
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth blob texture that polynomial expansion can lock onto.
    fn textured(w: usize, h: usize, shift_x: f32, shift_y: f32) -> Image<f32> {
        let mut img = Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let fx = x as f32 - shift_x;
                let fy = y as f32 - shift_y;
                let v = 128.0
                    + 60.0 * (fx * 0.21).sin() * (fy * 0.17).cos()
                    + 40.0 * ((fx + fy) * 0.11).sin();
                img.set(x, y, v);
            }
        }
        img
    }

    #[test]
    fn identical_frames_give_zero_flow() {
        let img = textured(48, 40, 0.0, 0.0);
        let flow = calc_flow(&img, &img, &FarnebackParams::default());
        assert_eq!(flow.dimensions(), (48, 40));
        assert_eq!(flow.max_magnitude(), 0.0);
    }

    #[test]
    fn detects_horizontal_shift() {
        let a = textured(64, 64, 0.0, 0.0);
        let b = textured(64, 64, 1.0, 0.0);
        let params = FarnebackParams { iterations: 3, win_size: 13, ..Default::default() };
        let flow = calc_flow(&a, &b, &params);
        // Average over the interior to damp local fit noise.
        let (mut su, mut sv, mut n) = (0.0, 0.0, 0.0);
        for y in 16..48 {
            for x in 16..48 {
                let (u, v) = flow.at(x, y);
                su += u;
                sv += v;
                n += 1.0;
            }
        }
        let (mu, mv) = (su / n, sv / n);
        assert!((mu - 1.0).abs() < 0.3, "mean u = {mu}");
        assert!(mv.abs() < 0.3, "mean v = {mv}");
    }

    #[test]
    fn basis_weights_are_normalized() {
        let b = ExpansionBasis::new(5, 1.1);
        let s: f32 = b.g.iter().sum();
        assert!((s - 1.0).abs() < 1e-5);
        assert!(b.ig11 > 0.0 && b.ig55 > 0.0);
    }

    #[test]
    fn expansion_of_linear_ramp() {
        // f = 3x + 2y: b_x = 3, b_y = 2, all quadratic terms 0 in the interior.
        let mut img = Image::new(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                img.set(x, y, 3.0 * x as f32 + 2.0 * y as f32);
            }
        }
        let c = ExpansionBasis::new(5, 1.1).expand(&img);
        let px = c.px(16, 16);
        assert!((px[0] - 2.0).abs() < 1e-3, "b_y {}", px[0]);
        assert!((px[1] - 3.0).abs() < 1e-3, "b_x {}", px[1]);
        for &q in &px[2..] {
            assert!(q.abs() < 1e-3);
        }
    }

    #[test]
    fn border_weights_taper() {
        assert_eq!(border_weight(0, 100), 0.14);
        assert_eq!(border_weight(50, 100), 1.0);
        assert_eq!(border_weight(99, 100), 0.14);
        assert_eq!(border_weight(4, 100), 0.4472);
    }

    #[test]
    fn flow_field_resize_scales_vectors() {
        let mut f = FlowField::zeros(4, 4);
        f.u.fill(1.0);
        f.v.fill(-0.5);
        let up = f.resized(8, 8, 2.0);
        assert_eq!(up.at(7, 7), (2.0, -1.0));
    }
}
