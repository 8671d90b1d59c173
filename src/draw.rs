// draw.rs — Stroke rasterization onto BGRA buffers.
//
// Every primitive is rendered by distance: a pixel is covered when its
// centre lies within half the stroke width of the ideal shape. Hard strokes
// overwrite covered pixels with the stroke colour; anti-aliased strokes
// ramp coverage over one pixel at the boundary and blend all four channels,
//
//     out = colour · coverage + dst · (1 − coverage)
//
// so drawing onto a transparent canvas yields partially transparent edges.
//
// Only the bounding box of each primitive (grown by the half width) is
// visited; everything outside the buffer is clipped.

use crate::geometry::Point;
use crate::pixel::{Bgra, PixelBuffer};

/// Stroke style shared by all primitives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Bgra,
    /// Line width in pixels, at least 1.
    pub thickness: u32,
    pub antialias: bool,
}

impl Stroke {
    pub fn new(color: Bgra, thickness: u32) -> Self {
        Stroke { color, thickness: thickness.max(1), antialias: false }
    }

    pub fn antialiased(mut self) -> Self {
        self.antialias = true;
        self
    }

    #[inline]
    fn half_width(&self) -> f32 {
        self.thickness.max(1) as f32 * 0.5
    }

    /// Coverage in [0, 1] for a pixel centre at distance `d` from the shape.
    #[inline]
    fn coverage(&self, d: f32) -> f32 {
        let half = self.half_width();
        if self.antialias {
            (half + 0.5 - d).clamp(0.0, 1.0)
        } else if d <= half {
            1.0
        } else {
            0.0
        }
    }
}

/// RGBA in [0, 1] → BGRA bytes by truncation (`(v · 255) as u8`).
pub fn bgra_from_unit_rgba(rgba: [f32; 4]) -> Bgra {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    [q(rgba[2]), q(rgba[1]), q(rgba[0]), q(rgba[3])]
}

#[inline]
fn plot(buf: &mut PixelBuffer, x: usize, y: usize, color: Bgra, cov: f32) {
    if cov <= 0.0 {
        return;
    }
    if cov >= 1.0 {
        buf.set_pixel(x, y, color);
        return;
    }
    let dst = buf.pixel(x, y);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let v = color[c] as f32 * cov + dst[c] as f32 * (1.0 - cov);
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    buf.set_pixel(x, y, out);
}

/// Visit every in-buffer pixel of the box `[x0, x1] × [y0, y1]`.
fn for_box(
    buf: &mut PixelBuffer,
    (x0, y0): (f32, f32),
    (x1, y1): (f32, f32),
    mut f: impl FnMut(&mut PixelBuffer, usize, usize),
) {
    let (w, h) = buf.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let xa = x0.floor().max(0.0) as i64;
    let ya = y0.floor().max(0.0) as i64;
    let xb = (x1.ceil() as i64).min(w as i64 - 1);
    let yb = (y1.ceil() as i64).min(h as i64 - 1);
    for y in ya..=yb {
        for x in xa..=xb {
            f(buf, x as usize, y as usize);
        }
    }
}

/// Distance from (px, py) to the segment a–b.
#[inline]
fn segment_distance(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - a.0) * dx + (py - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.0 + t * dx;
    let cy = a.1 + t * dy;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Straight segment with round caps.
pub fn line(buf: &mut PixelBuffer, a: (f32, f32), b: (f32, f32), stroke: &Stroke) {
    let reach = stroke.half_width() + 1.0;
    let lo = (a.0.min(b.0) - reach, a.1.min(b.1) - reach);
    let hi = (a.0.max(b.0) + reach, a.1.max(b.1) + reach);
    for_box(buf, lo, hi, |buf, x, y| {
        let d = segment_distance(x as f32, y as f32, a, b);
        plot(buf, x, y, stroke.color, stroke.coverage(d));
    });
}

/// Closed polyline through `points` (last point joins the first).
pub fn closed_polyline(buf: &mut PixelBuffer, points: &[Point], stroke: &Stroke) {
    match points {
        [] => {}
        [p] => {
            let c = (p.x as f32, p.y as f32);
            line(buf, c, c, stroke);
        }
        _ => {
            let mut prev = points[points.len() - 1];
            for &p in points {
                line(
                    buf,
                    (prev.x as f32, prev.y as f32),
                    (p.x as f32, p.y as f32),
                    stroke,
                );
                prev = p;
            }
        }
    }
}

/// Circle outline of the given radius.
pub fn circle(buf: &mut PixelBuffer, center: (f32, f32), radius: f32, stroke: &Stroke) {
    let reach = radius.max(0.0) + stroke.half_width() + 1.0;
    let lo = (center.0 - reach, center.1 - reach);
    let hi = (center.0 + reach, center.1 + reach);
    for_box(buf, lo, hi, |buf, x, y| {
        let r = ((x as f32 - center.0).powi(2) + (y as f32 - center.1).powi(2)).sqrt();
        plot(buf, x, y, stroke.color, stroke.coverage((r - radius).abs()));
    });
}

/// Shaft from `from` to `to` plus two barbs at ±45°, each `tip_ratio` of
/// the shaft length.
pub fn arrow(buf: &mut PixelBuffer, from: (f32, f32), to: (f32, f32), tip_ratio: f32, stroke: &Stroke) {
    line(buf, from, to, stroke);
    let (dx, dy) = (from.0 - to.0, from.1 - to.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON {
        return;
    }
    let tip = tip_ratio * len;
    let angle = dy.atan2(dx);
    for side in [std::f32::consts::FRAC_PI_4, -std::f32::consts::FRAC_PI_4] {
        let barb = (to.0 + tip * (angle + side).cos(), to.1 + tip * (angle + side).sin());
        line(buf, barb, to, stroke);
    }
}

/// Horizontal and vertical arms of length `arm` through `center`.
pub fn crosshair(buf: &mut PixelBuffer, center: (f32, f32), arm: f32, stroke: &Stroke) {
    let (cx, cy) = center;
    line(buf, (cx - arm, cy), (cx + arm, cy), stroke);
    line(buf, (cx, cy - arm), (cx, cy + arm), stroke);
}
