// optical_flow.rs — Dense motion visualization between consecutive frames.
//
// The frame is reduced to a working resolution (area averaging, `scale` of
// the input, at least 16 px per side), converted to luma, and compared with
// the previous frame's luma by Farnebäck flow. The stored flow is the raw
// estimate; `sensitivity` only scales what is drawn.
//
// Visualizations (output always matches the input size, opaque):
//
//   ColorWheel     hue = direction, value = min(255, 10·|flow|), full
//                  saturation; drawn at working size, bilinear upsampled.
//   ArrowOverlay   the input frame with an arrow every 20 px wherever the
//                  full-resolution motion exceeds 1 px; green for slow,
//                  red for fast.
//   MagnitudeOnly  grey = min(255, 10·|flow|), bilinear upsampled.
//
// The first frame, and any frame whose working size differs from the
// previous one, has nothing to compare against and yields opaque black.

use rayon::prelude::*;
use tracing::debug;

use crate::convert::{convert_image, hsv_to_bgr, luma_from_view, resize_area, resize_bilinear_bgra};
use crate::draw::{arrow, Stroke};
use crate::farneback::{calc_flow, FarnebackParams, FlowField};
use crate::image::{interpolate_bilinear, Image};
use crate::operator::{Operator, OperatorCore, MIN_WORKING_SIZE};
use crate::params::{ParamId, ParamSet};
use crate::pixel::{PixelBuffer, PixelView, CHANNELS, OPAQUE_BLACK};

pub const NAME: &str = "OpticalFlow";
pub const DESCRIPTION: &str = "Dense optical flow motion detection";

/// Grid spacing of the arrow overlay.
const ARROW_STEP: usize = 20;

/// How the flow field is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VizMode {
    #[default]
    ColorWheel,
    ArrowOverlay,
    MagnitudeOnly,
}

impl VizMode {
    /// Out-of-range indices clamp to the ends.
    pub fn from_index(i: i64) -> Self {
        match i {
            i64::MIN..=0 => VizMode::ColorWheel,
            1 => VizMode::ArrowOverlay,
            _ => VizMode::MagnitudeOnly,
        }
    }

    pub fn index(self) -> i64 {
        self as i64
    }
}

struct Ids {
    scale: ParamId,
    pyr_scale: ParamId,
    levels: ParamId,
    win_size: ParamId,
    iterations: ParamId,
    poly_n: ParamId,
    poly_sigma: ParamId,
    viz_mode: ParamId,
    sensitivity: ParamId,
}

/// Farnebäck flow at a reduced working resolution.
pub struct OpticalFlow {
    core: OperatorCore,
    ids: Ids,
    prev_gray: Option<Image<f32>>,
    flow: Option<FlowField>,
}

impl Default for OpticalFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl OpticalFlow {
    pub fn new() -> Self {
        let mut p = ParamSet::new();
        let ids = Ids {
            scale: p.float("scale", 0.15, 0.05, 1.0),
            pyr_scale: p.float("pyrScale", 0.5, 0.1, 0.9),
            levels: p.int("levels", 1, 1, 5),
            win_size: p.int("winSize", 9, 3, 25),
            iterations: p.int("iterations", 1, 1, 10),
            poly_n: p.int("polyN", 5, 5, 7),
            poly_sigma: p.float("polySigma", 1.1, 1.0, 2.0),
            viz_mode: p.int("vizMode", 0, 0, 2),
            sensitivity: p.float("sensitivity", 1.0, 0.1, 10.0),
        };
        OpticalFlow { core: OperatorCore::new(p), ids, prev_gray: None, flow: None }
    }

    pub fn boxed() -> Box<dyn Operator> {
        Box::new(Self::new())
    }

    pub fn scale(&self) -> f32 {
        self.core.params.get_f32(self.ids.scale).clamp(0.05, 1.0)
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.core.set(self.ids.scale, scale as f64);
    }

    pub fn viz_mode(&self) -> VizMode {
        VizMode::from_index(self.core.params.get_int(self.ids.viz_mode))
    }

    pub fn set_viz_mode(&mut self, mode: VizMode) {
        self.core.set(self.ids.viz_mode, mode.index() as f64);
    }

    pub fn sensitivity(&self) -> f32 {
        self.core.params.get_f32(self.ids.sensitivity)
    }

    pub fn set_sensitivity(&mut self, s: f32) {
        self.core.set(self.ids.sensitivity, s as f64);
    }

    /// Estimator settings from the current parameter values.
    pub fn farneback_params(&self) -> FarnebackParams {
        let p = &self.core.params;
        FarnebackParams {
            pyr_scale: p.get_f32(self.ids.pyr_scale),
            levels: p.get_int(self.ids.levels) as usize,
            win_size: p.get_int(self.ids.win_size) as usize,
            iterations: p.get_int(self.ids.iterations) as usize,
            poly_n: p.get_int(self.ids.poly_n) as usize,
            poly_sigma: p.get_f32(self.ids.poly_sigma),
        }
    }

    pub fn set_farneback_params(&mut self, f: &FarnebackParams) {
        self.core.set(self.ids.pyr_scale, f.pyr_scale as f64);
        self.core.set(self.ids.levels, f.levels as f64);
        self.core.set(self.ids.win_size, f.win_size as f64);
        self.core.set(self.ids.iterations, f.iterations as f64);
        self.core.set(self.ids.poly_n, f.poly_n as f64);
        self.core.set(self.ids.poly_sigma, f.poly_sigma as f64);
    }

    /// Working resolution for an input of `width × height`.
    pub fn working_size(&self, width: usize, height: usize) -> (usize, usize) {
        let s = self.scale();
        (
            ((width as f32 * s) as usize).max(MIN_WORKING_SIZE),
            ((height as f32 * s) as usize).max(MIN_WORKING_SIZE),
        )
    }

    /// Whether a previous frame is held for comparison.
    pub fn has_previous_frame(&self) -> bool {
        self.prev_gray.is_some()
    }

    /// Largest raw flow vector of the last comparison, in working-resolution
    /// pixels. `None` if the last cook had nothing to compare against.
    pub fn max_flow_magnitude(&self) -> Option<f32> {
        self.flow.as_ref().map(FlowField::max_magnitude)
    }

    fn working_gray(&self, input: &PixelView<'_>) -> Image<f32> {
        let luma = luma_from_view(input);
        if self.scale() < 0.99 {
            let (pw, ph) = self.working_size(input.width(), input.height());
            resize_area(&luma, pw, ph)
        } else {
            convert_image(&luma)
        }
    }
}

impl Operator for OpticalFlow {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperatorCore {
        &mut self.core
    }

    fn cook(&mut self, input: &PixelView<'_>) {
        let gray = self.working_gray(input);
        let sens = self.sensitivity();
        let scale = self.scale();
        let mode = self.viz_mode();
        let fb = self.farneback_params();

        let out = &mut self.core.output;
        out.ensure_size(input.width(), input.height());
        out.fill(OPAQUE_BLACK);

        self.flow = match self.prev_gray.as_ref() {
            Some(prev) if prev.dimensions() == gray.dimensions() => {
                let flow = calc_flow(prev, &gray, &fb);
                match mode {
                    VizMode::ColorWheel => resize_bilinear_bgra(&color_wheel(&flow, sens), out),
                    VizMode::MagnitudeOnly => resize_bilinear_bgra(&magnitude_gray(&flow, sens), out),
                    VizMode::ArrowOverlay => {
                        out.copy_from_view(input);
                        draw_arrows(out, &flow, scale, sens);
                    }
                }
                debug!(
                    working_w = gray.width(),
                    working_h = gray.height(),
                    ?mode,
                    max_flow = flow.max_magnitude(),
                    "flow computed"
                );
                Some(flow)
            }
            _ => None,
        };
        self.prev_gray = Some(gray);
    }

    fn release_state(&mut self) {
        self.prev_gray = None;
        self.flow = None;
    }
}

// ---------------------------------------------------------------------------
// Visualizations
// ---------------------------------------------------------------------------

/// `min(255, round(10·m))`.
#[inline]
fn magnitude_value(m: f32) -> f32 {
    (m * 10.0).round().min(255.0)
}

fn color_wheel(flow: &FlowField, sens: f32) -> PixelBuffer {
    let (w, h) = flow.dimensions();
    let mut buf = PixelBuffer::new(w, h);
    buf.par_rows_mut().enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
            let (u, v) = flow.at(x, y);
            let (u, v) = (u * sens, v * sens);
            let mag = (u * u + v * v).sqrt();
            let angle = v.atan2(u).to_degrees().rem_euclid(360.0);
            let [b, g, r] = hsv_to_bgr(angle, 1.0, magnitude_value(mag));
            px.copy_from_slice(&[b, g, r, 255]);
        }
    });
    buf
}

fn magnitude_gray(flow: &FlowField, sens: f32) -> PixelBuffer {
    let (w, h) = flow.dimensions();
    let mut buf = PixelBuffer::new(w, h);
    buf.par_rows_mut().enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
            let (u, v) = flow.at(x, y);
            let g = magnitude_value((u * u + v * v).sqrt() * sens) as u8;
            px.copy_from_slice(&[g, g, g, 255]);
        }
    });
    buf
}

/// Arrows on a `ARROW_STEP` grid over the full-resolution frame already in
/// `out`. Flow is sampled bilinearly at each grid point and rescaled from
/// working to full resolution.
fn draw_arrows(out: &mut PixelBuffer, flow: &FlowField, scale: f32, sens: f32) {
    let (w, h) = out.dimensions();
    let (fw, fh) = flow.dimensions();
    let (sx, sy) = (fw as f32 / w as f32, fh as f32 / h as f32);
    let gain = sens / scale;

    for y in (ARROW_STEP / 2..h).step_by(ARROW_STEP) {
        for x in (ARROW_STEP / 2..w).step_by(ARROW_STEP) {
            let fx_src = (x as f32 + 0.5) * sx - 0.5;
            let fy_src = (y as f32 + 0.5) * sy - 0.5;
            let fx = interpolate_bilinear(&flow.u, fx_src, fy_src) * gain;
            let fy = interpolate_bilinear(&flow.v, fx_src, fy_src) * gain;
            let mag = (fx * fx + fy * fy).sqrt();
            if mag <= 1.0 {
                continue;
            }
            let green = (255.0 - mag * 5.0).max(0.0) as u8;
            let red = (mag * 10.0).min(255.0) as u8;
            let stroke = Stroke::new([0, green, red, 255], 2).antialiased();
            let start = (x as f32, y as f32);
            let end = (x as f32 + fx * 2.0, y as f32 + fy * 2.0);
            arrow(out, start, end, 0.3, &stroke);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_size_floors_at_minimum() {
        let op = OpticalFlow::new();
        assert_eq!(op.working_size(1920, 1080), (288, 162));
        assert_eq!(op.working_size(32, 32), (16, 16));
    }

    #[test]
    fn viz_mode_index_clamps() {
        assert_eq!(VizMode::from_index(-1), VizMode::ColorWheel);
        assert_eq!(VizMode::from_index(1), VizMode::ArrowOverlay);
        assert_eq!(VizMode::from_index(9), VizMode::MagnitudeOnly);
    }

    #[test]
    fn magnitude_value_saturates() {
        assert_eq!(magnitude_value(0.0), 0.0);
        assert_eq!(magnitude_value(0.26), 3.0);
        assert_eq!(magnitude_value(100.0), 255.0);
    }

    #[test]
    fn color_wheel_direction_to_hue() {
        let mut f = FlowField::zeros(2, 1);
        f.u.set(0, 0, 30.0); // east → hue 0 → red
        f.v.set(1, 0, 30.0); // south (y down) → hue 90 → yellow-green
        let buf = color_wheel(&f, 1.0);
        assert_eq!(buf.pixel(0, 0), [0, 0, 255, 255]);
        let px = buf.pixel(1, 0);
        assert_eq!(px[1], 255);
        assert_eq!(px[0], 0);
    }

    #[test]
    fn arrows_only_where_motion_exceeds_one_pixel() {
        let mut out = PixelBuffer::filled(40, 40, OPAQUE_BLACK);
        let mut f = FlowField::zeros(40, 40);
        f.u.fill(0.5);
        draw_arrows(&mut out, &f, 1.0, 1.0);
        assert_eq!(out, PixelBuffer::filled(40, 40, OPAQUE_BLACK));

        f.u.fill(4.0);
        draw_arrows(&mut out, &f, 1.0, 1.0);
        // mag 4: green 235, red 40; shaft from (10,10) to (18,10).
        assert_eq!(out.pixel(14, 10), [0, 235, 40, 255]);
    }

    #[test]
    fn first_frame_is_opaque_black() {
        let frame = PixelBuffer::filled(32, 32, [90, 120, 200, 255]);
        let mut op = OpticalFlow::new();
        op.process(&frame.view());
        assert!(op.has_previous_frame());
        assert_eq!(op.max_flow_magnitude(), None);
        assert_eq!(op.core().output, PixelBuffer::filled(32, 32, OPAQUE_BLACK));
    }
}
