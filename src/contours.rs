// contours.rs — Edge contours drawn on a transparent canvas.
//
// Per cook:
//   1. BGRA → luma.
//   2. Canny hysteresis with (threshold1, threshold2); no pre-blur.
//   3. Border tracing of the edge map in the selected retrieval mode,
//      run-compressed.
//   4. Every contour stroked as a closed polyline of `lineWidth` pixels in
//      the configured colour onto a fully transparent buffer of the input
//      size.
//
// Traced contours stay private; only their count is exposed.

use tracing::debug;

use crate::canny::canny;
use crate::contour_trace::{find_contours, ChainApprox, Contour, RetrievalMode};
use crate::convert::luma_from_view;
use crate::draw::{bgra_from_unit_rgba, closed_polyline, Stroke};
use crate::operator::{Operator, OperatorCore};
use crate::params::{ParamId, ParamSet};
use crate::pixel::{PixelView, TRANSPARENT};

pub const NAME: &str = "Contours";
pub const DESCRIPTION: &str = "Detect and draw contours using Canny edge detection";

struct Ids {
    threshold1: ParamId,
    threshold2: ParamId,
    mode: ParamId,
    line_width: ParamId,
    color: [ParamId; 4],
}

/// Canny edges → traced contours → stroked outlines.
pub struct Contours {
    core: OperatorCore,
    ids: Ids,
    contours: Vec<Contour>,
}

impl Default for Contours {
    fn default() -> Self {
        Self::new()
    }
}

impl Contours {
    pub fn new() -> Self {
        let mut p = ParamSet::new();
        let ids = Ids {
            threshold1: p.float("threshold1", 100.0, 0.0, 255.0),
            threshold2: p.float("threshold2", 200.0, 0.0, 255.0),
            mode: p.int("mode", 0, 0, 3),
            line_width: p.float("lineWidth", 2.0, 1.0, 20.0),
            color: [
                p.float("colorR", 0.0, 0.0, 1.0),
                p.float("colorG", 1.0, 0.0, 1.0),
                p.float("colorB", 0.0, 0.0, 1.0),
                p.float("colorA", 1.0, 0.0, 1.0),
            ],
        };
        Contours { core: OperatorCore::new(p), ids, contours: Vec::new() }
    }

    pub fn boxed() -> Box<dyn Operator> {
        Box::new(Self::new())
    }

    /// Contours found by the last cook.
    pub fn contour_count(&self) -> usize {
        self.contours.len()
    }

    pub fn thresholds(&self) -> (f32, f32) {
        let p = &self.core.params;
        (p.get_f32(self.ids.threshold1), p.get_f32(self.ids.threshold2))
    }

    pub fn set_thresholds(&mut self, low: f32, high: f32) {
        self.core.set(self.ids.threshold1, low as f64);
        self.core.set(self.ids.threshold2, high as f64);
    }

    pub fn mode(&self) -> RetrievalMode {
        RetrievalMode::from_index(self.core.params.get_int(self.ids.mode))
    }

    pub fn set_mode(&mut self, mode: RetrievalMode) {
        self.core.set(self.ids.mode, mode.index() as f64);
    }

    pub fn line_width(&self) -> f32 {
        self.core.params.get_f32(self.ids.line_width)
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.core.set(self.ids.line_width, width as f64);
    }

    /// Stroke colour as RGBA in [0, 1].
    pub fn color(&self) -> [f32; 4] {
        self.ids.color.map(|id| self.core.params.get_f32(id))
    }

    pub fn set_color(&mut self, rgba: [f32; 4]) {
        for (id, v) in self.ids.color.into_iter().zip(rgba) {
            self.core.set(id, v as f64);
        }
    }
}

impl Operator for Contours {
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
        let (t1, t2) = self.thresholds();
        let mode = self.mode();

        let gray = luma_from_view(input);
        let edges = canny(&gray, t1, t2);
        self.contours = find_contours(&edges, mode, ChainApprox::Simple);

        let stroke = Stroke::new(bgra_from_unit_rgba(self.color()), self.line_width() as u32);
        let out = &mut self.core.output;
        out.ensure_size(input.width(), input.height());
        out.fill(TRANSPARENT);
        for c in &self.contours {
            closed_polyline(out, &c.points, &stroke);
        }
        debug!(contours = self.contours.len(), ?mode, "contours traced");
    }

    fn release_state(&mut self) {
        self.contours = Vec::new();
    }
}
