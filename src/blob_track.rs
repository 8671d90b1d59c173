// blob_track.rs — Blob detection with marker overlays.
//
// Building a `BlobDetector` fixes its configuration, so the operator keeps
// the eight user-facing filter values it was built from and rebuilds only
// when one of them differs. Keypoints are recomputed on every cook.
//
// Overlay on a copy of the input frame:
//   green    outer borders of the threshold mask whose area is within
//            [minArea, maxArea]
//   yellow   circle of the keypoint's radius (alpha 200)
//   magenta  ±8 px crosshair at the keypoint center
//
// Polarity: bright-only looks for blobs above the threshold, dark-only
// below it. With both flags set, or both cleared, blobs of either polarity
// are reported and the overlay mask uses the bright rule.

use tracing::{debug, info};

use crate::blob::{binarize, binarize_inverted, BlobDetector, BlobParams, KeyPoint};
use crate::contour_trace::{find_contours, ChainApprox, RetrievalMode};
use crate::convert::luma_from_view;
use crate::draw::{circle, closed_polyline, crosshair, Stroke};
use crate::geometry::area;
use crate::image::Image;
use crate::operator::{Operator, OperatorCore};
use crate::params::{ParamId, ParamSet};
use crate::pixel::{Bgra, PixelView};

pub const NAME: &str = "BlobTrack";
pub const DESCRIPTION: &str = "Blob detection and tracking";

const CONTOUR_COLOR: Bgra = [0, 255, 0, 255];
const CIRCLE_COLOR: Bgra = [0, 255, 255, 200];
const CROSS_COLOR: Bgra = [255, 0, 255, 255];
const CROSS_ARM: f32 = 8.0;

/// Which blob polarities to report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    Bright,
    Dark,
    Both,
}

impl Polarity {
    /// Both flags cleared reads as `Both`.
    pub fn from_flags(bright: bool, dark: bool) -> Self {
        match (bright, dark) {
            (true, false) => Polarity::Bright,
            (false, true) => Polarity::Dark,
            _ => Polarity::Both,
        }
    }
}

/// The filter values a detector was built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorFilters {
    pub min_area: f32,
    pub max_area: f32,
    pub min_circularity: f32,
    pub min_convexity: f32,
    pub min_inertia: f32,
    pub detect_bright: bool,
    pub detect_dark: bool,
    pub threshold: f32,
}

impl DetectorFilters {
    pub fn polarity(&self) -> Polarity {
        Polarity::from_flags(self.detect_bright, self.detect_dark)
    }

    /// Detector configuration: ±50 threshold sweep in steps of 10; shape
    /// filters at or below 0.01 are disabled.
    pub fn to_blob_params(&self) -> BlobParams {
        const DISABLED_BELOW: f32 = 0.01;
        let (filter_by_color, blob_color) = match self.polarity() {
            Polarity::Bright => (true, 255),
            Polarity::Dark => (true, 0),
            Polarity::Both => (false, 0),
        };
        BlobParams {
            min_threshold: self.threshold - 50.0,
            max_threshold: self.threshold + 50.0,
            threshold_step: 10.0,
            filter_by_area: true,
            min_area: self.min_area,
            max_area: self.max_area,
            filter_by_circularity: self.min_circularity > DISABLED_BELOW,
            min_circularity: self.min_circularity,
            filter_by_convexity: self.min_convexity > DISABLED_BELOW,
            min_convexity: self.min_convexity,
            filter_by_inertia: self.min_inertia > DISABLED_BELOW,
            min_inertia_ratio: self.min_inertia,
            filter_by_color,
            blob_color,
            ..BlobParams::default()
        }
    }
}

struct Ids {
    min_area: ParamId,
    max_area: ParamId,
    min_circularity: ParamId,
    min_convexity: ParamId,
    min_inertia: ParamId,
    detect_bright: ParamId,
    detect_dark: ParamId,
    threshold: ParamId,
}

/// Multi-threshold blob detector with a rebuild-on-change cache.
pub struct BlobTrack {
    core: OperatorCore,
    ids: Ids,
    detector: Option<(DetectorFilters, BlobDetector)>,
    build_count: u64,
    keypoints: Vec<KeyPoint>,
}

impl Default for BlobTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobTrack {
    pub fn new() -> Self {
        let mut p = ParamSet::new();
        let ids = Ids {
            min_area: p.float("minArea", 100.0, 10.0, 10000.0),
            max_area: p.float("maxArea", 50000.0, 100.0, 100000.0),
            min_circularity: p.float("minCircularity", 0.1, 0.0, 1.0),
            min_convexity: p.float("minConvexity", 0.5, 0.0, 1.0),
            min_inertia: p.float("minInertia", 0.1, 0.0, 1.0),
            detect_bright: p.int("detectBright", 1, 0, 1),
            detect_dark: p.int("detectDark", 1, 0, 1),
            threshold: p.float("threshold", 128.0, 0.0, 255.0),
        };
        BlobTrack {
            core: OperatorCore::new(p),
            ids,
            detector: None,
            build_count: 0,
            keypoints: Vec::new(),
        }
    }

    pub fn boxed() -> Box<dyn Operator> {
        Box::new(Self::new())
    }

    /// Current filter values.
    pub fn filters(&self) -> DetectorFilters {
        let p = &self.core.params;
        DetectorFilters {
            min_area: p.get_f32(self.ids.min_area),
            max_area: p.get_f32(self.ids.max_area),
            min_circularity: p.get_f32(self.ids.min_circularity),
            min_convexity: p.get_f32(self.ids.min_convexity),
            min_inertia: p.get_f32(self.ids.min_inertia),
            detect_bright: p.get_bool(self.ids.detect_bright),
            detect_dark: p.get_bool(self.ids.detect_dark),
            threshold: p.get_f32(self.ids.threshold),
        }
    }

    pub fn set_area_range(&mut self, min: f32, max: f32) {
        self.core.set(self.ids.min_area, min as f64);
        self.core.set(self.ids.max_area, max as f64);
    }

    pub fn set_shape_minimums(&mut self, circularity: f32, convexity: f32, inertia: f32) {
        self.core.set(self.ids.min_circularity, circularity as f64);
        self.core.set(self.ids.min_convexity, convexity as f64);
        self.core.set(self.ids.min_inertia, inertia as f64);
    }

    pub fn set_polarity(&mut self, bright: bool, dark: bool) {
        self.core.set(self.ids.detect_bright, bright as u8 as f64);
        self.core.set(self.ids.detect_dark, dark as u8 as f64);
    }

    pub fn set_threshold(&mut self, t: f32) {
        self.core.set(self.ids.threshold, t as f64);
    }

    /// Blobs found by the last cook.
    pub fn keypoints(&self) -> &[KeyPoint] {
        &self.keypoints
    }

    pub fn blob_count(&self) -> usize {
        self.keypoints.len()
    }

    /// Detector constructions so far.
    pub fn build_count(&self) -> u64 {
        self.build_count
    }

    /// Detector for `filters`, rebuilt only when they changed.
    fn detector_for(&mut self, filters: DetectorFilters) -> &BlobDetector {
        let stale = self.detector.as_ref().map_or(true, |(cached, _)| *cached != filters);
        if stale {
            self.build_count += 1;
            info!(build = self.build_count, ?filters, "blob detector rebuilt");
            self.detector = Some((filters, BlobDetector::new(filters.to_blob_params())));
        }
        let (_, det) = self
            .detector
            .get_or_insert_with(|| (filters, BlobDetector::new(filters.to_blob_params())));
        det
    }

    fn draw_overlay(&mut self, gray: &Image<u8>, filters: &DetectorFilters) {
        let binary = match filters.polarity() {
            Polarity::Dark => binarize_inverted(gray, filters.threshold),
            Polarity::Bright | Polarity::Both => binarize(gray, filters.threshold),
        };
        let out = &mut self.core.output;

        let outline = Stroke::new(CONTOUR_COLOR, 2).antialiased();
        let (lo, hi) = (filters.min_area as f64, filters.max_area as f64);
        for c in find_contours(&binary, RetrievalMode::OuterOnly, ChainApprox::Simple) {
            let a = area(&c.points);
            if a >= lo && a <= hi {
                closed_polyline(out, &c.points, &outline);
            }
        }

        let ring = Stroke::new(CIRCLE_COLOR, 2).antialiased();
        let cross = Stroke::new(CROSS_COLOR, 2).antialiased();
        for kp in &self.keypoints {
            let center = ((kp.x as i32) as f32, (kp.y as i32) as f32);
            let radius = (kp.size / 2.0) as i32 as f32;
            circle(out, center, radius, &ring);
            crosshair(out, center, CROSS_ARM, &cross);
        }
    }
}

impl Operator for BlobTrack {
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
        let filters = self.filters();
        let gray = luma_from_view(input);
        self.keypoints = self.detector_for(filters).detect(&gray);

        self.core.output.copy_from_view(input);
        self.draw_overlay(&gray, &filters);
        debug!(blobs = self.keypoints.len(), "blobs detected");
    }

    fn release_state(&mut self) {
        self.detector = None;
        self.keypoints = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarity_flags() {
        assert_eq!(Polarity::from_flags(true, false), Polarity::Bright);
        assert_eq!(Polarity::from_flags(false, true), Polarity::Dark);
        assert_eq!(Polarity::from_flags(true, true), Polarity::Both);
        assert_eq!(Polarity::from_flags(false, false), Polarity::Both);
    }

    #[test]
    fn filters_map_to_detector_params() {
        let f = DetectorFilters {
            min_area: 200.0,
            max_area: 1000.0,
            min_circularity: 0.0,
            min_convexity: 0.5,
            min_inertia: 0.01,
            detect_bright: false,
            detect_dark: true,
            threshold: 128.0,
        };
        let p = f.to_blob_params();
        assert_eq!((p.min_threshold, p.max_threshold, p.threshold_step), (78.0, 178.0, 10.0));
        assert!(!p.filter_by_circularity);
        assert!(p.filter_by_convexity);
        assert!(!p.filter_by_inertia, "0.01 is not above the cutoff");
        assert!(p.filter_by_color);
        assert_eq!(p.blob_color, 0);
        assert_eq!(p.min_repeatability, 2);
    }

    #[test]
    fn defaults_match_declared_params() {
        let b = BlobTrack::new();
        let f = b.filters();
        assert_eq!(f.min_area, 100.0);
        assert_eq!(f.max_area, 50000.0);
        assert!(f.detect_bright && f.detect_dark);
        assert_eq!(f.threshold, 128.0);
        assert_eq!(b.build_count(), 0);
    }

    #[test]
    fn detector_cache_rebuilds_only_on_change() {
        let mut b = BlobTrack::new();
        let f = b.filters();
        b.detector_for(f);
        b.detector_for(f);
        assert_eq!(b.build_count(), 1);
        let g = DetectorFilters { threshold: 100.0, ..f };
        b.detector_for(g);
        assert_eq!(b.build_count(), 2);
        b.detector_for(g);
        assert_eq!(b.build_count(), 2);
    }
}
