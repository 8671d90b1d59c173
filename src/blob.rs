// blob.rs — Multi-threshold blob detection.
//
// The grey image is binarized at a sweep of thresholds. At every threshold
// each traced border becomes a candidate center (its polygon centroid) if
// it passes the enabled shape filters:
//
//   area         min ≤ m00 < max
//   circularity  4π·area / perimeter²
//   inertia      ratio of principal second moments (1 = round, 0 = line)
//   convexity    area / convex hull area
//   colour       binary value at the rounded center equals `blob_color`
//
// Candidates from successive thresholds are merged into groups when they
// lie closer than `min_dist_between_blobs` and within each other's radius.
// A group seen at `min_repeatability` or more thresholds becomes one
// keypoint: its location is the confidence-weighted mean of the group and
// its size is twice the group's median radius.
//
// Thresholds are independent, so candidates are extracted in parallel and
// grouped afterwards in threshold order.

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::contour_trace::{find_contours, ChainApprox, RetrievalMode};
use crate::geometry::{arc_length, area, convex_hull, Moments, Point};
use crate::image::Image;

/// Detector configuration. Filters with `filter_by_* == false` are skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobParams {
    pub min_threshold: f32,
    pub max_threshold: f32,
    pub threshold_step: f32,
    pub min_repeatability: usize,
    pub min_dist_between_blobs: f32,

    pub filter_by_area: bool,
    pub min_area: f32,
    pub max_area: f32,

    pub filter_by_circularity: bool,
    pub min_circularity: f32,

    pub filter_by_inertia: bool,
    pub min_inertia_ratio: f32,

    pub filter_by_convexity: bool,
    pub min_convexity: f32,

    pub filter_by_color: bool,
    pub blob_color: u8,
}

impl Default for BlobParams {
    fn default() -> Self {
        BlobParams {
            min_threshold: 50.0,
            max_threshold: 220.0,
            threshold_step: 10.0,
            min_repeatability: 2,
            min_dist_between_blobs: 10.0,
            filter_by_area: true,
            min_area: 25.0,
            max_area: 5000.0,
            filter_by_circularity: false,
            min_circularity: 0.8,
            filter_by_inertia: true,
            min_inertia_ratio: 0.1,
            filter_by_convexity: true,
            min_convexity: 0.95,
            filter_by_color: true,
            blob_color: 0,
        }
    }
}

/// A detected blob.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Diameter.
    pub size: f32,
}

/// One candidate at one threshold.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: f64,
    y: f64,
    radius: f64,
    confidence: f64,
}

impl Candidate {
    fn distance(&self, other: &Candidate) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A configured detector. Construction is where configuration is fixed;
/// callers that change filters build a new one.
#[derive(Clone, Debug)]
pub struct BlobDetector {
    params: BlobParams,
}

impl BlobDetector {
    pub fn new(params: BlobParams) -> Self {
        BlobDetector { params }
    }

    pub fn params(&self) -> &BlobParams {
        &self.params
    }

    /// Thresholds of the sweep, lowest first.
    pub fn thresholds(&self) -> Vec<f32> {
        let p = &self.params;
        let step = p.threshold_step.max(f32::EPSILON);
        let mut out = Vec::new();
        let mut t = p.min_threshold;
        while t < p.max_threshold {
            out.push(t);
            t += step;
        }
        out
    }

    /// Detect blobs in a grey image.
    pub fn detect(&self, gray: &Image<u8>) -> Vec<KeyPoint> {
        if gray.is_empty() {
            return Vec::new();
        }

        let per_threshold: Vec<Vec<Candidate>> = self
            .thresholds()
            .into_par_iter()
            .map(|t| self.find_candidates(&binarize(gray, t)))
            .collect();

        // Each group stays sorted by radius so the median sits at len / 2.
        let mut groups: Vec<Vec<Candidate>> = Vec::new();
        for candidates in per_threshold {
            let mut fresh: Vec<Vec<Candidate>> = Vec::new();
            for cur in candidates {
                let matched = groups.iter_mut().find(|g| {
                    let mid = &g[g.len() / 2];
                    let d = mid.distance(&cur);
                    d < self.params.min_dist_between_blobs as f64 || d < mid.radius || d < cur.radius
                });
                match matched {
                    Some(g) => {
                        let pos = g.partition_point(|c| c.radius <= cur.radius);
                        g.insert(pos, cur);
                    }
                    None => fresh.push(vec![cur]),
                }
            }
            groups.extend(fresh);
        }

        groups
            .iter()
            .filter(|g| g.len() >= self.params.min_repeatability)
            .filter_map(|g| {
                let norm: f64 = g.iter().map(|c| c.confidence).sum();
                if norm <= 0.0 {
                    return None;
                }
                let x = g.iter().map(|c| c.x * c.confidence).sum::<f64>() / norm;
                let y = g.iter().map(|c| c.y * c.confidence).sum::<f64>() / norm;
                let size = g[g.len() / 2].radius * 2.0;
                Some(KeyPoint { x: x as f32, y: y as f32, size: size as f32 })
            })
            .collect()
    }

    fn find_candidates(&self, binary: &Image<u8>) -> Vec<Candidate> {
        let p = &self.params;
        let contours = find_contours(binary, RetrievalMode::AllFlat, ChainApprox::None);
        let mut out = Vec::new();

        for contour in &contours {
            let pts = &contour.points;
            let m = Moments::of_polygon(pts);
            let mut confidence = 1.0;

            if p.filter_by_area && (m.m00 < p.min_area as f64 || m.m00 >= p.max_area as f64) {
                continue;
            }

            if p.filter_by_circularity {
                let perimeter = arc_length(pts);
                if perimeter <= 0.0 {
                    continue;
                }
                let ratio = 4.0 * PI * m.m00 / (perimeter * perimeter);
                if ratio < p.min_circularity as f64 {
                    continue;
                }
            }

            if p.filter_by_inertia {
                let ratio = m.inertia_ratio();
                if ratio < p.min_inertia_ratio as f64 {
                    continue;
                }
                confidence = ratio * ratio;
            }

            if p.filter_by_convexity {
                let hull_area = area(&convex_hull(pts));
                if hull_area.abs() < f64::EPSILON {
                    continue;
                }
                if area(pts) / hull_area < p.min_convexity as f64 {
                    continue;
                }
            }

            let Some((cx, cy)) = m.centroid() else {
                continue;
            };

            if p.filter_by_color {
                let (rx, ry) = (cx.round(), cy.round());
                if rx < 0.0 || ry < 0.0 {
                    continue;
                }
                let (rx, ry) = (rx as usize, ry as usize);
                if rx >= binary.width() || ry >= binary.height() || binary.get(rx, ry) != p.blob_color {
                    continue;
                }
            }

            out.push(Candidate { x: cx, y: cy, radius: median_distance(pts, cx, cy), confidence });
        }
        out
    }
}

/// `> threshold` → 255, else 0.
pub fn binarize(gray: &Image<u8>, threshold: f32) -> Image<u8> {
    let data = gray.as_slice().iter().map(|&v| if v as f32 > threshold { 255 } else { 0 }).collect();
    Image::from_vec(gray.width(), gray.height(), data)
}

/// `> threshold` → 0, else 255.
pub fn binarize_inverted(gray: &Image<u8>, threshold: f32) -> Image<u8> {
    let data = gray.as_slice().iter().map(|&v| if v as f32 > threshold { 0 } else { 255 }).collect();
    Image::from_vec(gray.width(), gray.height(), data)
}

/// Median distance from (cx, cy) to the contour points.
fn median_distance(points: &[Point], cx: f64, cy: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let mut d: Vec<f64> = points
        .iter()
        .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
        .collect();
    d.sort_unstable_by(f64::total_cmp);
    let n = d.len();
    (d[(n - 1) / 2] + d[n / 2]) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(w: usize, h: usize, bg: u8, rects: &[(usize, usize, usize, usize, u8)]) -> Image<u8> {
        let mut img = Image::filled(w, h, bg);
        for &(x0, y0, rw, rh, v) in rects {
            for y in y0..y0 + rh {
                for x in x0..x0 + rw {
                    img.set(x, y, v);
                }
            }
        }
        img
    }

    fn disc(w: usize, h: usize, cx: f32, cy: f32, r: f32, fg: u8, bg: u8) -> Image<u8> {
        let mut img = Image::filled(w, h, bg);
        for y in 0..h {
            for x in 0..w {
                if (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2) <= r * r {
                    img.set(x, y, fg);
                }
            }
        }
        img
    }

    fn bright_params() -> BlobParams {
        BlobParams {
            min_threshold: 78.0,
            max_threshold: 178.0,
            min_area: 200.0,
            max_area: 1000.0,
            filter_by_circularity: true,
            min_circularity: 0.1,
            min_convexity: 0.5,
            blob_color: 255,
            ..Default::default()
        }
    }

    #[test]
    fn threshold_sweep() {
        let det = BlobDetector::new(bright_params());
        let t = det.thresholds();
        assert_eq!(t.len(), 10);
        assert_eq!(t[0], 78.0);
        assert_eq!(*t.last().unwrap(), 168.0);
    }

    #[test]
    fn single_square_gives_one_keypoint_at_centroid() {
        let img = scene(64, 64, 0, &[(22, 22, 20, 20, 255)]);
        let kps = BlobDetector::new(bright_params()).detect(&img);
        assert_eq!(kps.len(), 1);
        assert!((kps[0].x - 31.5).abs() < 1e-3);
        assert!((kps[0].y - 31.5).abs() < 1e-3);
        // Median border distance of a 19×19 pixel-centre square lies
        // between the inscribed (9.5) and circumscribed (13.4) radii.
        assert!(kps[0].size > 19.0 && kps[0].size < 27.0, "size {}", kps[0].size);
    }

    #[test]
    fn area_filter_rejects_small_and_large() {
        let img = scene(80, 80, 0, &[(5, 5, 6, 6, 255), (30, 30, 20, 20, 255)]);
        let kps = BlobDetector::new(bright_params()).detect(&img);
        assert_eq!(kps.len(), 1);
        assert!((kps[0].x - 39.5).abs() < 1e-3);

        let tight = BlobParams { max_area: 300.0, ..bright_params() };
        assert!(BlobDetector::new(tight).detect(&img).is_empty());
    }

    #[test]
    fn colour_filter_selects_polarity() {
        let img = disc(64, 64, 32.0, 32.0, 10.0, 0, 255);
        let bright = BlobDetector::new(bright_params()).detect(&img);
        assert!(bright.is_empty());

        let dark = BlobParams { blob_color: 0, ..bright_params() };
        let kps = BlobDetector::new(dark).detect(&img);
        assert_eq!(kps.len(), 1);
        assert!((kps[0].x - 32.0).abs() < 1.0);
        assert!((kps[0].y - 32.0).abs() < 1.0);
    }

    #[test]
    fn inertia_filter_rejects_lines() {
        let img = scene(100, 40, 0, &[(10, 18, 70, 4, 255)]);
        let p = BlobParams { min_area: 50.0, filter_by_circularity: false, min_inertia_ratio: 0.3, ..bright_params() };
        assert!(BlobDetector::new(p.clone()).detect(&img).is_empty());
        let loose = BlobParams { filter_by_inertia: false, ..p };
        assert_eq!(BlobDetector::new(loose).detect(&img).len(), 1);
    }

    #[test]
    fn single_threshold_below_repeatability() {
        let p = BlobParams { min_threshold: 128.0, max_threshold: 129.0, ..bright_params() };
        let img = scene(64, 64, 0, &[(22, 22, 20, 20, 255)]);
        assert!(BlobDetector::new(p.clone()).detect(&img).is_empty());
        let once = BlobParams { min_repeatability: 1, ..p };
        assert_eq!(BlobDetector::new(once).detect(&img).len(), 1);
    }

    #[test]
    fn binarize_polarity() {
        let img = Image::from_vec(3, 1, vec![10u8, 128, 200]);
        assert_eq!(binarize(&img, 128.0).as_slice(), &[0, 0, 255]);
        assert_eq!(binarize_inverted(&img, 128.0).as_slice(), &[255, 255, 0]);
    }

    #[test]
    fn median_of_even_count_averages() {
        let pts = [Point::new(1, 0), Point::new(2, 0), Point::new(3, 0), Point::new(4, 0)];
        assert_eq!(median_distance(&pts, 0.0, 0.0), 2.5);
    }
}
