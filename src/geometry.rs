// geometry.rs — Measurements on closed integer polygons.
//
// Contours come out of the tracer as pixel-centre polygons, so a filled
// 20×20 square measures 19×19 = 361 here, not 400. Blob filters are tuned
// to that convention.
//
// Moments use Green's theorem over the polygon edges rather than summing
// pixels; the result is independent of traversal direction because the
// accumulated signs are normalized at the end.

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// Shoelace area, positive for counter-clockwise order in y-up axes.
pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    let mut prev = points[points.len() - 1];
    for &p in points {
        acc += prev.x as i64 * p.y as i64 - p.x as i64 * prev.y as i64;
        prev = p;
    }
    acc as f64 * 0.5
}

/// Enclosed polygon area (absolute value).
pub fn area(points: &[Point]) -> f64 {
    signed_area(points).abs()
}

/// Perimeter of the closed polygon.
pub fn arc_length(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut prev = points[points.len() - 1];
    let mut len = 0.0;
    for &p in points {
        let dx = (p.x - prev.x) as f64;
        let dy = (p.y - prev.y) as f64;
        len += (dx * dx + dy * dy).sqrt();
        prev = p;
    }
    len
}

/// Spatial and central moments up to second order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
}

impl Moments {
    /// Polygon moments of a closed contour.
    pub fn of_polygon(points: &[Point]) -> Self {
        let mut a00 = 0.0;
        let mut a10 = 0.0;
        let mut a01 = 0.0;
        let mut a20 = 0.0;
        let mut a11 = 0.0;
        let mut a02 = 0.0;

        if points.len() >= 3 {
            let last = points[points.len() - 1];
            let (mut xp, mut yp) = (last.x as f64, last.y as f64);
            for p in points {
                let (xi, yi) = (p.x as f64, p.y as f64);
                let dxy = xp * yi - xi * yp;
                let xs = xp + xi;
                let ys = yp + yi;
                a00 += dxy;
                a10 += dxy * xs;
                a01 += dxy * ys;
                a20 += dxy * (xp * xs + xi * xi);
                a11 += dxy * (xp * (yp + ys) + xi * (ys + yi));
                a02 += dxy * (yp * ys + yi * yi);
                xp = xi;
                yp = yi;
            }
        }

        let sign = if a00 < 0.0 { -1.0 } else { 1.0 };
        let mut m = Moments {
            m00: sign * a00 / 2.0,
            m10: sign * a10 / 6.0,
            m01: sign * a01 / 6.0,
            m20: sign * a20 / 12.0,
            m11: sign * a11 / 24.0,
            m02: sign * a02 / 12.0,
            ..Default::default()
        };
        if m.m00.abs() > f64::EPSILON {
            let cx = m.m10 / m.m00;
            let cy = m.m01 / m.m00;
            m.mu20 = m.m20 - m.m10 * cx;
            m.mu11 = m.m11 - m.m10 * cy;
            m.mu02 = m.m02 - m.m01 * cy;
        }
        m
    }

    /// Centroid, or `None` for a degenerate (zero-area) polygon.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        (self.m00.abs() > f64::EPSILON).then(|| (self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Ratio of minimum to maximum principal inertia: 1 for a circle or
    /// square, approaching 0 for a line.
    pub fn inertia_ratio(&self) -> f64 {
        const EPS: f64 = 1e-2;
        let diff = self.mu20 - self.mu02;
        let denom = ((2.0 * self.mu11).powi(2) + diff * diff).sqrt();
        if denom <= EPS {
            return 1.0;
        }
        let cos_min = diff / denom;
        let sin_min = 2.0 * self.mu11 / denom;
        let half_sum = 0.5 * (self.mu20 + self.mu02);
        let i_min = half_sum - 0.5 * diff * cos_min - self.mu11 * sin_min;
        let i_max = half_sum + 0.5 * diff * cos_min + self.mu11 * sin_min;
        if i_max.abs() <= f64::EPSILON {
            return 1.0;
        }
        i_min / i_max
    }
}

/// Convex hull (Andrew's monotone chain), counter-clockwise, no duplicate
/// closing point. Collinear points on hull edges are dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_unstable();
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: Point, a: Point, b: Point) -> i64 {
        (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
    }

    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i32, y0: i32, side: i32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + side),
            Point::new(x0 + side, y0 + side),
            Point::new(x0 + side, y0),
        ]
    }

    #[test]
    fn area_and_perimeter_of_square() {
        let sq = square(2, 3, 19);
        assert_eq!(area(&sq), 361.0);
        assert_eq!(arc_length(&sq), 76.0);
        let mut rev = sq.clone();
        rev.reverse();
        assert_eq!(signed_area(&sq), -signed_area(&rev));
    }

    #[test]
    fn moments_centroid_of_square() {
        let m = Moments::of_polygon(&square(10, 20, 19));
        assert!((m.m00 - 361.0).abs() < 1e-9);
        let (cx, cy) = m.centroid().unwrap();
        assert!((cx - 19.5).abs() < 1e-9);
        assert!((cy - 29.5).abs() < 1e-9);
        assert!((m.inertia_ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn moments_are_orientation_independent() {
        let sq = square(0, 0, 8);
        let mut rev = sq.clone();
        rev.reverse();
        assert_eq!(Moments::of_polygon(&sq), Moments::of_polygon(&rev));
    }

    #[test]
    fn elongated_rectangle_has_low_inertia_ratio() {
        let rect = vec![
            Point::new(0, 0),
            Point::new(0, 2),
            Point::new(40, 2),
            Point::new(40, 0),
        ];
        let r = Moments::of_polygon(&rect).inertia_ratio();
        // (2² / 40²) for a thin rectangle.
        assert!(r < 0.01, "ratio {r}");
    }

    #[test]
    fn hull_of_concave_shape() {
        // L-shape: hull adds the missing corner region.
        let l = vec![
            Point::new(0, 0),
            Point::new(0, 10),
            Point::new(10, 10),
            Point::new(10, 5),
            Point::new(5, 5),
            Point::new(5, 0),
        ];
        let hull = convex_hull(&l);
        assert_eq!(hull.len(), 5);
        assert_eq!(area(&l), 75.0);
        assert_eq!(area(&hull), 87.5);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(area(&[Point::new(1, 1)]), 0.0);
        assert_eq!(arc_length(&[]), 0.0);
        assert!(Moments::of_polygon(&[Point::new(0, 0), Point::new(3, 0)]).centroid().is_none());
        assert_eq!(convex_hull(&[Point::new(2, 2), Point::new(2, 2)]).len(), 1);
    }
}
