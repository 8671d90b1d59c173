// contour_trace.rs — Border following with hierarchy (Suzuki & Abe, 1985).
//
// Input is any single-channel mask; nonzero pixels are foreground. The mask
// is copied into a zero-padded i32 label plane so border following never
// has to bounds-check, and each traced border stamps its sequence number
// (NBD) into the plane. The frame around the image is border 1 and counts
// as a hole.
//
// Neighbourhood order, index 0..8, is clockwise on screen (y grows down):
//
//     5 6 7
//     4 . 0
//     3 2 1
//
// so `d + 1` is the next clockwise neighbour and `d + 7` the next
// counter-clockwise one.
//
// Retrieval modes decide which borders are reported and how parents are
// expressed; the tracing itself is identical for all of them.

use crate::geometry::Point;
use crate::image::Image;

/// (row, column) offsets, clockwise starting east.
const DIRS: [(isize, isize); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Which borders to report and how to link them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RetrievalMode {
    /// Outermost borders only; no parents.
    #[default]
    OuterOnly,
    /// Every border, flat; no parents.
    AllFlat,
    /// Outer borders at the top level; each hole points at the outer border
    /// that encloses it.
    TwoLevelHierarchy,
    /// Complete nesting tree.
    FullTree,
}

impl RetrievalMode {
    pub const ALL: [RetrievalMode; 4] = [
        RetrievalMode::OuterOnly,
        RetrievalMode::AllFlat,
        RetrievalMode::TwoLevelHierarchy,
        RetrievalMode::FullTree,
    ];

    /// Mode for a parameter index; out-of-range indices clamp to the ends.
    pub fn from_index(i: i64) -> Self {
        Self::ALL[i.clamp(0, 3) as usize]
    }

    pub fn index(self) -> i64 {
        self as i64
    }

    /// Whether this mode reports parent links.
    pub fn is_hierarchical(self) -> bool {
        matches!(self, RetrievalMode::TwoLevelHierarchy | RetrievalMode::FullTree)
    }
}

/// Point density of traced contours.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChainApprox {
    /// Every border pixel.
    None,
    /// Only the end points of straight horizontal, vertical and diagonal runs.
    #[default]
    Simple,
}

/// One traced border.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point>,
    /// Border of a hole (background region enclosed by foreground).
    pub is_hole: bool,
    /// Index of the enclosing contour in the same result list.
    pub parent: Option<usize>,
}

/// Trace all borders of `mask` and report them per `mode`.
pub fn find_contours(mask: &Image<u8>, mode: RetrievalMode, approx: ChainApprox) -> Vec<Contour> {
    let borders = BorderTracer::new(mask).trace_all();
    select(borders, mode, approx)
}

/// Raw border as produced by the tracer. `parent` is a border number
/// (0 = none, 1 = the frame).
struct Border {
    pixels: Vec<(usize, usize)>,
    is_hole: bool,
    parent: usize,
}

struct BorderTracer {
    f: Vec<i32>,
    /// Padded width.
    pw: usize,
    ph: usize,
}

impl BorderTracer {
    fn new(mask: &Image<u8>) -> Self {
        let (w, h) = mask.dimensions();
        let pw = w + 2;
        let ph = h + 2;
        let mut f = vec![0i32; pw * ph];
        for y in 0..h {
            let dst = &mut f[(y + 1) * pw + 1..(y + 1) * pw + 1 + w];
            for (d, &s) in dst.iter_mut().zip(mask.row(y)) {
                *d = i32::from(s != 0);
            }
        }
        BorderTracer { f, pw, ph }
    }

    #[inline]
    fn at(&self, p: (usize, usize)) -> i32 {
        self.f[p.0 * self.pw + p.1]
    }

    #[inline]
    fn set(&mut self, p: (usize, usize), v: i32) {
        self.f[p.0 * self.pw + p.1] = v;
    }

    #[inline]
    fn step(p: (usize, usize), d: usize) -> (usize, usize) {
        let (di, dj) = DIRS[d];
        ((p.0 as isize + di) as usize, (p.1 as isize + dj) as usize)
    }

    fn dir_between(from: (usize, usize), to: (usize, usize)) -> usize {
        let d = (to.0 as isize - from.0 as isize, to.1 as isize - from.1 as isize);
        DIRS.iter().position(|&o| o == d).unwrap_or(0)
    }

    /// Raster scan; returns borders indexed by NBD − 2.
    fn trace_all(mut self) -> Vec<Border> {
        // Index 0 unused, index 1 is the frame.
        let mut kinds: Vec<(bool, usize)> = vec![(true, 0), (true, 0)];
        let mut borders = Vec::new();
        let mut nbd: i32 = 1;

        for i in 1..self.ph - 1 {
            let mut lnbd: usize = 1;
            for j in 1..self.pw - 1 {
                let fij = self.at((i, j));
                if fij == 0 {
                    continue;
                }

                let start = if fij == 1 && self.at((i, j - 1)) == 0 {
                    Some((false, (i, j - 1)))
                } else if fij >= 1 && self.at((i, j + 1)) == 0 {
                    if fij > 1 {
                        lnbd = fij as usize;
                    }
                    Some((true, (i, j + 1)))
                } else {
                    None
                };

                if let Some((is_hole, from)) = start {
                    nbd += 1;
                    let (prev_hole, prev_parent) = kinds[lnbd];
                    let parent = if is_hole == prev_hole { prev_parent } else { lnbd };
                    kinds.push((is_hole, parent));
                    let pixels = self.follow((i, j), from, nbd);
                    borders.push(Border { pixels, is_hole, parent });
                }

                let f_now = self.at((i, j));
                if f_now != 1 {
                    lnbd = f_now.unsigned_abs() as usize;
                }
            }
        }
        borders
    }

    /// Follow one border starting at `start`, entering from background
    /// pixel `from`. Stamps the border with `nbd` and returns its pixels in
    /// traversal order (padded coordinates).
    fn follow(&mut self, start: (usize, usize), from: (usize, usize), nbd: i32) -> Vec<(usize, usize)> {
        // Clockwise search for any foreground neighbour.
        let d0 = Self::dir_between(start, from);
        let first = (0..8)
            .map(|k| Self::step(start, (d0 + k) % 8))
            .find(|&p| self.at(p) != 0);
        let Some(p1) = first else {
            // Isolated pixel.
            self.set(start, -nbd);
            return vec![start];
        };

        let mut pixels = vec![start];
        let mut p2 = p1;
        let mut p3 = start;
        loop {
            // Counter-clockwise search around p3, beginning just past p2.
            let back = Self::dir_between(p3, p2);
            let mut p4 = p2;
            let mut east_is_background = false;
            for k in 1..=8 {
                let d = (back + 8 - k) % 8;
                let p = Self::step(p3, d);
                if self.at(p) != 0 {
                    p4 = p;
                    break;
                }
                if d == 0 {
                    east_is_background = true;
                }
            }

            if east_is_background {
                self.set(p3, -nbd);
            } else if self.at(p3) == 1 {
                self.set(p3, nbd);
            }

            if p4 == start && p3 == p1 {
                break;
            }
            pixels.push(p4);
            p2 = p3;
            p3 = p4;
        }
        pixels
    }
}

/// Apply the retrieval mode and point approximation to raw borders.
fn select(borders: Vec<Border>, mode: RetrievalMode, approx: ChainApprox) -> Vec<Contour> {
    // Border number n lives at borders[n - 2].
    let keep: Vec<bool> = borders
        .iter()
        .map(|b| match mode {
            RetrievalMode::OuterOnly => !b.is_hole && b.parent == 1,
            _ => true,
        })
        .collect();

    let mut out_index = vec![None; borders.len()];
    let mut next = 0;
    for (i, &k) in keep.iter().enumerate() {
        if k {
            out_index[i] = Some(next);
            next += 1;
        }
    }

    let parent_of = |b: &Border| -> Option<usize> {
        let link = match mode {
            RetrievalMode::OuterOnly | RetrievalMode::AllFlat => return None,
            RetrievalMode::TwoLevelHierarchy if !b.is_hole => return None,
            RetrievalMode::TwoLevelHierarchy | RetrievalMode::FullTree => b.parent,
        };
        if link < 2 {
            return None;
        }
        out_index[link - 2]
    };

    borders
        .iter()
        .zip(&keep)
        .filter(|(_, &k)| k)
        .map(|(b, _)| {
            let points: Vec<Point> = b
                .pixels
                .iter()
                .map(|&(i, j)| Point::new(j as i32 - 1, i as i32 - 1))
                .collect();
            Contour {
                points: match approx {
                    ChainApprox::None => points,
                    ChainApprox::Simple => compress_runs(&points),
                },
                is_hole: b.is_hole,
                parent: parent_of(b),
            }
        })
        .collect()
}

/// Keep only points where the step direction changes (closed sequence).
fn compress_runs(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let step = |a: Point, b: Point| (b.x - a.x, b.y - a.y);
    let kept: Vec<Point> = (0..n)
        .filter(|&k| {
            let prev = points[(k + n - 1) % n];
            let next = points[(k + 1) % n];
            step(prev, points[k]) != step(points[k], next)
        })
        .map(|k| points[k])
        .collect();
    if kept.is_empty() {
        points[..1].to_vec()
    } else {
        kept
    }
}
