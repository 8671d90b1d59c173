// image.rs — Single-channel planes.
//
// Luminance, edge maps and threshold masks are `Image<u8>`; flow
// components, polynomial coefficients and resampled luminance are
// `Image<f32>`. BGRA frames stay in `pixel::PixelBuffer` and are reduced to
// a plane once at the start of each cook.
//
// Storage is a tightly packed row-major Vec: (x, y) ↦ y * width + x.

use std::fmt;

/// Sample types a plane can hold.
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Raw value as f32; u8 maps to 0.0..=255.0, not 0..1.
    fn to_f32(self) -> f32;

    /// Saturating conversion back from f32.
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        // `as` saturates, and NaN becomes 0.
        v.round() as u8
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

/// Runtime-sized plane of `T`.
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Pixel> Image<T> {
    /// All-default (zero) plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image { width, height, data: vec![value; width * height] }
    }

    /// Wrap row-major samples.
    ///
    /// # Panics
    /// Panics unless `data.len() == width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert!(
            data.len() == width * height,
            "{width}×{height} plane needs {} samples, got {}",
            width * height,
            data.len(),
        );
        Image { width, height, data }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn index_of(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "({x}, {y}) outside {}×{} plane",
            self.width,
            self.height,
        );
        y * self.width + x
    }

    /// # Panics
    /// Panics when (x, y) lies outside the plane.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.index_of(x, y)]
    }

    /// Sample with replicated borders; any (x, y) is accepted.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> T {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let i = self.index_of(x, y);
        self.data[i] = value;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        let start = self.index_of(0, y);
        &self.data[start..start + self.width]
    }

    /// `(x, y, value)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width.max(1);
        self.data.iter().enumerate().map(move |(i, &v)| (i % w, i / w, v))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image<{}>({}×{})", std::any::type_name::<T>(), self.width, self.height)
    }
}

/// Bilinear sample of an f32 plane at a fractional position.
///
/// The position is clamped into the plane first, so borders replicate.
///
/// # Panics
/// Panics on an empty plane.
pub fn interpolate_bilinear(img: &Image<f32>, x: f32, y: f32) -> f32 {
    let (w, h) = img.dimensions();
    assert!(w > 0 && h > 0, "bilinear sample of an empty plane");

    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (x as usize, y as usize);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (ax, ay) = (x - x0 as f32, y - y0 as f32);

    let top = img.get(x0, y0) + ax * (img.get(x1, y0) - img.get(x0, y0));
    let bottom = img.get(x0, y1) + ax * (img.get(x1, y1) - img.get(x0, y1));
    top + ay * (bottom - top)
}
