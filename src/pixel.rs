// pixel.rs — Four-channel 8-bit frames exchanged between operators.
//
// Channel order is fixed: blue, green, red, alpha. Byte 3 of every texel is
// alpha.
//
//   PixelBuffer  owned, tightly packed, reallocated only on resize.
//   PixelView    borrowed read-only handle with an explicit row stride.
//                An invalid view (no data or a zero dimension) means
//                "no CPU pixels this frame" and is never an error.

use rayon::prelude::*;

/// One BGRA texel.
pub type Bgra = [u8; 4];

pub const CHANNELS: usize = 4;

pub const TRANSPARENT: Bgra = [0, 0, 0, 0];
pub const OPAQUE_BLACK: Bgra = [0, 0, 0, 255];

// ---------------------------------------------------------------------------
// PixelBuffer
// ---------------------------------------------------------------------------

/// Owned, contiguous BGRA8 image. `data.len() == width * height * 4`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl PixelBuffer {
    /// Zero-filled (fully transparent) buffer.
    pub fn new(width: usize, height: usize) -> Self {
        PixelBuffer {
            data: vec![0; width * height * CHANNELS],
            width,
            height,
        }
    }

    pub fn filled(width: usize, height: usize, color: Bgra) -> Self {
        let mut buf = Self::new(width, height);
        buf.fill(color);
        buf
    }

    /// Wrap existing BGRA bytes.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * 4`.
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width * height * CHANNELS,
            "BGRA data length ({}) must equal width * height * 4 ({})",
            data.len(),
            width * height * CHANNELS,
        );
        PixelBuffer { data, width, height }
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

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Resize to `width × height`. Returns `true` if storage was reallocated.
    /// Pixel contents are unspecified after a reallocation; callers fill or
    /// overwrite the whole buffer.
    pub fn ensure_size(&mut self, width: usize, height: usize) -> bool {
        if self.width == width && self.height == height && !self.data.is_empty() {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data = vec![0; width * height * CHANNELS];
        true
    }

    /// Drop the pixel storage, leaving a 0×0 buffer.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.width = 0;
        self.height = 0;
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Bgra {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Bgra) {
        let i = self.offset(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&color);
    }

    pub fn fill(&mut self, color: Bgra) {
        self.data
            .par_chunks_exact_mut(CHANNELS)
            .for_each(|px| px.copy_from_slice(&color));
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.width * CHANNELS;
        &self.data[start..start + self.width * CHANNELS]
    }

    /// Mutable BGRA rows, for row-parallel fills.
    pub fn par_rows_mut(&mut self) -> rayon::slice::ChunksExactMut<'_, u8> {
        let row_bytes = (self.width * CHANNELS).max(1);
        self.data.par_chunks_exact_mut(row_bytes)
    }

    /// Borrow as a read-only view for downstream consumers.
    pub fn view(&self) -> PixelView<'_> {
        if self.data.is_empty() {
            return PixelView::invalid();
        }
        PixelView::new(&self.data, self.width, self.height)
    }

    /// Overwrite this buffer with the contents of `view`, resizing if needed.
    /// Does nothing for an invalid view.
    pub fn copy_from_view(&mut self, view: &PixelView<'_>) {
        if !view.is_valid() {
            return;
        }
        self.ensure_size(view.width(), view.height());
        let row_bytes = self.width * CHANNELS;
        for y in 0..self.height {
            self.data[y * row_bytes..(y + 1) * row_bytes].copy_from_slice(view.row(y));
        }
    }

    /// True when every texel has alpha 0.
    pub fn is_fully_transparent(&self) -> bool {
        self.data.chunks_exact(CHANNELS).all(|px| px[3] == 0)
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for buffer {}×{}",
            self.width,
            self.height,
        );
        (y * self.width + x) * CHANNELS
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PixelBuffer {{ {}×{} BGRA8 }}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// PixelView
// ---------------------------------------------------------------------------

/// Borrowed BGRA8 frame. Valid only for the frame it was produced in.
#[derive(Clone, Copy, Debug)]
pub struct PixelView<'a> {
    data: Option<&'a [u8]>,
    width: usize,
    height: usize,
    /// Bytes between the starts of consecutive rows.
    stride: usize,
}

impl<'a> PixelView<'a> {
    /// Tightly packed view (`stride == width * 4`).
    pub fn new(data: &'a [u8], width: usize, height: usize) -> Self {
        Self::with_stride(data, width, height, width * CHANNELS)
    }

    pub fn with_stride(data: &'a [u8], width: usize, height: usize, stride: usize) -> Self {
        PixelView { data: Some(data), width, height, stride }
    }

    /// The explicit "no pixels this frame" view.
    pub const fn invalid() -> Self {
        PixelView { data: None, width: 0, height: 0, stride: 0 }
    }

    /// Data present, both dimensions positive, and enough bytes for every row.
    pub fn is_valid(&self) -> bool {
        let Some(data) = self.data else {
            return false;
        };
        if self.width == 0 || self.height == 0 || self.stride < self.width * CHANNELS {
            return false;
        }
        data.len() >= self.stride * (self.height - 1) + self.width * CHANNELS
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
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The `width * 4` pixel bytes of row `y`.
    ///
    /// # Panics
    /// Panics on an invalid view or an out-of-range row.
    pub fn row(&self, y: usize) -> &'a [u8] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let data = self.data.unwrap_or(&[]);
        let start = y * self.stride;
        &data[start..start + self.width * CHANNELS]
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Bgra {
        let row = self.row(y);
        let i = x * CHANNELS;
        [row[i], row[i + 1], row[i + 2], row[i + 3]]
    }
}

impl Default for PixelView<'_> {
    fn default() -> Self {
        Self::invalid()
    }
}
