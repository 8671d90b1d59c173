// codec.rs — Rgba16Float ↔ BGRA8 conversion for GPU texture transfers.
//
// GPU side: four IEEE half floats per texel in R, G, B, A order, linear
// light, rows padded to a multiple of 256 bytes (wgpu's
// COPY_BYTES_PER_ROW_ALIGNMENT). Host side: tightly packed BGRA8 in sRGB.
//
// Decode (texture → host):
//   half → f32, clamp to [0, 1], sRGB-encode colour channels, alpha linear,
//   scale by 255 and round to nearest.
//
// Encode (host → texture):
//   colour byte → linear through a 256-entry sRGB LUT, alpha / 255,
//   f32 → half, written into padded rows.
//
// Half packing follows the fast-path conversion used by most real-time
// code: subnormal results flush to signed zero, anything at or above the
// largest exponent saturates to infinity, and the mantissa rounds half-up.
// NaN is never produced because inputs are clamped first.
//
// Both directions work row-parallel with rayon; texels are cast with
// bytemuck so the padded byte buffer can be handed straight to wgpu.

use std::sync::OnceLock;

use rayon::prelude::*;

use crate::error::{CodecError, CodecResult};
use crate::pixel::{PixelBuffer, PixelView, CHANNELS};

/// wgpu's row alignment for buffer ↔ texture copies.
pub const COPY_ALIGNMENT: u32 = 256;

/// Bytes per Rgba16Float texel.
pub const TEXEL_BYTES: u32 = 8;

/// Host pixel layouts a caller may hand to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFormat {
    Bgra8,
    Bgr8,
    Gray8,
}

impl HostFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            HostFormat::Bgra8 => 4,
            HostFormat::Bgr8 => 3,
            HostFormat::Gray8 => 1,
        }
    }
}

/// Round `value` up to the next multiple of `alignment`.
///
///   align_to(100, 256) = 256
///   align_to(256, 256) = 256
///   align_to(257, 256) = 512
#[inline]
pub fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// Padded GPU row pitch for an Rgba16Float image of `width` texels.
#[inline]
pub fn padded_bytes_per_row(width: u32) -> u32 {
    align_to(width * TEXEL_BYTES, COPY_ALIGNMENT)
}

/// Total byte size of a padded Rgba16Float image.
#[inline]
pub fn padded_size(width: u32, height: u32) -> usize {
    padded_bytes_per_row(width) as usize * height as usize
}

// ---------------------------------------------------------------------------
// Half floats
// ---------------------------------------------------------------------------

/// IEEE binary16 → f32. Subnormals read as signed zero; exponent 31 reads
/// as signed infinity.
#[inline]
pub fn half_to_f32(h: u16) -> f32 {
    let sign = ((h & 0x8000) as u32) << 16;
    let exp = ((h >> 10) & 0x1f) as u32;
    let mant = (h & 0x3ff) as u32;
    let bits = match exp {
        0 => sign,
        31 => sign | 0x7f80_0000,
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

/// f32 → IEEE binary16 with round-half-up on the dropped mantissa bits.
#[inline]
pub fn f32_to_half(v: f32) -> u16 {
    let bits = v.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let mut exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mut mant = bits & 0x007f_ffff;

    if exp <= 0 {
        return sign;
    }
    if exp >= 31 {
        return sign | 0x7c00;
    }

    mant += 0x1000;
    if mant & 0x0080_0000 != 0 {
        mant = 0;
        exp += 1;
        if exp >= 31 {
            return sign | 0x7c00;
        }
    }
    sign | ((exp as u16) << 10) | (mant >> 13) as u16
}

// ---------------------------------------------------------------------------
// Transfer functions
// ---------------------------------------------------------------------------

/// Linear [0, 1] → sRGB byte.
#[inline]
pub fn linear_to_srgb(v: f32) -> u8 {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    let s = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round().clamp(0.0, 255.0) as u8
}

/// sRGB byte → linear [0, 1].
#[inline]
pub fn srgb_to_linear(c: u8) -> f32 {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        std::array::from_fn(|i| {
            let s = i as f32 / 255.0;
            if s <= 0.040_45 {
                s / 12.92
            } else {
                ((s + 0.055) / 1.055).powf(2.4)
            }
        })
    })[c as usize]
}

#[inline]
fn unit_to_byte(v: f32) -> u8 {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    (v * 255.0).round() as u8
}

// ---------------------------------------------------------------------------
// Image conversion
// ---------------------------------------------------------------------------

/// Decode a padded Rgba16Float image into a tightly packed BGRA8 buffer.
///
/// `padded` must hold at least `padded_size(width, height)` bytes.
pub fn decode_rgba16f(padded: &[u8], width: u32, height: u32) -> CodecResult<PixelBuffer> {
    if width == 0 || height == 0 {
        return Err(CodecError::EmptyImage);
    }
    let pitch = padded_bytes_per_row(width) as usize;
    let expected = padded_size(width, height);
    if padded.len() < expected {
        return Err(CodecError::SizeMismatch { width, height, expected, actual: padded.len() });
    }

    let (w, h) = (width as usize, height as usize);
    let mut out = PixelBuffer::new(w, h);
    out.par_rows_mut().enumerate().for_each(|(y, dst)| {
        let src = &padded[y * pitch..y * pitch + w * TEXEL_BYTES as usize];
        for (texel, px) in src.chunks_exact(TEXEL_BYTES as usize).zip(dst.chunks_exact_mut(CHANNELS)) {
            let [r, g, b, a]: [u16; 4] = bytemuck::pod_read_unaligned(texel);
            px[0] = linear_to_srgb(half_to_f32(b));
            px[1] = linear_to_srgb(half_to_f32(g));
            px[2] = linear_to_srgb(half_to_f32(r));
            px[3] = unit_to_byte(half_to_f32(a));
        }
    });
    Ok(out)
}

/// Encode a BGRA8 view into a padded Rgba16Float byte buffer.
///
/// `format` is what the caller claims the pixels are; anything but
/// [`HostFormat::Bgra8`] is rejected before any work is done.
pub fn encode_rgba16f(src: &PixelView<'_>, format: HostFormat) -> CodecResult<Vec<u8>> {
    if format != HostFormat::Bgra8 {
        return Err(CodecError::UnsupportedFormat(format));
    }
    if !src.is_valid() {
        return Err(CodecError::EmptyImage);
    }

    let (w, h) = (src.width(), src.height());
    let pitch = padded_bytes_per_row(w as u32) as usize;
    let mut out = vec![0u8; pitch * h];
    out.par_chunks_exact_mut(pitch).enumerate().for_each(|(y, dst)| {
        let row = src.row(y);
        for (px, texel) in row.chunks_exact(CHANNELS).zip(dst.chunks_exact_mut(TEXEL_BYTES as usize)) {
            let halves: [u16; 4] = [
                f32_to_half(srgb_to_linear(px[2])),
                f32_to_half(srgb_to_linear(px[1])),
                f32_to_half(srgb_to_linear(px[0])),
                f32_to_half(px[3] as f32 / 255.0),
            ];
            texel.copy_from_slice(bytemuck::bytes_of(&halves));
        }
    });
    Ok(out)
}
