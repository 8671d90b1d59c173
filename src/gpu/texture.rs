// gpu/texture.rs — Rgba16Float texture transfers.
//
// The host renders in linear half-float RGBA; operators work on sRGB BGRA8.
// These routines move pixels across that boundary with the codec in
// `crate::codec` doing the numeric conversion on the CPU.
//
// ROW ALIGNMENT:
// `copy_texture_to_buffer` and `write_texture` both use a row stride that is
// a multiple of COPY_ALIGNMENT (256 bytes); the codec produces and consumes
// exactly that layout, so no re-packing happens here.
//
// BOUNDED WAIT:
// `poll(Maintain::Wait)` can block forever on a lost device. Instead every
// wait polls non-blockingly up to POLL_BUDGET times, sleeping 1 ms between
// attempts, and gives up with `CodecError::Timeout`.
// A failed transfer never returns a partially filled buffer.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use tracing::warn;

use super::device::GpuDevice;
use crate::codec::{decode_rgba16f, encode_rgba16f, padded_bytes_per_row, padded_size, HostFormat};
use crate::error::{CodecError, CodecResult};
use crate::pixel::{PixelBuffer, PixelView};

/// The only texture format the transfer routines accept.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Polls before a wait is abandoned; roughly one second.
pub const POLL_BUDGET: u32 = 1000;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Allocate an Rgba16Float texture usable as a copy source, copy target and
/// shader binding.
///
/// # Errors
/// `EmptyImage` for a zero dimension; `Allocation` if the device reports an
/// out-of-memory or validation error while creating the texture.
pub fn create_texture(gpu: &GpuDevice, width: u32, height: u32) -> CodecResult<wgpu::Texture> {
    if width == 0 || height == 0 {
        return Err(CodecError::EmptyImage);
    }
    gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("vivid-vision::texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let validation = pollster::block_on(gpu.device.pop_error_scope());
    let oom = pollster::block_on(gpu.device.pop_error_scope());
    if let Some(err) = validation.or(oom) {
        warn!(width, height, error = %err, "texture allocation failed");
        return Err(CodecError::Allocation(err.to_string()));
    }
    Ok(texture)
}

/// Read an Rgba16Float texture back into an sRGB BGRA8 buffer.
///
/// Blocks until the copy completes or the poll budget runs out.
///
/// # Errors
/// `TextureFormat` for any other format; `Timeout` if either the queue or
/// the buffer map does not finish within `POLL_BUDGET` polls; `Map` if the
/// map callback reports failure.
pub fn texture_to_pixels(gpu: &GpuDevice, texture: &wgpu::Texture) -> CodecResult<PixelBuffer> {
    if texture.format() != TEXTURE_FORMAT {
        return Err(CodecError::TextureFormat(texture.format()));
    }
    let (width, height) = (texture.width(), texture.height());
    let bytes_per_row = padded_bytes_per_row(width);

    let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("vivid-vision::readback"),
        size: padded_size(width, height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("texture_to_pixels") });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &readback,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let (done_tx, done_rx) = mpsc::channel();
    gpu.queue.on_submitted_work_done(move || {
        let _ = done_tx.send(());
    });
    wait_bounded(gpu, &done_rx, "copy")?;

    let slice = readback.slice(..);
    let (map_tx, map_rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = map_tx.send(result);
    });
    if let Err(e) = wait_bounded(gpu, &map_rx, "map")? {
        warn!(error = %e, "read-back map failed");
        return Err(CodecError::Map(e));
    }

    let decoded = {
        let mapped = slice.get_mapped_range();
        decode_rgba16f(&mapped, width, height)
    };
    readback.unmap();
    decoded
}

/// Upload an sRGB BGRA8 view into an Rgba16Float texture of the same size.
///
/// # Errors
/// `TextureFormat` for any other format; `SizeMismatch` when the view and
/// texture dimensions differ; `EmptyImage` for an invalid view.
pub fn pixels_to_texture(
    gpu: &GpuDevice,
    src: &PixelView<'_>,
    texture: &wgpu::Texture,
) -> CodecResult<()> {
    if texture.format() != TEXTURE_FORMAT {
        return Err(CodecError::TextureFormat(texture.format()));
    }
    let (width, height) = (texture.width(), texture.height());
    if src.is_valid() && (src.width() != width as usize || src.height() != height as usize) {
        return Err(CodecError::SizeMismatch {
            width,
            height,
            expected: padded_size(width, height),
            actual: padded_size(src.width() as u32, src.height() as u32),
        });
    }
    let bytes = encode_rgba16f(src, HostFormat::Bgra8)?;

    gpu.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &bytes,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(padded_bytes_per_row(width)),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    gpu.queue.submit(std::iter::empty());
    Ok(())
}

/// Poll the device without blocking until `rx` yields or the budget is spent.
fn wait_bounded<T>(gpu: &GpuDevice, rx: &Receiver<T>, stage: &'static str) -> CodecResult<T> {
    for _ in 0..POLL_BUDGET {
        gpu.device.poll(wgpu::Maintain::Poll);
        match rx.try_recv() {
            Ok(v) => return Ok(v),
            Err(TryRecvError::Empty) => std::thread::sleep(POLL_INTERVAL),
            Err(TryRecvError::Disconnected) => break,
        }
    }
    warn!(stage, polls = POLL_BUDGET, "GPU wait abandoned");
    Err(CodecError::Timeout { stage, polls: POLL_BUDGET })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
//
// These need a real adapter and are ignored by default:
//     cargo test -- --ignored
