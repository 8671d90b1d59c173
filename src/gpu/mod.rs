// gpu/mod.rs — GPU boundary.
//
// Operators never touch the GPU. The host owns the textures it renders and
// calls into this module to move frames between an Rgba16Float texture and
// the BGRA8 buffers the operators read and write:
//
//   texture ──texture_to_pixels──▶ PixelBuffer ──operators──▶ PixelBuffer
//           ◀──pixels_to_texture──
//
// All numeric conversion lives in `crate::codec`; this module only handles
// device setup, copies and the bounded completion wait.

pub mod device;
pub mod texture;

pub use device::{AdapterInfo, GpuDevice};
pub use texture::{create_texture, pixels_to_texture, texture_to_pixels};
