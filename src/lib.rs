// vivid-vision: per-frame vision operators for a node-graph video host
//
// Three operators share one cook lifecycle (dirty flag, input gating,
// cached output buffer):
//
//   Contours     Canny edges → border tracing → stroked outlines
//   OpticalFlow  dense Farnebäck flow at reduced resolution → visualization
//   BlobTrack    multi-threshold blob detection → marker overlay
//
// Frames arrive as BGRA8 `PixelView`s; `codec` and `gpu` convert between
// those and the host's Rgba16Float textures.

pub mod image;
pub mod convert;
pub mod convolution;
pub mod gradient;
pub mod pyramid;
pub mod geometry;
pub mod draw;

pub mod canny;
pub mod contour_trace;
pub mod farneback;
pub mod blob;

pub mod error;
pub mod pixel;
pub mod params;
pub mod operator;
pub mod config;
pub mod codec;
pub mod gpu;

pub mod contours;
pub mod optical_flow;
pub mod blob_track;

pub use blob_track::BlobTrack;
pub use config::{NamedOperator, OperatorConfig, PipelineConfig};
pub use contours::Contours;
pub use error::{CodecError, ConfigError, ErrorKind, GpuError, ParamError, SkipReason};
pub use operator::{Operator, OperatorRegistry};
pub use optical_flow::{OpticalFlow, VizMode};
pub use pixel::{Bgra, PixelBuffer, PixelView};

/// Registry category for every operator in this crate.
pub const CATEGORY: &str = "Vision";

/// Register `Contours`, `OpticalFlow` and `BlobTrack`.
///
/// Call once at startup. Names already present are left untouched.
pub fn register_vision_operators(registry: &mut OperatorRegistry) {
    registry.register(contours::NAME, CATEGORY, contours::DESCRIPTION, Contours::boxed);
    registry.register(optical_flow::NAME, CATEGORY, optical_flow::DESCRIPTION, OpticalFlow::boxed);
    registry.register(blob_track::NAME, CATEGORY, blob_track::DESCRIPTION, BlobTrack::boxed);
}

/// A registry holding the operators of this crate.
pub fn vision_registry() -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();
    register_vision_operators(&mut registry);
    registry
}
