//! Error types for parameters, the texture codec, GPU setup and pipeline
//! configuration.
//!
//! Missing or undersized input is not an error: operators report it as a
//! [`SkipReason`] and keep their previous output.

use std::fmt;

use thiserror::Error;

/// Failure classes surfaced at the system boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// GPU allocation, read-back or map failed or timed out.
    ResourceFailure,
    /// Caller handed in data in a layout or format the routine does not accept.
    ConfigurationMismatch,
}

/// Why an operator declined to cook this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Upstream exposed no CPU-readable pixels.
    NoInput,
    /// Smaller dimension is below the minimum working size.
    TooSmall { width: usize, height: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoInput => write!(f, "no input pixels"),
            SkipReason::TooSmall { width, height } => {
                write!(f, "input {width}×{height} below minimum working size")
            }
        }
    }
}

/// Errors from the parameter surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{name}' on operator '{operator}'")]
    Unknown { operator: String, name: String },

    #[error("parameter '{name}' rejected non-finite value {value}")]
    NonFinite { name: String, value: f64 },
}

/// Errors from half-float texture conversion and GPU transfers.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unsupported host pixel format {0:?}; only BGRA8 can be encoded")]
    UnsupportedFormat(crate::codec::HostFormat),

    #[error("buffer holds {actual} bytes, layout {width}×{height} needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("image has zero width or height")]
    EmptyImage,

    #[error("texture format {0:?} is not Rgba16Float")]
    TextureFormat(wgpu::TextureFormat),

    #[error("GPU texture allocation failed: {0}")]
    Allocation(String),

    #[error("timed out waiting for GPU {stage} after {polls} polls")]
    Timeout { stage: &'static str, polls: u32 },

    #[error("read-back buffer map failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
}

impl CodecError {
    /// Boundary classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::UnsupportedFormat(_)
            | CodecError::SizeMismatch { .. }
            | CodecError::EmptyImage
            | CodecError::TextureFormat(_) => ErrorKind::ConfigurationMismatch,
            CodecError::Allocation(_) | CodecError::Timeout { .. } | CodecError::Map(_) => {
                ErrorKind::ResourceFailure
            }
        }
    }
}

/// Errors from GPU device initialization.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No adapter found on any enabled backend.
    #[error("no suitable GPU adapter found")]
    NoSuitableAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Errors from loading or instantiating a pipeline description.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read pipeline config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize pipeline config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown operator kind '{0}'")]
    UnknownKind(String),

    #[error("duplicate operator name '{0}'")]
    DuplicateName(String),

    #[error(transparent)]
    Param(#[from] ParamError),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
