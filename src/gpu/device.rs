// gpu/device.rs — wgpu adapter and device selection.
//
// Only the texture transfer routines need a device, so there is no compute
// profile here: the device is requested with default limits and no extra
// features.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` may pick a software rasterizer when one
// is listed before the real GPU. We enumerate explicitly and choose in
// tiers:
//   1. DiscreteGpu / IntegratedGpu / VirtualGpu / Other.
//   2. Anything at all (llvmpipe etc.), logged so the choice is visible.
//
// FIELD DROP ORDER:
// `_instance` is declared last so the `wgpu::Instance` outlives `device`
// and `queue`. Some Vulkan layers crash when the instance is destroyed
// while device-level objects still reference it.

use std::fmt;

use tracing::info;

use crate::error::GpuError;

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl From<wgpu::AdapterInfo> for AdapterInfo {
    fn from(info: wgpu::AdapterInfo) -> Self {
        AdapterInfo { name: info.name, device_type: info.device_type, backend: info.backend }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Adapter preference rank; lower is better.
fn adapter_tier(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu => 0,
        wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => 1,
        wgpu::DeviceType::Cpu => 2,
    }
}

/// Device and queue for texture transfers.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    /// Keeps the instance alive until `device` and `queue` are dropped.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a device on the best adapter of any primary backend.
    ///
    /// # Errors
    /// Returns `Err` if no adapter is found or the device request fails.
    pub fn new() -> Result<Self, GpuError> {
        Self::with_backends(wgpu::Backends::PRIMARY)
    }

    /// Create a device restricted to `backends`.
    pub fn with_backends(backends: wgpu::Backends) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(backends))
    }

    async fn init_async(backends: wgpu::Backends) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .enumerate_adapters(backends)
            .into_iter()
            .min_by_key(|a| adapter_tier(a.get_info().device_type))
            .ok_or(GpuError::NoSuitableAdapter)?;

        let adapter_info = AdapterInfo::from(adapter.get_info());
        info!(adapter = %adapter_info, "GPU adapter selected");

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vivid-vision"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        Ok(GpuDevice { device, queue, adapter_info, _instance: instance })
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ adapter: {} }}", self.adapter_info)
    }
}
