use crate::core::ModelOptions;
use candle_core::Device;

/// Loads a device to be used for the model.
/// If `index` is `Some(i)` it will attempt to load the specified CUDA device.
/// When `None` it defaults to CUDA device 0 if available and otherwise falls back
/// to CPU.
pub fn load_device_with(index: Option<usize>) -> anyhow::Result<Device> {
    match index {
        Some(i) => Ok(Device::new_cuda(i)?),
        None => Ok(Device::cuda_if_available(0).unwrap_or(Device::Cpu)),
    }
}

/// Request for a specific device, used by pipeline builders.
#[derive(Debug, Clone, Default)]
pub enum DeviceRequest {
    /// Use CUDA if available, otherwise CPU (default behavior).
    #[default]
    Default,
    /// Force CPU even if CUDA is available.
    Cpu,
    /// Select a specific CUDA device by index.
    Cuda(usize),
    /// Provide an already constructed device.
    Explicit(Device),
}

impl DeviceRequest {
    /// Resolve the request into an actual [`Device`].
    pub fn resolve(self) -> anyhow::Result<Device> {
        match self {
            DeviceRequest::Default => load_device_with(None),
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => load_device_with(Some(i)),
            DeviceRequest::Explicit(d) => Ok(d),
        }
    }

    /// Short stable name used in cache keys and logs.
    pub fn label(&self) -> String {
        match self {
            DeviceRequest::Default => "auto".to_string(),
            DeviceRequest::Cpu => "cpu".to_string(),
            DeviceRequest::Cuda(i) => format!("cuda:{i}"),
            DeviceRequest::Explicit(d) => format!("{:?}", d.location()),
        }
    }
}

/// Utility to generate a cache key combining model options and device request.
pub fn build_cache_key<O: ModelOptions>(options: &O, device: &DeviceRequest) -> String {
    format!("{}-{}", options.cache_key(), device.label())
}
