use anyhow::Result;
use candle_core::Device;

/// Pick the compute device for feature extraction: CUDA device 0 when an
/// accelerator is available, CPU otherwise.
pub fn best_device() -> Result<Device> {
    let device = Device::cuda_if_available(0)?;
    Ok(device)
}
