//! GPU device discovery and information.
//!
//! Reports the devices a backend can allocate on. When compiled without the
//! `cuda` feature, CUDA discovery returns nothing.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Backend, DeviceConfig};

/// Information about a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device index.
    pub id: usize,

    /// Backend serving this device.
    pub backend: Backend,

    /// Device name (e.g., "NVIDIA GeForce GTX 1070").
    pub name: String,

    /// Total memory in bytes (0 = unbounded).
    pub total_memory: usize,

    /// Free memory in bytes at detection time.
    pub free_memory: usize,

    /// Compute capability (major, minor), if the device has one.
    pub compute_capability: Option<(u32, u32)>,
}

/// Detect the devices available to the configured backend.
pub fn detect_devices(config: &DeviceConfig) -> Vec<DeviceInfo> {
    match config.backend {
        Backend::Host => vec![host_device_info(config)],
        Backend::Cuda => detect_cuda_devices(),
    }
}

/// Describe the simulated host device for the given configuration.
pub fn host_device_info(config: &DeviceConfig) -> DeviceInfo {
    DeviceInfo {
        id: config.ordinal,
        backend: Backend::Host,
        name: "Simulated host device".to_string(),
        total_memory: config.memory_budget,
        free_memory: config.memory_budget,
        compute_capability: None,
    }
}

#[cfg(not(feature = "cuda"))]
fn detect_cuda_devices() -> Vec<DeviceInfo> {
    info!("CUDA not enabled, no CUDA devices available");
    Vec::new()
}

#[cfg(feature = "cuda")]
fn detect_cuda_devices() -> Vec<DeviceInfo> {
    use cudarc::driver::sys::CUdevice_attribute_enum;
    use cudarc::driver::{result, CudaContext};

    let count = match CudaContext::device_count() {
        Ok(n) => n.max(0) as usize,
        Err(err) => {
            info!(error = %err, "CUDA driver unavailable");
            return Vec::new();
        }
    };

    (0..count)
        .filter_map(|id| {
            let ctx = CudaContext::new(id).ok()?;
            let name = ctx.name().ok()?;
            let major = ctx
                .attribute(CUdevice_attribute_enum::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)
                .ok()?;
            let minor = ctx
                .attribute(CUdevice_attribute_enum::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)
                .ok()?;
            ctx.bind_to_thread().ok()?;
            let (free_memory, total_memory) = result::mem_get_info().ok()?;

            info!(device = id, name = %name, total_memory, "Detected CUDA device");
            Some(DeviceInfo {
                id,
                backend: Backend::Cuda,
                name,
                total_memory,
                free_memory,
                compute_capability: Some((major as u32, minor as u32)),
            })
        })
        .collect()
}
