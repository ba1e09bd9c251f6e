//! gpu-tensor: round-trip probe for the device tensor buffer.
//!
//! Allocates a tensor on the configured backend, copies a known pattern in and
//! back out, frees it, and prints a JSON report.

use clap::Parser;
use tracing::info;

use gpu_tensor::config::{Backend, Cli, Config};
use gpu_tensor::gpu::allocator::HostDevice;
use gpu_tensor::gpu::device::detect_devices;
use gpu_tensor::gpu::DeviceMemory;
use gpu_tensor::probe::{round_trip, RoundTripReport};
use gpu_tensor::Tensor;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "gpu_tensor=debug"
    } else {
        "gpu_tensor=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("gpu-tensor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);

    info!(
        backend = %config.device.backend,
        ordinal = config.device.ordinal,
        memory_budget = config.device.memory_budget,
        realloc_policy = ?config.tensor.realloc_policy,
        "Configuration loaded"
    );

    for dev in detect_devices(&config.device) {
        info!(
            id = dev.id,
            name = %dev.name,
            total_memory = dev.total_memory,
            free_memory = dev.free_memory,
            "Device"
        );
    }

    let report = match config.device.backend {
        Backend::Host => {
            let device = HostDevice::new(config.device.ordinal, config.device.memory_budget);
            let report = run(device.clone(), &config)?;
            info!(peak_bytes = device.stats().peak_bytes, "Host device heap");
            report
        }
        Backend::Cuda => run_cuda(&config)?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.matched {
        anyhow::bail!("round trip returned {} mismatched elements", report.mismatches);
    }
    Ok(())
}

fn run<D: DeviceMemory>(device: D, config: &Config) -> anyhow::Result<RoundTripReport> {
    let mut tensor = Tensor::with_policy(device, config.tensor.realloc_policy);
    let report = round_trip(&mut tensor, config.tensor.rows, config.tensor.cols)?;
    Ok(report)
}

#[cfg(feature = "cuda")]
fn run_cuda(config: &Config) -> anyhow::Result<RoundTripReport> {
    let device = gpu_tensor::gpu::cuda::CudaDevice::new(config.device.ordinal)?;
    run(device, config)
}

#[cfg(not(feature = "cuda"))]
fn run_cuda(_config: &Config) -> anyhow::Result<RoundTripReport> {
    anyhow::bail!("CUDA backend requested but gpu-tensor was built without the `cuda` feature")
}
