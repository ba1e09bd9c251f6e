//! Runtime configuration for gpu-tensor.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Every field is optional in the file; missing fields take their defaults.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "gpu-tensor", about = "Device tensor buffer round-trip probe")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Override the device backend.
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Override the number of rows.
    #[arg(long)]
    pub rows: Option<usize>,

    /// Override the number of columns.
    #[arg(long)]
    pub cols: Option<usize>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Which device memory implementation backs a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Simulated device in host RAM.
    Host,
    /// CUDA device (requires the `cuda` feature).
    Cuda,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Host => write!(f, "host"),
            Backend::Cuda => write!(f, "cuda"),
        }
    }
}

/// What `allocate` does when the tensor already holds an allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReallocPolicy {
    /// Release the current regions, then allocate.
    #[default]
    Release,
    /// Fail with `AlreadyAllocated`; the current allocation is kept.
    Reject,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device configuration.
    pub device: DeviceConfig,

    /// Tensor configuration.
    pub tensor: TensorConfig,
}

/// Device selection and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Memory backend.
    pub backend: Backend,

    /// Device index.
    pub ordinal: usize,

    /// Byte budget for the host backend (0 = unlimited).
    pub memory_budget: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Host,
            ordinal: 0,
            memory_budget: 0,
        }
    }
}

/// Tensor behaviour and probe shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorConfig {
    /// Reallocation policy.
    pub realloc_policy: ReallocPolicy,

    /// Rows for the round-trip probe.
    pub rows: usize,

    /// Columns for the round-trip probe.
    pub cols: usize,
}

impl Default for TensorConfig {
    fn default() -> Self {
        Self {
            realloc_policy: ReallocPolicy::Release,
            rows: 2,
            cols: 3,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(backend) = cli.backend {
            self.device.backend = backend;
        }
        if let Some(rows) = cli.rows {
            self.tensor.rows = rows;
        }
        if let Some(cols) = cli.cols {
            self.tensor.cols = cols;
        }
    }
}
