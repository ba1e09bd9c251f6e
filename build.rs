//! Build script for gpu-tensor.
//!
//! cudarc loads the CUDA driver itself, so nothing is compiled or linked here.
//! With the `cuda` feature enabled this only checks that a CUDA toolkit can be
//! found and warns when it cannot.

use std::env;
use std::path::{Path, PathBuf};

fn find_cuda() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = ["CUDA_PATH", "CUDA_HOME", "CUDA_ROOT"]
        .iter()
        .filter_map(|var| env::var_os(var).map(PathBuf::from))
        .collect();
    candidates.push(PathBuf::from("/usr/local/cuda"));
    candidates.push(PathBuf::from("/usr"));

    candidates
        .into_iter()
        .find(|root| Path::new(root).join("bin").join("nvcc").exists())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CUDA_PATH");
    println!("cargo:rerun-if-env-changed=CUDA_HOME");
    println!("cargo:rerun-if-env-changed=CUDA_ROOT");

    if env::var_os("CARGO_FEATURE_CUDA").is_none() {
        return;
    }

    match find_cuda() {
        Some(root) => println!("cargo:warning=Using CUDA toolkit at {}", root.display()),
        None => println!(
            "cargo:warning=CUDA feature enabled but no CUDA toolkit found; set CUDA_PATH"
        ),
    }
}
