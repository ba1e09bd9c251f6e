//! Simulated device memory for CPU-only builds and tests.
//!
//! Each region is an opaque byte block owned by its handle; host code reaches
//! the contents only through [`DeviceMemory::copy_htod`] and
//! [`DeviceMemory::copy_dtoh`]. All handles cloned from one [`HostDevice`]
//! share a heap that accounts for every allocation and release, so leaks show
//! up in [`HeapStats`].

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::{check_copy_len, DeviceError, DeviceMemory, DeviceRegion};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Shared accounting for one simulated device.
#[derive(Debug)]
struct HostHeap {
    /// Device ID.
    device_id: usize,

    /// Byte budget (0 = unlimited).
    budget: usize,

    bytes_in_use: AtomicUsize,
    peak_bytes: AtomicUsize,
    live_regions: AtomicUsize,
    total_allocations: AtomicU64,
    total_frees: AtomicU64,
    next_region: AtomicU64,
}

impl HostHeap {
    fn available(&self, used: usize) -> usize {
        if self.budget == 0 {
            usize::MAX - used
        } else {
            self.budget.saturating_sub(used)
        }
    }

    fn out_of_memory(&self, requested: usize) -> DeviceError {
        let used = self.bytes_in_use.load(Ordering::Acquire);
        DeviceError::OutOfMemory {
            device_id: self.device_id,
            requested,
            available: self.available(used),
        }
    }

    /// Charge `bytes` against the budget.
    fn reserve(&self, bytes: usize) -> Result<(), DeviceError> {
        let budget = self.budget;
        let prev = self
            .bytes_in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                if budget != 0 && next > budget {
                    None
                } else {
                    Some(next)
                }
            })
            .map_err(|_| self.out_of_memory(bytes))?;

        self.peak_bytes.fetch_max(prev + bytes, Ordering::AcqRel);
        Ok(())
    }

    fn release(&self, bytes: usize) {
        self.bytes_in_use.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Snapshot of a simulated device's allocation accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    /// Regions currently allocated.
    pub live_regions: usize,
    /// Bytes currently allocated.
    pub bytes_in_use: usize,
    /// Highest `bytes_in_use` observed.
    pub peak_bytes: usize,
    /// Successful allocations since creation.
    pub total_allocations: u64,
    /// Releases since creation.
    pub total_frees: u64,
    /// Byte budget (0 = unlimited).
    pub budget: usize,
}

impl HeapStats {
    /// Usage as a fraction of the budget (0.0 when unlimited).
    pub fn utilization(&self) -> f64 {
        if self.budget == 0 {
            return 0.0;
        }
        self.bytes_in_use as f64 / self.budget as f64
    }
}

/// A region of simulated device memory.
pub struct HostRegion {
    id: u64,
    len: usize,
    bytes: Vec<u8>,
    heap: Arc<HostHeap>,
}

impl HostRegion {
    /// Region ID, unique per device.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl DeviceRegion for HostRegion {
    fn len(&self) -> usize {
        self.len
    }
}

impl fmt::Debug for HostRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRegion")
            .field("device", &self.heap.device_id)
            .field("id", &self.id)
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for HostRegion {
    fn drop(&mut self) {
        let bytes = self.bytes.len();
        self.heap.release(bytes);
        self.heap.live_regions.fetch_sub(1, Ordering::AcqRel);
        self.heap.total_frees.fetch_add(1, Ordering::AcqRel);
        debug!(
            device = self.heap.device_id,
            region = self.id,
            bytes,
            "Released device region"
        );
    }
}

/// Simulated device backed by host RAM.
///
/// Cloning yields another handle to the same device and heap.
#[derive(Debug, Clone)]
pub struct HostDevice {
    heap: Arc<HostHeap>,
}

impl HostDevice {
    /// Create a simulated device.
    ///
    /// `budget`: maximum bytes that may be allocated at once (0 = unlimited).
    pub fn new(device_id: usize, budget: usize) -> Self {
        Self {
            heap: Arc::new(HostHeap {
                device_id,
                budget,
                bytes_in_use: AtomicUsize::new(0),
                peak_bytes: AtomicUsize::new(0),
                live_regions: AtomicUsize::new(0),
                total_allocations: AtomicU64::new(0),
                total_frees: AtomicU64::new(0),
                next_region: AtomicU64::new(0),
            }),
        }
    }

    /// Create a simulated device with no byte budget.
    pub fn unlimited(device_id: usize) -> Self {
        Self::new(device_id, 0)
    }

    /// Byte budget (0 = unlimited).
    pub fn budget(&self) -> usize {
        self.heap.budget
    }

    /// Current allocation accounting.
    pub fn stats(&self) -> HeapStats {
        let heap = &self.heap;
        HeapStats {
            live_regions: heap.live_regions.load(Ordering::Acquire),
            bytes_in_use: heap.bytes_in_use.load(Ordering::Acquire),
            peak_bytes: heap.peak_bytes.load(Ordering::Acquire),
            total_allocations: heap.total_allocations.load(Ordering::Acquire),
            total_frees: heap.total_frees.load(Ordering::Acquire),
            budget: heap.budget,
        }
    }
}

impl DeviceMemory for HostDevice {
    type Region = HostRegion;

    fn ordinal(&self) -> usize {
        self.heap.device_id
    }

    fn alloc(&self, len: usize) -> Result<HostRegion, DeviceError> {
        let bytes = len
            .checked_mul(F32_BYTES)
            .ok_or_else(|| self.heap.out_of_memory(usize::MAX))?;

        self.heap.reserve(bytes)?;

        let mut block = Vec::new();
        if block.try_reserve_exact(bytes).is_err() {
            self.heap.release(bytes);
            return Err(self.heap.out_of_memory(bytes));
        }
        block.resize(bytes, 0u8);

        let id = self.heap.next_region.fetch_add(1, Ordering::AcqRel);
        self.heap.live_regions.fetch_add(1, Ordering::AcqRel);
        self.heap.total_allocations.fetch_add(1, Ordering::AcqRel);

        debug!(
            device = self.heap.device_id,
            region = id,
            bytes,
            "Allocated device region"
        );

        Ok(HostRegion {
            id,
            len,
            bytes: block,
            heap: Arc::clone(&self.heap),
        })
    }

    fn copy_htod(&self, src: &[f32], dst: &mut HostRegion) -> Result<(), DeviceError> {
        check_copy_len(dst.len, src.len())?;
        dst.bytes.copy_from_slice(bytemuck::cast_slice(src));
        debug!(
            device = self.heap.device_id,
            region = dst.id,
            size = dst.bytes.len(),
            "H2D transfer"
        );
        Ok(())
    }

    fn copy_dtoh(&self, src: &HostRegion, dst: &mut [f32]) -> Result<(), DeviceError> {
        check_copy_len(src.len, dst.len())?;
        bytemuck::cast_slice_mut::<f32, u8>(dst).copy_from_slice(&src.bytes);
        debug!(
            device = self.heap.device_id,
            region = src.id,
            size = src.bytes.len(),
            "D2H transfer"
        );
        Ok(())
    }
}
