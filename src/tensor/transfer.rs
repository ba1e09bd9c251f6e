//! Host ↔ device transfer accounting.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Device to Host (GPU → RAM).
    DeviceToHost,
    /// Host to Device (RAM → GPU).
    HostToDevice,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub total_d2h_bytes: u64,
    pub total_h2d_bytes: u64,
    pub total_d2h_transfers: u64,
    pub total_h2d_transfers: u64,
}

impl TransferStats {
    /// Count one completed transfer of `bytes` bytes.
    pub fn record(&mut self, direction: TransferDirection, bytes: usize) {
        match direction {
            TransferDirection::DeviceToHost => {
                self.total_d2h_bytes += bytes as u64;
                self.total_d2h_transfers += 1;
            }
            TransferDirection::HostToDevice => {
                self.total_h2d_bytes += bytes as u64;
                self.total_h2d_transfers += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut stats = TransferStats::default();
        stats.record(TransferDirection::HostToDevice, 2048);
        stats.record(TransferDirection::HostToDevice, 1024);
        stats.record(TransferDirection::DeviceToHost, 4096);

        assert_eq!(stats.total_h2d_transfers, 2);
        assert_eq!(stats.total_h2d_bytes, 3072);
        assert_eq!(stats.total_d2h_transfers, 1);
        assert_eq!(stats.total_d2h_bytes, 4096);
    }
}
