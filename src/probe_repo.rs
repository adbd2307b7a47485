// Host metric probes: sysinfo for memory and disk, /proc/stat for raw CPU
// time counters. Each probe returns a (total, used-or-idle) pair; a probe
// that fails returns an error and contributes nothing for that tick.

mod linux;

pub use linux::parse_cpu_times;

use std::sync::{Arc, Mutex};

use sysinfo::{Disks, System};
use thiserror::Error;
use tracing::instrument;

/// Mount point sampled by the disk probe.
pub const ROOT_MOUNT: &str = "/";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {0}")]
    Parse(&'static str),
    #[error("cpu time counters unavailable on this platform")]
    Unsupported,
    #[error("no disk mounted at {0}")]
    DiskNotFound(String),
    #[error("probe lock poisoned: {0}")]
    Lock(String),
    #[error("probe task join: {0}")]
    Join(String),
}

pub struct ProbeRepo {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
}

impl Default for ProbeRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeRepo {
    pub fn new() -> Self {
        let sys = System::new();
        let disks = Disks::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(disks)),
        }
    }

    /// Returns (total, used) memory in bytes; used counts memory not
    /// available for reclaim, matching `free`'s used column.
    #[instrument(skip(self), fields(repo = "probe", operation = "read_memory"))]
    pub async fn read_memory(&self) -> Result<(u64, u64), ProbeError> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys.lock().map_err(|e| ProbeError::Lock(e.to_string()))?;
            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());
            Ok((total, used))
        })
        .await
        .map_err(|e| ProbeError::Join(e.to_string()))?
    }

    /// Returns raw (total, idle) CPU time counters. Total is the sum of all
    /// accounted time categories including idle; idle is idle time alone.
    #[instrument(skip(self), fields(repo = "probe", operation = "read_cpu_times"))]
    pub async fn read_cpu_times(&self) -> Result<(u64, u64), ProbeError> {
        tokio::task::spawn_blocking(linux::read_cpu_times)
            .await
            .map_err(|e| ProbeError::Join(e.to_string()))?
    }

    /// Returns (total, used) bytes of the root filesystem.
    #[instrument(skip(self), fields(repo = "probe", operation = "read_disk"))]
    pub async fn read_disk(&self) -> Result<(u64, u64), ProbeError> {
        let disks = self.disks.clone();
        tokio::task::spawn_blocking(move || {
            let mut disks = disks.lock().map_err(|e| ProbeError::Lock(e.to_string()))?;
            disks.refresh(true);
            let disk = disks
                .list()
                .iter()
                .find(|d| d.mount_point() == std::path::Path::new(ROOT_MOUNT))
                .ok_or_else(|| ProbeError::DiskNotFound(ROOT_MOUNT.into()))?;
            let total = disk.total_space();
            let used = total.saturating_sub(disk.available_space());
            Ok((total, used))
        })
        .await
        .map_err(|e| ProbeError::Join(e.to_string()))?
    }
}
