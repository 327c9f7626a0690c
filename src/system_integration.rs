use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PathError;

const GIB: f64 = 1_073_741_824.0;

/// Capacity of the volume holding a path, as seen by statvfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

impl DiskUsage {
    /// Integer percent for the gauge. 0 for an empty volume.
    pub fn percent_used(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let percent = (self.used_bytes as u128 * 100) / self.total_bytes as u128;
        percent.min(100) as u8
    }

    pub fn summary_lines(&self) -> [String; 2] {
        [
            "Disk Health:".to_string(),
            format!(
                "Size Remaining - {:.1} / {:.1} GB",
                self.free_bytes as f64 / GIB,
                self.total_bytes as f64 / GIB
            ),
        ]
    }
}

pub struct DiskMonitor;

impl Default for DiskMonitor {
    fn default() -> Self {
        Self
    }
}

impl DiskMonitor {
    pub fn new() -> Self {
        Self
    }

    /// statvfs 시스템 콜로 볼륨 용량을 조회합니다.
    ///
    /// `free_bytes` is what an unprivileged writer can still use, `used_bytes`
    /// counts every allocated block, so the two need not add up to the total.
    pub fn probe(&self, path: &Path) -> Result<DiskUsage, PathError> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|e| PathError::PathUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let fragment = stat.fragment_size() as u64;
        let total_bytes = stat.blocks() as u64 * fragment;
        let free_bytes = stat.blocks_available() as u64 * fragment;
        let used_bytes = (stat.blocks() as u64).saturating_sub(stat.blocks_free() as u64) * fragment;

        Ok(DiskUsage {
            total_bytes,
            used_bytes,
            free_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_temp_dir() {
        let temp = tempfile::tempdir().unwrap();
        let usage = DiskMonitor::new().probe(temp.path()).unwrap();
        assert!(usage.total_bytes > 0);
        assert!(usage.free_bytes <= usage.total_bytes);
        assert!(usage.used_bytes <= usage.total_bytes);
        assert!(usage.percent_used() <= 100);
    }

    #[test]
    fn test_probe_missing_path() {
        let temp = tempfile::tempdir().unwrap();
        let err = DiskMonitor::new()
            .probe(&temp.path().join("gone/away"))
            .unwrap_err();
        assert!(matches!(err, PathError::PathUnavailable { .. }));
        assert_eq!(err.code(), "ERR_PATH_UNAVAILABLE");
    }

    #[test]
    fn test_percent_used() {
        let usage = DiskUsage {
            total_bytes: 1000,
            used_bytes: 333,
            free_bytes: 667,
        };
        assert_eq!(usage.percent_used(), 33);

        let empty = DiskUsage {
            total_bytes: 0,
            used_bytes: 0,
            free_bytes: 0,
        };
        assert_eq!(empty.percent_used(), 0);
    }

    #[test]
    fn test_summary_in_gb() {
        let usage = DiskUsage {
            total_bytes: 500 * 1_073_741_824,
            used_bytes: 380 * 1_073_741_824,
            free_bytes: 120 * 1_073_741_824,
        };
        assert_eq!(
            usage.summary_lines(),
            ["Disk Health:".to_string(), "Size Remaining - 120.0 / 500.0 GB".to_string()]
        );
    }
}
