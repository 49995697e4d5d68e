//! Free-disk admission policy.
//!
//! Polling the filesystem for usage numbers belongs to the hosting process;
//! the engine only evaluates the admission formula over whatever a
//! [`DiskInfoProvider`] reports. Stores built without a provider skip the
//! check entirely. The check is advisory: a write that slips past it still
//! fails at I/O time if the disk truly fills.

use std::io;
use std::path::Path;

use crate::error::{StorageErrorKind, StorageResult};

/// A point-in-time usage snapshot for the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInfo {
    /// Total capacity in bytes.
    pub total: u64,
    /// Free capacity in bytes.
    pub free: u64,
}

/// Source of [`DiskInfo`] snapshots (statfs, a cached poller, a fake in
/// tests).
pub trait DiskInfoProvider: Send + Sync + 'static {
    /// Report usage for the filesystem containing `path`.
    fn disk_info(&self, path: &Path) -> io::Result<DiskInfo>;
}

impl<F> DiskInfoProvider for F
where
    F: Fn(&Path) -> io::Result<DiskInfo> + Send + Sync + 'static,
{
    fn disk_info(&self, path: &Path) -> io::Result<DiskInfo> {
        self(path)
    }
}

/// Evaluate the admission formula and fail with
/// [`StorageErrorKind::RootPathFull`] when the free share drops to or below
/// `min_free_percent`.
///
/// 5% of the total is set aside for journalling and inode overhead before
/// the percentage is computed, and the result is truncated toward zero.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn check_disk_free(
    root: &Path,
    provider: &dyn DiskInfoProvider,
    min_free_percent: i64,
) -> StorageResult<()> {
    let info = provider.disk_info(root)?;
    let usable_total = info.total as f64 - 0.05 * info.total as f64;
    let available = (info.free as f64 / usable_total) * 100.0;
    if available as i64 <= min_free_percent {
        return Err(StorageErrorKind::RootPathFull {
            path: root.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
