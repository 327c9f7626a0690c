use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::types::SyncTask;

/// Per (source, destination) single-flight registry.
///
/// Timer-triggered and manual backups for the same pair wait on the same
/// lock, so only one copier writes a destination tree at a time. Distinct
/// pairs never block each other.
#[derive(Default)]
pub struct PairLocks {
    locks: Mutex<HashMap<(PathBuf, PathBuf), Arc<AsyncMutex<()>>>>,
}

/// Different spellings of one directory share a key.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, task: &SyncTask) -> Arc<AsyncMutex<()>> {
        let key = (canonical(&task.source_root), canonical(&task.dest_root));
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries only the map still references are idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    }

    pub async fn acquire(&self, task: &SyncTask) -> OwnedMutexGuard<()> {
        self.entry(task).lock_owned().await
    }
}
