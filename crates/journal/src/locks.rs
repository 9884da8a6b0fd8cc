// SPDX-License-Identifier: MIT

//! Per-file mutual exclusion, created on demand and keyed by absolute path
//! (spec.md §4.1 "Per-file serialization", §5 "Per-file exclusion for
//! journal writes via a map of path-keyed mutual-exclusion primitives
//! created on demand").

use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
pub struct PathLocks {
    locks: SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (creating if absent) the lock for `path`.
    pub fn lock_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(path.to_path_buf()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }
}
