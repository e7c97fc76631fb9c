// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-snapshot mutual exclusion.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, Weak};

use hashbrown::HashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

static GLOBAL: LazyLock<IdentifierLocks> = LazyLock::new(IdentifierLocks::new);

/// Registry of async locks keyed by baseline path.
///
/// Two calls for the same identifier in the same directory are serialized;
/// calls for different snapshots proceed independently. Paths are made
/// absolute before use, so `snaps/x` and `./snaps/x` share a slot. Entries
/// are dropped once nobody holds or waits on them.
///
/// Snapshotters share [`IdentifierLocks::global`], so separate matcher
/// instances in one test binary still exclude each other.
#[derive(Debug, Default)]
pub struct IdentifierLocks {
    slots: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}

impl IdentifierLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Wait for exclusive access to the snapshot at `key`.
    pub async fn lock(&self, key: &Path) -> OwnedMutexGuard<()> {
        let key = normalize(key);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| slot.strong_count() > 0);
            match slots.get(&key).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(AsyncMutex::new(()));
                    slots.insert(key, Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }

    /// Number of snapshots currently locked or waited on.
    #[must_use]
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.strong_count() > 0).count()
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
