//! Per-name mutual exclusion
//!
//! Each basename gets its own async mutex, created on first use and dropped
//! again once nobody holds or waits for it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Map of async locks keyed by name
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl KeyedLocks {
    /// Creates an empty lock map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and takes it
    ///
    /// The key is released when the returned guard is dropped, including when
    /// the owning future is dropped mid-operation.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.to_string()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            slot,
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of keys currently held or awaited
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// True when no key is held or awaited
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key of a [`KeyedLocks`] map
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    slot: Slot,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl KeyGuard {
    /// The key this guard holds
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.slots.lock();
        // One reference in the map, one here: nobody else is waiting
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
