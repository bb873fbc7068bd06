//! # Keyed Critical Sections
//!
//! One async mutex per group identity. Epoch transitions and history appends
//! for the same group run one at a time inside this process; the directory
//! generation check covers other processes sharing the store.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Lazily created async mutexes keyed by string.
///
/// An entry lives while someone holds or waits on it and is removed when
/// the last guard drops.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<LockMap>,
}

/// Exclusive access to one key of a [`KeyedLocks`].
#[derive(Debug)]
pub struct KeyedGuard {
    key: String,
    mutex: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Map entry plus `self.mutex`; anything above that is a waiter.
        self.locks.remove_if(&self.key, |_, mutex| {
            Arc::ptr_eq(mutex, &self.mutex) && Arc::strong_count(mutex) == 2
        });
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = Arc::clone(&mutex).lock_owned().await;
        KeyedGuard {
            key: key.to_string(),
            mutex,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Drop mutexes nobody holds or waits on.
    ///
    /// Only entries left behind by cancelled waiters remain to be pruned.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
