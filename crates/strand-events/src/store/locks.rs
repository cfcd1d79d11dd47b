//! Per-session write locks.
//!
//! Locks live in a sharded map keyed by session and are created on first use.
//! A guard removes its entry on drop when nobody else holds or waits on it,
//! so the table only contains sessions with a write in flight.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::SessionKey;

#[derive(Debug, Default)]
pub(crate) struct LockTable {
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl LockTable {
    /// Wait for exclusive write access to `key`.
    pub(crate) async fn acquire(&self, key: &SessionKey) -> SessionGuard<'_> {
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;
        SessionGuard {
            table: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive write access to one session; released on drop.
pub(crate) struct SessionGuard<'a> {
    table: &'a LockTable,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference; any other is a holder or a waiter.
        let _ = self
            .table
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
