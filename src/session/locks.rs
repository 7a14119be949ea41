//! Per-sender serialization of message handling.
//!
//! Each message is handled on its own task. Two messages from the same
//! sender must not interleave their read-modify-write of the session, so
//! handling takes the sender's lock first. Different senders never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::SessionKey;

/// Idle lock entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// Registry of per-key async locks.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

/// Held for the duration of one message-handling unit.
pub struct SessionGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &SessionKey) -> SessionGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > PRUNE_THRESHOLD {
                // Entries only referenced by the map have no holder or waiter.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        SessionGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of tracked keys.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
