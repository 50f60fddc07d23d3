//! Advisory per-hash locks serialising tree creation from the same matched torrent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use seedlink_torrent_core::TorrentHash;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = HashMap<TorrentHash, Arc<AsyncMutex<()>>>;

/// Hands out one guard per matched-torrent hash at a time.
#[derive(Debug, Clone, Default)]
pub struct HashLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Proof that the holder owns the lock for `hash`; released on drop.
#[derive(Debug)]
pub struct HashGuard {
    hash: TorrentHash,
    _guard: OwnedMutexGuard<()>,
}

impl HashGuard {
    /// Hash this guard covers.
    #[must_use]
    pub const fn hash(&self) -> &TorrentHash {
        &self.hash
    }
}

impl HashLocks {
    /// Empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on `hash`.
    pub async fn lock(&self, hash: &TorrentHash) -> HashGuard {
        let mutex = self.entry(hash);
        HashGuard {
            hash: hash.clone(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Take the lock on `hash` if nobody holds it.
    #[must_use]
    pub fn try_lock(&self, hash: &TorrentHash) -> Option<HashGuard> {
        let mutex = self.entry(hash);
        mutex.try_lock_owned().ok().map(|guard| HashGuard {
            hash: hash.clone(),
            _guard: guard,
        })
    }

    /// Number of hashes currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no hash is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, hash: &TorrentHash) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries only referenced by the table are idle.
        table.retain(|key, mutex| key == hash || Arc::strong_count(mutex) > 1);
        Arc::clone(table.entry(hash.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_hash_is_exclusive() {
        let locks = HashLocks::new();
        let hash = TorrentHash::from_bytes(&[1; 20]);
        let guard = locks.lock(&hash).await;
        assert_eq!(guard.hash(), &hash);
        assert!(locks.try_lock(&hash).is_none());

        let other = TorrentHash::from_bytes(&[2; 20]);
        assert!(locks.try_lock(&other).is_some());

        drop(guard);
        assert!(locks.try_lock(&hash).is_some());
    }

    #[tokio::test]
    async fn waiters_acquire_after_release() -> anyhow::Result<()> {
        let locks = HashLocks::new();
        let hash = TorrentHash::from_bytes(&[1; 20]);
        let guard = locks.lock(&hash).await;

        let waiter = {
            let locks = locks.clone();
            let hash = hash.clone();
            tokio::spawn(async move { locks.lock(&hash).await.hash().clone() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_secs(1), waiter).await??;
        assert_eq!(acquired, hash);
        Ok(())
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = HashLocks::new();
        for seed in 0..4 {
            drop(locks.lock(&TorrentHash::from_bytes(&[seed; 20])).await);
        }
        let _held = locks.lock(&TorrentHash::from_bytes(&[9; 20])).await;
        assert_eq!(locks.len(), 1);
    }
}
