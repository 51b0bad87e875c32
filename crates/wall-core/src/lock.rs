//! # Tree Locks
//!
//! Per-tree exclusive locks serializing structural mutations. Holding the
//! guard for a tree means no other insert or delete in that tree computes a
//! shift until the guard drops. Waiting is bounded; on expiry the caller gets
//! a retryable [`AppError::Busy`].

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AppError, Result};
use crate::models::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// The reply-tree rooted at this message.
    Tree(MessageId),
    /// Appending new roots after the last one.
    Forest,
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::Tree(id) => write!(f, "tree {id}"),
            LockKey::Forest => write!(f, "forest"),
        }
    }
}

/// Held while a structural transaction runs. Dropping it releases the tree.
#[derive(Debug)]
pub struct TreeGuard {
    key: LockKey,
    _guard: OwnedMutexGuard<()>,
}

impl TreeGuard {
    pub fn key(&self) -> LockKey {
        self.key
    }
}

#[derive(Debug)]
pub struct TreeLocks {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl TreeLocks {
    pub fn new(timeout: Duration) -> Self {
        Self { locks: DashMap::new(), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits at most `timeout` for exclusive access to `key`.
    pub async fn acquire(&self, key: LockKey) -> Result<TreeGuard> {
        // Clone the Arc out so the shard lock is not held across the await.
        let mutex = self.locks.entry(key).or_default().value().clone();
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(TreeGuard { key, _guard: guard }),
            Err(_) => {
                log::warn!("lock on {key} not acquired within {:?}", self.timeout);
                Err(AppError::Busy(format!("{key} is being modified, try again")))
            }
        }
    }

    /// Drops the registry entry of a deleted tree once nobody waits on it.
    pub fn forget(&self, key: LockKey) {
        self.locks.remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Default for TreeLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn second_writer_times_out_as_busy() {
        let locks = TreeLocks::new(Duration::from_millis(20));
        let key = LockKey::Tree(Uuid::now_v7());

        let held = locks.acquire(key).await.unwrap();
        let err = locks.acquire(key).await.unwrap_err();
        assert!(err.is_retryable());

        drop(held);
        assert!(locks.acquire(key).await.is_ok());
    }

    #[tokio::test]
    async fn different_trees_do_not_block() {
        let locks = TreeLocks::new(Duration::from_millis(20));
        let _a = locks.acquire(LockKey::Tree(Uuid::now_v7())).await.unwrap();
        let _b = locks.acquire(LockKey::Tree(Uuid::now_v7())).await.unwrap();
        let _forest = locks.acquire(LockKey::Forest).await.unwrap();
        assert_eq!(locks.tracked(), 3);
    }

    #[tokio::test]
    async fn forget_keeps_entries_in_use() {
        let locks = TreeLocks::default();
        let key = LockKey::Tree(Uuid::now_v7());
        let guard = locks.acquire(key).await.unwrap();
        locks.forget(key);
        assert_eq!(locks.tracked(), 1);
        drop(guard);
        locks.forget(key);
        assert_eq!(locks.tracked(), 0);
    }
}
