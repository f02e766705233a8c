//! Per-key reader/writer locks
//!
//! Every cache key gets exactly one [`RwLock`] for the lifetime of the
//! process. Reads take it shared, writes and loads take it exclusive, and
//! because all callers converge on the same instance, holding it exclusively
//! across a load function is what guarantees one load per miss.
//!
//! The registry only ever grows: locks are never removed, so memory scales
//! with the number of distinct keys seen. Sharding a fixed pool of locks by
//! key hash would bound that, at the cost of false contention between
//! unrelated keys; this registry keeps exact per-key exclusion instead.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

/// The sole lock instance shared by every caller touching one key.
pub type KeyLock = Arc<RwLock<()>>;

/// Lazily creates and hands out one lock per cache key.
///
/// Concurrent first-time requests for the same key may each build a candidate
/// lock, but the entry API makes the insertion atomic: exactly one candidate
/// becomes the lock of record and the rest are dropped unused.
#[derive(Clone, Default)]
pub struct KeyLockRegistry {
    locks: Arc<DashMap<String, KeyLock>>,
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Return the lock associated with `key`, creating it if absent.
    ///
    /// This cannot fail and never blocks beyond the map's internal sharding.
    pub fn lock_for(&self, key: &str) -> KeyLock {
        if let Some(existing) = self.locks.get(key) {
            return existing.clone();
        }
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Number of distinct keys that have been locked so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_returns_same_instance() {
        let registry = KeyLockRegistry::new();
        let a = registry.lock_for("user:1");
        let b = registry.lock_for("user:1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_keys_get_distinct_locks() {
        let registry = KeyLockRegistry::new();
        let a = registry.lock_for("user:1");
        let b = registry.lock_for("user:2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reacquire_does_not_grow_registry() {
        let registry = KeyLockRegistry::new();
        for _ in 0..10 {
            registry.lock_for("user:1");
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_converges() {
        let registry = KeyLockRegistry::new();
        let reference = registry.lock_for("contended");

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..64 {
            let registry = registry.clone();
            tasks.spawn(async move { registry.lock_for("contended") });
        }

        while let Some(lock) = tasks.join_next().await {
            assert!(Arc::ptr_eq(&reference, &lock.unwrap()));
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_writer_excludes_readers() {
        let registry = KeyLockRegistry::new();
        let lock = registry.lock_for("user:1");

        let writer = lock.write().await;
        assert!(lock.try_read().is_err());
        drop(writer);
        assert!(lock.try_read().is_ok());
    }

    #[tokio::test]
    async fn test_readers_share() {
        let registry = KeyLockRegistry::new();
        let lock = registry.lock_for("user:1");

        let _first = lock.read().await;
        assert!(lock.try_read().is_ok());
        assert!(lock.try_write().is_err());
    }
}
