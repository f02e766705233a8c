//! In-process local tier
//!
//! [`MemoryCache`] is the stock [`LocalCache`]: a concurrent map of
//! [`Item`]s with two reclamation paths. Passive expiration removes an
//! expired entry when an access touches it. An opportunistic sweep,
//! amortized over writes and rate-limited to one pass per interval, removes
//! expired entries nobody is reading anymore. Items flagged lazy are exempt
//! from the sweep and only leave passively, so rarely-read keys flagged that
//! way cost nothing until the next touch.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::item::Item;
use crate::traits::LocalCache;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Concurrent in-process cache tier.
pub struct MemoryCache {
    entries: DashMap<String, Item>,
    sweep_interval: Duration,
    /// Gate so at most one writer pays for a sweep per interval.
    last_sweep: Mutex<Instant>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a cache that sweeps at most once per `sweep_interval`.
    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            sweep_interval,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove non-lazy expired entries, at most once per sweep interval.
    ///
    /// `try_lock` keeps this off the write path entirely when another writer
    /// is already sweeping.
    fn maybe_sweep(&self) {
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if last.elapsed() < self.sweep_interval {
            return;
        }
        *last = Instant::now();
        self.entries
            .retain(|_, item| item.is_lazy() || !item.is_expired());
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCache for MemoryCache {
    fn up_to_date(&self, key: &str) -> Option<Item> {
        let item = self.entries.get(key)?.value().clone();
        if item.is_expired() {
            // Re-check under the shard lock; a writer may have replaced the
            // entry with a fresh one since we looked.
            self.entries.remove_if(key, |_, stored| stored.is_expired());
            return None;
        }
        Some(item)
    }

    fn set(&self, key: &str, item: Item) {
        self.entries.insert(key.to_string(), item);
        self.maybe_sweep();
    }
}

// =============================================================================
// TESTS
// =============================================================================
