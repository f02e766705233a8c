//! Contracts between the facade and its two tiers

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheResult;
use crate::item::Item;

// ============================================================================
// PAYLOAD BOUND
// ============================================================================

/// Bound for payload types the cache can carry end to end: cloneable for the
/// copy-out guarantee, serde-capable for the wire envelope, and sendable
/// across tasks.
///
/// Blanket-implemented for every qualifying type; never implement by hand.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

// ============================================================================
// LOCAL TIER
// ============================================================================

/// The fast in-process tier, consulted before any remote access.
///
/// Storage, eviction, and freshness policy are the implementation's own
/// business; the facade sees exactly these two operations. Both are
/// infallible: a local tier that cannot answer behaves as empty.
pub trait LocalCache: Send + Sync {
    /// Return the entry for `key` iff one exists and is not stale.
    fn up_to_date(&self, key: &str) -> Option<Item>;

    /// Unconditionally insert or overwrite the entry for `key`.
    fn set(&self, key: &str, item: Item);
}

// ============================================================================
// REMOTE TIER
// ============================================================================

/// The shared remote tier, reached over the network.
///
/// Values are opaque strings; the facade owns the envelope format. Transport
/// and pooling live behind the implementation.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the serialized value at `key`.
    ///
    /// `Ok(None)` means the key does not exist; `Err` is a transport or
    /// store failure.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` at `key` with a TTL in whole seconds.
    ///
    /// A non-positive TTL means the value is already expired; implementations
    /// delete the key instead of storing it.
    async fn set_string(&self, key: &str, value: &str, ttl_seconds: i64) -> CacheResult<()>;

    /// Delete every key matching `pattern` (`*` any run, `?` any single
    /// character, everything else literal), returning how many were removed.
    async fn del_keys(&self, pattern: &str) -> CacheResult<u64>;
}
