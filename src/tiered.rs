//! Two-tier cache facade
//!
//! [`TieredCache`] keeps a fast local tier and a shared remote tier
//! consistent. Reads go local first and fall through to the remote store,
//! warming the local tier on the way back. Writes go through the remote
//! store before anything becomes locally visible. Loads hold the key's
//! exclusive lock across the whole load function, which is what collapses a
//! miss storm on one key into a single upstream load.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BoxError, CacheError, CacheResult};
use crate::item::Item;
use crate::lock::KeyLockRegistry;
use crate::traits::{Cacheable, LocalCache, RemoteStore};

/// Configuration for the cache facade.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Deadline for the whole exclusive section of `load`/`warm`: the wait
    /// for the key lock, the re-check, the load function, and both tier
    /// writes. `None` waits indefinitely.
    pub load_timeout: Option<Duration>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound how long a `load`/`warm` call may run before it fails with
    /// [`CacheError::LoadTimeout`].
    pub fn with_load_timeout(mut self, limit: Duration) -> Self {
        self.load_timeout = Some(limit);
        self
    }
}

/// Read-through/write-through facade over a local and a remote cache tier.
///
/// All operations are safe to call concurrently from many tasks. Callers for
/// the same key are coordinated through one reader/writer lock per key:
/// `get` takes it shared while `set`/`load`/`warm` take it exclusive;
/// `delete` takes none (it operates on patterns, not keys).
///
/// # Example
///
/// ```ignore
/// let cache = TieredCache::with_defaults(
///     Arc::new(MemoryCache::new()),
///     Arc::new(InMemoryStore::new()),
/// );
///
/// let user: User = cache
///     .load("user:42", Duration::from_secs(300), false, || async {
///         fetch_user(42).await
///     })
///     .await?;
/// ```
pub struct TieredCache<L, R>
where
    L: LocalCache,
    R: RemoteStore,
{
    /// The in-process tier.
    local: Arc<L>,
    /// The shared remote tier.
    remote: Arc<R>,
    /// One reader/writer lock per key, shared by every clone of the facade.
    locks: KeyLockRegistry,
    /// Facade configuration.
    config: CacheConfig,
}

impl<L, R> TieredCache<L, R>
where
    L: LocalCache,
    R: RemoteStore,
{
    /// Create a new facade over the given tiers.
    pub fn new(local: Arc<L>, remote: Arc<R>, config: CacheConfig) -> Self {
        Self {
            local,
            remote,
            locks: KeyLockRegistry::new(),
            config,
        }
    }

    /// Create a new facade with default configuration.
    pub fn with_defaults(local: Arc<L>, remote: Arc<R>) -> Self {
        Self::new(local, remote, CacheConfig::default())
    }

    /// Get the facade configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the local tier.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Get a reference to the remote tier.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Read the item at `key`, local tier first.
    ///
    /// On a local miss the remote store is consulted; a payload that decodes
    /// as `T` warms the local tier and is returned. Remote absence, an empty
    /// payload, a transport failure, and an undecodable payload all read as
    /// `None`: a failed opportunistic read costs freshness, never an error.
    /// Faults on the way are logged at warn level.
    ///
    /// Holds the key's lock shared for the duration, so any number of
    /// concurrent readers proceed together while writers wait.
    pub async fn get<T: Cacheable>(&self, key: &str) -> Option<Item> {
        let lock = self.locks.lock_for(key);
        let _guard = lock.read().await;

        if let Some(item) = self.local.up_to_date(key) {
            return Some(item);
        }

        let body = match self.remote.get_string(key).await {
            Ok(Some(body)) if !body.is_empty() => body,
            Ok(_) => return None,
            Err(err) => {
                tracing::warn!(key, error = %err, "remote read failed, treating as miss");
                return None;
            }
        };

        let item = match Item::decode::<T>(&body) {
            Ok(item) => item,
            Err(err) => {
                tracing::warn!(key, error = %err, "undecodable cache payload, treating as miss");
                return None;
            }
        };

        self.local.set(key, item.clone());
        Some(item)
    }

    /// Write `item` through to the remote store under the key's exclusive
    /// lock.
    ///
    /// The remote TTL is the item's remaining lifetime in whole seconds.
    /// The local tier is deliberately not touched: local visibility comes
    /// from a later `get` (which warms it) or from `load` (which writes it
    /// back). Serialization and remote failures are returned to the caller.
    pub async fn set<T: Cacheable>(&self, key: &str, item: &Item) -> CacheResult<()> {
        let lock = self.locks.lock_for(key);
        let _guard = lock.write().await;
        self.write_through::<T>(key, item).await
    }

    /// Load the value for `key`, calling `load_fn` at most once per miss.
    ///
    /// The key's exclusive lock is held across the entire call, load
    /// function included. A caller that queued behind an in-flight load
    /// re-checks the local tier once it holds the lock and returns the
    /// freshly written entry without loading again; that is the whole
    /// thundering-herd defense. The price is that `load_fn` must not
    /// touch the same key through this facade (the lock is not reentrant),
    /// and a slow load blocks every other operation on the key.
    ///
    /// On a genuine miss the loaded value is written through to the remote
    /// store and only then written back to the local tier; if the remote
    /// write fails, the local tier stays untouched and the error is
    /// returned. A load function error is returned as
    /// [`CacheError::Load`] with no mutation of either tier.
    ///
    /// With a [`CacheConfig::with_load_timeout`] deadline configured, the
    /// whole call is abandoned with [`CacheError::LoadTimeout`] once the
    /// deadline passes, lock wait included.
    pub async fn load<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        lazy: bool,
        load_fn: F,
    ) -> CacheResult<T>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        self.bounded(key, self.load_inner(key, ttl, lazy, load_fn))
            .await
    }

    /// Populate both tiers for `key` without returning the value.
    ///
    /// Identical to [`load`](Self::load) except the caller does not receive
    /// the loaded value, which spares a clone of the payload.
    pub async fn warm<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        lazy: bool,
        load_fn: F,
    ) -> CacheResult<()>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        self.bounded(key, self.warm_inner(key, ttl, lazy, load_fn))
            .await
    }

    /// Delete every remote key matching `pattern`, returning the count.
    ///
    /// No key lock is taken and the local tier is not invalidated; locally
    /// cached entries for deleted keys age out on their own TTL. The remote
    /// store's error comes back unchanged.
    pub async fn delete(&self, pattern: &str) -> CacheResult<u64> {
        self.remote.del_keys(pattern).await
    }

    /// Encode and write one item to the remote store.
    async fn write_through<T: Cacheable>(&self, key: &str, item: &Item) -> CacheResult<()> {
        let body = item.encode::<T>()?;
        self.remote.set_string(key, &body, item.ttl_seconds()).await
    }

    /// Run `section` under the configured load deadline, if any.
    async fn bounded<T>(
        &self,
        key: &str,
        section: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        match self.config.load_timeout {
            Some(limit) => match tokio::time::timeout(limit, section).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::LoadTimeout {
                    key: key.to_string(),
                    limit,
                }),
            },
            None => section.await,
        }
    }

    async fn load_inner<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        lazy: bool,
        load_fn: F,
    ) -> CacheResult<T>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let lock = self.locks.lock_for(key);
        let _guard = lock.write().await;

        if let Some(item) = self.local.up_to_date(key) {
            if let Some(value) = item.value::<T>() {
                return Ok(value);
            }
            // An entry of another payload type is useless to this caller;
            // fall through and load over it.
        }

        let value = load_fn()
            .await
            .map_err(|source| CacheError::Load { source })?;

        let item = Item::new(value.clone(), ttl, lazy);
        self.write_through::<T>(key, &item).await?;
        self.local.set(key, item);
        Ok(value)
    }

    async fn warm_inner<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        lazy: bool,
        load_fn: F,
    ) -> CacheResult<()>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let lock = self.locks.lock_for(key);
        let _guard = lock.write().await;

        if self.local.up_to_date(key).is_some() {
            return Ok(());
        }

        let value = load_fn()
            .await
            .map_err(|source| CacheError::Load { source })?;

        let item = Item::new(value, ttl, lazy);
        self.write_through::<T>(key, &item).await?;
        self.local.set(key, item);
        Ok(())
    }
}

impl<L, R> Clone for TieredCache<L, R>
where
    L: LocalCache,
    R: RemoteStore,
{
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            remote: Arc::clone(&self.remote),
            locks: self.locks.clone(),
            config: self.config.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
