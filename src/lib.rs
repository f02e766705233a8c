//! tiered-cache - Two-Tier Read-Through/Write-Through Cache
//!
//! A small facade that coordinates a fast in-process cache tier with a
//! shared remote tier (Redis or an in-memory stand-in), keyed by string.
//!
//! # Design Philosophy
//!
//! The interesting part of a two-tier cache is not storage, it is
//! coordination. Every key owns one reader/writer lock: reads share it,
//! writes and loads hold it exclusively for their whole critical section,
//! load function included. When a hot key expires and a hundred tasks call
//! [`TieredCache::load`] at once, exactly one runs the load function; the
//! rest queue on the lock and return the freshly written entry when their
//! turn comes.
//!
//! Durability ordering is fixed: a loaded value is written through to the
//! remote store first and only then becomes locally visible, so the local
//! tier never serves a value the shared tier has not accepted.
//!
//! # Example
//!
//! ```ignore
//! let cache = TieredCache::with_defaults(
//!     Arc::new(MemoryCache::new()),
//!     Arc::new(InMemoryStore::new()),
//! );
//!
//! // One upstream fetch per expiry, no matter how many callers race.
//! let profile: Profile = cache
//!     .load("profile:42", Duration::from_secs(300), false, || async {
//!         fetch_profile(42).await
//!     })
//!     .await?;
//! ```

pub mod error;
pub mod item;
pub mod lock;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod remote;
pub mod tiered;
pub mod traits;

pub use error::{BoxError, CacheError, CacheResult};
pub use item::Item;
pub use lock::{KeyLock, KeyLockRegistry};
pub use tiered::{CacheConfig, TieredCache};
pub use traits::{Cacheable, LocalCache, RemoteStore};

// Re-export the bundled tier implementations
pub use memory::MemoryCache;
pub use remote::InMemoryStore;

// Re-export the Redis-backed remote tier when enabled
#[cfg(feature = "redis")]
pub use crate::redis::{RedisConfig, RedisStore};
