//! Redis-backed remote tier
//!
//! Compiled behind the `redis` cargo feature. [`RedisStore`] implements
//! [`RemoteStore`] over a [`ConnectionManager`], which multiplexes one
//! auto-reconnecting connection across concurrent callers. Pattern deletes
//! iterate with `SCAN MATCH` rather than `KEYS`, so they never stall the
//! server on a large keyspace.
//!
//! # Example
//!
//! ```ignore
//! let store = RedisStore::connect(RedisConfig {
//!     url: "redis://127.0.0.1:6379".into(),
//!     key_prefix: "app:".into(),
//! })
//! .await?;
//! let cache = TieredCache::with_defaults(Arc::new(MemoryCache::new()), Arc::new(store));
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{CacheError, CacheResult};
use crate::traits::RemoteStore;

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Remote {
            reason: err.to_string(),
        }
    }
}

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Prepended to every key and delete pattern. Empty for none.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
        }
    }
}

/// Remote tier over a shared Redis instance.
pub struct RedisStore {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisStore {
    /// Open a managed connection and verify it with a PING.
    pub async fn connect(config: RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(CacheError::Remote {
                reason: format!("unexpected PING reply: {pong}"),
            });
        }

        Ok(Self { conn, config })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.prefixed(key)).await?;
        Ok(value)
    }

    async fn set_string(&self, key: &str, value: &str, ttl_seconds: i64) -> CacheResult<()> {
        let key = self.prefixed(key);
        let mut conn = self.conn.clone();
        if ttl_seconds <= 0 {
            let _: () = conn.del(key).await?;
            return Ok(());
        }
        let _: () = conn.set_ex(key, value, ttl_seconds as u64).await?;
        Ok(())
    }

    async fn del_keys(&self, pattern: &str) -> CacheResult<u64> {
        let pattern = self.prefixed(pattern);

        // SCAN borrows its connection for the whole iteration; collect first,
        // then delete over a second handle.
        let mut scan_conn = self.conn.clone();
        let mut matched: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<String> = scan_conn.scan_match(&pattern).await?;
            while let Some(key) = iter.next_item().await {
                matched.push(key);
            }
        }
        if matched.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(matched).await?;
        Ok(removed)
    }
}
