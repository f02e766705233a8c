//! In-process remote-tier double
//!
//! [`InMemoryStore`] speaks the [`RemoteStore`] contract without a network:
//! serialized bodies in a concurrent map with per-entry deadlines. It backs
//! tests and single-process deployments, and doubles as the reference for
//! what a real client must do with TTLs and delete patterns.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use tokio::time::Instant;

use crate::error::{CacheError, CacheResult};
use crate::traits::RemoteStore;

struct StoredValue {
    body: String,
    expires_at: Instant,
}

/// Process-local implementation of the remote tier.
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, expired ones included until read or deleted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compile a glob pattern (`*` any run, `?` any one, rest literal) into an
/// anchored regex.
fn compile_glob(pattern: &str) -> CacheResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            ch => expr.push_str(&regex::escape(&ch.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|err| CacheError::Remote {
        reason: format!("invalid pattern {:?}: {}", pattern, err),
    })
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let hit = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.body.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if hit.is_none() {
            self.entries
                .remove_if(key, |_, stored| stored.expires_at <= Instant::now());
        }
        Ok(hit)
    }

    async fn set_string(&self, key: &str, value: &str, ttl_seconds: i64) -> CacheResult<()> {
        if ttl_seconds <= 0 {
            self.entries.remove(key);
            return Ok(());
        }
        let stored = StoredValue {
            body: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds as u64),
        };
        self.entries.insert(key.to_string(), stored);
        Ok(())
    }

    async fn del_keys(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = compile_glob(pattern)?;
        let matched: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0u64;
        for key in matched {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
