//! Cached value envelope
//!
//! An [`Item`] wraps an arbitrary payload with the expiry metadata both cache
//! tiers agree on: an absolute expiration timestamp (unix nanoseconds) and
//! the lazy-expiration flag. The payload is stored type-erased so one local
//! tier can hold entries of many types; callers recover it with
//! [`Item::value`], which hands back a clone, never a reference into cache
//! storage.
//!
//! On the wire (the remote tier stores strings) an Item is a JSON envelope:
//!
//! ```json
//! {"object": {...}, "expiration": 1734000000000000000, "lazy": false}
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::traits::Cacheable;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Current time as unix nanoseconds.
fn now_nanos() -> i64 {
    // Out of i64 range only past year 2262.
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// The value envelope stored in both cache tiers.
///
/// Items are immutable once constructed; an update stores a new Item in place
/// of the old one. Cloning an Item is cheap (the payload is shared behind an
/// `Arc`), which is what lets the local tier hand out copies without holding
/// its own locks across caller code.
#[derive(Clone)]
pub struct Item {
    object: Arc<dyn Any + Send + Sync>,
    /// Unix nanoseconds after which the item is stale.
    expiration: i64,
    lazy: bool,
}

/// Borrowing view serialized on the write path.
#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    object: &'a T,
    expiration: i64,
    lazy: bool,
}

/// Owned envelope parsed on the read path.
#[derive(Deserialize)]
struct Envelope<T> {
    object: T,
    expiration: i64,
    lazy: bool,
}

impl Item {
    /// Wrap `object` with an expiration `ttl` from now.
    ///
    /// There is deliberately no constructor without a TTL; every Item carries
    /// an expiration policy from birth.
    pub fn new<T>(object: T, ttl: Duration, lazy: bool) -> Self
    where
        T: Send + Sync + 'static,
    {
        let ttl_nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        Self {
            object: Arc::new(object),
            expiration: now_nanos().saturating_add(ttl_nanos),
            lazy,
        }
    }

    /// Absolute expiration in unix nanoseconds.
    pub fn expiration(&self) -> i64 {
        self.expiration
    }

    /// Whether this item uses lazy expiration (the local tier's sweep leaves
    /// it alone; it is only reclaimed when an access touches it).
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Whether the expiration timestamp has passed.
    pub fn is_expired(&self) -> bool {
        now_nanos() >= self.expiration
    }

    /// Time left until expiration, `None` if already expired.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        let rest = self.expiration.saturating_sub(now_nanos());
        (rest > 0).then(|| Duration::from_nanos(rest as u64))
    }

    /// Remaining TTL in whole seconds, as written to the remote tier.
    ///
    /// Non-positive once the item has less than a second to live; the remote
    /// stores treat such a write as a delete.
    pub fn ttl_seconds(&self) -> i64 {
        self.expiration.saturating_sub(now_nanos()) / NANOS_PER_SEC
    }

    /// Copy the payload out as a `T`.
    ///
    /// Returns `None` when the stored payload is not a `T`. The clone is a
    /// real value copy; mutating the result never affects what the cache
    /// holds.
    pub fn value<T>(&self) -> Option<T>
    where
        T: Clone + 'static,
    {
        self.object.downcast_ref::<T>().cloned()
    }

    /// Serialize to the JSON wire envelope.
    ///
    /// Fails if the payload is not a `T` or if `T`'s serialization fails.
    pub fn encode<T: Cacheable>(&self) -> CacheResult<String> {
        let object = self.object.downcast_ref::<T>().ok_or_else(|| {
            CacheError::Serialization {
                reason: format!("payload is not a {}", std::any::type_name::<T>()),
            }
        })?;
        let envelope = EnvelopeRef {
            object,
            expiration: self.expiration,
            lazy: self.lazy,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parse an Item back out of the JSON wire envelope.
    pub fn decode<T: Cacheable>(body: &str) -> CacheResult<Self> {
        let envelope: Envelope<T> = serde_json::from_str(body)?;
        Ok(Self {
            object: Arc::new(envelope.object),
            expiration: envelope.expiration,
            lazy: envelope.lazy,
        })
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("expiration", &self.expiration)
            .field("lazy", &self.lazy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
    }

    fn make_profile() -> Profile {
        Profile {
            id: 7,
            name: "ada".to_string(),
        }
    }

    #[test]
    fn test_value_copies_payload_out() {
        let item = Item::new(make_profile(), Duration::from_secs(60), false);

        let mut copy: Profile = item.value().unwrap();
        copy.name.push_str("-mutated");

        // The stored payload is unaffected by mutation of the copy.
        let again: Profile = item.value().unwrap();
        assert_eq!(again, make_profile());
    }

    #[test]
    fn test_value_with_wrong_type_is_none() {
        let item = Item::new(make_profile(), Duration::from_secs(60), false);
        assert!(item.value::<String>().is_none());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let item = Item::new(make_profile(), Duration::from_secs(60), true);

        let body = item.encode::<Profile>().unwrap();
        let decoded = Item::decode::<Profile>(&body).unwrap();

        assert_eq!(decoded.value::<Profile>().unwrap(), make_profile());
        assert_eq!(decoded.expiration(), item.expiration());
        assert!(decoded.is_lazy());
    }

    #[test]
    fn test_encode_with_wrong_type_is_error() {
        let item = Item::new(make_profile(), Duration::from_secs(60), false);
        let err = item.encode::<String>().unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Item::decode::<Profile>("{not json").unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }

    #[test]
    fn test_ttl_seconds_boundary() {
        let item = Item::new(make_profile(), Duration::from_secs(5), false);
        let ttl = item.ttl_seconds();
        // Truncating division may shave the in-flight nanoseconds off.
        assert!(ttl == 5 || ttl == 4, "ttl was {}", ttl);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let item = Item::new(make_profile(), Duration::ZERO, false);
        assert!(item.is_expired());
        assert!(item.remaining_ttl().is_none());
        assert!(item.ttl_seconds() <= 0);
    }

    #[test]
    fn test_clone_shares_payload() {
        let item = Item::new(make_profile(), Duration::from_secs(60), false);
        let clone = item.clone();
        assert_eq!(
            clone.value::<Profile>().unwrap(),
            item.value::<Profile>().unwrap()
        );
        assert_eq!(clone.expiration(), item.expiration());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        tag: String,
        count: i64,
        flags: Vec<bool>,
    }

    fn payload_strategy() -> impl Strategy<Value = Payload> {
        (".*", any::<i64>(), prop::collection::vec(any::<bool>(), 0..8)).prop_map(
            |(tag, count, flags)| Payload { tag, count, flags },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: the wire envelope round-trips any serializable payload
        /// together with its expiry metadata.
        #[test]
        fn prop_envelope_roundtrip(
            payload in payload_strategy(),
            ttl_secs in 0u64..86_400,
            lazy in any::<bool>(),
        ) {
            let item = Item::new(payload.clone(), Duration::from_secs(ttl_secs), lazy);
            let body = item.encode::<Payload>().expect("encode should succeed");
            let decoded = Item::decode::<Payload>(&body).expect("decode should succeed");

            prop_assert_eq!(decoded.value::<Payload>().expect("payload type"), payload);
            prop_assert_eq!(decoded.expiration(), item.expiration());
            prop_assert_eq!(decoded.is_lazy(), lazy);
        }
    }
}
