//! Short-lived plaintext key cache.
//!
//! Avoids a store round trip and a decrypt for every outbound call. Entries
//! live in process memory only; there is no cross-process coherence. Expiry
//! is checked lazily on read; key cardinality is one entry per user per
//! service, so there is nothing to sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::clock::Clock;

use super::{Service, UserId};

struct CacheEntry {
    value: SecretString,
    inserted_at: DateTime<Utc>,
}

/// TTL-bounded map of (user, service) to decrypted key.
///
/// Constructed explicitly and shared via `Arc`; writes are plain
/// last-write-wins overwrites, which is safe because concurrent writers for
/// the same key always carry the same freshly-decrypted value.
pub struct KeyCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<(UserId, Service), CacheEntry>>,
}

impl KeyCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached key if present and unexpired. A miss is not an
    /// error; an expired entry is dropped on the spot.
    pub fn get(&self, user_id: &UserId, service: Service) -> Option<SecretString> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("key cache lock poisoned");

        let key = (user_id.clone(), service);
        match entries.get(&key) {
            Some(entry) if !self.is_expired(entry, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a key; the TTL clock starts now. Overwrites any existing entry.
    pub fn set(&self, user_id: &UserId, service: Service, value: SecretString) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("key cache lock poisoned");
        entries.insert(
            (user_id.clone(), service),
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let age = (now - entry.inserted_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age >= self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use secrecy::ExposeSecret;

    fn cache_with_clock(ttl_secs: u64) -> (KeyCache, Arc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let cache = KeyCache::new(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn set_then_get_returns_value() {
        let (cache, _clock) = cache_with_clock(300);
        let user = UserId::from("u1");

        cache.set(&user, Service::Youtube, SecretString::from("k1"));
        let hit = cache.get(&user, Service::Youtube).unwrap();
        assert_eq!(hit.expose_secret(), "k1");
    }

    #[test]
    fn entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock(300);
        let user = UserId::from("u1");

        cache.set(&user, Service::Youtube, SecretString::from("k1"));
        clock.advance(chrono::Duration::seconds(299));
        assert!(cache.get(&user, Service::Youtube).is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.get(&user, Service::Youtube).is_none());
    }

    #[test]
    fn set_overwrites_and_restarts_ttl() {
        let (cache, clock) = cache_with_clock(300);
        let user = UserId::from("u1");

        cache.set(&user, Service::Youtube, SecretString::from("old"));
        clock.advance(chrono::Duration::seconds(200));
        cache.set(&user, Service::Youtube, SecretString::from("new"));

        clock.advance(chrono::Duration::seconds(200));
        let hit = cache.get(&user, Service::Youtube).unwrap();
        assert_eq!(hit.expose_secret(), "new");
    }

    #[test]
    fn entries_are_scoped_per_user_and_service() {
        let (cache, _clock) = cache_with_clock(300);
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        cache.set(&alice, Service::Youtube, SecretString::from("a-yt"));
        cache.set(&alice, Service::RapidApi, SecretString::from("a-ra"));

        assert_eq!(
            cache
                .get(&alice, Service::Youtube)
                .unwrap()
                .expose_secret(),
            "a-yt"
        );
        assert_eq!(
            cache
                .get(&alice, Service::RapidApi)
                .unwrap()
                .expose_secret(),
            "a-ra"
        );
        assert!(cache.get(&bob, Service::Youtube).is_none());
    }
}
