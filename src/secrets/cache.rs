//! Short-lived in-memory copies of decrypted secrets.
//!
//! Entries hold their own `SecretValue` allocation and every lookup
//! returns a fresh clone, so a caller zeroizing its copy never touches
//! the cached one.  Expiry is checked lazily on read.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::vault::SecretValue;

/// Default time-to-live for cached secrets.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Longest time-to-live a cache accepts; larger values are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(3600);

/// Default maximum number of cached entries.
pub const DEFAULT_CAPACITY: usize = 256;

struct CacheEntry {
    value: SecretValue,
    expires_at: Instant,
}

/// Bounded TTL map from logical key to secret.
pub struct SecretCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl SecretCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: ttl.min(MAX_TTL),
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return an independent copy of a live entry.  Expired entries are
    /// dropped.
    pub fn get(&self, key: &str) -> Option<SecretValue> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a copy of `value` with a fresh expiry.
    ///
    /// Nothing is cached when the expiry is not representable.
    pub fn insert(&self, key: &str, value: &SecretValue) {
        let mut entries = self.lock();
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(self.ttl) else {
            return;
        };

        if !entries.contains_key(key) && entries.len() >= self.capacity {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.capacity {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(k) = soonest {
                    entries.remove(&k);
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries, live or not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SecretCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .finish()
    }
}
