//! Process-local locks keyed by secret file path or logical key.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of one mutex per key.
///
/// Entries are created on first access and never removed; the registry
/// grows with the number of distinct secrets.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

/// Locks keyed by resolved record path, as the vault uses them.
pub type PathLocks = KeyedLocks<PathBuf>;

impl<K: Hash + Eq> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the mutex for `key`, creating it if necessary.
    ///
    /// The registry lock is held only long enough to look up the entry.
    pub fn lock_for<Q>(&self, key: &Q) -> Arc<Mutex<()>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(key) {
            return Arc::clone(lock);
        }
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Hash + Eq> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
