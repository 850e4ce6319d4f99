//! Change notifications fired after vault mutations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::key::{parse_site_key, SiteCredential};

/// What happened to a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Saved,
    Deleted,
    /// The file failed its integrity checks and was removed.
    Corrupted,
}

/// Payload delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretChange {
    pub key: String,
    pub kind: ChangeKind,
    /// Present when `key` matches the site-scoped pattern.
    pub site: Option<SiteCredential>,
}

impl SecretChange {
    pub fn new(key: &str, kind: ChangeKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            site: parse_site_key(key),
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&SecretChange) + Send + Sync>;

/// Callback registry.
#[derive(Default)]
pub struct ChangeSubscribers {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback)>>,
}

impl ChangeSubscribers {
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SecretChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `true` if a subscription was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Deliver `change` to every subscriber.
    ///
    /// Callbacks run outside the registry lock so they may subscribe or
    /// unsubscribe themselves.
    pub fn notify(&self, change: &SecretChange) {
        let snapshot: Vec<Callback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in snapshot {
            callback(change);
        }
    }
}

impl std::fmt::Debug for ChangeSubscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ChangeSubscribers")
            .field("subscriber_count", &count)
            .finish()
    }
}
