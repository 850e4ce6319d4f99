//! Vault module — encrypted per-key secret storage.
//!
//! This module provides:
//! - `SecretValue`, the zeroizing in-memory secret (`secret`)
//! - Logical key helpers and credential kinds (`key`)
//! - The binary record format (`format`)
//! - Path-keyed locks (`locks`) and change notifications (`events`)
//! - The `Vault` itself (`store`)

pub mod events;
pub mod format;
pub mod key;
pub mod locks;
pub mod secret;
pub mod store;

pub use events::{ChangeKind, SecretChange, SubscriptionId};
pub use format::{SecretRecord, CURRENT_PAYLOAD_VERSION};
pub use key::{cookie_key, parse_site_key, site_key, CredentialKind, SiteCredential};
pub use secret::SecretValue;
pub use store::Vault;
