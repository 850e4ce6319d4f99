//! Cryptographic primitives for KioskVault.
//!
//! This module provides:
//! - AES-256-GCM encryption with associated data (`encryption`)
//! - Application entropy, key hashing and HKDF derivation (`keys`)
//! - The per-user key file (`keyfile`)
//! - The `DataProtector` seam and its user-key implementation (`protector`)

pub mod encryption;
pub mod keyfile;
pub mod keys;
pub mod protector;

pub use encryption::{decrypt, encrypt};
pub use keyfile::{load_or_create_keyfile, USER_KEY_FILE};
pub use keys::{hashes_match, AppEntropy, UserKey, KEY_LEN};
pub use protector::{DataProtector, UserKeyProtector};
