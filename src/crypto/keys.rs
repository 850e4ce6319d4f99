//! Key material and derivation helpers.
//!
//! From the single per-user key we derive, with HKDF-SHA256, a dedicated
//! **protection key** used for sealing secret payloads.  Separately, the
//! vault computes a fixed **application entropy** value once at
//! construction, and uses it both as AEAD associated data and as the
//! HMAC key for **key hashes** (file names and tamper checks).

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::errors::{KioskVaultError, Result};

/// Length of derived sub-keys and hashes (256 bits).
pub const KEY_LEN: usize = 32;

/// Fixed salt mixed into every application entropy value.
const ENTROPY_SALT: &[u8] = b"kioskvault/entropy/v1";

/// HKDF context for the payload protection key.
const PROTECT_INFO: &[u8] = b"kioskvault-protect-key";

/// Derive the payload protection key from the per-user key.
pub fn derive_protection_key(user_key: &[u8]) -> Result<[u8; KEY_LEN]> {
    hkdf_derive(user_key, PROTECT_INFO)
}

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
///
/// The user key is already uniformly random, so it is used directly as
/// input keying material with an empty salt.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| KioskVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// Application-specific entropy, computed once per vault instance.
///
/// `SHA-256(salt || caller_string)`.  Ciphertext sealed under one entropy
/// value does not open under another.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct AppEntropy {
    bytes: [u8; KEY_LEN],
}

impl AppEntropy {
    /// Build the entropy value from an optional caller-supplied string.
    pub fn derive(base: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ENTROPY_SALT);
        if let Some(base) = base {
            hasher.update(base.as_bytes());
        }
        Self {
            bytes: hasher.finalize().into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Keyed hash (HMAC-SHA256) of a logical key name.
    pub fn key_hash(&self, logical_key: &str) -> Result<[u8; KEY_LEN]> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.bytes)
            .map_err(|e| KioskVaultError::KeyDerivationFailed(format!("invalid HMAC key: {e}")))?;
        mac.update(logical_key.as_bytes());
        Ok(mac.finalize().into_bytes().into())
    }
}

impl std::fmt::Debug for AppEntropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppEntropy(..)")
    }
}

/// Compare two hashes without leaking where they first differ.
pub fn hashes_match(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// A wrapper around the 32-byte per-user key that zeroes its memory
/// when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct UserKey {
    bytes: [u8; KEY_LEN],
}

impl UserKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the payload protection key from this user key.
    pub fn derive_protection_key(&self) -> Result<[u8; KEY_LEN]> {
        derive_protection_key(&self.bytes)
    }
}
