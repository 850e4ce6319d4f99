//! Per-user data protection.
//!
//! `DataProtector` is the seam where the operating system's per-user
//! protection facility plugs in.  It takes no password: the scope is the
//! identity of the running user, plus an application entropy value
//! supplied by the caller on every call.

use std::path::Path;

use zeroize::{Zeroize, Zeroizing};

use super::encryption::{decrypt, encrypt};
use super::keyfile;
use super::keys::{UserKey, KEY_LEN};
use crate::errors::Result;

/// Seals and opens byte payloads for the current user.
pub trait DataProtector: Send + Sync {
    /// Seal `plaintext`, binding it to this user and to `entropy`.
    fn protect(&self, plaintext: &[u8], entropy: &[u8]) -> Result<Vec<u8>>;

    /// Open a payload produced by `protect` with the same `entropy`.
    fn unprotect(&self, ciphertext: &[u8], entropy: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Protector backed by a 32-byte per-user key.
///
/// Payloads are sealed with AES-256-GCM under a key derived from the
/// user key; the entropy is authenticated as associated data.
pub struct UserKeyProtector {
    protection_key: Zeroizing<[u8; KEY_LEN]>,
}

impl UserKeyProtector {
    /// Build a protector from an already loaded user key.
    pub fn new(user_key: &UserKey) -> Result<Self> {
        let mut derived = user_key.derive_protection_key()?;
        let protector = Self {
            protection_key: Zeroizing::new(derived),
        };
        derived.zeroize();
        Ok(protector)
    }

    /// Load the user key from `path`, generating it on first use.
    pub fn from_keyfile(path: &Path) -> Result<Self> {
        let user_key = keyfile::load_or_create_keyfile(path)?;
        Self::new(&user_key)
    }

    /// Load the user key from the OS keyring, generating it on first use.
    #[cfg(feature = "keyring-store")]
    pub fn from_keyring(account: &str) -> Result<Self> {
        let user_key = crate::keyring::load_or_create_user_key(account)?;
        Self::new(&user_key)
    }
}

impl DataProtector for UserKeyProtector {
    fn protect(&self, plaintext: &[u8], entropy: &[u8]) -> Result<Vec<u8>> {
        encrypt(self.protection_key.as_ref(), plaintext, entropy)
    }

    fn unprotect(&self, ciphertext: &[u8], entropy: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        decrypt(self.protection_key.as_ref(), ciphertext, entropy).map(Zeroizing::new)
    }
}

impl std::fmt::Debug for UserKeyProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UserKeyProtector(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protector(byte: u8) -> UserKeyProtector {
        UserKeyProtector::new(&UserKey::new([byte; KEY_LEN])).unwrap()
    }

    #[test]
    fn protect_unprotect_roundtrip() {
        let p = protector(1);
        let sealed = p.protect(b"p@ss", b"entropy").unwrap();
        assert_eq!(p.unprotect(&sealed, b"entropy").unwrap().as_slice(), b"p@ss");
    }

    #[test]
    fn other_user_cannot_unprotect() {
        let sealed = protector(1).protect(b"p@ss", b"entropy").unwrap();
        assert!(protector(2).unprotect(&sealed, b"entropy").is_err());
    }

    #[test]
    fn other_application_entropy_cannot_unprotect() {
        let p = protector(1);
        let sealed = p.protect(b"p@ss", b"entropy-a").unwrap();
        assert!(p.unprotect(&sealed, b"entropy-b").is_err());
    }
}
