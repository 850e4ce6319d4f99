//! In-memory secret values.
//!
//! A `SecretValue` owns its plaintext in a buffer that is zeroed when
//! the value is dropped or explicitly wiped.  Cloning always allocates a
//! new buffer, so wiping one copy never touches another.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// A decrypted secret.
#[derive(Clone, Default)]
pub struct SecretValue {
    inner: Zeroizing<String>,
}

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: Zeroizing::new(value.into()),
        }
    }

    /// Copy the plaintext out of a decrypted byte buffer.
    ///
    /// Returns `None` if the bytes are not UTF-8.  The source buffer is
    /// left to its owner to wipe.
    pub fn from_utf8_bytes(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().map(Self::new)
    }

    /// Borrow the plaintext.  Keep the borrow short.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Wipe this copy now instead of waiting for drop.
    pub fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes().ct_eq(other.as_bytes()).into()
    }
}

impl Eq for SecretValue {}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_are_independent() {
        let original = SecretValue::new("p@ss");
        let mut copy = original.clone();
        copy.zeroize();

        assert!(copy.is_empty());
        assert_eq!(original.expose(), "p@ss");
    }

    #[test]
    fn debug_never_shows_plaintext() {
        let value = SecretValue::new("p@ss");
        assert!(!format!("{value:?}").contains("p@ss"));
    }

    #[test]
    fn from_utf8_rejects_invalid_bytes() {
        assert!(SecretValue::from_utf8_bytes(&[0xff, 0xfe]).is_none());
        assert_eq!(
            SecretValue::from_utf8_bytes(b"ok").map(|v| v.expose().to_string()),
            Some("ok".to_string())
        );
    }
}
