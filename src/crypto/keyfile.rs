//! Per-user key file.
//!
//! The user key is a 32-byte random file kept in the user's data
//! directory with owner-only permissions.  It scopes every sealed secret
//! to the account that owns the file: another user (or another machine)
//! without it cannot open the vault's ciphertext.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use rand::RngCore;
use zeroize::Zeroize;

use super::keys::{UserKey, KEY_LEN};
use crate::errors::{KioskVaultError, Result};

/// Default file name of the user key inside the data directory.
pub const USER_KEY_FILE: &str = "user.key";

/// Generate a new random user key and write it to `path`.
///
/// Creation is exclusive: if another process created the file first,
/// this fails with `AlreadyExists` rather than overwriting it.
pub fn generate_keyfile(path: &Path) -> Result<UserKey> {
    let mut bytes = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut bytes);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                KioskVaultError::KeyfileError(format!("cannot create keyfile directory: {e}"))
            })?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let written = options
        .open(path)
        .and_then(|mut file| file.write_all(&bytes).and_then(|()| file.sync_all()));

    let key = UserKey::new(bytes);
    bytes.zeroize();

    match written {
        Ok(()) => Ok(key),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(KioskVaultError::KeyfileError(
            format!("keyfile already exists at {}", path.display()),
        )),
        Err(e) => Err(KioskVaultError::KeyfileError(format!(
            "failed to write keyfile: {e}"
        ))),
    }
}

/// Load a user key from disk and validate its length.
pub fn load_keyfile(path: &Path) -> Result<UserKey> {
    if !path.exists() {
        return Err(KioskVaultError::KeyfileError(format!(
            "keyfile not found at {}",
            path.display()
        )));
    }

    let mut data = fs::read(path)
        .map_err(|e| KioskVaultError::KeyfileError(format!("failed to read keyfile: {e}")))?;

    if data.len() != KEY_LEN {
        let len = data.len();
        data.zeroize();
        return Err(KioskVaultError::KeyfileError(format!(
            "keyfile must be exactly {KEY_LEN} bytes, got {len}"
        )));
    }

    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&data);
    data.zeroize();
    let key = UserKey::new(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Load the user key, creating it on first use.
///
/// Two processes racing to create the key both end up with whichever
/// file won the exclusive create.
pub fn load_or_create_keyfile(path: &Path) -> Result<UserKey> {
    if path.exists() {
        return load_keyfile(path);
    }
    match generate_keyfile(path) {
        Ok(key) => {
            tracing::info!(path = %path.display(), "generated new user key");
            Ok(key)
        }
        Err(_) if path.exists() => load_keyfile(path),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generate_and_load_keyfile_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(USER_KEY_FILE);

        let generated = generate_keyfile(&path).unwrap();
        let loaded = load_keyfile(&path).unwrap();
        assert_eq!(generated.as_bytes(), loaded.as_bytes());
    }

    #[test]
    fn generate_keyfile_fails_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(USER_KEY_FILE);

        generate_keyfile(&path).unwrap();
        assert!(generate_keyfile(&path).is_err());
    }

    #[test]
    fn load_keyfile_fails_if_missing() {
        let dir = TempDir::new().unwrap();
        assert!(load_keyfile(&dir.path().join("nonexistent.key")).is_err());
    }

    #[test]
    fn load_keyfile_fails_on_wrong_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.key");
        fs::write(&path, [0u8; 16]).unwrap();
        assert!(load_keyfile(&path).is_err());
    }

    #[test]
    fn load_or_create_is_stable_across_calls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(USER_KEY_FILE);

        let first = load_or_create_keyfile(&path).unwrap();
        let second = load_or_create_keyfile(&path).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn keyfile_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(USER_KEY_FILE);
        generate_keyfile(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
