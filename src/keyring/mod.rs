//! OS keyring storage for the per-user protection key.
//!
//! Stores the hex-encoded user key in the operating system's credential
//! store instead of a key file:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::keys::{UserKey, KEY_LEN};
use crate::errors::{KioskVaultError, Result};

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "kioskvault";

fn entry(account: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(SERVICE_NAME, &format!("user-key:{account}"))
        .map_err(|e| KioskVaultError::KeyringError(format!("failed to create keyring entry: {e}")))
}

/// Load the user key for `account`, generating and storing one if absent.
pub fn load_or_create_user_key(account: &str) -> Result<UserKey> {
    let entry = entry(account)?;

    match entry.get_password() {
        Ok(stored) => {
            let stored = Zeroizing::new(stored);
            let mut raw = hex::decode(stored.as_str())
                .map_err(|e| KioskVaultError::KeyringError(format!("stored key is not hex: {e}")))?;
            if raw.len() != KEY_LEN {
                raw.zeroize();
                return Err(KioskVaultError::KeyringError(
                    "stored key has the wrong length".into(),
                ));
            }
            let mut bytes = [0u8; KEY_LEN];
            bytes.copy_from_slice(&raw);
            raw.zeroize();
            let key = UserKey::new(bytes);
            bytes.zeroize();
            Ok(key)
        }
        Err(keyring::Error::NoEntry) => {
            let mut bytes = [0u8; KEY_LEN];
            rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
            let encoded = Zeroizing::new(hex::encode(bytes));
            entry.set_password(&encoded).map_err(|e| {
                KioskVaultError::KeyringError(format!("failed to store key in keyring: {e}"))
            })?;
            let key = UserKey::new(bytes);
            bytes.zeroize();
            Ok(key)
        }
        Err(e) => Err(KioskVaultError::KeyringError(format!(
            "failed to read from keyring: {e}"
        ))),
    }
}

/// Remove the stored user key.  Every secret sealed under it becomes
/// unreadable.
pub fn delete_user_key(account: &str) -> Result<()> {
    match entry(account)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(KioskVaultError::KeyringError(format!(
            "failed to delete from keyring: {e}"
        ))),
    }
}
