//! The per-user encrypted secret store.
//!
//! `Vault` keeps one record file per logical key under
//! `<data_dir>/secrets/`.  File names are the hex key hash, never the
//! caller's string.  Every read re-checks the stored key hash, migrates
//! old payload versions forward, and self-heals corrupted files by
//! deleting them before reporting the corruption.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use chrono::Utc;
use zeroize::Zeroizing;

use crate::audit::{AuditEvent, AuditLog};
use crate::crypto::{hashes_match, AppEntropy, DataProtector, KEY_LEN};
use crate::errors::{KioskVaultError, Result};

use super::events::{ChangeKind, ChangeSubscribers, SecretChange, SubscriptionId};
use super::format::{
    self, SecretRecord, CURRENT_PAYLOAD_VERSION, FORMAT_VERSION, MIN_PAYLOAD_VERSION,
    RECORD_EXTENSION,
};
use super::key::validate_key;
use super::locks::PathLocks;
use super::secret::SecretValue;

/// Name of the directory holding record files.
const SECRETS_DIR: &str = "secrets";

/// How a successful read was satisfied.
enum Opened {
    Current(SecretValue),
    /// Opened but stored in an older payload version or the legacy
    /// headerless layout; must be rewritten.
    NeedsMigration(SecretValue, &'static str),
}

/// The vault handle.  Cheap to share behind an `Arc`; every method
/// takes `&self`.
pub struct Vault {
    secrets_dir: PathBuf,
    protector: Arc<dyn DataProtector>,
    entropy: AppEntropy,
    locks: PathLocks,
    subscribers: ChangeSubscribers,
    audit: Option<Arc<AuditLog>>,
}

impl Vault {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open (or create) the vault rooted at `data_dir`.
    ///
    /// `entropy` is the optional application string mixed into the
    /// fixed entropy value; it must be the same on every run or no
    /// existing secret will open.
    pub fn open(
        data_dir: &Path,
        protector: Arc<dyn DataProtector>,
        entropy: Option<&str>,
    ) -> Result<Self> {
        let secrets_dir = data_dir.join(SECRETS_DIR);
        fs::create_dir_all(&secrets_dir)
            .map_err(|_| KioskVaultError::DataDirUnavailable(secrets_dir.clone()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&secrets_dir, fs::Permissions::from_mode(0o700));
        }

        Ok(Self {
            secrets_dir,
            protector,
            entropy: AppEntropy::derive(entropy),
            locks: PathLocks::new(),
            subscribers: ChangeSubscribers::default(),
            audit: None,
        })
    }

    /// Attach an audit log for integrity events.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Store `secret` under `key` in the current payload version.
    pub fn save(&self, key: &str, secret: &SecretValue) -> Result<()> {
        self.save_versioned(key, secret, CURRENT_PAYLOAD_VERSION)
    }

    /// Store `secret` sealed as payload `version`.
    ///
    /// Older versions are accepted so records can be written in the
    /// layout another build expects; they migrate on their next read.
    pub fn save_versioned(&self, key: &str, secret: &SecretValue, version: i32) -> Result<()> {
        validate_key(key)?;
        if !(MIN_PAYLOAD_VERSION..=CURRENT_PAYLOAD_VERSION).contains(&version) {
            return Err(KioskVaultError::validation(
                "payload version",
                format!("{version} is outside {MIN_PAYLOAD_VERSION}..={CURRENT_PAYLOAD_VERSION}"),
            ));
        }

        let key_hash = self.entropy.key_hash(key)?;
        let path = self.path_for_hash(&key_hash);
        {
            let lock = self.locks.lock_for(&path);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.write_locked(&path, &key_hash, secret, version)?;
        }

        self.subscribers
            .notify(&SecretChange::new(key, ChangeKind::Saved));
        Ok(())
    }

    /// Decrypt and return the secret stored under `key`.
    ///
    /// # Errors
    /// `SecretNotFound` when no file exists; `CorruptedSecret` when the
    /// file existed but could not be opened (it has been deleted).
    pub fn get(&self, key: &str) -> Result<SecretValue> {
        validate_key(key)?;
        let key_hash = self.entropy.key_hash(key)?;
        let path = self.path_for_hash(&key_hash);

        let outcome = {
            let lock = self.locks.lock_for(&path);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.read_locked(key, &path, &key_hash)
        };

        if let Err(KioskVaultError::CorruptedSecret { .. }) = &outcome {
            self.subscribers
                .notify(&SecretChange::new(key, ChangeKind::Corrupted));
        }
        outcome
    }

    /// Like `get`, but a missing secret is `Ok(None)`.
    ///
    /// Corruption is still an error.
    pub fn try_get(&self, key: &str) -> Result<Option<SecretValue>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(KioskVaultError::SecretNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` if a record file exists for `key`.
    ///
    /// Metadata-only; nothing is decrypted.
    pub fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.path_for(key)?.is_file())
    }

    /// Remove the secret.  Succeeds when nothing is stored.
    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key)?;
        {
            let lock = self.locks.lock_for(&path);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.subscribers
            .notify(&SecretChange::new(key, ChangeKind::Deleted));
        Ok(())
    }

    /// Read the raw record header for `key` without decrypting.
    pub fn read_record(&self, key: &str) -> Result<SecretRecord> {
        validate_key(key)?;
        let path = self.path_for(key)?;
        let lock = self.locks.lock_for(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::read(&path) {
            Ok(data) => SecretRecord::decode(&data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(KioskVaultError::SecretNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Change notification
    // ------------------------------------------------------------------

    /// Register a callback fired after every successful save or delete,
    /// and after a corrupted record is removed.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SecretChange) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The record file that backs `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.path_for_hash(&self.entropy.key_hash(key)?))
    }

    pub fn secrets_dir(&self) -> &Path {
        &self.secrets_dir
    }

    // ------------------------------------------------------------------
    // Internals (caller holds the path lock)
    // ------------------------------------------------------------------

    fn path_for_hash(&self, key_hash: &[u8; KEY_LEN]) -> PathBuf {
        self.secrets_dir
            .join(format!("{}.{RECORD_EXTENSION}", hex::encode(key_hash)))
    }

    /// Associated data for a payload version.
    ///
    /// - v1: application entropy only.
    /// - v2: entropy followed by the key hash, so a ciphertext copied
    ///   into another key's file no longer opens.
    fn aad_for(&self, version: i32, key_hash: &[u8; KEY_LEN]) -> Vec<u8> {
        let mut aad = self.entropy.as_bytes().to_vec();
        if version >= 2 {
            aad.extend_from_slice(key_hash);
        }
        aad
    }

    fn write_locked(
        &self,
        path: &Path,
        key_hash: &[u8; KEY_LEN],
        secret: &SecretValue,
        version: i32,
    ) -> Result<()> {
        let aad = self.aad_for(version, key_hash);
        let ciphertext = self.protector.protect(secret.as_bytes(), &aad)?;
        let record = SecretRecord {
            format_version: FORMAT_VERSION,
            payload_version: version,
            updated_at: Utc::now(),
            key_hash: *key_hash,
            ciphertext,
        };
        format::write_record_file(path, &record.encode()?)
    }

    fn read_locked(&self, key: &str, path: &Path, key_hash: &[u8; KEY_LEN]) -> Result<SecretValue> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KioskVaultError::SecretNotFound(key.to_string()));
            }
            Err(e) => return Err(self.heal(key, path, key_hash, None, &format!("unreadable: {e}"))),
        };

        let opened = match self.open_versioned(&data, key_hash) {
            Ok(opened) => opened,
            Err(reason) => match self.open_legacy(&data) {
                Ok(value) => Opened::NeedsMigration(value, "legacy"),
                Err(_) => {
                    let actual = stored_hash(&data);
                    return Err(self.heal(key, path, key_hash, actual.as_deref(), &reason));
                }
            },
        };

        match opened {
            Opened::Current(value) => Ok(value),
            Opened::NeedsMigration(value, from) => {
                self.write_locked(path, key_hash, &value, CURRENT_PAYLOAD_VERSION)?;
                tracing::debug!(
                    file = %path.display(),
                    from,
                    to = CURRENT_PAYLOAD_VERSION,
                    "migrated secret record"
                );
                Ok(value)
            }
        }
    }

    /// Parse the versioned layout and decrypt.  The error is a reason
    /// string for the corruption report.
    fn open_versioned(
        &self,
        data: &[u8],
        key_hash: &[u8; KEY_LEN],
    ) -> std::result::Result<Opened, String> {
        if data.is_empty() {
            return Err("zero-length file".into());
        }
        let record = SecretRecord::decode(data).map_err(|e| e.to_string())?;

        if !hashes_match(&record.key_hash, key_hash) {
            return Err("stored key hash does not match requested key".into());
        }
        if !(MIN_PAYLOAD_VERSION..=CURRENT_PAYLOAD_VERSION).contains(&record.payload_version) {
            return Err(format!(
                "unsupported payload version {}",
                record.payload_version
            ));
        }

        let aad = self.aad_for(record.payload_version, key_hash);
        let value = self.unseal(&record.ciphertext, &aad)?;

        if record.payload_version < CURRENT_PAYLOAD_VERSION {
            Ok(Opened::NeedsMigration(value, "older payload"))
        } else {
            Ok(Opened::Current(value))
        }
    }

    /// Treat the whole file as a pre-versioning bare ciphertext.
    fn open_legacy(&self, data: &[u8]) -> std::result::Result<SecretValue, String> {
        if data.is_empty() {
            return Err("zero-length file".into());
        }
        self.unseal(data, self.entropy.as_bytes())
    }

    /// Decrypt and copy into a `SecretValue`.  The plaintext buffer is a
    /// `Zeroizing` and is wiped on every exit path.
    fn unseal(&self, ciphertext: &[u8], aad: &[u8]) -> std::result::Result<SecretValue, String> {
        let plaintext: Zeroizing<Vec<u8>> = self
            .protector
            .unprotect(ciphertext, aad)
            .map_err(|e| e.to_string())?;
        SecretValue::from_utf8_bytes(&plaintext).ok_or_else(|| "payload is not UTF-8".to_string())
    }

    /// Delete a corrupted record, audit it, and build the error.
    fn heal(
        &self,
        key: &str,
        path: &Path,
        key_hash: &[u8; KEY_LEN],
        actual_hash: Option<&str>,
        reason: &str,
    ) -> KioskVaultError {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(file = %path.display(), error = %e, "failed to delete corrupted secret");
            }
        }
        tracing::warn!(file = %path.display(), %reason, "secret record corrupted, removed");

        if let Some(ref audit) = self.audit {
            let path_str = path.display().to_string();
            audit.record(AuditEvent::integrity_failure(
                &path_str,
                &hex::encode(key_hash),
                actual_hash.unwrap_or(""),
            ));
            audit.record(AuditEvent::secret_corrupted(&path_str, reason));
        }

        KioskVaultError::CorruptedSecret {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Hex of the key-hash field if the file is long enough to have one.
fn stored_hash(data: &[u8]) -> Option<String> {
    data.get(format::KEY_HASH_OFFSET..format::KEY_HASH_OFFSET + KEY_LEN)
        .map(hex::encode)
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("secrets_dir", &self.secrets_dir)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{UserKey, UserKeyProtector};
    use crate::vault::key::{site_key, CredentialKind};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn vault(dir: &TempDir) -> Vault {
        let protector = UserKeyProtector::new(&UserKey::new([3u8; KEY_LEN])).unwrap();
        Vault::open(dir.path(), Arc::new(protector), Some("app-x")).unwrap()
    }

    #[test]
    fn file_name_is_hex_hash_not_key() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        let path = v.path_for("site:foo:password").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(name.ends_with(".secret"));
        assert_eq!(name.len(), 64 + ".secret".len());
        assert!(!name.contains("foo"));
    }

    #[test]
    fn save_rejects_unknown_payload_version() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        let secret = SecretValue::new("x");
        assert!(v.save_versioned("k", &secret, 0).is_err());
        assert!(v.save_versioned("k", &secret, CURRENT_PAYLOAD_VERSION + 1).is_err());
    }

    #[test]
    fn ciphertext_swapped_between_keys_is_rejected() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        v.save("a", &SecretValue::new("alpha")).unwrap();
        v.save("b", &SecretValue::new("bravo")).unwrap();

        // Transplant a's ciphertext into b's record, keeping b's header.
        let rec_a = v.read_record("a").unwrap();
        let mut rec_b = v.read_record("b").unwrap();
        rec_b.ciphertext = rec_a.ciphertext;
        fs::write(v.path_for("b").unwrap(), rec_b.encode().unwrap()).unwrap();

        assert!(v.get("b").unwrap_err().is_corrupted());
        assert!(!v.exists("b").unwrap());
        assert_eq!(v.get("a").unwrap().expose(), "alpha");
    }

    #[test]
    fn zero_length_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        fs::write(v.path_for("k").unwrap(), b"").unwrap();

        assert!(v.get("k").unwrap_err().is_corrupted());
        assert!(!v.exists("k").unwrap());
    }

    #[test]
    fn subscribers_see_site_scoped_changes() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        v.subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        let key = site_key("foo", CredentialKind::Password);
        v.save(&key, &SecretValue::new("p@ss")).unwrap();
        v.delete(&key).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, ChangeKind::Saved);
        assert_eq!(seen[1].kind, ChangeKind::Deleted);
        let site = seen[0].site.as_ref().unwrap();
        assert_eq!(site.owner, "foo");
        assert_eq!(site.kind, CredentialKind::Password);
    }

    #[test]
    fn corruption_writes_integrity_audit_event() {
        let dir = TempDir::new().unwrap();
        let audit = Arc::new(
            AuditLog::open(&dir.path().join("audit.log"), 1024 * 1024, 2).unwrap(),
        );
        let v = vault(&dir).with_audit(Arc::clone(&audit));
        fs::write(v.path_for("k").unwrap(), b"garbage").unwrap();

        assert!(v.get("k").is_err());
        let events = audit
            .read_events(&crate::audit::AuditFilter::default())
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event.event_type,
            crate::audit::AuditEventType::IntegrityFailure
        );
    }
}
