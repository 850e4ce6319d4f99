//! Caching façade over the vault for site credentials and cookies.

use std::sync::{Arc, PoisonError};

use crate::audit::{AuditEvent, AuditLog};
use crate::errors::Result;
use crate::policy::SecurityPolicy;
use crate::vault::key::validate_owner;
use crate::vault::locks::KeyedLocks;
use crate::vault::{site_key, CredentialKind, SecretValue, Vault};

use super::cache::SecretCache;
use super::cookies::{Cookie, CookieStore};

/// Site-level secret access.
///
/// Reads go through a short-TTL cache; writes go to the vault first and
/// then refresh the cache.  Every value handed out is a fresh copy the
/// caller owns and should drop (or `zeroize`) promptly.
///
/// Cache misses, writes and deletes for one key run under that key's
/// lock, so a read that started before a delete cannot cache the old
/// value after the delete returns.
pub struct SecretsFacade {
    vault: Arc<Vault>,
    cookies: Arc<dyn CookieStore>,
    cache: SecretCache,
    key_locks: KeyedLocks<String>,
    audit: Option<Arc<AuditLog>>,
}

impl SecretsFacade {
    pub fn new(vault: Arc<Vault>, cookies: Arc<dyn CookieStore>) -> Self {
        Self {
            vault,
            cookies,
            cache: SecretCache::default(),
            key_locks: KeyedLocks::new(),
            audit: None,
        }
    }

    /// Replace the default cache (30 s TTL, 256 entries).
    pub fn with_cache(mut self, cache: SecretCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    pub fn save_credentials(
        &self,
        owner: &str,
        username: &SecretValue,
        password: &SecretValue,
    ) -> Result<()> {
        validate_owner(owner)?;
        self.put(owner, CredentialKind::Username, username)?;
        self.put(owner, CredentialKind::Password, password)
    }

    pub fn save_totp(&self, owner: &str, totp: &SecretValue) -> Result<()> {
        validate_owner(owner)?;
        self.put(owner, CredentialKind::Totp, totp)
    }

    /// Store one credential kind.
    pub fn save(&self, owner: &str, kind: CredentialKind, value: &SecretValue) -> Result<()> {
        validate_owner(owner)?;
        self.put(owner, kind, value)
    }

    pub fn get_username(&self, owner: &str) -> Result<Option<SecretValue>> {
        self.get(owner, CredentialKind::Username)
    }

    pub fn get_password(&self, owner: &str) -> Result<Option<SecretValue>> {
        self.get(owner, CredentialKind::Password)
    }

    pub fn get_totp(&self, owner: &str) -> Result<Option<SecretValue>> {
        self.get(owner, CredentialKind::Totp)
    }

    /// Read one credential kind, from cache when fresh.
    pub fn get(&self, owner: &str, kind: CredentialKind) -> Result<Option<SecretValue>> {
        validate_owner(owner)?;
        let key = site_key(owner, kind);

        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(site = owner, kind = kind.as_str(), "secret cache hit");
            return Ok(Some(hit));
        }

        let lock = self.key_locks.lock_for(key.as_str());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another miss may have filled the entry while we waited.
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit));
        }

        let value = self.vault.try_get(&key)?;
        if let Some(ref v) = value {
            self.cache.insert(&key, v);
        }
        Ok(value)
    }

    /// Remove username and password.
    pub fn delete_credentials(&self, owner: &str) -> Result<()> {
        validate_owner(owner)?;
        self.remove(owner, CredentialKind::Username)?;
        self.remove(owner, CredentialKind::Password)
    }

    pub fn delete_totp(&self, owner: &str) -> Result<()> {
        validate_owner(owner)?;
        self.remove(owner, CredentialKind::Totp)
    }

    /// Remove one credential kind.
    pub fn delete(&self, owner: &str, kind: CredentialKind) -> Result<()> {
        validate_owner(owner)?;
        self.remove(owner, kind)
    }

    /// Drop every credential, the TOTP seed and the cookie jar for `owner`.
    pub fn forget_site(&self, owner: &str) -> Result<()> {
        validate_owner(owner)?;
        for kind in CredentialKind::ALL {
            self.remove(owner, kind)?;
        }
        self.cookies.delete_cookies(owner)?;
        self.audit_event(AuditEvent::cookie_revoked(owner));
        tracing::info!(site = owner, "forgot all site secrets");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cache control
    // ------------------------------------------------------------------

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The edit surface lost focus; stop trusting cached secrets.
    pub fn notify_focus_lost(&self) {
        self.clear_cache();
    }

    // ------------------------------------------------------------------
    // Cookies
    // ------------------------------------------------------------------

    pub fn save_cookies(&self, owner: &str, cookies: &[Cookie]) -> Result<()> {
        validate_owner(owner)?;
        self.cookies.save_cookies(owner, cookies)?;
        self.audit_event(AuditEvent::cookie_stored(owner, cookies.len() as u64));
        Ok(())
    }

    /// Load the site's jar if the resolved policy allows cookie restore.
    ///
    /// A refused restore yields an empty jar and a `cookie_blocked` event.
    pub fn restore_cookies(&self, owner: &str, policy: &SecurityPolicy) -> Result<Vec<Cookie>> {
        validate_owner(owner)?;
        if !policy.resolve(Some(owner)).allow_cookie_restore {
            self.audit_event(AuditEvent::cookie_blocked(owner, "allow_cookie_restore"));
            tracing::info!(site = owner, "cookie restore blocked by policy");
            return Ok(Vec::new());
        }

        let jar = self.cookies.load_cookies(owner)?;
        self.audit_event(AuditEvent::cookie_restored(owner, jar.len() as u64));
        Ok(jar)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn put(&self, owner: &str, kind: CredentialKind, value: &SecretValue) -> Result<()> {
        let key = site_key(owner, kind);
        let lock = self.key_locks.lock_for(key.as_str());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = self.vault.save(&key, value) {
            self.cache.remove(&key);
            return Err(e);
        }
        self.cache.insert(&key, value);
        Ok(())
    }

    fn remove(&self, owner: &str, kind: CredentialKind) -> Result<()> {
        let key = site_key(owner, kind);
        let lock = self.key_locks.lock_for(key.as_str());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self.vault.delete(&key);
        self.cache.remove(&key);
        result
    }

    fn audit_event(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.record(event);
        }
    }
}

impl std::fmt::Debug for SecretsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsFacade")
            .field("vault", &self.vault)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEventType, AuditFilter, DEFAULT_MAX_BYTES};
    use crate::crypto::{UserKey, UserKeyProtector};
    use crate::policy::SecurityProfile;
    use crate::secrets::VaultCookieStore;
    use tempfile::TempDir;

    fn facade(dir: &TempDir) -> SecretsFacade {
        let protector = UserKeyProtector::new(&UserKey::new([9u8; 32])).unwrap();
        let vault = Arc::new(Vault::open(dir.path(), Arc::new(protector), Some("app-x")).unwrap());
        let cookies = Arc::new(VaultCookieStore::new(vault.clone()));
        SecretsFacade::new(vault, cookies)
    }

    #[test]
    fn credentials_round_trip() {
        let dir = TempDir::new().unwrap();
        let f = facade(&dir);
        f.save_credentials("lobby", &"kiosk".into(), &"p@ss".into())
            .unwrap();

        assert_eq!(f.get_username("lobby").unwrap().unwrap().expose(), "kiosk");
        assert_eq!(f.get_password("lobby").unwrap().unwrap().expose(), "p@ss");
        assert!(f.get_totp("lobby").unwrap().is_none());
    }

    #[test]
    fn reads_are_independent_copies() {
        let dir = TempDir::new().unwrap();
        let f = facade(&dir);
        f.save_credentials("lobby", &"u".into(), &"p@ss".into())
            .unwrap();

        let mut a = f.get_password("lobby").unwrap().unwrap();
        let b = f.get_password("lobby").unwrap().unwrap();
        a.zeroize();

        assert_eq!(b.expose(), "p@ss");
        assert_eq!(f.get_password("lobby").unwrap().unwrap().expose(), "p@ss");
    }

    #[test]
    fn cache_serves_reads_after_file_is_gone_until_cleared() {
        let dir = TempDir::new().unwrap();
        let f = facade(&dir);
        f.save_totp("lobby", &"JBSWY3DP".into()).unwrap();

        let path = f.vault().path_for(&site_key("lobby", CredentialKind::Totp)).unwrap();
        std::fs::remove_file(path).unwrap();

        assert!(f.get_totp("lobby").unwrap().is_some());
        f.notify_focus_lost();
        assert!(f.get_totp("lobby").unwrap().is_none());
    }

    #[test]
    fn delete_credentials_clears_cache_and_vault() {
        let dir = TempDir::new().unwrap();
        let f = facade(&dir);
        f.save_credentials("lobby", &"u".into(), &"p".into()).unwrap();
        f.delete_credentials("lobby").unwrap();

        assert!(f.get_username("lobby").unwrap().is_none());
        assert!(f.get_password("lobby").unwrap().is_none());
    }

    #[test]
    fn forget_site_removes_everything() {
        let dir = TempDir::new().unwrap();
        let f = facade(&dir);
        f.save_credentials("lobby", &"u".into(), &"p".into()).unwrap();
        f.save_totp("lobby", &"seed".into()).unwrap();
        f.save_cookies("lobby", &[Cookie::new("sid", "1", "x.example")])
            .unwrap();

        f.forget_site("lobby").unwrap();

        let policy = SecurityPolicy::new(SecurityProfile::Relaxed);
        assert!(f.get_totp("lobby").unwrap().is_none());
        assert!(f.restore_cookies("lobby", &policy).unwrap().is_empty());
        assert_eq!(std::fs::read_dir(f.vault().secrets_dir()).unwrap().count(), 0);
    }

    #[test]
    fn strict_policy_blocks_cookie_restore() {
        let dir = TempDir::new().unwrap();
        let audit =
            Arc::new(AuditLog::open(&dir.path().join("audit.log"), DEFAULT_MAX_BYTES, 2).unwrap());
        let f = facade(&dir).with_audit(audit.clone());
        f.save_cookies("lobby", &[Cookie::new("sid", "1", "x.example")])
            .unwrap();

        let strict = SecurityPolicy::new(SecurityProfile::Strict);
        assert!(f.restore_cookies("lobby", &strict).unwrap().is_empty());

        let standard = SecurityPolicy::new(SecurityProfile::Standard);
        assert_eq!(f.restore_cookies("lobby", &standard).unwrap().len(), 1);

        let blocked = audit
            .read_events(&AuditFilter {
                event_type: Some(AuditEventType::CookieBlocked),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].event.setting.as_deref(), Some("allow_cookie_restore"));
    }

    #[test]
    fn empty_owner_is_rejected() {
        let dir = TempDir::new().unwrap();
        let f = facade(&dir);
        assert!(f.get_password("  ").is_err());
        assert!(f.save_totp("", &"x".into()).is_err());
    }
}
