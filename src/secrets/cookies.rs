//! Companion cookie store.
//!
//! A site's cookie jar is persisted as its own secret: the jar is
//! serialized to JSON and stored under `cookies:<owner>`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{KioskVaultError, Result};
use crate::vault::{cookie_key, SecretValue, Vault};

/// One browser cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix seconds; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expires: None,
            secure: true,
            http_only: true,
        }
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"***")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .finish()
    }
}

/// Persistence for per-site cookie jars.
pub trait CookieStore: Send + Sync {
    fn save_cookies(&self, owner: &str, cookies: &[Cookie]) -> Result<()>;

    /// Load a site's jar.  A site with no stored jar yields an empty list.
    fn load_cookies(&self, owner: &str) -> Result<Vec<Cookie>>;

    /// Remove a site's jar.  Succeeds when nothing is stored.
    fn delete_cookies(&self, owner: &str) -> Result<()>;
}

/// `CookieStore` backed by the vault.
#[derive(Debug, Clone)]
pub struct VaultCookieStore {
    vault: Arc<Vault>,
}

impl VaultCookieStore {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self { vault }
    }
}

impl CookieStore for VaultCookieStore {
    fn save_cookies(&self, owner: &str, cookies: &[Cookie]) -> Result<()> {
        let json = Zeroizing::new(
            serde_json::to_string(cookies)
                .map_err(|e| KioskVaultError::SerializationError(format!("cookie jar: {e}")))?,
        );
        self.vault
            .save(&cookie_key(owner), &SecretValue::new(json.as_str()))
    }

    fn load_cookies(&self, owner: &str) -> Result<Vec<Cookie>> {
        match self.vault.try_get(&cookie_key(owner))? {
            Some(jar) => serde_json::from_str(jar.expose())
                .map_err(|e| KioskVaultError::SerializationError(format!("cookie jar: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    fn delete_cookies(&self, owner: &str) -> Result<()> {
        self.vault.delete(&cookie_key(owner))
    }
}
