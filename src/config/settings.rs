use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::{DEFAULT_MAX_BYTES, DEFAULT_RETENTION};
use crate::crypto::USER_KEY_FILE;
use crate::errors::{KioskVaultError, Result};
use crate::policy::{PolicyOverride, SecurityPolicy, SecurityProfile};
use crate::secrets::MAX_TTL;

/// Application directory name under the platform data/config roots.
const APP_DIR: &str = "kioskvault";

/// Fallback directory under `$HOME` when no platform root is set.
const HOME_FALLBACK_DIR: &str = ".kioskvault";

/// Per-user configuration, loaded from `<config_dir>/kioskvault.toml`.
///
/// Every field has a default so KioskVault works without any config
/// file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where secrets, the user key and the audit log live.  Unset means
    /// the per-user application data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Optional string mixed into the vault's application entropy.
    /// Changing it makes every existing secret unreadable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<String>,

    /// How long decrypted secrets stay in the façade cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// `tracing` filter used when `KIOSKVAULT_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub policy: PolicySettings,
}

/// `[audit]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Rotate once the primary file reaches this size.
    #[serde(default = "default_audit_max_bytes")]
    pub max_bytes: u64,

    /// Rotated generations kept beside the primary file.
    #[serde(default = "default_audit_retention")]
    pub retention: usize,

    /// File name inside the data directory.
    #[serde(default = "default_audit_file_name")]
    pub file_name: String,
}

/// `[policy]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default)]
    pub profile: SecurityProfile,

    /// `[policy.overrides.<site>]` tables.
    #[serde(default)]
    pub overrides: BTreeMap<String, PolicyOverride>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audit_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_audit_retention() -> usize {
    DEFAULT_RETENTION
}

fn default_audit_file_name() -> String {
    "audit.log".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            entropy: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            log_level: default_log_level(),
            audit: AuditSettings::default(),
            policy: PolicySettings::default(),
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_audit_max_bytes(),
            retention: default_audit_retention(),
            file_name: default_audit_file_name(),
        }
    }
}

impl Settings {
    /// Name of the config file inside the config directory.
    pub const FILE_NAME: &'static str = "kioskvault.toml";

    /// Load settings from `<config_dir>/kioskvault.toml`.
    ///
    /// A missing file yields defaults; a file that does not parse is an
    /// error.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            KioskVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Reject values that would make the vault or audit log unusable.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(KioskVaultError::ConfigError(
                "cache_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.cache_ttl_secs > MAX_TTL.as_secs() {
            return Err(KioskVaultError::ConfigError(format!(
                "cache_ttl_secs must be at most {}",
                MAX_TTL.as_secs()
            )));
        }
        if self.audit.max_bytes == 0 {
            return Err(KioskVaultError::ConfigError(
                "audit.max_bytes must be greater than zero".into(),
            ));
        }
        if self.audit.retention == 0 {
            return Err(KioskVaultError::ConfigError(
                "audit.retention must be greater than zero".into(),
            ));
        }
        check_audit_file_name(&self.audit.file_name)?;
        SecurityPolicy::from_settings(&self.policy).map(|_| ())
    }

    /// Resolved data directory (configured, or the platform default).
    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.data_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    /// Path of the primary audit file.  The configured name must not
    /// leave the data directory.
    pub fn audit_path(&self) -> Result<PathBuf> {
        check_audit_file_name(&self.audit.file_name)?;
        Ok(self.data_dir()?.join(&self.audit.file_name))
    }

    /// Path of the per-user key file.
    pub fn keyfile_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(USER_KEY_FILE))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs).min(MAX_TTL)
    }
}

fn check_audit_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(KioskVaultError::ConfigError(format!(
            "audit.file_name '{name}' must be a plain file name"
        )));
    }
    Ok(())
}

/// `$XDG_DATA_HOME/kioskvault`, `%APPDATA%\kioskvault`, or
/// `~/.kioskvault`, in that order.
pub fn default_data_dir() -> Result<PathBuf> {
    platform_dir("XDG_DATA_HOME")
}

/// `$XDG_CONFIG_HOME/kioskvault`, `%APPDATA%\kioskvault`, or
/// `~/.kioskvault`, in that order.
pub fn default_config_dir() -> Result<PathBuf> {
    platform_dir("XDG_CONFIG_HOME")
}

fn platform_dir(xdg_var: &str) -> Result<PathBuf> {
    let non_empty = |var: &str| std::env::var_os(var).filter(|v| !v.is_empty());

    if let Some(root) = non_empty(xdg_var) {
        return Ok(PathBuf::from(root).join(APP_DIR));
    }
    if let Some(root) = non_empty("APPDATA") {
        return Ok(PathBuf::from(root).join(APP_DIR));
    }
    if let Some(home) = non_empty("HOME").or_else(|| non_empty("USERPROFILE")) {
        return Ok(PathBuf::from(home).join(HOME_FALLBACK_DIR));
    }
    Err(KioskVaultError::DataDirUnavailable(PathBuf::from(
        HOME_FALLBACK_DIR,
    )))
}

// ── Tests ────────────────────────────────────────────────────────────
