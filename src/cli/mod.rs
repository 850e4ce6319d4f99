//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::audit::AuditLog;
use crate::config::{default_config_dir, Settings};
use crate::crypto::{DataProtector, UserKeyProtector};
use crate::errors::{KioskVaultError, Result};
use crate::policy::SecurityPolicy;
use crate::secrets::{SecretCache, SecretsFacade, VaultCookieStore, DEFAULT_CAPACITY};
use crate::vault::{CredentialKind, Vault};

/// KioskVault CLI: local secret vault and security policy for kiosk sites.
#[derive(Parser)]
#[command(
    name = "kioskvault",
    about = "Local secret vault and security policy for kiosk sites",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding kioskvault.toml
    #[arg(long, env = "KIOSKVAULT_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(long, env = "KIOSKVAULT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep the user key in the OS keyring instead of a key file
    #[arg(long, global = true)]
    pub keyring: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Manage site credentials
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Inspect the security policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// View the security audit log
    Audit {
        /// Number of entries to show
        #[arg(long, default_value = "50")]
        last: usize,
        /// Only this event type (e.g. cookie_blocked)
        #[arg(long = "type")]
        event_type: Option<String>,
        /// Only events for this site
        #[arg(long)]
        site: Option<String>,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Print hardened browser arguments for a profile, one per line
    Sandbox {
        /// Profile identifier (reduced to letters, digits, '-' and '_')
        profile_id: String,
        /// Full-screen kiosk mode
        #[arg(long)]
        kiosk: bool,
        /// Open this absolute URL in app mode
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        incognito: bool,
        /// Proxy server (must include a scheme)
        #[arg(long)]
        proxy: Option<String>,
        /// Host sent direct, bypassing the proxy (repeatable)
        #[arg(long, requires = "proxy")]
        bypass: Vec<String>,
        /// Apply the resolved policy for this site
        #[arg(long)]
        site: Option<String>,
    },

    /// Run a value through the input sanitizer
    Sanitize {
        #[command(subcommand)]
        kind: SanitizeKind,
    },
}

/// `secret` subcommands.
#[derive(clap::Subcommand)]
pub enum SecretAction {
    /// Store a credential (add or update)
    Set {
        site: String,
        kind: CredentialKind,
        /// Secret value (omit for piped input or an interactive prompt)
        value: Option<String>,
    },

    /// Print a credential
    Get { site: String, kind: CredentialKind },

    /// Delete a credential
    Delete {
        site: String,
        kind: CredentialKind,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Report whether a credential is stored
    Exists { site: String, kind: CredentialKind },

    /// Delete every credential and the cookie jar for a site
    Forget {
        site: String,
        #[arg(short, long)]
        force: bool,
    },
}

/// `policy` subcommands.
#[derive(clap::Subcommand)]
pub enum PolicyAction {
    /// Show the resolved toggles
    Show {
        #[arg(long)]
        site: Option<String>,
    },

    /// Check profile and overrides for out-of-range values
    Validate,
}

/// `sanitize` subcommands.
#[derive(clap::Subcommand)]
pub enum SanitizeKind {
    Host { value: String },
    Path {
        value: String,
        /// Base directory the path must stay inside (default: current dir)
        #[arg(long)]
        base: Option<PathBuf>,
    },
    Selector {
        value: String,
        #[arg(long, default_value = "256")]
        max_len: usize,
    },
}

/// Short name for the command, used as the shield context.
pub fn command_context(cli: &Cli) -> &'static str {
    match cli.command {
        Commands::Secret { .. } => "secret",
        Commands::Policy { .. } => "policy",
        Commands::Audit { .. } => "audit",
        Commands::Sandbox { .. } => "sandbox",
        Commands::Sanitize { .. } => "sanitize",
    }
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load settings from `--config-dir` (or the default config directory)
/// and apply `--data-dir`.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let config_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => default_config_dir()?,
    };
    let mut settings = Settings::load(&config_dir)?;
    if let Some(ref dir) = cli.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    Ok(settings)
}

/// Open the audit log configured in `settings`.
pub fn open_audit(settings: &Settings) -> Result<Arc<AuditLog>> {
    let log = AuditLog::open(
        &settings.audit_path()?,
        settings.audit.max_bytes,
        settings.audit.retention,
    )?;
    Ok(Arc::new(log))
}

/// Everything a vault-backed command needs.
pub struct VaultContext {
    pub settings: Settings,
    pub audit: Arc<AuditLog>,
    pub vault: Arc<Vault>,
    pub facade: SecretsFacade,
}

/// Validate settings and open the vault, audit log and façade.
pub fn open_vault(cli: &Cli, settings: Settings) -> Result<VaultContext> {
    settings.validate()?;
    let data_dir = settings.data_dir()?;
    let audit = open_audit(&settings)?;
    let protector = load_protector(cli, &settings)?;

    let vault = Arc::new(
        Vault::open(&data_dir, protector, settings.entropy.as_deref())?.with_audit(audit.clone()),
    );
    let cookies = Arc::new(VaultCookieStore::new(vault.clone()));
    let facade = SecretsFacade::new(vault.clone(), cookies)
        .with_cache(SecretCache::new(settings.cache_ttl(), DEFAULT_CAPACITY))
        .with_audit(audit.clone());

    Ok(VaultContext {
        settings,
        audit,
        vault,
        facade,
    })
}

/// Build the policy from settings, auditing runtime override changes.
pub fn load_policy(settings: &Settings, audit: Option<Arc<AuditLog>>) -> Result<SecurityPolicy> {
    let policy = SecurityPolicy::from_settings(&settings.policy)?;
    Ok(match audit {
        Some(audit) => policy.with_audit(audit),
        None => policy,
    })
}

fn load_protector(cli: &Cli, settings: &Settings) -> Result<Arc<dyn DataProtector>> {
    if cli.keyring {
        #[cfg(feature = "keyring-store")]
        {
            let account = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "default".to_string());
            return Ok(Arc::new(UserKeyProtector::from_keyring(&account)?));
        }
        #[cfg(not(feature = "keyring-store"))]
        return Err(KioskVaultError::ConfigError(
            "this build has no OS keyring support (rebuild with --features keyring-store)".into(),
        ));
    }

    Ok(Arc::new(UserKeyProtector::from_keyfile(
        &settings.keyfile_path()?,
    )?))
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
pub fn parse_duration(input: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let input = input.trim();

    let (num_str, unit) = if let Some(s) = input.strip_suffix('d') {
        (s, 'd')
    } else if let Some(s) = input.strip_suffix('h') {
        (s, 'h')
    } else if let Some(s) = input.strip_suffix('m') {
        (s, 'm')
    } else {
        return Err(KioskVaultError::validation(
            "duration",
            format!("'{input}' must look like 7d, 24h, or 30m"),
        ));
    };

    let num: i64 = num_str.parse().map_err(|_| {
        KioskVaultError::validation("duration", format!("'{input}' has no valid number"))
    })?;
    let out_of_range =
        || KioskVaultError::validation("duration", format!("'{input}' is out of range"));
    if num < 0 {
        return Err(out_of_range());
    }

    let duration = match unit {
        'd' => chrono::TimeDelta::try_days(num),
        'h' => chrono::TimeDelta::try_hours(num),
        _ => chrono::TimeDelta::try_minutes(num),
    }
    .ok_or_else(out_of_range)?;

    chrono::Utc::now()
        .checked_sub_signed(duration)
        .ok_or_else(out_of_range)
}
