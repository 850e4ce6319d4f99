//! Exception shield: turn any error into a user-safe message.
//!
//! The original error is kept as `source()` for diagnostics and logged
//! through the redactor; only `ShieldedError`'s message is meant for a
//! user-facing surface.

use std::error::Error as StdError;
use std::fmt;

use crate::audit::{AuditEvent, AuditLog};
use crate::errors::KioskVaultError;
use crate::redact::redact;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

const CRYPTO_MESSAGE: &str =
    "A stored secret could not be read. It may have been damaged and needs to be entered again.";
const IO_MESSAGE: &str = "A file could not be read or written. Check disk space and permissions.";
const AUTOMATION_MESSAGE: &str = "The browser automation step failed. Please try again.";
const INPUT_MESSAGE: &str =
    "A value or setting was rejected as invalid. The log has the details.";
const NOT_FOUND_MESSAGE: &str = "The requested secret is not stored.";
const UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// Which fixed message a shielded error carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldCategory {
    Crypto,
    Io,
    Automation,
    /// Rejected caller input or configuration.
    Input,
    NotFound,
    Unknown,
}

impl ShieldCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Io => "io",
            Self::Automation => "automation",
            Self::Input => "input",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ShieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ShieldedError {
    message: String,
    category: ShieldCategory,
    #[source]
    source: BoxError,
}

impl ShieldedError {
    /// The user-safe message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ShieldCategory {
        self.category
    }

    /// The original error, for developer diagnostics only.
    pub fn original(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Shield `err` raised while doing `context`.
///
/// Logs the redacted original and, when an audit log is given, records
/// an `exception` event with `context` as the site id.
pub fn shield(err: impl Into<BoxError>, context: &str, audit: Option<&AuditLog>) -> ShieldedError {
    let source: BoxError = err.into();
    let category = categorize(source.as_ref());
    let message = match category {
        ShieldCategory::Crypto => CRYPTO_MESSAGE.to_string(),
        ShieldCategory::Io => IO_MESSAGE.to_string(),
        ShieldCategory::Automation => AUTOMATION_MESSAGE.to_string(),
        ShieldCategory::Input => INPUT_MESSAGE.to_string(),
        ShieldCategory::NotFound => NOT_FOUND_MESSAGE.to_string(),
        ShieldCategory::Unknown => UNKNOWN_MESSAGE.to_string(),
    };

    tracing::error!(
        context,
        category = category.as_str(),
        detail = %redact(&source.to_string()),
        "shielded error"
    );
    if let Some(audit) = audit {
        audit.record(AuditEvent::exception(context));
    }

    ShieldedError {
        message,
        category,
        source,
    }
}

fn categorize(err: &(dyn StdError + 'static)) -> ShieldCategory {
    if let Some(e) = err.downcast_ref::<KioskVaultError>() {
        return match e {
            KioskVaultError::EncryptionFailed(_)
            | KioskVaultError::DecryptionFailed
            | KioskVaultError::KeyDerivationFailed(_)
            | KioskVaultError::CorruptedSecret { .. }
            | KioskVaultError::InvalidRecordFormat(_)
            | KioskVaultError::KeyfileError(_)
            | KioskVaultError::KeyringError(_) => ShieldCategory::Crypto,

            KioskVaultError::Io(_)
            | KioskVaultError::DataDirUnavailable(_)
            | KioskVaultError::AuditError(_) => ShieldCategory::Io,

            KioskVaultError::Automation(_) | KioskVaultError::CommandFailed(_) => {
                ShieldCategory::Automation
            }

            KioskVaultError::Validation { .. }
            | KioskVaultError::PolicyConfiguration(_)
            | KioskVaultError::ConfigError(_) => ShieldCategory::Input,

            KioskVaultError::SecretNotFound(_) => ShieldCategory::NotFound,

            KioskVaultError::SerializationError(_) => ShieldCategory::Unknown,
        };
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return ShieldCategory::Io;
    }
    ShieldCategory::Unknown
}
