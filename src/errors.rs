use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in KioskVault.
#[derive(Debug, Error)]
pub enum KioskVaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong user key, wrong entropy, or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault errors ---
    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Secret '{key}' was corrupted and has been removed: {reason}")]
    CorruptedSecret { key: String, reason: String },

    #[error("Invalid secret record: {0}")]
    InvalidRecordFormat(String),

    #[error("Data directory unavailable: {0}")]
    DataDirUnavailable(PathBuf),

    // --- Sanitizer errors ---
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // --- Policy errors ---
    #[error("Security policy misconfigured: {0}")]
    PolicyConfiguration(String),

    // --- Keyfile errors ---
    #[error("Keyfile error: {0}")]
    KeyfileError(String),

    // --- Keyring errors ---
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    AuditError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI / automation errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Automation driver error: {0}")]
    Automation(String),
}

impl KioskVaultError {
    /// Shorthand for a sanitizer rejection.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for the self-healed corruption condition.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::CorruptedSecret { .. })
    }

    /// Returns `true` when the requested secret has no backing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SecretNotFound(_))
    }
}

/// Convenience type alias for KioskVault results.
pub type Result<T> = std::result::Result<T, KioskVaultError>;
