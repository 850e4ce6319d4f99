//! Audit event types.
//!
//! Callers build an `AuditEvent`; the log stamps it with the write time
//! and stores it as an `AuditRecord`.  Events carry no timestamp of their
//! own so a caller can never backdate one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type tag of an audit event (`type` field on disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    LoginAttempt,
    CookieStored,
    CookieRestored,
    CookieRevoked,
    CookieBlocked,
    AllowlistBlock,
    IntegrityFailure,
    PolicyOverride,
    SecretCorrupted,
    Exception,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginAttempt => "login_attempt",
            Self::CookieStored => "cookie_stored",
            Self::CookieRestored => "cookie_restored",
            Self::CookieRevoked => "cookie_revoked",
            Self::CookieBlocked => "cookie_blocked",
            Self::AllowlistBlock => "allowlist_block",
            Self::IntegrityFailure => "integrity_failure",
            Self::PolicyOverride => "policy_override",
            Self::SecretCorrupted => "secret_corrupted",
            Self::Exception => "exception",
        }
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = crate::errors::KioskVaultError;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
            crate::errors::KioskVaultError::validation(
                "audit event type",
                format!("unknown event type '{s}'"),
            )
        })
    }
}

/// An event with sparse optional context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub event_type: AuditEventType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            site_id: None,
            result: None,
            host: None,
            count: None,
            url: None,
            path: None,
            expected_hash: None,
            actual_hash: None,
            setting: None,
        }
    }

    // ── Builders ─────────────────────────────────────────────────────

    pub fn site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    pub fn result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn hashes(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected_hash = Some(expected.into());
        self.actual_hash = Some(actual.into());
        self
    }

    pub fn setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = Some(setting.into());
        self
    }

    // ── Known event kinds ────────────────────────────────────────────

    pub fn login_attempt(site_id: &str, success: bool) -> Self {
        Self::new(AuditEventType::LoginAttempt)
            .site(site_id)
            .result(if success { "success" } else { "failure" })
    }

    pub fn cookie_stored(site_id: &str, count: u64) -> Self {
        Self::new(AuditEventType::CookieStored)
            .site(site_id)
            .count(count)
    }

    pub fn cookie_restored(site_id: &str, count: u64) -> Self {
        Self::new(AuditEventType::CookieRestored)
            .site(site_id)
            .count(count)
    }

    pub fn cookie_revoked(site_id: &str) -> Self {
        Self::new(AuditEventType::CookieRevoked).site(site_id)
    }

    /// Cookie operation refused by policy; `setting` names the toggle.
    pub fn cookie_blocked(site_id: &str, setting: &str) -> Self {
        Self::new(AuditEventType::CookieBlocked)
            .site(site_id)
            .setting(setting)
            .result("blocked")
    }

    pub fn allowlist_block(site_id: &str, url: &str, host: &str) -> Self {
        Self::new(AuditEventType::AllowlistBlock)
            .site(site_id)
            .url(url)
            .host(host)
            .result("blocked")
    }

    pub fn integrity_failure(path: &str, expected_hash: &str, actual_hash: &str) -> Self {
        Self::new(AuditEventType::IntegrityFailure)
            .path(path)
            .hashes(expected_hash, actual_hash)
    }

    pub fn policy_override(site_id: &str, setting: &str) -> Self {
        Self::new(AuditEventType::PolicyOverride)
            .site(site_id)
            .setting(setting)
    }

    pub fn secret_corrupted(path: &str, reason: &str) -> Self {
        Self::new(AuditEventType::SecretCorrupted)
            .path(path)
            .result(reason)
    }

    pub fn exception(context: &str) -> Self {
        Self::new(AuditEventType::Exception)
            .site(context)
            .result("shielded")
    }
}

/// An event as stored: the write-time timestamp plus the event fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub event: AuditEvent,
}
