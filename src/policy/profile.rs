//! Security profiles, sparse per-site overrides and resolved snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{KioskVaultError, Result};

/// Longest login session any profile or override may configure (24 h).
pub const MAX_LOGIN_DURATION_SECS: u32 = 86_400;

/// One of the three fixed baseline postures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProfile {
    Relaxed,
    #[default]
    Standard,
    Strict,
}

impl SecurityProfile {
    pub const ALL: [SecurityProfile; 3] = [Self::Relaxed, Self::Standard, Self::Strict];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relaxed => "relaxed",
            Self::Standard => "standard",
            Self::Strict => "strict",
        }
    }

    /// The five toggles this profile starts from.
    pub fn baseline(self) -> PolicySnapshot {
        match self {
            Self::Relaxed => PolicySnapshot {
                allow_cookie_restore: true,
                allow_devtools_cookie_ops: true,
                strict_tls: false,
                disable_third_party_cookies: false,
                max_login_duration_secs: 86_400,
            },
            Self::Standard => PolicySnapshot {
                allow_cookie_restore: true,
                allow_devtools_cookie_ops: false,
                strict_tls: true,
                disable_third_party_cookies: true,
                max_login_duration_secs: 28_800,
            },
            Self::Strict => PolicySnapshot {
                allow_cookie_restore: false,
                allow_devtools_cookie_ops: false,
                strict_tls: true,
                disable_third_party_cookies: true,
                max_login_duration_secs: 3_600,
            },
        }
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityProfile {
    type Err = KioskVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relaxed" => Ok(Self::Relaxed),
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(KioskVaultError::PolicyConfiguration(format!(
                "unknown security profile '{other}' (expected relaxed, standard or strict)"
            ))),
        }
    }
}

/// Fully resolved toggles for one site at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub allow_cookie_restore: bool,
    pub allow_devtools_cookie_ops: bool,
    pub strict_tls: bool,
    pub disable_third_party_cookies: bool,
    pub max_login_duration_secs: u32,
}

/// Sparse per-site record.  `None` means "use the profile baseline".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_cookie_restore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_devtools_cookie_ops: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_third_party_cookies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_login_duration_secs: Option<u32>,
}

impl PolicyOverride {
    /// Replace each baseline field that this override sets.
    pub fn apply(&self, mut base: PolicySnapshot) -> PolicySnapshot {
        if let Some(v) = self.allow_cookie_restore {
            base.allow_cookie_restore = v;
        }
        if let Some(v) = self.allow_devtools_cookie_ops {
            base.allow_devtools_cookie_ops = v;
        }
        if let Some(v) = self.strict_tls {
            base.strict_tls = v;
        }
        if let Some(v) = self.disable_third_party_cookies {
            base.disable_third_party_cookies = v;
        }
        if let Some(v) = self.max_login_duration_secs {
            base.max_login_duration_secs = v;
        }
        base
    }

    /// Names of the fields this override sets, in declaration order.
    pub fn set_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.allow_cookie_restore.is_some() {
            fields.push("allow_cookie_restore");
        }
        if self.allow_devtools_cookie_ops.is_some() {
            fields.push("allow_devtools_cookie_ops");
        }
        if self.strict_tls.is_some() {
            fields.push("strict_tls");
        }
        if self.disable_third_party_cookies.is_some() {
            fields.push("disable_third_party_cookies");
        }
        if self.max_login_duration_secs.is_some() {
            fields.push("max_login_duration_secs");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.set_fields().is_empty()
    }
}

/// Reject a login duration outside `1..=MAX_LOGIN_DURATION_SECS`.
pub(crate) fn check_login_duration(secs: u32, context: &str) -> Result<()> {
    if (1..=MAX_LOGIN_DURATION_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(KioskVaultError::PolicyConfiguration(format!(
            "{context}: max_login_duration_secs {secs} is outside 1..={MAX_LOGIN_DURATION_SECS}"
        )))
    }
}
