//! Logical secret keys.
//!
//! Site-scoped credentials use `site:<owner>:<kind>` where `kind` is one
//! of `username`, `password` or `totp`.  Any other string is a generic
//! opaque key: it is stored the same way but carries no owner/kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{KioskVaultError, Result};

/// Namespace prefix for site-scoped credential keys.
pub const SITE_PREFIX: &str = "site";

/// Namespace prefix for a site's cookie jar.
pub const COOKIE_PREFIX: &str = "cookies";

/// Maximum length of a logical key.
pub const MAX_KEY_LEN: usize = 1024;

/// The kind of credential stored under a site-scoped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Username,
    Password,
    Totp,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 3] = [Self::Username, Self::Password, Self::Totp];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::Totp => "totp",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = KioskVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "username" => Ok(Self::Username),
            "password" => Ok(Self::Password),
            "totp" => Ok(Self::Totp),
            other => Err(KioskVaultError::validation(
                "credential kind",
                format!("'{other}' is not one of username, password, totp"),
            )),
        }
    }
}

/// Owner and kind parsed out of a site-scoped key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteCredential {
    pub owner: String,
    pub kind: CredentialKind,
}

/// Build the logical key for a site credential.
pub fn site_key(owner: &str, kind: CredentialKind) -> String {
    format!("{SITE_PREFIX}:{owner}:{kind}")
}

/// Build the logical key for a site's cookie jar.
pub fn cookie_key(owner: &str) -> String {
    format!("{COOKIE_PREFIX}:{owner}")
}

/// Parse a site-scoped key.  Returns `None` for generic keys, including
/// keys with the site prefix but an unknown kind suffix.
pub fn parse_site_key(key: &str) -> Option<SiteCredential> {
    let rest = key.strip_prefix(SITE_PREFIX)?.strip_prefix(':')?;
    let (owner, kind) = rest.rsplit_once(':')?;
    if owner.is_empty() {
        return None;
    }
    let kind = kind.parse().ok()?;
    Some(SiteCredential {
        owner: owner.to_string(),
        kind,
    })
}

/// Reject keys the vault cannot address.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(KioskVaultError::validation("secret key", "cannot be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(KioskVaultError::validation(
            "secret key",
            format!("cannot exceed {MAX_KEY_LEN} bytes"),
        ));
    }
    Ok(())
}

/// Reject owner ids that would make ambiguous keys.
pub fn validate_owner(owner: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(KioskVaultError::validation("site id", "cannot be empty"));
    }
    if owner.chars().any(char::is_control) {
        return Err(KioskVaultError::validation(
            "site id",
            "contains control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_key_roundtrips_through_parse() {
        for kind in CredentialKind::ALL {
            let key = site_key("foo", kind);
            let parsed = parse_site_key(&key).unwrap();
            assert_eq!(parsed.owner, "foo");
            assert_eq!(parsed.kind, kind);
        }
    }

    #[test]
    fn example_key_parses() {
        let parsed = parse_site_key("site:foo:password").unwrap();
        assert_eq!(parsed.owner, "foo");
        assert_eq!(parsed.kind, CredentialKind::Password);
    }

    #[test]
    fn owner_may_contain_colons() {
        let parsed = parse_site_key("site:intranet:8080:username").unwrap();
        assert_eq!(parsed.owner, "intranet:8080");
    }

    #[test]
    fn unknown_suffix_is_generic() {
        assert!(parse_site_key("site:foo:apikey").is_none());
        assert!(parse_site_key("site::password").is_none());
        assert!(parse_site_key("cookies:foo").is_none());
        assert!(parse_site_key("sitefoo:password").is_none());
    }

    #[test]
    fn validate_key_bounds() {
        assert!(validate_key("").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
        assert!(validate_key("anything goes").is_ok());
    }

    #[test]
    fn validate_owner_rejects_blank_and_control() {
        assert!(validate_owner("  ").is_err());
        assert!(validate_owner("a\nb").is_err());
        assert!(validate_owner("lobby-left").is_ok());
    }
}
