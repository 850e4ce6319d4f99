//! Input sanitization for configuration-supplied strings.
//!
//! Every function either returns a normalized value or fails with a
//! `Validation` error naming the field and the reason.  Nothing is
//! silently truncated or stripped.

use std::path::{Component, Path, PathBuf};

use crate::errors::{KioskVaultError, Result};

/// Longest path accepted before resolution.
pub const MAX_PATH_LEN: usize = 4096;

/// Longest host name accepted (RFC 1035 total length).
pub const MAX_HOST_LEN: usize = 255;

/// Longest single DNS label.
const MAX_LABEL_LEN: usize = 63;

/// Characters allowed in a selector besides ASCII alphanumerics.
const SELECTOR_PUNCTUATION: &str = "-_#.:[]=>+~*(),^$| ";

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Resolve `path` against `base_dir` and require the result to stay
/// inside it.
///
/// Resolution is lexical: `.` and `..` are folded without touching the
/// file system, so the target need not exist.  Absolute candidates are
/// accepted only if they already lie under the base.
pub fn sanitize_path(path: &str, base_dir: &Path) -> Result<PathBuf> {
    const FIELD: &str = "path";

    if path.trim().is_empty() {
        return Err(KioskVaultError::validation(FIELD, "cannot be empty"));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("exceeds {MAX_PATH_LEN} bytes"),
        ));
    }
    if path.chars().any(char::is_control) {
        return Err(KioskVaultError::validation(
            FIELD,
            "contains control characters",
        ));
    }

    let base = if base_dir.is_absolute() {
        base_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(base_dir)
    };
    let base = normalize(&base).ok_or_else(|| {
        KioskVaultError::validation("base directory", "escapes the filesystem root")
    })?;

    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };

    let resolved = normalize(&joined).ok_or_else(|| {
        KioskVaultError::validation(FIELD, format!("'{path}' escapes the filesystem root"))
    })?;

    if !resolved.starts_with(&base) {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("'{path}' resolves outside {}", base.display()),
        ));
    }

    Ok(resolved)
}

/// Fold `.` and `..` components.  Returns `None` if `..` would climb
/// above the root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Hosts
// ---------------------------------------------------------------------------

/// Normalize a host name to lower-case ASCII.
///
/// Trailing dots are trimmed and internationalized labels are converted
/// to their punycode (`xn--`) form before the character check.
pub fn sanitize_host(host: &str) -> Result<String> {
    const FIELD: &str = "host";

    let trimmed = host.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(KioskVaultError::validation(FIELD, "cannot be empty"));
    }
    if trimmed.len() > MAX_HOST_LEN * 4 {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("exceeds {MAX_HOST_LEN} characters"),
        ));
    }

    let ascii = if trimmed.is_ascii() {
        trimmed.to_string()
    } else {
        match url::Host::parse(trimmed) {
            Ok(url::Host::Domain(domain)) => domain,
            Ok(other) => other.to_string(),
            Err(e) => {
                return Err(KioskVaultError::validation(
                    FIELD,
                    format!("'{host}' is not a valid host name: {e}"),
                ))
            }
        }
    };
    let ascii = ascii.trim_end_matches('.');

    if ascii.len() > MAX_HOST_LEN {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("exceeds {MAX_HOST_LEN} characters"),
        ));
    }
    if let Some(bad) = ascii
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("contains disallowed character {bad:?}"),
        ));
    }
    if ascii
        .split('.')
        .any(|label| label.is_empty() || label.len() > MAX_LABEL_LEN)
    {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("labels must be 1 to {MAX_LABEL_LEN} characters"),
        ));
    }

    Ok(ascii.to_ascii_lowercase())
}

// ---------------------------------------------------------------------------
// Selectors and free text
// ---------------------------------------------------------------------------

/// Validate a CSS-selector-shaped field.
///
/// Quotes, backslashes, angle brackets, braces and semicolons are all
/// rejected, so the value can be placed inside a quoted script literal.
pub fn sanitize_selector(value: &str, max_len: usize) -> Result<String> {
    const FIELD: &str = "selector";

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(KioskVaultError::validation(FIELD, "cannot be empty"));
    }
    if value.chars().count() > max_len {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("exceeds {max_len} characters"),
        ));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || SELECTOR_PUNCTUATION.contains(*c)))
    {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("contains disallowed character {bad:?}"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Require printable ASCII (plus tab, CR and LF) within `max_len`.
pub fn ensure_safe_ascii(value: &str, max_len: usize, field_name: &str) -> Result<()> {
    if value.len() > max_len {
        return Err(KioskVaultError::validation(
            field_name,
            format!("exceeds {max_len} characters"),
        ));
    }
    if let Some((index, bad)) = value
        .char_indices()
        .find(|(_, c)| !(matches!(c, ' '..='~') || matches!(c, '\t' | '\n' | '\r')))
    {
        return Err(KioskVaultError::validation(
            field_name,
            format!("contains non-printable or non-ASCII character {bad:?} at byte {index}"),
        ));
    }
    Ok(())
}

/// Reduce a profile identifier to `[A-Za-z0-9_-]` for use as a
/// directory name.  An id with nothing left is rejected.
pub fn sanitize_profile_id(id: &str) -> Result<String> {
    let cleaned: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        return Err(KioskVaultError::validation(
            "profile id",
            format!("'{id}' has no usable characters"),
        ));
    }
    Ok(cleaned)
}
