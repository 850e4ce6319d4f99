//! Hardened command-line arguments for a launched child browser.
//!
//! The structured methods sanitize everything they splice into a flag.
//! `add` only deduplicates; it is for literals the caller already trusts.
//! A flag name (text before `=`, compared case-insensitively) is emitted
//! at most once and the first occurrence wins.

use std::path::{Path, PathBuf};

use crate::errors::{KioskVaultError, Result};
use crate::policy::PolicySnapshot;
use crate::sanitize::{ensure_safe_ascii, sanitize_host, sanitize_profile_id};

/// Directory under the base that holds per-profile data dirs.
pub const PROFILES_DIR: &str = "profiles";

const MAX_PROXY_LEN: usize = 2048;

/// Flags present on every launch after `--user-data-dir`.
const HARDENING_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-extensions",
    "--disable-component-update",
    "--metrics-recording-only",
    "--disable-features=Translate,MediaRouter",
];

/// Ordered, deduplicated argument list.
#[derive(Debug, Clone)]
pub struct SandboxArgs {
    profile_id: String,
    user_data_dir: PathBuf,
    args: Vec<String>,
}

impl SandboxArgs {
    /// Start a builder for `profile_id`, isolated under
    /// `<base_dir>/profiles/<sanitized id>`.
    pub fn new(profile_id: &str, base_dir: &Path) -> Result<Self> {
        let profile_id = sanitize_profile_id(profile_id)?;
        let user_data_dir = base_dir.join(PROFILES_DIR).join(&profile_id);

        let mut builder = Self {
            profile_id,
            user_data_dir,
            args: Vec::new(),
        };
        let data_dir_flag = format!("--user-data-dir={}", builder.user_data_dir.display());
        builder.push(data_dir_flag);
        for flag in HARDENING_FLAGS {
            builder.push(*flag);
        }
        Ok(builder)
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn user_data_dir(&self) -> &Path {
        &self.user_data_dir
    }

    pub fn kiosk(mut self) -> Self {
        self.push("--kiosk");
        self
    }

    pub fn incognito(mut self) -> Self {
        self.push("--incognito");
        self
    }

    /// App mode for an absolute http(s) URL.
    ///
    /// The URL is rebuilt from scheme, sanitized host, port and an
    /// escaped path.  Query, fragment and credentials are dropped.
    pub fn app(mut self, url: &str) -> Result<Self> {
        let rebuilt = rebuild_app_url(url)?;
        self.push(format!("--app={rebuilt}"));
        Ok(self)
    }

    /// Route traffic through `address` (which must carry a scheme), with
    /// `bypass` hosts sent direct.  Blank bypass entries are dropped.
    pub fn proxy<S: AsRef<str>>(mut self, address: &str, bypass: &[S]) -> Result<Self> {
        let address = address.trim();
        if !address.contains("://") {
            return Err(KioskVaultError::validation(
                "proxy",
                format!("'{address}' has no scheme (expected e.g. http://host:port)"),
            ));
        }
        ensure_safe_ascii(address, MAX_PROXY_LEN, "proxy")?;
        if let Some(bad) = address
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';' | '`'))
        {
            return Err(KioskVaultError::validation(
                "proxy",
                format!("contains disallowed character {bad:?}"),
            ));
        }

        let mut hosts = Vec::new();
        for entry in bypass {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            hosts.push(sanitize_bypass_entry(entry)?);
        }

        self.push(format!("--proxy-server={address}"));
        if !hosts.is_empty() {
            self.push(format!("--proxy-bypass-list={}", hosts.join(";")));
        }
        Ok(self)
    }

    /// Map resolved policy toggles to flags.  Only tightening flags are
    /// ever emitted.
    pub fn with_policy(mut self, snapshot: &PolicySnapshot) -> Self {
        if snapshot.strict_tls {
            self.push("--ssl-version-min=tls1.2");
        }
        if snapshot.disable_third_party_cookies {
            self.push("--test-third-party-cookie-phaseout");
        }
        self
    }

    /// Append a caller-assembled flag.  Deduplicated, not sanitized.
    pub fn add(mut self, argument: impl Into<String>) -> Self {
        self.push(argument);
        self
    }

    pub fn build(self) -> Vec<String> {
        self.args
    }

    fn push(&mut self, argument: impl Into<String>) {
        let argument = argument.into();
        let name = flag_name(&argument);
        if self.args.iter().any(|a| flag_name(a) == name) {
            tracing::debug!(flag = %name, "duplicate sandbox flag ignored");
            return;
        }
        self.args.push(argument);
    }
}

fn flag_name(argument: &str) -> String {
    argument
        .split_once('=')
        .map_or(argument, |(name, _)| name)
        .to_ascii_lowercase()
}

fn rebuild_app_url(raw: &str) -> Result<String> {
    const FIELD: &str = "app url";

    let parsed = url::Url::parse(raw.trim()).map_err(|e| {
        KioskVaultError::validation(FIELD, format!("'{raw}' is not an absolute URL: {e}"))
    })?;
    let scheme = parsed.scheme();
    if scheme != "https" && scheme != "http" {
        return Err(KioskVaultError::validation(
            FIELD,
            format!("scheme '{scheme}' is not http or https"),
        ));
    }
    // IP literals are already canonical once parsed; only names go
    // through host sanitizing.
    let host = match parsed.host() {
        Some(url::Host::Domain(name)) => sanitize_host(name)?,
        Some(url::Host::Ipv4(ip)) => ip.to_string(),
        Some(url::Host::Ipv6(ip)) => format!("[{ip}]"),
        None => return Err(KioskVaultError::validation(FIELD, "has no host")),
    };

    let mut out = format!("{scheme}://{host}");
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(&escape_path(parsed.path()));
    Ok(out)
}

/// Percent-encode every byte outside a conservative path set.  Existing
/// `%XX` escapes pass through unchanged.
fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'/' | b'%' | b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Bypass entries may carry a leading `*.` wildcard; the rest must be a
/// valid host.
fn sanitize_bypass_entry(entry: &str) -> Result<String> {
    match entry.strip_prefix("*.") {
        Some(rest) => Ok(format!("*.{}", sanitize_host(rest)?)),
        None => sanitize_host(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SecurityProfile;

    fn base() -> SandboxArgs {
        SandboxArgs::new("lobby", Path::new("/data")).unwrap()
    }

    #[test]
    fn new_seeds_data_dir_and_hardening_flags() {
        let args = base().build();
        assert_eq!(args[0], "--user-data-dir=/data/profiles/lobby");
        for flag in HARDENING_FLAGS {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
    }

    #[test]
    fn profile_id_cannot_traverse() {
        let b = SandboxArgs::new("../../etc", Path::new("/data")).unwrap();
        assert_eq!(b.user_data_dir(), Path::new("/data/profiles/etc"));
        assert!(SandboxArgs::new("../", Path::new("/data")).is_err());
    }

    #[test]
    fn kiosk_twice_yields_one_token() {
        let args = base().kiosk().kiosk().add("--KIOSK").build();
        assert_eq!(args.iter().filter(|a| a.eq_ignore_ascii_case("--kiosk")).count(), 1);
    }

    #[test]
    fn dedup_compares_name_before_equals() {
        let args = base().add("--lang=en").add("--LANG=fr").build();
        let langs: Vec<&String> = args
            .iter()
            .filter(|a| a.to_ascii_lowercase().starts_with("--lang"))
            .collect();
        assert_eq!(langs, vec!["--lang=en"]);
    }

    #[test]
    fn app_url_is_rebuilt_from_sanitized_parts() {
        let args = base()
            .app("https://user:pw@Intranet.Example.COM:8443/board/it's here?token=x#frag")
            .unwrap()
            .build();
        let app = args.iter().find(|a| a.starts_with("--app=")).unwrap();
        assert_eq!(
            app,
            "--app=https://intranet.example.com:8443/board/it%27s%20here"
        );
    }

    #[test]
    fn app_accepts_ip_literal_hosts() {
        let app = |raw: &str| {
            base()
                .app(raw)
                .unwrap()
                .build()
                .into_iter()
                .find(|a| a.starts_with("--app="))
                .unwrap()
        };

        assert_eq!(app("http://[::1]:8080/"), "--app=http://[::1]:8080/");
        assert_eq!(
            app("https://[2001:DB8:0:0::1]/board"),
            "--app=https://[2001:db8::1]/board"
        );
        assert_eq!(app("http://127.0.0.1:3000/x"), "--app=http://127.0.0.1:3000/x");
    }

    #[test]
    fn app_rejects_relative_and_non_http() {
        assert!(base().app("/relative/path").is_err());
        assert!(base().app("javascript:alert(1)").is_err());
        assert!(base().app("file:///etc/passwd").is_err());
    }

    #[test]
    fn proxy_requires_scheme_and_sanitizes_bypass() {
        assert!(base().proxy("proxy.local:3128", &[] as &[&str]).is_err());

        let args = base()
            .proxy("http://proxy.local:3128", &["Intranet.Example.", "  ", "*.Corp.example"])
            .unwrap()
            .build();
        assert!(args.contains(&"--proxy-server=http://proxy.local:3128".to_string()));
        assert!(args.contains(&"--proxy-bypass-list=intranet.example;*.corp.example".to_string()));
    }

    #[test]
    fn proxy_rejects_bad_bypass_host() {
        assert!(base()
            .proxy("http://proxy.local:3128", &["evil.com;--disable-web-security"])
            .is_err());
    }

    #[test]
    fn policy_maps_to_tightening_flags_only() {
        let strict = base().with_policy(&SecurityProfile::Strict.baseline()).build();
        assert!(strict.contains(&"--ssl-version-min=tls1.2".to_string()));
        assert!(strict.contains(&"--test-third-party-cookie-phaseout".to_string()));

        let relaxed = base().with_policy(&SecurityProfile::Relaxed.baseline()).build();
        assert!(!relaxed.iter().any(|a| a.starts_with("--ssl-version-min")));
        assert!(!relaxed.iter().any(|a| a.contains("ignore-certificate")));
    }
}
