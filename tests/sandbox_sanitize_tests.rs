//! Integration tests for the sanitizer, the sandbox argument builder
//! and the exception shield.

use std::path::Path;

use kioskvault::errors::KioskVaultError;
use kioskvault::policy::SecurityPolicy;
use kioskvault::policy::SecurityProfile;
use kioskvault::sandbox::SandboxArgs;
use kioskvault::sanitize::{ensure_safe_ascii, sanitize_host, sanitize_path, sanitize_selector};
use kioskvault::shield::{shield, ShieldCategory};

#[test]
fn traversal_is_rejected_and_nested_path_accepted() {
    assert!(sanitize_path("../../etc/passwd", Path::new("/data")).is_err());

    let ok = sanitize_path("sub/dir", Path::new("/data")).unwrap();
    assert!(ok.is_absolute());
    assert!(ok.starts_with("/data"));
}

#[test]
fn sanitizer_errors_are_validation_errors() {
    let errs = [
        sanitize_host("bad host").unwrap_err(),
        sanitize_selector("a<b", 10).unwrap_err(),
        ensure_safe_ascii("\u{1b}[31m", 10, "script").unwrap_err(),
    ];
    for e in errs {
        assert!(matches!(e, KioskVaultError::Validation { .. }), "{e}");
    }
}

#[test]
fn host_normalization() {
    assert_eq!(sanitize_host("Example.COM..").unwrap(), "example.com");
    assert_eq!(sanitize_host("münchen.de").unwrap(), "xn--mnchen-3ya.de");
    assert!(sanitize_host(&format!("{}.com", "a".repeat(256))).is_err());
}

#[test]
fn kiosk_called_twice_emits_one_token() {
    let args = SandboxArgs::new("lobby", Path::new("/data"))
        .unwrap()
        .kiosk()
        .kiosk()
        .build();
    assert_eq!(args.iter().filter(|a| *a == "--kiosk").count(), 1);
}

#[test]
fn full_launch_for_strict_site() {
    let policy = SecurityPolicy::new(SecurityProfile::Strict);
    let args = SandboxArgs::new("Lobby Screen #1", Path::new("/var/lib/kiosk"))
        .unwrap()
        .kiosk()
        .app("https://Signage.Example.com/boards/main")
        .unwrap()
        .proxy("http://proxy.internal:8080", &["intranet.example"])
        .unwrap()
        .with_policy(&policy.resolve(Some("lobby")))
        .build();

    assert_eq!(args[0], "--user-data-dir=/var/lib/kiosk/profiles/LobbyScreen1");
    assert!(args.contains(&"--app=https://signage.example.com/boards/main".to_string()));
    assert!(args.contains(&"--ssl-version-min=tls1.2".to_string()));

    // No flag name appears twice.
    let mut names: Vec<String> = args
        .iter()
        .map(|a| a.split('=').next().unwrap().to_ascii_lowercase())
        .collect();
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total);
}

#[test]
fn app_host_injection_is_rejected() {
    let b = SandboxArgs::new("p", Path::new("/data")).unwrap();
    assert!(b.app("https://exa mple.com/").is_err());
}

#[test]
fn shield_hides_io_details() {
    let err = std::fs::read("/definitely/not/here/kioskvault.secret").unwrap_err();
    let shielded = shield(KioskVaultError::from(err), "vault.get", None);

    assert_eq!(shielded.category(), ShieldCategory::Io);
    assert!(!shielded.to_string().contains("/definitely"));
    assert!(shielded.original().to_string().contains("No such file"));
}
