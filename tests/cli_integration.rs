//! Integration tests for the KioskVault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Every invocation points `--config-dir` and `--data-dir` at temp
//! directories so nothing outside them is touched.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Helper: get a Command pointing at the kioskvault binary.
fn kioskvault() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("kioskvault").expect("binary should exist");
    cmd.env_remove("KIOSKVAULT_LOG")
        .env_remove("KIOSKVAULT_CONFIG_DIR")
        .env_remove("KIOSKVAULT_DATA_DIR");
    cmd
}

/// Helper: a command scoped to `tmp` for both config and data.
fn scoped(tmp: &TempDir) -> Command {
    let mut cmd = kioskvault();
    cmd.env("KIOSKVAULT_CONFIG_DIR", tmp.child("config").path())
        .env("KIOSKVAULT_DATA_DIR", tmp.child("data").path());
    cmd
}

#[test]
fn help_flag_shows_usage() {
    kioskvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Local secret vault"))
        .stdout(predicate::str::contains("secret"))
        .stdout(predicate::str::contains("policy"))
        .stdout(predicate::str::contains("audit"))
        .stdout(predicate::str::contains("sandbox"))
        .stdout(predicate::str::contains("sanitize"));
}

#[test]
fn version_flag_shows_version() {
    kioskvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kioskvault"));
}

#[test]
fn no_args_shows_help() {
    kioskvault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ---------------------------------------------------------------------------
// secret
// ---------------------------------------------------------------------------

#[test]
fn secret_set_get_exists_delete() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["secret", "set", "lobby", "password", "p@ss"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored password for 'lobby'"));

    scoped(&tmp)
        .args(["secret", "get", "lobby", "password"])
        .assert()
        .success()
        .stdout("p@ss\n");

    scoped(&tmp)
        .args(["secret", "exists", "lobby", "password"])
        .assert()
        .success()
        .stdout("true\n");

    scoped(&tmp)
        .args(["secret", "delete", "lobby", "password", "--force"])
        .assert()
        .success();

    scoped(&tmp)
        .args(["secret", "exists", "lobby", "password"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn secret_set_reads_piped_value() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["secret", "set", "lobby", "totp"])
        .write_stdin("JBSWY3DPEHPK3PXP\n")
        .assert()
        .success();

    scoped(&tmp)
        .args(["secret", "get", "lobby", "totp"])
        .assert()
        .success()
        .stdout("JBSWY3DPEHPK3PXP\n");
}

#[test]
fn secret_files_do_not_contain_plaintext() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["secret", "set", "lobby", "password", "plain-marker-123"])
        .assert()
        .success();

    let secrets = tmp.child("data").child("secrets");
    let mut found = 0;
    for entry in std::fs::read_dir(secrets.path()).unwrap() {
        let path = entry.unwrap().path();
        assert_eq!(path.extension().unwrap(), "secret");
        let data = std::fs::read(&path).unwrap();
        assert!(!data
            .windows(b"plain-marker-123".len())
            .any(|w| w == b"plain-marker-123"));
        found += 1;
    }
    assert_eq!(found, 1);
}

#[test]
fn secret_get_missing_fails() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["secret", "get", "lobby", "username"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("The requested secret is not stored"));
}

#[test]
fn secret_forget_removes_all_kinds() {
    let tmp = TempDir::new().unwrap();

    for kind in ["username", "password", "totp"] {
        scoped(&tmp)
            .args(["secret", "set", "lobby", kind, "v"])
            .assert()
            .success();
    }

    scoped(&tmp)
        .args(["secret", "forget", "lobby", "--force"])
        .assert()
        .success();

    for kind in ["username", "password", "totp"] {
        scoped(&tmp)
            .args(["secret", "exists", "lobby", kind])
            .assert()
            .success()
            .stdout("false\n");
    }
}

#[test]
fn secret_rejects_unknown_kind() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["secret", "get", "lobby", "pin"])
        .assert()
        .failure();
}

#[test]
fn keyring_flag_without_feature_fails_cleanly() {
    let tmp = TempDir::new().unwrap();

    if cfg!(feature = "keyring-store") {
        return;
    }
    scoped(&tmp)
        .args(["--keyring", "secret", "exists", "lobby", "password"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rejected as invalid"));
}

// ---------------------------------------------------------------------------
// policy
// ---------------------------------------------------------------------------

#[test]
fn policy_show_uses_config_file() {
    let tmp = TempDir::new().unwrap();
    tmp.child("config")
        .child("kioskvault.toml")
        .write_str(
            r#"
[policy]
profile = "strict"

[policy.overrides.gallery]
allow_cookie_restore = true
max_login_duration_secs = 600
"#,
        )
        .unwrap();

    scoped(&tmp)
        .args(["policy", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strict"))
        .stdout(predicate::str::contains("baseline"))
        .stdout(predicate::str::contains("3600"));

    scoped(&tmp)
        .args(["policy", "show", "--site", "gallery"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overridden"))
        .stdout(predicate::str::contains("600"));
}

#[test]
fn policy_validate_rejects_out_of_range_duration() {
    let tmp = TempDir::new().unwrap();
    tmp.child("config")
        .child("kioskvault.toml")
        .write_str("[policy.overrides.lobby]\nmax_login_duration_secs = 0\n")
        .unwrap();

    scoped(&tmp)
        .args(["policy", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rejected as invalid"));
}

#[test]
fn policy_validate_accepts_defaults() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["policy", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy is valid"));
}

#[test]
fn malformed_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    tmp.child("config")
        .child("kioskvault.toml")
        .write_str("[policy\nprofile = ")
        .unwrap();

    scoped(&tmp).args(["policy", "show"]).assert().failure();
}

// ---------------------------------------------------------------------------
// sandbox
// ---------------------------------------------------------------------------

#[test]
fn sandbox_prints_one_argument_per_line() {
    let tmp = TempDir::new().unwrap();

    let out = scoped(&tmp)
        .args([
            "sandbox",
            "lobby",
            "--kiosk",
            "--app",
            "https://Signage.Example.com/board",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert!(lines[0].starts_with("--user-data-dir="));
    assert!(lines[0].ends_with("lobby"));
    assert_eq!(lines.iter().filter(|l| **l == "--kiosk").count(), 1);
    assert!(lines.contains(&"--app=https://signage.example.com/board"));
    assert!(lines.contains(&"--no-first-run"));
}

#[test]
fn sandbox_applies_site_policy() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["sandbox", "lobby", "--site", "lobby"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--ssl-version-min=tls1.2"));
}

#[test]
fn sandbox_rejects_proxy_without_scheme() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["sandbox", "lobby", "--proxy", "proxy.internal:8080"])
        .assert()
        .failure();
}

#[test]
fn sandbox_bypass_requires_proxy() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["sandbox", "lobby", "--bypass", "intranet.example"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--proxy"));
}

// ---------------------------------------------------------------------------
// sanitize
// ---------------------------------------------------------------------------

#[test]
fn sanitize_host_normalizes() {
    kioskvault()
        .args(["sanitize", "host", "Intranet.EXAMPLE."])
        .assert()
        .success()
        .stdout("intranet.example\n");
}

#[test]
fn sanitize_path_traversal_fails() {
    let tmp = TempDir::new().unwrap();

    kioskvault()
        .args(["sanitize", "path", "../../etc/passwd", "--base"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("rejected as invalid"));
}

#[test]
fn sanitize_selector_rejects_quotes() {
    kioskvault()
        .args(["sanitize", "selector", "a[href=\"x\"]"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

#[test]
fn audit_lists_recorded_events() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["secret", "set", "lobby", "password", "p"])
        .assert()
        .success();
    scoped(&tmp)
        .args(["secret", "forget", "lobby", "--force"])
        .assert()
        .success();

    scoped(&tmp)
        .args(["audit", "--type", "cookie_revoked"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cookie_revoked"))
        .stdout(predicate::str::contains("lobby"));
}

#[test]
fn audit_empty_log_reports_no_entries() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("No audit entries found"));
}

#[test]
fn audit_rejects_unknown_type() {
    let tmp = TempDir::new().unwrap();

    scoped(&tmp)
        .args(["audit", "--type", "nope"])
        .assert()
        .failure();
}
