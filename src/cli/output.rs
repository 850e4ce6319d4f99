//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::AuditRecord;
use crate::policy::PolicySnapshot;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a resolved policy as a Setting / Value table.
pub fn print_policy_table(snapshot: &PolicySnapshot) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Setting", "Value"]);

    let flag = |on: bool| {
        if on {
            style("yes").green().to_string()
        } else {
            style("no").red().to_string()
        }
    };

    table.add_row(vec!["allow_cookie_restore".to_string(), flag(snapshot.allow_cookie_restore)]);
    table.add_row(vec![
        "allow_devtools_cookie_ops".to_string(),
        flag(snapshot.allow_devtools_cookie_ops),
    ]);
    table.add_row(vec!["strict_tls".to_string(), flag(snapshot.strict_tls)]);
    table.add_row(vec![
        "disable_third_party_cookies".to_string(),
        flag(snapshot.disable_third_party_cookies),
    ]);
    table.add_row(vec![
        "max_login_duration_secs".to_string(),
        snapshot.max_login_duration_secs.to_string(),
    ]);

    println!("{table}");
}

/// Print audit records in a formatted table.
pub fn print_audit_table(records: &[AuditRecord]) {
    if records.is_empty() {
        info("No audit entries found.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Type", "Site", "Details"]);

    for record in records {
        let event = &record.event;
        let time = record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let site = event.site_id.as_deref().unwrap_or("-").to_string();

        let mut details = Vec::new();
        if let Some(ref r) = event.result {
            details.push(r.clone());
        }
        if let Some(ref s) = event.setting {
            details.push(format!("setting={s}"));
        }
        if let Some(c) = event.count {
            details.push(format!("count={c}"));
        }
        if let Some(ref h) = event.host {
            details.push(format!("host={h}"));
        }
        if let Some(ref p) = event.path {
            details.push(format!("path={p}"));
        }
        let details = if details.is_empty() {
            "-".to_string()
        } else {
            details.join(" ")
        };

        table.add_row(vec![
            time,
            colorize_event_type(event.event_type.as_str()),
            site,
            details,
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", records.len())).bold()
    );
    println!("{table}");
}

/// Colorize event type names for display.
fn colorize_event_type(name: &str) -> String {
    match name {
        "cookie_stored" | "cookie_restored" | "login_attempt" => style(name).green().to_string(),
        "cookie_revoked" | "policy_override" => style(name).yellow().to_string(),
        "cookie_blocked" | "allowlist_block" => style(name).magenta().to_string(),
        "integrity_failure" | "secret_corrupted" | "exception" => style(name).red().to_string(),
        _ => name.to_string(),
    }
}
