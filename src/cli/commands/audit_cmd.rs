//! `kioskvault audit` — display recent audit log entries.

use crate::audit::{AuditEventType, AuditFilter};
use crate::cli::{load_settings, open_audit, output, parse_duration, Cli};
use crate::errors::Result;

/// Execute the `audit` command.
pub fn execute(
    cli: &Cli,
    last: usize,
    event_type: Option<&str>,
    site: Option<&str>,
    since: Option<&str>,
) -> Result<()> {
    let settings = load_settings(cli)?;
    let audit = open_audit(&settings)?;

    let filter = AuditFilter {
        event_type: event_type.map(str::parse::<AuditEventType>).transpose()?,
        site_id: site.map(str::to_string),
        since: since.map(parse_duration).transpose()?,
        limit: Some(last),
    };

    let records = audit.read_events(&filter)?;
    output::print_audit_table(&records);

    Ok(())
}
