//! `kioskvault sanitize` — check a value the way configuration loading does.

use crate::cli::{Cli, SanitizeKind};
use crate::errors::Result;
use crate::sanitize::{sanitize_host, sanitize_path, sanitize_selector};

/// Execute the `sanitize` command, printing the normalized value.
pub fn execute(_cli: &Cli, kind: &SanitizeKind) -> Result<()> {
    let normalized = match kind {
        SanitizeKind::Host { value } => sanitize_host(value)?,
        SanitizeKind::Path { value, base } => {
            let base = match base {
                Some(b) => b.clone(),
                None => std::env::current_dir()?,
            };
            sanitize_path(value, &base)?.display().to_string()
        }
        SanitizeKind::Selector { value, max_len } => sanitize_selector(value, *max_len)?,
    };
    println!("{normalized}");
    Ok(())
}
