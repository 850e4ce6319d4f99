//! Diagnostic logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "KIOSKVAULT_LOG";

/// Install the global subscriber, writing to stderr.
///
/// Precedence: `--verbose` forces `debug`; otherwise `KIOSKVAULT_LOG`,
/// then `configured`, then `info`.  Calling twice is harmless.
pub fn init(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
