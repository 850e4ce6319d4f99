use clap::Parser;
use kioskvault::cli::commands::sandbox_cmd::SandboxOptions;
use kioskvault::cli::{command_context, load_settings, open_audit, Cli, Commands};
use kioskvault::shield::shield;

fn main() {
    let cli = Cli::parse();

    // Settings are loaded again by each command; this pass only feeds the
    // log level and the audit log used by the shield.
    let settings = load_settings(&cli).ok();
    kioskvault::logging::init(cli.verbose, settings.as_ref().map(|s| s.log_level.as_str()));

    let result = match cli.command {
        Commands::Secret { ref action } => {
            kioskvault::cli::commands::secret::execute(&cli, action)
        }
        Commands::Policy { ref action } => {
            kioskvault::cli::commands::policy_cmd::execute(&cli, action)
        }
        Commands::Audit {
            last,
            ref event_type,
            ref site,
            ref since,
        } => kioskvault::cli::commands::audit_cmd::execute(
            &cli,
            last,
            event_type.as_deref(),
            site.as_deref(),
            since.as_deref(),
        ),
        Commands::Sandbox {
            ref profile_id,
            kiosk,
            ref app,
            incognito,
            ref proxy,
            ref bypass,
            ref site,
        } => kioskvault::cli::commands::sandbox_cmd::execute(
            &cli,
            &SandboxOptions {
                profile_id,
                kiosk,
                app: app.as_deref(),
                incognito,
                proxy: proxy.as_deref(),
                bypass,
                site: site.as_deref(),
            },
        ),
        Commands::Sanitize { ref kind } => {
            kioskvault::cli::commands::sanitize_cmd::execute(&cli, kind)
        }
    };

    if let Err(e) = result {
        let audit = settings.as_ref().and_then(|s| open_audit(s).ok());
        let shielded = shield(e, command_context(&cli), audit.as_deref());
        kioskvault::cli::output::error(shielded.message());
        std::process::exit(1);
    }
}
