//! `kioskvault policy` — show and validate the security policy.

use console::style;

use crate::cli::{load_policy, load_settings, output, Cli, PolicyAction};
use crate::errors::Result;

/// Execute a `policy` subcommand.
pub fn execute(cli: &Cli, action: &PolicyAction) -> Result<()> {
    let settings = load_settings(cli)?;

    match action {
        PolicyAction::Show { site } => {
            let policy = load_policy(&settings, None)?;
            let snapshot = policy.resolve(site.as_deref());

            let scope = match site {
                Some(s) if policy.overrides_for(s).is_some() => format!("site '{s}' (overridden)"),
                Some(s) => format!("site '{s}'"),
                None => "baseline".to_string(),
            };
            println!(
                "{} {} ({})",
                style("Profile:").bold(),
                policy.profile(),
                scope
            );
            output::print_policy_table(&snapshot);
        }

        PolicyAction::Validate => {
            settings.validate()?;
            let policy = load_policy(&settings, None)?;
            output::success(&format!(
                "Policy is valid (profile {}, {} site override(s))",
                policy.profile(),
                policy.sites().len()
            ));
        }
    }

    Ok(())
}
