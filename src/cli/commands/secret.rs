//! `kioskvault secret` — store, read and remove site credentials.

use std::io::{self, IsTerminal, Read};

use dialoguer::Confirm;
use zeroize::Zeroizing;

use crate::cli::{load_settings, open_vault, output, Cli, SecretAction};
use crate::errors::{KioskVaultError, Result};
use crate::vault::{site_key, CredentialKind, SecretValue};

/// Execute a `secret` subcommand.
pub fn execute(cli: &Cli, action: &SecretAction) -> Result<()> {
    let ctx = open_vault(cli, load_settings(cli)?)?;

    match action {
        SecretAction::Set { site, kind, value } => {
            let secret = read_value(site, *kind, value.as_deref())?;
            ctx.facade.save(site, *kind, &secret)?;
            output::success(&format!("Stored {kind} for '{site}'"));
        }

        SecretAction::Get { site, kind } => match ctx.facade.get(site, *kind)? {
            Some(secret) => println!("{}", secret.expose()),
            None => {
                return Err(KioskVaultError::SecretNotFound(site_key(site, *kind)));
            }
        },

        SecretAction::Delete { site, kind, force } => {
            if !*force && !confirm(&format!("Delete {kind} for '{site}'?"))? {
                output::info("Cancelled.");
                return Ok(());
            }
            ctx.facade.delete(site, *kind)?;
            output::success(&format!("Deleted {kind} for '{site}'"));
        }

        SecretAction::Exists { site, kind } => {
            let present = ctx.vault.exists(&site_key(site, *kind))?;
            println!("{present}");
        }

        SecretAction::Forget { site, force } => {
            if !*force && !confirm(&format!("Delete every secret and cookie for '{site}'?"))? {
                output::info("Cancelled.");
                return Ok(());
            }
            ctx.facade.forget_site(site)?;
            output::success(&format!("Forgot all secrets for '{site}'"));
        }
    }

    Ok(())
}

/// Take the value inline, from a pipe, or from a hidden prompt.
fn read_value(site: &str, kind: CredentialKind, inline: Option<&str>) -> Result<SecretValue> {
    let raw = if let Some(v) = inline {
        output::warning("Value provided on the command line may appear in shell history.");
        Zeroizing::new(v.to_string())
    } else if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        Zeroizing::new(buf.trim_end().to_string())
    } else {
        Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Enter {kind} for {site}"))
                .interact()
                .map_err(|e| KioskVaultError::CommandFailed(format!("input prompt: {e}")))?,
        )
    };

    if raw.is_empty() {
        return Err(KioskVaultError::validation("secret value", "cannot be empty"));
    }
    Ok(SecretValue::new(raw.as_str()))
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| KioskVaultError::CommandFailed(format!("confirm prompt: {e}")))
}
