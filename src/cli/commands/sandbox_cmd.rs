//! `kioskvault sandbox` — print hardened child-browser arguments.

use crate::cli::{load_policy, load_settings, Cli};
use crate::errors::Result;
use crate::sandbox::SandboxArgs;

/// Options collected from the command line.
pub struct SandboxOptions<'a> {
    pub profile_id: &'a str,
    pub kiosk: bool,
    pub app: Option<&'a str>,
    pub incognito: bool,
    pub proxy: Option<&'a str>,
    pub bypass: &'a [String],
    pub site: Option<&'a str>,
}

/// Execute the `sandbox` command.  Arguments go to stdout one per line
/// so a launcher can read them back verbatim.
pub fn execute(cli: &Cli, opts: &SandboxOptions<'_>) -> Result<()> {
    let settings = load_settings(cli)?;
    let data_dir = settings.data_dir()?;

    let mut args = SandboxArgs::new(opts.profile_id, &data_dir)?;
    if opts.kiosk {
        args = args.kiosk();
    }
    if opts.incognito {
        args = args.incognito();
    }
    if let Some(url) = opts.app {
        args = args.app(url)?;
    }
    if let Some(proxy) = opts.proxy {
        args = args.proxy(proxy, opts.bypass)?;
    }
    if let Some(site) = opts.site {
        let policy = load_policy(&settings, None)?;
        args = args.with_policy(&policy.resolve(Some(site)));
    }

    for arg in args.build() {
        println!("{arg}");
    }
    Ok(())
}
