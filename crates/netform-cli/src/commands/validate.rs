//! `nf validate`: Parse and resolve templates without touching state.

use std::path::PathBuf;

use clap::Args;
use netform_common::config::NetformConfig;

/// Arguments for the `validate` command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Template files to check.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print each resolved environment as JSON.
    #[arg(long)]
    pub show: bool,
}

/// Executes the `validate` command.
///
/// # Errors
///
/// Returns the first template that fails to parse or resolve.
pub fn execute(args: &ValidateArgs, config: &NetformConfig) -> anyhow::Result<()> {
    for file in &args.files {
        let resolved = super::resolve(file, config)?;

        if args.show {
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        } else {
            println!(
                "{}: environment \"{}\" is valid ({} subnets, {} firewall rules, {} routes)",
                file.display(),
                resolved.label,
                resolved.subnets.len(),
                resolved.firewall_rules.len(),
                resolved.routes.len()
            );
        }
    }
    Ok(())
}
