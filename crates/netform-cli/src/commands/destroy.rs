//! `nf destroy`: Delete every resource recorded for an environment.

use std::path::PathBuf;

use clap::Args;
use netform_common::config::NetformConfig;
use netform_engine::Engine;

/// Arguments for the `destroy` command.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Path to the environment template.
    pub file: PathBuf,
}

/// Executes the `destroy` command.
///
/// # Errors
///
/// Returns an error if the state is locked or a deletion fails.
pub fn execute(args: &DestroyArgs, config: NetformConfig) -> anyhow::Result<()> {
    let target = super::open_target(&args.file, &config)?;
    let report = Engine::offline(config).destroy(&target)?;

    for address in &report.completed {
        println!("  - {address}");
    }
    println!(
        "Destroy complete! {} resource(s) deleted from \"{}\".",
        report.completed.len(),
        target.label()
    );
    Ok(())
}
