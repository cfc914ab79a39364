//! `nf apply`: Reconcile recorded infrastructure with a template.

use std::path::PathBuf;

use clap::Args;
use netform_common::config::NetformConfig;
use netform_engine::Engine;

use crate::output;

/// Arguments for the `apply` command.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the environment template.
    pub file: PathBuf,
}

/// Executes the `apply` command.
///
/// # Errors
///
/// Returns an error if the template is invalid, the state is locked, or a
/// resource operation fails. Completed operations stay recorded.
pub fn execute(args: &ApplyArgs, config: NetformConfig) -> anyhow::Result<()> {
    let target = super::open_target(&args.file, &config)?;
    let report = Engine::offline(config).apply(&target)?;

    print!("{}", output::render_plan(target.label(), &report.plan));
    println!(
        "Apply complete! {} resource(s) changed, state serial {}.",
        report.completed.len(),
        report.serial
    );
    Ok(())
}
