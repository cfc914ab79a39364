//! `nf overlap`: Report subnet ranges shared between environments.

use std::path::PathBuf;

use clap::Args;
use netform_common::config::NetformConfig;
use netform_compose::overlap;

/// Arguments for the `overlap` command.
#[derive(Args, Debug)]
pub struct OverlapArgs {
    /// Template files, one per environment.
    #[arg(required = true, num_args = 2..)]
    pub files: Vec<PathBuf>,
}

/// Executes the `overlap` command.
///
/// # Errors
///
/// Returns an error if a template is invalid or overlaps are found.
pub fn execute(args: &OverlapArgs, config: &NetformConfig) -> anyhow::Result<()> {
    let resolved = args
        .files
        .iter()
        .map(|file| super::resolve(file, config))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let refs: Vec<_> = resolved.iter().collect();

    let found = overlap::find_overlaps(&refs)?;
    if found.is_empty() {
        println!("No overlapping subnet ranges across {} environments.", refs.len());
        return Ok(());
    }
    for o in &found {
        println!(
            "  {}/{} {}  overlaps  {}/{} {}",
            o.first.environment,
            o.first.subnet,
            o.first.cidr,
            o.second.environment,
            o.second.subnet,
            o.second.cidr
        );
    }
    anyhow::bail!("{} overlapping subnet pair(s)", found.len())
}
