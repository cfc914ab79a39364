//! `nf force-unlock`: Remove a stale state lock.

use std::path::PathBuf;

use clap::Args;
use netform_common::config::NetformConfig;
use uuid::Uuid;

/// Arguments for the `force-unlock` command.
#[derive(Args, Debug)]
pub struct ForceUnlockArgs {
    /// Path to the environment template.
    pub file: PathBuf,

    /// Id of the lock to remove, as reported by the failed operation.
    #[arg(required_unless_present = "unreadable", conflicts_with = "unreadable")]
    pub lock_id: Option<Uuid>,

    /// Remove a lock file whose contents cannot be parsed.
    #[arg(long)]
    pub unreadable: bool,
}

/// Executes the `force-unlock` command.
///
/// # Errors
///
/// Returns an error if no lock is held, its id differs from `lock_id`, or
/// `--unreadable` is given for a lock that parses.
pub fn execute(args: &ForceUnlockArgs, config: &NetformConfig) -> anyhow::Result<()> {
    let target = super::open_target(&args.file, config)?;
    match args.lock_id {
        Some(id) => {
            let released = target.state.force_unlock(id)?;
            tracing::warn!(lock_id = %released.id, holder = %released.describe(), "lock removed by force");
            println!("Released lock {} on \"{}\".", released.id, target.label());
        }
        None => {
            target.state.clear_unreadable_lock()?;
            println!("Removed unreadable lock on \"{}\".", target.label());
        }
    }
    Ok(())
}
