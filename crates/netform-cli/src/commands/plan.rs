//! `nf plan`: Show the changes an apply would make.

use std::path::PathBuf;

use clap::{ArgAction, Args};
use netform_common::config::NetformConfig;
use netform_engine::Engine;

use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the environment template.
    pub file: PathBuf,

    /// Hold the state lock while planning.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub lock: bool,

    /// Plan the deletion of every recorded resource instead.
    #[arg(long)]
    pub destroy: bool,

    /// Print the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `plan` command.
///
/// # Errors
///
/// Returns an error if the template is invalid or the state is locked or
/// unreadable.
pub fn execute(args: &PlanArgs, config: NetformConfig) -> anyhow::Result<()> {
    let target = super::open_target(&args.file, &config)?;
    let engine = Engine::offline(NetformConfig {
        lock: args.lock,
        ..config
    });

    let plan = if args.destroy {
        engine.plan_destroy(&target)?
    } else {
        engine.plan(&target)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", output::render_plan(target.label(), &plan));
    }
    Ok(())
}
