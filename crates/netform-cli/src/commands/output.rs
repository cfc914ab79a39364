//! `nf output`: Print the outputs recorded for an environment.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use netform_common::config::NetformConfig;
use netform_engine::Engine;

/// Arguments for the `output` command.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Path to the environment template.
    pub file: PathBuf,

    /// Single output to print (`network_self_link`, `network_name`,
    /// `subnets`, `firewall_rules`, or `routes`).
    pub name: Option<String>,
}

/// Executes the `output` command.
///
/// # Errors
///
/// Returns an error if nothing has been applied or `name` is unknown.
pub fn execute(args: &OutputArgs, config: NetformConfig) -> anyhow::Result<()> {
    let target = super::open_target(&args.file, &config)?;
    let outputs = serde_json::to_value(Engine::offline(config).outputs(&target)?)?;

    let selected = match &args.name {
        None => &outputs,
        Some(name) => outputs
            .get(name)
            .with_context(|| format!("no output named \"{name}\""))?,
    };
    match selected {
        serde_json::Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}
