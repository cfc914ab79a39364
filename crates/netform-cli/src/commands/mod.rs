//! CLI command definitions and dispatch.

pub mod apply;
pub mod destroy;
pub mod force_unlock;
pub mod output;
pub mod overlap;
pub mod plan;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use netform_common::config::{NetformConfig, NextHopPolicy};
use netform_common::constants::{
    BIN_NAME, DEFAULT_BUCKET_ROOT, DEFAULT_PARALLELISM, TEMPLATE_EXTENSION,
};
use netform_compose::environment::{self, EnvironmentSpec, ResolvedEnvironment};
use netform_engine::Target;

/// netform: declarative network environments.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Mount point of bucket-backed state stores.
    #[arg(long, global = true, env = "NF_BUCKET_ROOT", default_value = DEFAULT_BUCKET_ROOT)]
    pub bucket_root: PathBuf,

    /// Maximum concurrent resource operations per stage.
    #[arg(long, global = true, env = "NF_PARALLELISM", default_value_t = DEFAULT_PARALLELISM)]
    pub parallelism: usize,

    /// Reject routes declaring both a next-hop gateway and a next-hop IP.
    #[arg(long, global = true, env = "NF_STRICT_NEXT_HOP")]
    pub strict_next_hop: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Cli {
    /// Builds the runtime configuration from global flags.
    #[must_use]
    pub fn config(&self) -> NetformConfig {
        NetformConfig {
            bucket_root: self.bucket_root.clone(),
            parallelism: self.parallelism,
            next_hop_policy: if self.strict_next_hop {
                NextHopPolicy::Strict
            } else {
                NextHopPolicy::GatewayWins
            },
            ..NetformConfig::default()
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and resolve templates without touching state.
    Validate(validate::ValidateArgs),
    /// Show the changes an apply would make.
    Plan(plan::PlanArgs),
    /// Reconcile recorded infrastructure with a template.
    Apply(apply::ApplyArgs),
    /// Delete every resource recorded for an environment.
    Destroy(destroy::DestroyArgs),
    /// Print the outputs recorded for an environment.
    Output(output::OutputArgs),
    /// Remove a stale state lock.
    ForceUnlock(force_unlock::ForceUnlockArgs),
    /// Report subnet ranges shared between environments.
    Overlap(overlap::OverlapArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();
    match cli.command {
        Command::Validate(args) => validate::execute(&args, &config),
        Command::Plan(args) => plan::execute(&args, config),
        Command::Apply(args) => apply::execute(&args, config),
        Command::Destroy(args) => destroy::execute(&args, config),
        Command::Output(args) => output::execute(&args, config),
        Command::ForceUnlock(args) => force_unlock::execute(&args, &config),
        Command::Overlap(args) => overlap::execute(&args, &config),
    }
}

fn warn_unusual_extension(file: &Path) {
    if !file.to_string_lossy().ends_with(TEMPLATE_EXTENSION) {
        tracing::warn!(file = %file.display(), "template does not end in {TEMPLATE_EXTENSION}");
    }
}

/// Opens the environment in `file`, naming the file on failure.
fn open_target(file: &Path, config: &NetformConfig) -> anyhow::Result<Target> {
    warn_unusual_extension(file);
    Target::open(file, config).with_context(|| format!("failed to load {}", file.display()))
}

/// Loads and resolves `file` without locating its state.
fn resolve(file: &Path, config: &NetformConfig) -> anyhow::Result<ResolvedEnvironment> {
    warn_unusual_extension(file);
    let spec = EnvironmentSpec::load(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    environment::compose(&spec, config.next_hop_policy)
        .with_context(|| format!("invalid environment in {}", file.display()))
}
