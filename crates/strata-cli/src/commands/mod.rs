//! CLI command definitions and dispatch.

pub mod build;
pub mod images;
pub mod logs;
pub mod ps;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata_common::config::StrataConfig;
use strata_runtime::engine::Engine;

/// strata — daemon-less build-and-launch tool for service images.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Enable offline mode (refuse remote base image fetches).
    #[arg(long, global = true)]
    pub offline: bool,

    /// Data directory for images, rootfs, logs, and state.
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build service images from a .stra recipe.
    Build(build::BuildArgs),
    /// Build and launch every service in a recipe.
    Run(run::RunArgs),
    /// List deployed services.
    Ps(ps::PsArgs),
    /// Stop services.
    Stop(stop::StopArgs),
    /// Manage the local image catalog.
    Images(images::ImagesArgs),
    /// View service logs.
    Logs(logs::LogsArgs),
}

/// Shared global options handed to every command handler.
#[derive(Debug)]
pub struct Context {
    /// Explicit data directory override.
    pub data_dir: Option<PathBuf>,
    /// Offline mode flag.
    pub offline: bool,
}

impl Context {
    /// Builds an engine honoring the global options.
    #[must_use]
    pub fn engine(&self) -> Engine {
        let mut config = self
            .data_dir
            .clone()
            .map_or_else(StrataConfig::default, StrataConfig::with_data_dir);
        config.offline = self.offline;
        Engine::from_config(&config)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context {
        data_dir: cli.data_dir,
        offline: cli.offline,
    };
    match cli.command {
        Command::Build(args) => build::execute(&ctx, args),
        Command::Run(args) => run::execute(&ctx, args),
        Command::Ps(args) => ps::execute(&ctx, args),
        Command::Stop(args) => stop::execute(&ctx, args),
        Command::Images(args) => images::execute(&ctx, args),
        Command::Logs(args) => logs::execute(&ctx, args),
    }
}
