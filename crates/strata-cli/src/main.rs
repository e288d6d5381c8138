//! # strata — deployment CLI
//!
//! Daemon-less build-and-launch tool for layered service images.
//! Single binary for building images from `.stra` recipes and running
//! the services they describe.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
