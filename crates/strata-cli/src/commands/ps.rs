//! `strata ps` — List deployed services.

use clap::Args;
use strata_common::types::ServiceState;

use crate::commands::Context;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all services (including stopped and failed).
    #[arg(short, long)]
    pub all: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the state index cannot be read.
pub fn execute(ctx: &Context, args: PsArgs) -> anyhow::Result<()> {
    let engine = ctx.engine();
    let services = engine.list().map_err(|e| anyhow::anyhow!("{e}"))?;

    let filtered: Vec<_> = if args.all {
        services
    } else {
        services
            .into_iter()
            .filter(|s| s.state == ServiceState::Running)
            .collect()
    };

    if filtered.is_empty() {
        println!("No services found.");
        return Ok(());
    }

    println!(
        "{:<40} {:<15} {:<10} {:<8} {:<6}",
        "SERVICE ID", "NAME", "STATE", "PID", "PORT"
    );
    for s in &filtered {
        println!(
            "{:<40} {:<15} {:<10} {:<8} {:<6}",
            s.id,
            s.name,
            s.state.to_string(),
            s.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            s.port
        );
    }

    Ok(())
}
