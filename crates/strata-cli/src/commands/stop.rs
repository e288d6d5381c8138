//! `strata stop` — Stop services.

use clap::Args;

use crate::commands::Context;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Service IDs or names to stop. If empty, stops all running services.
    pub services: Vec<String>,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if a service is unknown or cannot be signaled.
pub fn execute(ctx: &Context, args: StopArgs) -> anyhow::Result<()> {
    let engine = ctx.engine();

    if args.services.is_empty() {
        engine.stop_all().map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("All services stopped.");
        return Ok(());
    }

    for key in &args.services {
        engine.stop(key).map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("Stopped {key}");
    }
    Ok(())
}
