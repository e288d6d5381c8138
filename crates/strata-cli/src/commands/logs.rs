//! `strata logs` — View service logs.

use clap::Args;

use crate::commands::Context;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Service ID or name.
    pub service: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the service is not found or logs are unavailable.
pub fn execute(ctx: &Context, args: LogsArgs) -> anyhow::Result<()> {
    let engine = ctx.engine();
    let logs = engine.logs(&args.service).map_err(|e| anyhow::anyhow!("{e}"))?;

    if logs.is_empty() {
        println!("No logs available for service: {}", args.service);
    } else {
        print!("{logs}");
    }

    Ok(())
}
