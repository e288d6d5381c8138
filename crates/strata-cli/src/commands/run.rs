//! `strata run` — Build and launch every service in a recipe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::Args;
use strata_runtime::engine::{DeployedService, Engine};

use crate::commands::Context;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the .stra recipe file.
    #[arg(default_value = strata_common::constants::DEFAULT_RECIPE_FILE)]
    pub file: String,

    /// Run in detached mode (don't wait for Ctrl+C).
    #[arg(short, long)]
    pub detach: bool,
}

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if building or launching fails.
pub fn execute(ctx: &Context, args: RunArgs) -> anyhow::Result<()> {
    let total_start = Instant::now();
    print_header();

    let path = std::path::Path::new(&args.file);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Recipe file not found: {}\n\
             Create a .stra file or specify a path: strata run <file>",
            args.file
        ));
    }

    let engine = ctx.engine();
    let deployed = deploy_and_report(&engine, path, total_start)?;

    if args.detach {
        eprintln!();
        eprintln!("  Running detached. Use {BOLD}strata stop{RESET} to stop all services.");
        return Ok(());
    }

    wait_for_shutdown(&engine, &deployed)
}

fn print_header() {
    eprintln!();
    eprintln!("  {BOLD}strata{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    eprintln!();
}

fn deploy_and_report(
    engine: &Engine,
    path: &std::path::Path,
    total_start: Instant,
) -> anyhow::Result<Vec<DeployedService>> {
    let deployed = engine.deploy(path).map_err(|e| anyhow::anyhow!("{e}"))?;

    eprintln!();
    eprintln!(
        "  {GREEN}{BOLD}Launched {}{RESET} service(s) in {:.1}s:",
        deployed.len(),
        total_start.elapsed().as_secs_f64()
    );
    eprintln!();

    for svc in &deployed {
        eprintln!(
            "    {GREEN}●{RESET} {BOLD}{}{RESET} {DIM}[{}]{RESET} {CYAN}->{RESET} http://localhost:{}",
            svc.name, svc.id, svc.port
        );
    }

    eprintln!();
    eprintln!("  {DIM}Data dir: {}{RESET}", engine.data_dir().display());

    Ok(deployed)
}

fn wait_for_shutdown(engine: &Engine, _deployed: &[DeployedService]) -> anyhow::Result<()> {
    eprintln!();
    eprintln!("  Press {BOLD}Ctrl+C{RESET} to stop all services...");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(250));
    }

    eprintln!();
    eprintln!("  Stopping services...");
    engine.stop_all().map_err(|e| anyhow::anyhow!("{e}"))?;
    eprintln!("  {GREEN}All services stopped.{RESET}");

    Ok(())
}
