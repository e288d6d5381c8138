//! `strata build` — Build service images from a .stra recipe.

use clap::Args;
use strata_image::build::BuiltImage;

use crate::commands::Context;
use crate::output;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the .stra recipe file.
    #[arg(default_value = strata_common::constants::DEFAULT_RECIPE_FILE)]
    pub file: String,
}

/// Executes the `build` command.
///
/// # Errors
///
/// Returns an error if parsing or image building fails.
pub fn execute(ctx: &Context, args: BuildArgs) -> anyhow::Result<()> {
    tracing::info!(file = %args.file, "building from recipe");
    let engine = ctx.engine();
    let built = engine
        .build(std::path::Path::new(&args.file))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    if built.is_empty() {
        println!("Recipe declares no services: {}", args.file);
        return Ok(());
    }

    for image in &built {
        print_image(image);
    }
    Ok(())
}

fn print_image(image: &BuiltImage) {
    println!(
        "Built {} ({}), {} layers, {}",
        image.entry.name,
        image.entry.id,
        image.layers.len(),
        output::format_bytes(image.entry.size_bytes)
    );
    for layer in &image.layers {
        println!(
            "  {:<10} {:<14} {:>10}  {}",
            layer.kind.to_string(),
            output::short_digest(layer.digest.as_hex()),
            output::format_bytes(layer.size_bytes),
            if layer.cache_hit { "CACHED" } else { "BUILT" }
        );
    }
}
