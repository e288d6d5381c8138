//! `strata images` — Manage the local image catalog.

use clap::Args;
use strata_common::types::ImageId;

use crate::commands::Context;
use crate::output;

/// Arguments for the `images` command.
#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Remove an image by ID.
    #[arg(long, value_name = "ID")]
    pub remove: Option<String>,
}

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if catalog operations fail.
pub fn execute(ctx: &Context, args: ImagesArgs) -> anyhow::Result<()> {
    let engine = ctx.engine();

    if let Some(id) = args.remove {
        engine
            .remove_image(&ImageId::new(&id))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("Removed image {id}");
        return Ok(());
    }

    let images = engine.images().map_err(|e| anyhow::anyhow!("{e}"))?;
    if images.is_empty() {
        println!("No images in the catalog.");
        return Ok(());
    }

    println!(
        "{:<14} {:<15} {:<6} {:<7} {:>10}  {}",
        "IMAGE ID", "NAME", "PORT", "LAYERS", "SIZE", "CREATED"
    );
    for image in &images {
        println!(
            "{:<14} {:<15} {:<6} {:<7} {:>10}  {}",
            image.id,
            image.name,
            image.exposed_port,
            image.layers.len(),
            output::format_bytes(image.size_bytes),
            image.created_at
        );
    }
    Ok(())
}
