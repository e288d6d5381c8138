//! Rootfs assembly from stored layers.
//!
//! Extracts an image's layer blobs in order into a run directory; later
//! layers overwrite earlier paths, mirroring the layered-image model
//! without a union filesystem.

use std::path::Path;

use strata_common::error::{Result, StrataError};
use strata_common::types::Sha256Hash;
use strata_image::layer;
use strata_image::store::LayerStore;

/// Assembles a rootfs by extracting `layers` (bottom to top) into `target`.
///
/// # Errors
///
/// Returns an error if a layer is missing from the store or extraction
/// fails.
pub fn assemble_rootfs(store: &LayerStore, layers: &[String], target: &Path) -> Result<()> {
    tracing::info!(
        target = %target.display(),
        layers = layers.len(),
        "assembling rootfs"
    );
    std::fs::create_dir_all(target).map_err(|e| StrataError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;

    for digest_hex in layers {
        let digest = Sha256Hash::from_hex(digest_hex.clone())?;
        let blob = store.blob_path(&digest)?;
        layer::extract_layer(&blob, target)?;
    }
    Ok(())
}
