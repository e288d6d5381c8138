//! The seam to the external package installer.
//!
//! Dependency resolution and installation are delegated entirely to an
//! external tool; strata only invokes it and surfaces its exit status.
//! The trait keeps the build pipeline testable without a Python toolchain.

use std::path::{Path, PathBuf};
use std::process::Command;

use strata_common::error::{Result, StrataError};

/// Directory under the image working directory that receives installed
/// packages.
pub const PACKAGES_SUBDIR: &str = "packages";

/// External package installer invoked for the dependency-install layer.
pub trait Installer {
    /// Stable identifier mixed into the install layer's cache key, so a
    /// different installer invalidates the cached install result.
    fn id(&self) -> &str;

    /// Installs everything the manifest declares into `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the installer cannot be invoked or exits
    /// nonzero.
    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<()>;
}

/// Installer backed by `pip` of a local CPython interpreter.
#[derive(Debug)]
pub struct PipInstaller {
    python: PathBuf,
}

impl PipInstaller {
    /// Locates a Python interpreter on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if neither `python3` nor `python`
    /// is available.
    pub fn detect() -> Result<Self> {
        let python = which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| StrataError::NotFound {
                kind: "installer",
                id: "python3".into(),
            })?;
        tracing::debug!(python = %python.display(), "detected pip installer");
        Ok(Self { python })
    }

    /// Uses an explicit interpreter path.
    #[must_use]
    pub fn with_python(python: PathBuf) -> Self {
        Self { python }
    }
}

impl Installer for PipInstaller {
    fn id(&self) -> &str {
        "pip"
    }

    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(target_dir).map_err(|e| StrataError::Io {
            path: target_dir.to_path_buf(),
            source: e,
        })?;
        tracing::info!(
            manifest = %manifest.display(),
            target = %target_dir.display(),
            "invoking pip"
        );
        // --no-cache-dir keeps installer artifacts out of the layer.
        let output = Command::new(&self.python)
            .args(["-m", "pip", "install", "--no-cache-dir", "--target"])
            .arg(target_dir)
            .arg("-r")
            .arg(manifest)
            .output()
            .map_err(|e| StrataError::Install {
                message: format!("failed to invoke {}: {e}", self.python.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StrataError::Install {
                message: format!(
                    "pip exited with {}: {}",
                    output.status,
                    stderr.lines().last().unwrap_or("no output")
                ),
            });
        }
        Ok(())
    }
}
