//! Local image catalog management.
//!
//! Maintains an index of built images, their layer compositions, and the
//! startup metadata the launcher needs. Registration is upsert-by-name:
//! a successful rebuild replaces the service's "latest" entry, a failed
//! build never touches it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::error::{Result, StrataError};
use strata_common::types::{ImageId, StartupCommand};

/// Entry in the local image catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Unique identifier for this image.
    pub id: ImageId,
    /// Service name this image was built for.
    pub name: String,
    /// Base image URI the build started from.
    pub base: String,
    /// Ordered list of layer digests (bottom to top).
    pub layers: Vec<String>,
    /// Total blob size in bytes.
    pub size_bytes: u64,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Declared exposed port. Advisory metadata: nothing binds a socket
    /// until the startup command's own `--port` argument does.
    pub exposed_port: u16,
    /// Absolute working directory inside the image.
    pub workdir: PathBuf,
    /// Fixed command the image runs on start.
    pub startup: StartupCommand,
}

/// Image catalog backed by a JSON file.
#[derive(Debug)]
pub struct ImageCatalog {
    catalog_path: PathBuf,
}

impl ImageCatalog {
    /// Opens or creates an image catalog under the given data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog directory cannot be created.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let catalog_path = data_dir.join("images").join("catalog.json");
        if let Some(parent) = catalog_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StrataError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(Self { catalog_path })
    }

    /// Lists all images in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog file cannot be read or parsed.
    pub fn list(&self) -> Result<Vec<ImageEntry>> {
        if !self.catalog_path.exists() {
            return Ok(Vec::new());
        }
        let content =
            std::fs::read_to_string(&self.catalog_path).map_err(|e| StrataError::Io {
                path: self.catalog_path.clone(),
                source: e,
            })?;
        let entries: Vec<ImageEntry> = serde_json::from_str(&content)?;
        Ok(entries)
    }

    /// Registers an image, replacing any previous entry for the same
    /// service name.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or written.
    pub fn register(&self, entry: ImageEntry) -> Result<()> {
        let mut entries = self.list()?;
        entries.retain(|e| e.name != entry.name);
        tracing::info!(id = %entry.id, name = %entry.name, "registering image");
        entries.push(entry);
        self.write_entries(&entries)
    }

    /// Finds an image by ID or service name.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if no image matches.
    pub fn find(&self, id_or_name: &str) -> Result<ImageEntry> {
        self.list()?
            .into_iter()
            .find(|e| e.id.as_str() == id_or_name || e.name == id_or_name)
            .ok_or_else(|| StrataError::NotFound {
                kind: "image",
                id: id_or_name.to_string(),
            })
    }

    /// Removes an image by ID.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if no image with the given ID exists.
    pub fn remove(&self, id: &ImageId) -> Result<()> {
        let mut entries = self.list()?;
        let before = entries.len();
        entries.retain(|e| e.id.as_str() != id.as_str());
        if entries.len() == before {
            return Err(StrataError::NotFound {
                kind: "image",
                id: id.to_string(),
            });
        }
        self.write_entries(&entries)
    }

    fn write_entries(&self, entries: &[ImageEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.catalog_path, json).map_err(|e| StrataError::Io {
            path: self.catalog_path.clone(),
            source: e,
        })?;
        Ok(())
    }
}
