//! Abstract syntax tree for `.stra` recipe files, plus the resolved form
//! handed to the image builder and launcher.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_common::error::{Result, StrataError};
use strata_common::types::EntryPoint;

/// Working directory used when a service declares none.
pub const DEFAULT_WORKDIR: &str = "/app";
/// Dependency manifest file used when a service declares none.
pub const DEFAULT_MANIFEST: &str = "requirements.txt";
/// Source tree root used when a service declares none.
pub const DEFAULT_SOURCE: &str = ".";
/// Server executable used when a service declares none.
pub const DEFAULT_SERVER: &str = "uvicorn";

/// Root node of a parsed `.stra` file.
#[derive(Debug, Clone, Default)]
pub struct RecipeFile {
    /// Service definitions, in declaration order.
    pub services: Vec<ServiceDecl>,
}

/// A `SERVICE` block as written, before defaults and validation.
#[derive(Debug, Clone, Default)]
pub struct ServiceDecl {
    /// Service name.
    pub name: String,
    /// Base image source URI (`file://`, `tar://`, or `https://`).
    pub base: Option<String>,
    /// Absolute working directory inside the image.
    pub workdir: Option<String>,
    /// Context-relative path to the dependency manifest.
    pub manifest: Option<String>,
    /// Context-relative source tree root.
    pub source: Option<String>,
    /// Declared exposed port.
    pub port: Option<u16>,
    /// Server executable name or path.
    pub server: Option<String>,
    /// Entry point string `module:attribute`.
    pub entrypoint: Option<String>,
}

/// A validated service definition with defaults applied.
///
/// This is the form the rest of the workspace consumes; `Option`s are gone
/// and the entry point has been parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecipe {
    /// Service name.
    pub name: String,
    /// Base image source URI.
    pub base: String,
    /// Absolute working directory inside the image.
    pub workdir: PathBuf,
    /// Context-relative path to the dependency manifest.
    pub manifest: PathBuf,
    /// Context-relative source tree root.
    pub source: PathBuf,
    /// Declared exposed port. Advisory metadata until the launched server
    /// binds it via its `--port` argument.
    pub port: u16,
    /// Server executable name or path.
    pub server: String,
    /// Application object to serve.
    pub entrypoint: EntryPoint,
}

impl ServiceDecl {
    /// Resolves the declaration into a [`ServiceRecipe`], applying defaults.
    ///
    /// Callers are expected to have run [`crate::validator::validate`]
    /// first; this only fails on conditions the validator also rejects.
    ///
    /// # Errors
    ///
    /// Returns an error if a required property is missing or the entry
    /// point string is malformed.
    pub fn resolve(&self) -> Result<ServiceRecipe> {
        let missing = |prop: &str| StrataError::Recipe {
            message: format!("service \"{}\" is missing required property: {prop}", self.name),
        };
        let base = self.base.clone().ok_or_else(|| missing("base"))?;
        let port = self.port.ok_or_else(|| missing("port"))?;
        let entrypoint =
            EntryPoint::parse(self.entrypoint.as_deref().ok_or_else(|| missing("entrypoint"))?)?;

        Ok(ServiceRecipe {
            name: self.name.clone(),
            base,
            workdir: PathBuf::from(self.workdir.as_deref().unwrap_or(DEFAULT_WORKDIR)),
            manifest: PathBuf::from(self.manifest.as_deref().unwrap_or(DEFAULT_MANIFEST)),
            source: PathBuf::from(self.source.as_deref().unwrap_or(DEFAULT_SOURCE)),
            port,
            server: self.server.clone().unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            entrypoint,
        })
    }
}

impl RecipeFile {
    /// Resolves every service declaration in the file.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error encountered.
    pub fn resolve(&self) -> Result<Vec<ServiceRecipe>> {
        self.services.iter().map(ServiceDecl::resolve).collect()
    }
}
