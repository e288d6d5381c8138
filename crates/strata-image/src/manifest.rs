//! Dependency manifest reading.
//!
//! A manifest is a newline-separated list of package specifiers, each an
//! opaque string understood by the external installer. Blank lines and
//! `#` comments are skipped; specifiers are not interpreted beyond a
//! display-name split.

use std::path::Path;

use strata_common::error::{Result, StrataError};

/// A single package specifier line from a dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    raw: String,
}

impl PackageSpec {
    /// Returns the specifier exactly as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the package name portion of the specifier, for display.
    ///
    /// Everything up to the first version-comparison or extras character;
    /// the full specifier stays opaque to strata.
    #[must_use]
    pub fn name(&self) -> &str {
        let end = self
            .raw
            .find(['=', '<', '>', '~', '!', '[', ' ', ';'])
            .unwrap_or(self.raw.len());
        self.raw[..end].trim()
    }
}

/// Reads and parses a dependency manifest file.
///
/// # Errors
///
/// Returns an I/O error if the file is missing or unreadable, and a
/// manifest error if the content is not valid UTF-8 or a specifier
/// contains control characters.
pub fn read_manifest(path: &Path) -> Result<Vec<PackageSpec>> {
    tracing::debug!(path = %path.display(), "reading dependency manifest");
    let bytes = std::fs::read(path).map_err(|e| StrataError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let content = String::from_utf8(bytes).map_err(|_| StrataError::Manifest {
        path: path.to_path_buf(),
        message: "not valid UTF-8".into(),
    })?;
    parse_manifest(&content).map_err(|message| StrataError::Manifest {
        path: path.to_path_buf(),
        message,
    })
}

/// Parses manifest content into package specifiers.
fn parse_manifest(content: &str) -> std::result::Result<Vec<PackageSpec>, String> {
    let mut specs = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        // pip-style trailing comments
        let line = line.split(" #").next().unwrap_or(line).trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.chars().any(char::is_control) {
            return Err(format!("control character in specifier on line {}", lineno + 1));
        }
        specs.push(PackageSpec { raw: line.to_string() });
    }
    Ok(specs)
}
