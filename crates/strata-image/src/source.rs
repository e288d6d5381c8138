//! Base image source protocol handlers.
//!
//! Supports `file://` (local rootfs directory), `tar://` (local archive),
//! and `https://` remote archives with mandatory SHA-256 validation.
//! Local-first by design; remote fetches are refused in offline mode.

use std::io::Write;
use std::path::{Path, PathBuf};

use strata_common::error::{Result, StrataError};
use strata_common::types::Sha256Hash;

/// Supported base image source protocols.
#[derive(Debug, Clone)]
pub enum BaseSource {
    /// Local rootfs directory (`file:///path/to/rootfs`).
    Dir(PathBuf),
    /// Local tar archive (`tar:///path/to/base.tar.gz`).
    Archive(PathBuf),
    /// Remote HTTPS archive with a declared digest
    /// (`https://host/base.tar.gz#sha256=<hex>`).
    Remote {
        /// URL of the remote archive, without the digest fragment.
        url: String,
        /// Declared SHA-256 the download must match.
        sha256: Sha256Hash,
    },
}

/// Resolves a base image URI into a [`BaseSource`].
///
/// # Errors
///
/// Returns an error if the URI scheme is unsupported, a local path does
/// not exist, or a remote URI lacks its `#sha256=` fragment.
pub fn resolve_source(uri: &str) -> Result<BaseSource> {
    if let Some(path_str) = uri.strip_prefix("file://") {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            return Err(StrataError::NotFound {
                kind: "base image directory",
                id: path_str.to_string(),
            });
        }
        tracing::debug!(path = %path.display(), "resolved file:// base");
        Ok(BaseSource::Dir(path))
    } else if let Some(path_str) = uri.strip_prefix("tar://") {
        let path = PathBuf::from(path_str);
        if !path.is_file() {
            return Err(StrataError::NotFound {
                kind: "base image archive",
                id: path_str.to_string(),
            });
        }
        tracing::debug!(path = %path.display(), "resolved tar:// base");
        Ok(BaseSource::Archive(path))
    } else if uri.starts_with("https://") || uri.starts_with("http://") {
        let Some((url, fragment)) = uri.split_once('#') else {
            return Err(StrataError::Recipe {
                message: format!("remote base \"{uri}\" must declare #sha256=<hex>"),
            });
        };
        let Some(hex) = fragment.strip_prefix("sha256=") else {
            return Err(StrataError::Recipe {
                message: format!("remote base \"{uri}\" must declare #sha256=<hex>"),
            });
        };
        let sha256 = Sha256Hash::from_hex(hex)?;
        tracing::debug!(url, "resolved remote base");
        Ok(BaseSource::Remote {
            url: url.to_string(),
            sha256,
        })
    } else {
        Err(StrataError::Recipe {
            message: format!("unsupported base image URI scheme: {uri}"),
        })
    }
}

/// Downloads a remote base archive to `dest` and validates its digest.
///
/// # Errors
///
/// Returns an error if the request fails, the body cannot be written, or
/// the downloaded content does not match the declared digest.
pub fn fetch_remote(url: &str, expected: &Sha256Hash, dest: &Path) -> Result<()> {
    tracing::info!(url, dest = %dest.display(), "fetching remote base");
    let response = reqwest::blocking::get(url).map_err(|e| StrataError::NotFound {
        kind: "remote base",
        id: format!("{url}: {e}"),
    })?;
    if !response.status().is_success() {
        return Err(StrataError::NotFound {
            kind: "remote base",
            id: format!("{url}: HTTP {}", response.status()),
        });
    }
    let bytes = response.bytes().map_err(|e| StrataError::NotFound {
        kind: "remote base",
        id: format!("{url}: {e}"),
    })?;

    let io_err = |e| StrataError::Io {
        path: dest.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::create(dest).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;

    crate::hash::validate_hash(dest, expected)
}
