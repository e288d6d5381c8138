//! Persistent state management.
//!
//! Maintains a local JSON index of all services and their current
//! states, enabling daemon-less lifecycle management. Saves are
//! write-then-rename so a crash never leaves a torn index.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_common::error::{Result, StrataError};
use strata_common::types::{ImageId, ServiceId, ServiceState};

/// Persistent record of a service's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    /// Service identifier.
    pub id: ServiceId,
    /// Service name from the recipe.
    pub name: String,
    /// Current lifecycle state.
    pub state: ServiceState,
    /// PID of the server process (if running).
    pub pid: Option<u32>,
    /// Image the service was launched from.
    pub image: ImageId,
    /// Declared exposed port.
    pub port: u16,
    /// Path to the assembled rootfs.
    pub rootfs_path: Option<std::path::PathBuf>,
    /// ISO-8601 timestamp of creation.
    pub created_at: String,
}

/// The full state index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    /// All tracked services.
    pub services: Vec<StateEntry>,
}

/// Loads the state index from disk.
///
/// A missing file yields an empty index.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_state(path: &Path) -> Result<StateFile> {
    tracing::debug!(path = %path.display(), "loading state index");
    if !path.exists() {
        return Ok(StateFile::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| StrataError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let state: StateFile = serde_json::from_str(&content)?;
    Ok(state)
}

/// Persists the state index to disk atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_state(path: &Path, state: &StateFile) -> Result<()> {
    tracing::debug!(path = %path.display(), services = state.services.len(), "saving state index");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StrataError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StrataError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StrataError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
