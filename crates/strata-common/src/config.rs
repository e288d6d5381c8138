//! Global configuration model for the strata tool.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for a strata session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Base directory for strata state and data.
    pub data_dir: PathBuf,
    /// Path to the state index file.
    pub state_file: PathBuf,
    /// Whether offline mode is enabled (refuses remote base fetches).
    pub offline: bool,
}

impl Default for StrataConfig {
    fn default() -> Self {
        let data_dir = crate::constants::data_dir().clone();
        Self {
            state_file: data_dir.join("state.json"),
            data_dir,
            offline: false,
        }
    }
}

impl StrataConfig {
    /// Builds a configuration rooted at an explicit data directory.
    #[must_use]
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            state_file: data_dir.join("state.json"),
            data_dir,
            offline: false,
        }
    }
}
