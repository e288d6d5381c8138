//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for strata data on Linux with root access.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/strata";

/// Returns the data directory, preferring `$HOME/.strata` for non-root
/// or non-Linux environments, falling back to `/var/lib/strata`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        let user_dir = PathBuf::from(home).join(".strata");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default state file path.
pub fn default_state_file() -> String {
    data_dir().join("state.json").to_string_lossy().into_owned()
}

/// Returns the default image store path.
pub fn default_image_store() -> PathBuf {
    data_dir().join("images")
}

/// Returns the default rootfs directory.
pub fn default_rootfs_dir() -> PathBuf {
    data_dir().join("rootfs")
}

/// File extension for strata deployment recipes.
pub const RECIPE_EXTENSION: &str = ".stra";

/// Default recipe file name looked up in the current directory.
pub const DEFAULT_RECIPE_FILE: &str = "strata.stra";

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Number of layers in every built image: base, workdir, manifest,
/// install, source.
pub const IMAGE_LAYER_COUNT: usize = 5;

/// Wildcard address the launched server binds to.
pub const WILDCARD_HOST: &str = "0.0.0.0";

/// Directory names excluded from source snapshots and tree hashing.
pub const SNAPSHOT_IGNORE: &[&str] = &[".git", ".strata"];

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "strata";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "strata";
