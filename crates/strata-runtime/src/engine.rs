//! Runtime engine that orchestrates the deployment pipeline.
//!
//! Ties the recipe, image, and process layers together: parse and
//! validate a recipe, build each service image, assemble its rootfs,
//! launch its server process, and track everything in the state index.

use std::path::{Path, PathBuf};

use strata_common::config::StrataConfig;
use strata_common::error::{Result, StrataError};
use strata_common::types::{ImageId, ServiceId, ServiceState};
use strata_image::build::{BuiltImage, ImageBuilder, ImageSpec};
use strata_image::catalog::{ImageCatalog, ImageEntry};
use strata_image::installer::{Installer, PipInstaller};
use strata_image::store::LayerStore;
use strata_recipe::ServiceRecipe;

use crate::state::{StateEntry, StateFile};
use crate::{logs, process, rootfs, state};

/// Information about a launched service.
#[derive(Debug, Clone)]
pub struct DeployedService {
    /// Service ID assigned at launch.
    pub id: ServiceId,
    /// Service name from the recipe.
    pub name: String,
    /// Declared exposed port.
    pub port: u16,
    /// PID of the server process.
    pub pid: Option<u32>,
}

/// The engine coordinating build and launch operations.
pub struct Engine {
    data_dir: PathBuf,
    offline: bool,
}

impl Engine {
    /// Creates an engine over the default data directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_dir: strata_common::constants::data_dir().clone(),
            offline: false,
        }
    }

    /// Creates an engine with a custom data directory.
    #[must_use]
    pub const fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            offline: false,
        }
    }

    /// Creates an engine from a configuration model.
    #[must_use]
    pub fn from_config(config: &StrataConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            offline: config.offline,
        }
    }

    /// Sets offline mode; remote base fetches are refused when enabled.
    #[must_use]
    pub const fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Returns the data directory path.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    /// Builds images for every service in a recipe file, using the
    /// detected pip installer.
    ///
    /// # Errors
    ///
    /// Returns an error if no installer is available, or parsing,
    /// validation, or any build step fails.
    pub fn build(&self, recipe_path: &Path) -> Result<Vec<BuiltImage>> {
        let installer = PipInstaller::detect()?;
        self.build_with(recipe_path, &installer)
    }

    /// Builds images for every service in a recipe file with an explicit
    /// installer.
    ///
    /// Each image is registered in the catalog only after its build
    /// completes; a failed build leaves the previous catalog entry
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing, validation, or any build step fails.
    pub fn build_with(
        &self,
        recipe_path: &Path,
        installer: &dyn Installer,
    ) -> Result<Vec<BuiltImage>> {
        let recipes = self.load_recipes(recipe_path)?;
        let context = recipe_context(recipe_path);

        let store = LayerStore::open(&self.data_dir)?;
        let catalog = ImageCatalog::open(&self.data_dir)?;
        let builder = ImageBuilder::new(&store, installer).offline(self.offline);

        let mut built = Vec::with_capacity(recipes.len());
        for recipe in &recipes {
            let image = builder.build(&to_image_spec(recipe), &context)?;
            catalog.register(image.entry.clone())?;
            built.push(image);
        }
        Ok(built)
    }

    /// Builds and launches every service in a recipe file.
    ///
    /// # Errors
    ///
    /// Returns an error if building or any launch fails.
    pub fn deploy(&self, recipe_path: &Path) -> Result<Vec<DeployedService>> {
        let installer = PipInstaller::detect()?;
        self.deploy_with(recipe_path, &installer)
    }

    /// Builds and launches every service with an explicit installer.
    ///
    /// # Errors
    ///
    /// Returns an error if building or any launch fails.
    pub fn deploy_with(
        &self,
        recipe_path: &Path,
        installer: &dyn Installer,
    ) -> Result<Vec<DeployedService>> {
        let built = self.build_with(recipe_path, installer)?;
        let mut deployed = Vec::with_capacity(built.len());
        for image in &built {
            deployed.push(self.launch(&image.entry)?);
        }
        Ok(deployed)
    }

    /// Assembles a rootfs for the image and launches its server process.
    ///
    /// # Errors
    ///
    /// Returns an error if rootfs assembly or the launch fails; a failed
    /// launch is recorded in the state index.
    pub fn launch(&self, image: &ImageEntry) -> Result<DeployedService> {
        let id = ServiceId::generate();
        let store = LayerStore::open(&self.data_dir)?;
        let rootfs_dir = self.data_dir.join("rootfs").join(id.as_str());
        rootfs::assemble_rootfs(&store, &image.layers, &rootfs_dir)?;

        let state_path = self.state_path();
        let mut index = state::load_state(&state_path)?;
        index.services.push(StateEntry {
            id: id.clone(),
            name: image.name.clone(),
            state: ServiceState::Created,
            pid: None,
            image: image.id.clone(),
            port: image.exposed_port,
            rootfs_path: Some(rootfs_dir.clone()),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        state::save_state(&state_path, &index)?;

        let log = logs::open_log_file(&self.data_dir, id.as_str())?;
        match process::spawn_service(image, &rootfs_dir, log) {
            Ok(proc) => {
                let pid = proc.detach();
                self.update_entry(&id, |entry| {
                    entry.state = ServiceState::Running;
                    entry.pid = Some(pid);
                })?;
                tracing::info!(id = %id, name = %image.name, pid, "service running");
                Ok(DeployedService {
                    id,
                    name: image.name.clone(),
                    port: image.exposed_port,
                    pid: Some(pid),
                })
            }
            Err(e) => {
                self.update_entry(&id, |entry| entry.state = ServiceState::Failed)?;
                tracing::error!(id = %id, name = %image.name, error = %e, "launch failed");
                Err(e)
            }
        }
    }

    /// Lists all tracked services.
    ///
    /// # Errors
    ///
    /// Returns an error if the state index cannot be read.
    pub fn list(&self) -> Result<Vec<StateEntry>> {
        Ok(state::load_state(&self.state_path())?.services)
    }

    /// Stops a service by ID or name.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if no service matches, or an
    /// error if the process cannot be signaled.
    pub fn stop(&self, id_or_name: &str) -> Result<()> {
        let state_path = self.state_path();
        let mut index = state::load_state(&state_path)?;
        let Some(pos) = find_entry(&index, id_or_name) else {
            return Err(StrataError::NotFound {
                kind: "service",
                id: id_or_name.to_string(),
            });
        };
        let entry = &mut index.services[pos];
        if let Some(pid) = entry.pid {
            process::terminate(pid)?;
        }
        entry.state = ServiceState::Stopped;
        entry.pid = None;
        tracing::info!(id = %entry.id, name = %entry.name, "service stopped");
        state::save_state(&state_path, &index)
    }

    /// Stops all running services.
    ///
    /// # Errors
    ///
    /// Returns an error if any process cannot be signaled or state
    /// cannot be saved.
    pub fn stop_all(&self) -> Result<()> {
        let state_path = self.state_path();
        let mut index = state::load_state(&state_path)?;
        for entry in &mut index.services {
            if entry.state == ServiceState::Running {
                if let Some(pid) = entry.pid {
                    process::terminate(pid)?;
                }
                entry.state = ServiceState::Stopped;
                entry.pid = None;
            }
        }
        state::save_state(&state_path, &index)
    }

    /// Returns the logs for a service identified by ID or name.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if no service matches.
    pub fn logs(&self, id_or_name: &str) -> Result<String> {
        let index = state::load_state(&self.state_path())?;
        let Some(pos) = find_entry(&index, id_or_name) else {
            return Err(StrataError::NotFound {
                kind: "service",
                id: id_or_name.to_string(),
            });
        };
        logs::read_logs(&self.data_dir, index.services[pos].id.as_str())
    }

    /// Lists all images in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn images(&self) -> Result<Vec<ImageEntry>> {
        ImageCatalog::open(&self.data_dir)?.list()
    }

    /// Removes an image from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if the image does not exist.
    pub fn remove_image(&self, id: &ImageId) -> Result<()> {
        ImageCatalog::open(&self.data_dir)?.remove(id)
    }

    fn load_recipes(&self, recipe_path: &Path) -> Result<Vec<ServiceRecipe>> {
        let content = std::fs::read_to_string(recipe_path).map_err(|e| StrataError::Io {
            path: recipe_path.to_path_buf(),
            source: e,
        })?;
        let file = strata_recipe::parse_recipe(&content)?;
        if file.services.is_empty() {
            tracing::warn!(path = %recipe_path.display(), "recipe declares no services");
        }
        file.resolve()
    }

    fn update_entry(&self, id: &ServiceId, f: impl FnOnce(&mut StateEntry)) -> Result<()> {
        let state_path = self.state_path();
        let mut index = state::load_state(&state_path)?;
        if let Some(entry) = index.services.iter_mut().find(|e| e.id == *id) {
            f(entry);
        }
        state::save_state(&state_path, &index)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Build context for a recipe: the directory containing the recipe file.
fn recipe_context(recipe_path: &Path) -> PathBuf {
    recipe_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn to_image_spec(recipe: &ServiceRecipe) -> ImageSpec {
    ImageSpec {
        name: recipe.name.clone(),
        base: recipe.base.clone(),
        workdir: recipe.workdir.clone(),
        manifest: recipe.manifest.clone(),
        source: recipe.source.clone(),
        port: recipe.port,
        server: recipe.server.clone(),
        entrypoint: recipe.entrypoint.clone(),
    }
}

/// Finds a service by exact ID, falling back to the most recent entry
/// with a matching name.
fn find_entry(index: &StateFile, key: &str) -> Option<usize> {
    index
        .services
        .iter()
        .position(|e| e.id.as_str() == key)
        .or_else(|| index.services.iter().rposition(|e| e.name == key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_empty_on_fresh_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::with_data_dir(dir.path().to_path_buf());
        assert!(engine.list().expect("list").is_empty());
    }

    #[test]
    fn stop_unknown_service_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::with_data_dir(dir.path().to_path_buf());
        assert!(matches!(
            engine.stop("ghost"),
            Err(StrataError::NotFound { .. })
        ));
    }

    #[test]
    fn recipe_context_defaults_to_current_dir() {
        assert_eq!(recipe_context(Path::new("strata.stra")), PathBuf::from("."));
        assert_eq!(
            recipe_context(Path::new("/srv/app/strata.stra")),
            PathBuf::from("/srv/app")
        );
    }

    #[test]
    fn find_entry_prefers_exact_id_then_latest_name() {
        let mut index = StateFile::default();
        for (id, name) in [("id-1", "api"), ("id-2", "api")] {
            index.services.push(StateEntry {
                id: ServiceId::new(id),
                name: name.into(),
                state: ServiceState::Stopped,
                pid: None,
                image: ImageId::new("img"),
                port: 8080,
                rootfs_path: None,
                created_at: "2026-01-01T00:00:00Z".into(),
            });
        }
        assert_eq!(find_entry(&index, "id-1"), Some(0));
        assert_eq!(find_entry(&index, "api"), Some(1));
        assert_eq!(find_entry(&index, "nope"), None);
    }
}
