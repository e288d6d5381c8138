//! The fixed five-layer image build pipeline.
//!
//! Layer order is the contract: base runtime, working directory,
//! dependency manifest, dependency install, source snapshot. The manifest
//! is copied and installed before the source tree is even hashed, so a
//! source-only change can never invalidate the install layer.
//!
//! Each step's cache key chains over the previous step's key plus the
//! step's declared inputs; the store maps key → layer digest. A hit
//! skips executing the step entirely.

use std::fmt;
use std::path::{Path, PathBuf};

use strata_common::constants::{IMAGE_LAYER_COUNT, SNAPSHOT_IGNORE};
use strata_common::error::{Result, StrataError};
use strata_common::types::{EntryPoint, ImageId, Sha256Hash, StartupCommand};

use crate::catalog::ImageEntry;
use crate::installer::{Installer, PACKAGES_SUBDIR};
use crate::source::BaseSource;
use crate::store::{LayerMedia, LayerStore};
use crate::{hash, layer, manifest, source};

/// Everything the builder needs to know about one service image.
///
/// Mirrors the resolved recipe; kept separate so this crate does not
/// depend on the recipe language.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Service name the image is built for.
    pub name: String,
    /// Base image source URI.
    pub base: String,
    /// Absolute working directory inside the image.
    pub workdir: PathBuf,
    /// Context-relative path to the dependency manifest.
    pub manifest: PathBuf,
    /// Context-relative source tree root.
    pub source: PathBuf,
    /// Declared exposed port.
    pub port: u16,
    /// Server executable name or path.
    pub server: String,
    /// Application object to serve.
    pub entrypoint: EntryPoint,
}

/// Which of the five pipeline steps produced a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Base runtime image, externally supplied and unmodified.
    Base,
    /// Working-directory creation.
    Workdir,
    /// Dependency manifest copied alone.
    Manifest,
    /// Dependency installation result.
    Install,
    /// Full source tree snapshot.
    Source,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Workdir => write!(f, "workdir"),
            Self::Manifest => write!(f, "manifest"),
            Self::Install => write!(f, "install"),
            Self::Source => write!(f, "source"),
        }
    }
}

/// Result of one pipeline step.
#[derive(Debug, Clone)]
pub struct LayerOutcome {
    /// Step that produced this layer.
    pub kind: LayerKind,
    /// Content digest of the layer blob.
    pub digest: Sha256Hash,
    /// Blob size in bytes.
    pub size_bytes: u64,
    /// Whether the layer was reused from the build cache.
    pub cache_hit: bool,
}

/// A completed build: the catalog entry plus per-layer outcomes.
#[derive(Debug, Clone)]
pub struct BuiltImage {
    /// Catalog entry describing the image.
    pub entry: ImageEntry,
    /// Per-step outcomes in layer order.
    pub layers: Vec<LayerOutcome>,
}

/// Builds layered images against a [`LayerStore`].
pub struct ImageBuilder<'a> {
    store: &'a LayerStore,
    installer: &'a dyn Installer,
    offline: bool,
}

impl<'a> ImageBuilder<'a> {
    /// Creates a builder over the given store and installer.
    #[must_use]
    pub fn new(store: &'a LayerStore, installer: &'a dyn Installer) -> Self {
        Self {
            store,
            installer,
            offline: false,
        }
    }

    /// Sets offline mode; remote base fetches are refused when enabled.
    #[must_use]
    pub const fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Builds an image from the spec against the given build context.
    ///
    /// All-or-nothing: any step error aborts the build and nothing is
    /// returned; the caller registers the entry only on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the base cannot be resolved, the manifest is
    /// missing or malformed, the installer fails, or any copy step
    /// references a nonexistent path.
    pub fn build(&self, spec: &ImageSpec, context: &Path) -> Result<BuiltImage> {
        tracing::info!(service = %spec.name, base = %spec.base, "building image");
        let workdir_rel = spec
            .workdir
            .strip_prefix("/")
            .map_err(|_| StrataError::Recipe {
                message: format!("workdir must be absolute: {}", spec.workdir.display()),
            })?
            .to_path_buf();

        let mut layers = Vec::with_capacity(IMAGE_LAYER_COUNT);

        // Layer 1: base runtime.
        let base_source = source::resolve_source(&spec.base)?;
        let base_inputs = match &base_source {
            BaseSource::Dir(path) => hash::hash_tree(path, &[])?,
            BaseSource::Archive(path) => hash::hash_file(path)?,
            BaseSource::Remote { sha256, .. } => sha256.clone(),
        };
        let mut chain = chain_key(None, LayerKind::Base, &base_inputs);
        layers.push(self.realize(LayerKind::Base, &chain, |scratch| {
            match &base_source {
                BaseSource::Dir(path) => {
                    let blob = scratch.join("base.tar.gz");
                    let _ = layer::pack_layer(path, &blob)?;
                    Ok((blob, LayerMedia::TarGzip))
                }
                BaseSource::Archive(path) => Ok((path.clone(), LayerMedia::from_path(path))),
                BaseSource::Remote { url, sha256 } => {
                    if self.offline {
                        return Err(StrataError::PermissionDenied {
                            message: format!("offline mode refuses remote base: {url}"),
                        });
                    }
                    let blob = scratch.join("base.tar.gz");
                    source::fetch_remote(url, sha256, &blob)?;
                    Ok((blob, LayerMedia::from_path(Path::new(url.as_str()))))
                }
            }
        })?);

        // Layer 2: working-directory creation.
        let inputs = hash::hash_bytes(spec.workdir.to_string_lossy().as_bytes());
        chain = chain_key(Some(&chain), LayerKind::Workdir, &inputs);
        layers.push(self.realize(LayerKind::Workdir, &chain, |scratch| {
            let stage = scratch.join("stage");
            let dir = stage.join(&workdir_rel);
            std::fs::create_dir_all(&dir).map_err(|e| StrataError::Io {
                path: dir,
                source: e,
            })?;
            pack_stage(&stage, scratch)
        })?);

        // Layer 3: dependency manifest, copied alone.
        let manifest_path = context.join(&spec.manifest);
        let packages = manifest::read_manifest(&manifest_path)?;
        tracing::info!(packages = packages.len(), "dependency manifest read");
        let manifest_bytes = std::fs::read(&manifest_path).map_err(|e| StrataError::Io {
            path: manifest_path.clone(),
            source: e,
        })?;
        let manifest_name = spec
            .manifest
            .file_name()
            .map(std::ffi::OsStr::to_owned)
            .ok_or_else(|| StrataError::Recipe {
                message: format!("manifest path has no file name: {}", spec.manifest.display()),
            })?;
        let mut input_bytes = workdir_rel.to_string_lossy().into_owned().into_bytes();
        input_bytes.push(0);
        input_bytes.extend_from_slice(manifest_name.to_string_lossy().as_bytes());
        input_bytes.push(0);
        input_bytes.extend_from_slice(&manifest_bytes);
        let inputs = hash::hash_bytes(&input_bytes);
        chain = chain_key(Some(&chain), LayerKind::Manifest, &inputs);
        layers.push(self.realize(LayerKind::Manifest, &chain, |scratch| {
            let stage = scratch.join("stage");
            let dir = stage.join(&workdir_rel);
            std::fs::create_dir_all(&dir).map_err(|e| StrataError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let dest = dir.join(&manifest_name);
            let _ = std::fs::copy(&manifest_path, &dest).map_err(|e| StrataError::Io {
                path: dest,
                source: e,
            })?;
            pack_stage(&stage, scratch)
        })?);

        // Layer 4: dependency installation. Keyed off the manifest chain,
        // so it is only re-executed when the manifest or an ancestor
        // layer changes.
        let inputs = hash::hash_bytes(self.installer.id().as_bytes());
        chain = chain_key(Some(&chain), LayerKind::Install, &inputs);
        layers.push(self.realize(LayerKind::Install, &chain, |scratch| {
            let stage = scratch.join("stage");
            let target = stage.join(&workdir_rel).join(PACKAGES_SUBDIR);
            self.installer.install(&manifest_path, &target)?;
            pack_stage(&stage, scratch)
        })?);

        // Layer 5: full source tree snapshot.
        let source_root = context.join(&spec.source);
        if !source_root.is_dir() {
            return Err(StrataError::NotFound {
                kind: "source tree",
                id: source_root.display().to_string(),
            });
        }
        let inputs = hash::hash_tree(&source_root, SNAPSHOT_IGNORE)?;
        chain = chain_key(Some(&chain), LayerKind::Source, &inputs);
        layers.push(self.realize(LayerKind::Source, &chain, |scratch| {
            let stage = scratch.join("stage");
            let dir = stage.join(&workdir_rel);
            layer::copy_tree(&source_root, &dir, SNAPSHOT_IGNORE)?;
            pack_stage(&stage, scratch)
        })?);

        let entry = ImageEntry {
            id: ImageId::from_digest(&chain),
            name: spec.name.clone(),
            base: spec.base.clone(),
            layers: layers.iter().map(|l| l.digest.as_hex().to_string()).collect(),
            size_bytes: layers.iter().map(|l| l.size_bytes).sum(),
            created_at: chrono::Utc::now().to_rfc3339(),
            exposed_port: spec.port,
            workdir: spec.workdir.clone(),
            startup: StartupCommand {
                program: spec.server.clone(),
                entry_point: spec.entrypoint.clone(),
                port: spec.port,
            },
        };
        tracing::info!(
            id = %entry.id,
            hits = layers.iter().filter(|l| l.cache_hit).count(),
            "image built"
        );
        Ok(BuiltImage { entry, layers })
    }

    /// Reuses a cached layer for the key, or materializes and stores a
    /// new one.
    fn realize(
        &self,
        kind: LayerKind,
        key: &Sha256Hash,
        materialize: impl FnOnce(&Path) -> Result<(PathBuf, LayerMedia)>,
    ) -> Result<LayerOutcome> {
        if let Some(digest) = self.store.cache_lookup(key) {
            if self.store.has_layer(&digest) {
                let meta = self.store.layer_meta(&digest)?;
                tracing::info!(kind = %kind, digest = %digest, "layer cache hit");
                return Ok(LayerOutcome {
                    kind,
                    digest,
                    size_bytes: meta.size_bytes,
                    cache_hit: true,
                });
            }
        }

        let scratch = tempfile::tempdir().map_err(|e| StrataError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;
        let (blob, media) = materialize(scratch.path())?;
        let meta = self.store.insert_blob(&blob, media)?;
        self.store.cache_record(key, &meta.digest)?;
        tracing::info!(kind = %kind, digest = %meta.digest, "layer built");
        Ok(LayerOutcome {
            kind,
            digest: meta.digest,
            size_bytes: meta.size_bytes,
            cache_hit: false,
        })
    }
}

/// Packs a staging directory into a blob inside the step scratch dir.
fn pack_stage(stage: &Path, scratch: &Path) -> Result<(PathBuf, LayerMedia)> {
    std::fs::create_dir_all(stage).map_err(|e| StrataError::Io {
        path: stage.to_path_buf(),
        source: e,
    })?;
    let blob = scratch.join("layer.tar.gz");
    let _ = layer::pack_layer(stage, &blob)?;
    Ok((blob, LayerMedia::TarGzip))
}

/// Derives a step's cache key from its predecessor's key and its own
/// declared inputs.
fn chain_key(parent: Option<&Sha256Hash>, kind: LayerKind, inputs: &Sha256Hash) -> Sha256Hash {
    let parent_hex = parent.map_or("scratch", Sha256Hash::as_hex);
    hash::hash_bytes(format!("{parent_hex}\n{kind}\n{}", inputs.as_hex()).as_bytes())
}
