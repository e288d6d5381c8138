//! Integration tests for the five-layer build pipeline.
//!
//! Uses a recording fake installer so the pipeline's caching behavior is
//! observable without a Python toolchain: the install layer must be
//! executed exactly once for a given manifest chain, no matter how the
//! application source changes between builds.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_common::error::{Result, StrataError};
use strata_common::types::EntryPoint;
use strata_image::build::{ImageBuilder, ImageSpec, LayerKind};
use strata_image::installer::Installer;
use strata_image::store::LayerStore;

/// Installer that writes a marker file and counts invocations.
#[derive(Default)]
struct FakeInstaller {
    calls: AtomicUsize,
}

impl Installer for FakeInstaller {
    fn id(&self) -> &str {
        "fake"
    }

    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<()> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(target_dir).map_err(|e| StrataError::Io {
            path: target_dir.to_path_buf(),
            source: e,
        })?;
        let listing = std::fs::read_to_string(manifest).map_err(|e| StrataError::Io {
            path: manifest.to_path_buf(),
            source: e,
        })?;
        std::fs::write(target_dir.join("installed.txt"), listing).map_err(|e| StrataError::Io {
            path: target_dir.to_path_buf(),
            source: e,
        })
    }
}

impl FakeInstaller {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct Fixture {
    root: tempfile::TempDir,
    store: LayerStore,
    context: PathBuf,
    base_dir: PathBuf,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().expect("tempdir");
    let store = LayerStore::open(root.path().join("store")).expect("open store");

    let base_dir = root.path().join("base");
    std::fs::create_dir_all(base_dir.join("usr/bin")).expect("mkdir base");
    std::fs::write(base_dir.join("usr/bin/python3"), "#!fake interpreter\n").expect("write base");

    let context = root.path().join("context");
    std::fs::create_dir_all(&context).expect("mkdir context");
    std::fs::write(context.join("requirements.txt"), "fastapi==0.111.0\nuvicorn>=0.29\n")
        .expect("write manifest");
    std::fs::write(context.join("main.py"), "app = object()\n").expect("write source");

    Fixture {
        root,
        store,
        context,
        base_dir,
    }
}

fn spec_for(fx: &Fixture) -> ImageSpec {
    ImageSpec {
        name: "api".into(),
        base: format!("file://{}", fx.base_dir.display()),
        workdir: PathBuf::from("/app"),
        manifest: PathBuf::from("requirements.txt"),
        source: PathBuf::from("."),
        port: 8080,
        server: "uvicorn".into(),
        entrypoint: EntryPoint::parse("main:app").expect("entry point"),
    }
}

#[test]
fn build_produces_five_layers_in_order() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);

    let built = builder.build(&spec_for(&fx), &fx.context).expect("build");

    let kinds: Vec<LayerKind> = built.layers.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        [
            LayerKind::Base,
            LayerKind::Workdir,
            LayerKind::Manifest,
            LayerKind::Install,
            LayerKind::Source,
        ]
    );
    assert_eq!(built.entry.layers.len(), 5);
    assert!(built.layers.iter().all(|l| !l.cache_hit));
    assert_eq!(installer.call_count(), 1);
    for digest_hex in &built.entry.layers {
        let digest = strata_common::types::Sha256Hash::from_hex(digest_hex.clone())
            .expect("digest hex");
        assert!(fx.store.has_layer(&digest));
    }
}

#[test]
fn entry_port_matches_startup_command() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);

    let built = builder.build(&spec_for(&fx), &fx.context).expect("build");
    assert_eq!(built.entry.exposed_port, built.entry.startup.port);

    let argv = built.entry.startup.argv();
    let port_pos = argv.iter().position(|a| a == "--port").expect("--port");
    assert_eq!(argv[port_pos + 1], built.entry.exposed_port.to_string());
}

#[test]
fn source_only_change_keeps_install_layer_cached() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);
    let spec = spec_for(&fx);

    let first = builder.build(&spec, &fx.context).expect("first build");
    std::fs::write(fx.context.join("main.py"), "app = object()  # changed\n").expect("write");
    let second = builder.build(&spec, &fx.context).expect("second build");

    // Layers 1-4 are reused byte-for-byte; only the snapshot changes.
    for i in 0..4 {
        assert_eq!(first.layers[i].digest, second.layers[i].digest, "layer {i}");
        assert!(second.layers[i].cache_hit, "layer {i} should be a cache hit");
    }
    assert_ne!(first.layers[4].digest, second.layers[4].digest);
    assert!(!second.layers[4].cache_hit);
    assert_eq!(installer.call_count(), 1, "installer must not re-run");
}

#[test]
fn unchanged_inputs_rebuild_is_fully_cached() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);
    let spec = spec_for(&fx);

    let first = builder.build(&spec, &fx.context).expect("first build");
    let second = builder.build(&spec, &fx.context).expect("second build");

    for (a, b) in first.layers.iter().zip(&second.layers) {
        assert_eq!(a.digest, b.digest);
    }
    assert!(second.layers.iter().all(|l| l.cache_hit));
    assert_eq!(first.entry.id, second.entry.id);
    assert_eq!(installer.call_count(), 1);
}

#[test]
fn manifest_change_invalidates_install_but_not_base() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);
    let spec = spec_for(&fx);

    let first = builder.build(&spec, &fx.context).expect("first build");
    std::fs::write(fx.context.join("requirements.txt"), "fastapi==0.112.0\n").expect("write");
    let second = builder.build(&spec, &fx.context).expect("second build");

    assert_eq!(first.layers[0].digest, second.layers[0].digest);
    assert_eq!(first.layers[1].digest, second.layers[1].digest);
    assert_ne!(first.layers[2].digest, second.layers[2].digest);
    assert_ne!(first.layers[3].digest, second.layers[3].digest);
    assert_eq!(installer.call_count(), 2, "installer must re-run for a new manifest");
}

#[test]
fn missing_manifest_fails_build() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);
    let mut spec = spec_for(&fx);
    spec.manifest = PathBuf::from("no-such-requirements.txt");

    let result = builder.build(&spec, &fx.context);
    assert!(matches!(result, Err(StrataError::Io { .. })));
    assert_eq!(installer.call_count(), 0);
}

#[test]
fn missing_base_fails_build() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);
    let mut spec = spec_for(&fx);
    spec.base = "file:///definitely/not/a/base".into();

    assert!(builder.build(&spec, &fx.context).is_err());
    assert_eq!(installer.call_count(), 0);
}

#[test]
fn failing_installer_aborts_build() {
    struct BrokenInstaller;
    impl Installer for BrokenInstaller {
        fn id(&self) -> &str {
            "broken"
        }
        fn install(&self, _manifest: &Path, _target_dir: &Path) -> Result<()> {
            Err(StrataError::Install {
                message: "resolver exploded".into(),
            })
        }
    }

    let fx = fixture();
    let builder = ImageBuilder::new(&fx.store, &BrokenInstaller);
    let result = builder.build(&spec_for(&fx), &fx.context);
    assert!(matches!(result, Err(StrataError::Install { .. })));
}

#[test]
fn offline_mode_refuses_remote_base() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer).offline(true);
    let mut spec = spec_for(&fx);
    spec.base = format!("https://example.com/base.tar.gz#sha256={}", "a".repeat(64));

    let result = builder.build(&spec, &fx.context);
    assert!(matches!(result, Err(StrataError::PermissionDenied { .. })));
}

#[test]
fn install_layer_contains_installer_output() {
    let fx = fixture();
    let installer = FakeInstaller::default();
    let builder = ImageBuilder::new(&fx.store, &installer);

    let built = builder.build(&spec_for(&fx), &fx.context).expect("build");
    let install_digest = &built.layers[3].digest;
    let blob = fx.store.blob_path(install_digest).expect("blob path");

    let out = fx.root.path().join("unpacked");
    strata_image::layer::extract_layer(&blob, &out).expect("extract");
    let listing =
        std::fs::read_to_string(out.join("app/packages/installed.txt")).expect("marker file");
    assert!(listing.contains("fastapi==0.111.0"));
}
