//! End-to-end tests for the deploy pipeline.
//!
//! Drives the engine across the full path — parse recipe, build the
//! five-layer image, assemble the rootfs, launch the server process —
//! with a fake installer and shell-script servers, so no Python
//! toolchain or network is required.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use strata_common::error::{Result, StrataError};
use strata_common::types::ServiceState;
use strata_image::installer::Installer;
use strata_runtime::engine::Engine;

struct FakeInstaller;

impl Installer for FakeInstaller {
    fn id(&self) -> &str {
        "fake"
    }

    fn install(&self, _manifest: &Path, target_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(target_dir).map_err(|e| StrataError::Io {
            path: target_dir.to_path_buf(),
            source: e,
        })?;
        std::fs::write(target_dir.join("installed.txt"), "ok").map_err(|e| StrataError::Io {
            path: target_dir.to_path_buf(),
            source: e,
        })
    }
}

struct Fixture {
    root: tempfile::TempDir,
    engine: Engine,
    recipe_path: PathBuf,
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
    }
}

/// Builds a fixture whose recipe uses `server_body` as the service
/// executable and `with_module` to control entry-module presence.
fn fixture(server_body: &str, with_module: bool) -> Fixture {
    let root = tempfile::tempdir().expect("tempdir");

    let base_dir = root.path().join("base");
    std::fs::create_dir_all(&base_dir).expect("mkdir base");
    std::fs::write(base_dir.join("os-release"), "fake base\n").expect("write base");

    let server = root.path().join("server.sh");
    write_script(&server, server_body);

    let context = root.path().join("app");
    std::fs::create_dir_all(&context).expect("mkdir context");
    std::fs::write(context.join("requirements.txt"), "fastapi==0.111.0\n").expect("write manifest");
    if with_module {
        std::fs::write(context.join("main.py"), "app = object()\n").expect("write module");
    }

    let recipe_path = context.join("strata.stra");
    let recipe = format!(
        r#"
SERVICE api {{
    base = "file://{}"
    workdir = "/app"
    manifest = "requirements.txt"
    source = "."
    port = 8080
    server = "{}"
    entrypoint = "main:app"
}}
"#,
        base_dir.display(),
        server.display()
    );
    std::fs::write(&recipe_path, recipe).expect("write recipe");

    let engine = Engine::with_data_dir(root.path().join("data"));
    Fixture {
        root,
        engine,
        recipe_path,
    }
}

const LONG_RUNNING_SERVER: &str = "#!/bin/sh\necho \"serving $1 on $3:$5\"\nexec sleep 30\n";

#[test]
fn deploy_launches_and_stop_terminates() {
    let fx = fixture(LONG_RUNNING_SERVER, true);

    let deployed = fx
        .engine
        .deploy_with(&fx.recipe_path, &FakeInstaller)
        .expect("deploy failed");
    assert_eq!(deployed.len(), 1);
    assert_eq!(deployed[0].name, "api");
    assert_eq!(deployed[0].port, 8080);
    assert!(deployed[0].pid.is_some());

    let services = fx.engine.list().expect("list");
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].state, ServiceState::Running);
    assert_eq!(services[0].port, 8080);

    fx.engine.stop("api").expect("stop failed");
    let services = fx.engine.list().expect("list");
    assert_eq!(services[0].state, ServiceState::Stopped);
    assert!(services[0].pid.is_none());
}

#[test]
fn deploy_registers_image_in_catalog() {
    let fx = fixture(LONG_RUNNING_SERVER, true);

    let _ = fx
        .engine
        .deploy_with(&fx.recipe_path, &FakeInstaller)
        .expect("deploy failed");

    let images = fx.engine.images().expect("images");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].name, "api");
    assert_eq!(images[0].layers.len(), 5);
    assert_eq!(images[0].exposed_port, 8080);
    assert_eq!(images[0].exposed_port, images[0].startup.port);

    fx.engine.stop_all().expect("stop all");
}

#[test]
fn deploy_captures_server_logs() {
    let fx = fixture(LONG_RUNNING_SERVER, true);

    let _ = fx
        .engine
        .deploy_with(&fx.recipe_path, &FakeInstaller)
        .expect("deploy failed");

    // The server receives the wildcard host, never loopback.
    let logs = fx.engine.logs("api").expect("logs");
    assert!(logs.contains("serving main:app on 0.0.0.0:8080"), "got: {logs}");

    fx.engine.stop_all().expect("stop all");
}

#[test]
fn missing_entry_module_fails_launch_before_spawn() {
    let fx = fixture(LONG_RUNNING_SERVER, false);

    let result = fx.engine.deploy_with(&fx.recipe_path, &FakeInstaller);
    assert!(matches!(result, Err(StrataError::Launch { .. })));

    let services = fx.engine.list().expect("list");
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].state, ServiceState::Failed);
    assert!(services[0].pid.is_none());

    // Nothing was spawned, so nothing wrote to the service log.
    let logs = fx.engine.logs("api").expect("logs");
    assert!(logs.is_empty());
}

#[test]
fn server_exiting_during_startup_fails_launch() {
    let fx = fixture("#!/bin/sh\nexit 3\n", true);

    let result = fx.engine.deploy_with(&fx.recipe_path, &FakeInstaller);
    match result {
        Err(StrataError::Launch { message }) => {
            assert!(message.contains("exited during startup"), "got: {message}");
        }
        other => panic!("expected launch error, got {other:?}"),
    }

    let services = fx.engine.list().expect("list");
    assert_eq!(services[0].state, ServiceState::Failed);
}

#[test]
fn missing_manifest_fails_build_and_registers_nothing() {
    let fx = fixture(LONG_RUNNING_SERVER, true);
    std::fs::remove_file(fx.root.path().join("app/requirements.txt")).expect("remove manifest");

    let result = fx.engine.build_with(&fx.recipe_path, &FakeInstaller);
    assert!(matches!(result, Err(StrataError::Io { .. })));
    assert!(fx.engine.images().expect("images").is_empty());
    assert!(fx.engine.list().expect("list").is_empty());
}

#[test]
fn rootfs_contains_all_five_layers_content() {
    let fx = fixture(LONG_RUNNING_SERVER, true);

    let _ = fx
        .engine
        .deploy_with(&fx.recipe_path, &FakeInstaller)
        .expect("deploy failed");

    let services = fx.engine.list().expect("list");
    let rootfs = services[0].rootfs_path.clone().expect("rootfs path");

    assert!(rootfs.join("os-release").is_file(), "base layer content");
    assert!(rootfs.join("app").is_dir(), "workdir layer");
    assert!(rootfs.join("app/requirements.txt").is_file(), "manifest layer");
    assert!(rootfs.join("app/packages/installed.txt").is_file(), "install layer");
    assert!(rootfs.join("app/main.py").is_file(), "source layer");

    fx.engine.stop_all().expect("stop all");
}
