//! Server process launch.
//!
//! Each service runs exactly one foreground process: the ASGI server
//! executable, started in the image's working directory with the
//! image's fixed startup arguments. There is no supervisor and no
//! restart; if the process exits, the service is stopped.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use strata_common::error::{Result, StrataError};
use strata_common::types::EntryPoint;
use strata_image::catalog::ImageEntry;

/// How long to watch a freshly spawned server before declaring the
/// launch successful. A process that dies inside this window failed to
/// start.
const LAUNCH_GRACE: Duration = Duration::from_millis(200);

/// Handle to a launched server process.
#[derive(Debug)]
pub struct ServiceProcess {
    child: Child,
}

impl ServiceProcess {
    /// Returns the PID of the server process.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Waits for the process to exit and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub fn wait(mut self) -> Result<i32> {
        let status = self.child.wait().map_err(|e| StrataError::Process {
            message: format!("wait failed: {e}"),
        })?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Releases the handle without waiting; the process keeps running.
    #[must_use]
    pub fn detach(self) -> u32 {
        self.child.id()
    }
}

/// Spawns the server process for an assembled service rootfs.
///
/// Validations before spawning:
/// - the image working directory exists under the rootfs,
/// - the entry module is present there (`<module>.py` or a package
///   `__init__.py`),
/// - the server executable can be resolved.
///
/// The entry attribute is resolved by the server itself; if the process
/// exits during the launch grace window, its status is surfaced as a
/// fatal launch error.
///
/// # Errors
///
/// Returns an error if any pre-check fails, the process cannot be
/// spawned, or it exits during the grace window.
pub fn spawn_service(
    image: &ImageEntry,
    rootfs: &Path,
    log: std::fs::File,
) -> Result<ServiceProcess> {
    let workdir_rel = image
        .workdir
        .strip_prefix("/")
        .map_err(|_| StrataError::Launch {
            message: format!("image workdir is not absolute: {}", image.workdir.display()),
        })?;
    let workdir = rootfs.join(workdir_rel);
    if !workdir.is_dir() {
        return Err(StrataError::Launch {
            message: format!("working directory missing from rootfs: {}", workdir.display()),
        });
    }

    check_entry_module(&workdir, &image.startup.entry_point)?;
    let program = resolve_program(&image.startup.program)?;

    tracing::info!(
        program = %program.display(),
        entry = %image.startup.entry_point,
        port = image.startup.port,
        "spawning server process"
    );

    let log_err = log.try_clone().map_err(|e| StrataError::Process {
        message: format!("failed to clone log handle: {e}"),
    })?;
    let mut child = Command::new(&program)
        .args(image.startup.argv())
        .current_dir(&workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()
        .map_err(|e| StrataError::Launch {
            message: format!("failed to spawn {}: {e}", program.display()),
        })?;

    // A server that dies immediately (e.g. unresolvable app attribute)
    // is a failed launch, not a running service.
    std::thread::sleep(LAUNCH_GRACE);
    match child.try_wait() {
        Ok(Some(status)) => Err(StrataError::Launch {
            message: format!("server exited during startup: {status}"),
        }),
        Ok(None) => Ok(ServiceProcess { child }),
        Err(e) => Err(StrataError::Process {
            message: format!("failed to poll server process: {e}"),
        }),
    }
}

/// Sends SIGTERM to a running service process.
///
/// A process that is already gone is treated as stopped.
///
/// # Errors
///
/// Returns an error if the signal cannot be delivered for any reason
/// other than the process not existing.
pub fn terminate(pid: u32) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| StrataError::Process {
        message: format!("pid out of range: {pid}"),
    })?;
    tracing::info!(pid, "sending SIGTERM");
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), nix::sys::signal::Signal::SIGTERM)
    {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(StrataError::Process {
            message: format!("failed to signal pid {pid}: {e}"),
        }),
    }
}

/// Verifies the entry module exists under the working directory.
fn check_entry_module(workdir: &Path, entry: &EntryPoint) -> Result<()> {
    let module_rel: PathBuf = entry.module().split('.').collect();
    let candidates = [
        workdir.join(module_rel.with_extension("py")),
        workdir.join(module_rel.join("__init__.py")),
    ];
    if candidates.iter().any(|p| p.is_file()) {
        return Ok(());
    }
    Err(StrataError::Launch {
        message: format!(
            "entry module \"{}\" not found in {}",
            entry.module(),
            workdir.display()
        ),
    })
}

/// Resolves the server executable: literal paths are used as-is, bare
/// names are looked up on `PATH`.
fn resolve_program(program: &str) -> Result<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        if path.is_file() {
            return Ok(path);
        }
        return Err(StrataError::NotFound {
            kind: "server executable",
            id: program.to_string(),
        });
    }
    which::which(program).map_err(|_| StrataError::NotFound {
        kind: "server executable",
        id: program.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_entry_module_accepts_flat_module() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("main.py"), "app = 1\n").expect("write");
        let entry = EntryPoint::parse("main:app").expect("parse");
        check_entry_module(dir.path(), &entry).expect("should find main.py");
    }

    #[test]
    fn check_entry_module_accepts_package() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("svc/api")).expect("mkdir");
        std::fs::write(dir.path().join("svc/api/__init__.py"), "app = 1\n").expect("write");
        let entry = EntryPoint::parse("svc.api:app").expect("parse");
        check_entry_module(dir.path(), &entry).expect("should find package");
    }

    #[test]
    fn check_entry_module_rejects_missing_module() {
        let dir = tempfile::tempdir().expect("tempdir");
        let entry = EntryPoint::parse("main:app").expect("parse");
        assert!(matches!(
            check_entry_module(dir.path(), &entry),
            Err(StrataError::Launch { .. })
        ));
    }

    #[test]
    fn resolve_program_rejects_missing_path() {
        assert!(resolve_program("/no/such/server").is_err());
    }

    #[test]
    fn resolve_program_finds_sh_on_path() {
        let path = resolve_program("sh").expect("sh should resolve");
        assert!(path.is_absolute());
    }

    #[test]
    fn resolve_program_accepts_literal_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("server");
        std::fs::write(&script, "#!/bin/sh\n").expect("write");
        let resolved = resolve_program(&script.to_string_lossy()).expect("literal path");
        assert_eq!(resolved, script);
    }

    #[test]
    fn terminate_nonexistent_pid_is_ok() {
        // PID near the Linux default max is effectively never alive in tests.
        terminate(4_194_000).expect("ESRCH should be treated as stopped");
    }
}
