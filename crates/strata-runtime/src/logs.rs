//! Service log management.
//!
//! Each service gets one append-only log file under the data directory;
//! the launched server's stdout and stderr are redirected into it.

use std::io::Write;
use std::path::{Path, PathBuf};

use strata_common::error::{Result, StrataError};

/// Returns the log file path for a service.
#[must_use]
pub fn log_path(data_dir: &Path, service_id: &str) -> PathBuf {
    data_dir.join("logs").join(format!("{service_id}.log"))
}

/// Opens a service's log file for appending, creating it if needed.
///
/// The returned handle is passed to the spawned process as stdout/stderr.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created or opened.
pub fn open_log_file(data_dir: &Path, service_id: &str) -> Result<std::fs::File> {
    let path = log_path(data_dir, service_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StrataError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StrataError::Io { path, source: e })
}

/// Reads service logs from disk.
///
/// Returns an empty string if the log file does not exist yet.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(data_dir: &Path, service_id: &str) -> Result<String> {
    let path = log_path(data_dir, service_id);
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(&path).map_err(|e| StrataError::Io { path, source: e })
}

/// Appends a log line for a service.
///
/// Used by the runtime itself for lifecycle annotations.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn append_log(data_dir: &Path, service_id: &str, line: &str) -> Result<()> {
    let mut file = open_log_file(data_dir, service_id)?;
    writeln!(file, "{line}").map_err(|e| StrataError::Io {
        path: log_path(data_dir, service_id),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_is_constructed_correctly() {
        let p = log_path(Path::new("/var/lib/strata"), "abc-123");
        assert_eq!(p.to_str().unwrap(), "/var/lib/strata/logs/abc-123.log");
    }

    #[test]
    fn read_logs_missing_file_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_logs(dir.path(), "nonexistent").expect("should succeed");
        assert!(content.is_empty());
    }

    #[test]
    fn append_and_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_log(dir.path(), "s1", "starting api").expect("append 1");
        append_log(dir.path(), "s1", "listening on 0.0.0.0:8080").expect("append 2");

        let content = read_logs(dir.path(), "s1").expect("read");
        assert!(content.contains("starting api"));
        assert!(content.contains("listening on 0.0.0.0:8080"));
    }

    #[test]
    fn append_creates_log_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs_dir = dir.path().join("logs");
        assert!(!logs_dir.exists());

        append_log(dir.path(), "s2", "first line").expect("append");
        assert!(logs_dir.exists());
    }

    #[test]
    fn separate_services_have_separate_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_log(dir.path(), "a", "from a").expect("append a");
        append_log(dir.path(), "b", "from b").expect("append b");

        let a_logs = read_logs(dir.path(), "a").expect("read a");
        let b_logs = read_logs(dir.path(), "b").expect("read b");

        assert!(a_logs.contains("from a"));
        assert!(!a_logs.contains("from b"));
        assert!(b_logs.contains("from b"));
    }

    #[test]
    fn open_log_file_appends_across_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut f = open_log_file(dir.path(), "s3").expect("open 1");
            writeln!(f, "one").expect("write");
        }
        {
            let mut f = open_log_file(dir.path(), "s3").expect("open 2");
            writeln!(f, "two").expect("write");
        }
        let content = read_logs(dir.path(), "s3").expect("read");
        assert!(content.contains("one"));
        assert!(content.contains("two"));
    }
}
