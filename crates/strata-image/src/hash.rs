//! SHA-256 content addressing.
//!
//! Layer identity, cache keys, and base image verification all reduce to
//! the digests computed here. Tree hashing walks in sorted order so the
//! same file set always produces the same digest.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use strata_common::error::{Result, StrataError};
use strata_common::types::Sha256Hash;

/// Computes the SHA-256 hash of a byte slice.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Sha256Hash::from_digest_bytes(&hasher.finalize())
}

/// Computes the SHA-256 hash of a file, streaming its contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<Sha256Hash> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let io_err = |e| StrataError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha256Hash::from_digest_bytes(&hasher.finalize()))
}

/// Validates that a file matches the expected SHA-256 hash.
///
/// # Errors
///
/// Returns `StrataError::HashMismatch` if the hashes do not match.
pub fn validate_hash(path: &Path, expected: &Sha256Hash) -> Result<()> {
    tracing::debug!(path = %path.display(), "validating SHA-256 hash");
    let actual = hash_file(path)?;
    if actual != *expected {
        return Err(StrataError::HashMismatch {
            resource: path.display().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Computes a stable digest over a directory tree.
///
/// Entries are visited in sorted relative-path order; directories named in
/// `ignore` are skipped at any depth. The digest covers relative paths,
/// entry kinds, and file contents, so it changes exactly when the tree's
/// observable content changes.
///
/// # Errors
///
/// Returns an error if the tree cannot be traversed or a file read.
pub fn hash_tree(root: &Path, ignore: &[&str]) -> Result<Sha256Hash> {
    let mut hasher = Sha256::new();
    hash_tree_inner(root, Path::new(""), ignore, &mut hasher)?;
    Ok(Sha256Hash::from_digest_bytes(&hasher.finalize()))
}

fn hash_tree_inner(
    dir: &Path,
    rel: &Path,
    ignore: &[&str],
    hasher: &mut Sha256,
) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| StrataError::Io { path, source: e }
    };

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(io_err(dir))?
        .collect::<std::io::Result<_>>()
        .map_err(io_err(dir))?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let name = entry.file_name();
        if ignore.iter().any(|i| name.to_string_lossy() == *i) {
            continue;
        }
        let path = entry.path();
        let entry_rel = rel.join(&name);
        let rel_str = entry_rel.to_string_lossy();
        let meta = std::fs::symlink_metadata(&path).map_err(io_err(&path))?;

        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&path).map_err(io_err(&path))?;
            hasher.update(b"l");
            hasher.update(rel_str.as_bytes());
            hasher.update(b"\0");
            hasher.update(target.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        } else if meta.is_dir() {
            hasher.update(b"d");
            hasher.update(rel_str.as_bytes());
            hasher.update(b"\0");
            hash_tree_inner(&path, &entry_rel, ignore, hasher)?;
        } else {
            hasher.update(b"f");
            hasher.update(rel_str.as_bytes());
            hasher.update(b"\0");
            let mut file = std::fs::File::open(&path).map_err(io_err(&path))?;
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = file.read(&mut buf).map_err(io_err(&path))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            hasher.update(b"\0");
        }
    }
    Ok(())
}
