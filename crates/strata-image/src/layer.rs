//! Filesystem layer packing and extraction.
//!
//! Each image is a stack of content-addressed layers. Packing is
//! deterministic: entries are written in sorted order with zeroed
//! timestamps and fixed ownership, so identical trees always produce
//! byte-identical archives and therefore identical digests.

use std::path::{Path, PathBuf};

use strata_common::error::{Result, StrataError};
use strata_common::types::Sha256Hash;

/// A packed filesystem layer.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Content-addressed digest of the layer blob.
    pub digest: Sha256Hash,
    /// Size of the blob in bytes.
    pub size_bytes: u64,
}

/// Packs a directory tree into a gzip-compressed tar blob at `dest`.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or the archive written.
pub fn pack_layer(src_dir: &Path, dest: &Path) -> Result<Layer> {
    tracing::debug!(
        src = %src_dir.display(),
        dest = %dest.display(),
        "packing layer"
    );
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| StrataError::Io { path, source: e }
    };

    let file = std::fs::File::create(dest).map_err(io_err(dest))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    append_dir_sorted(&mut builder, src_dir, Path::new(""))?;
    let encoder = builder.into_inner().map_err(io_err(dest))?;
    let _ = encoder.finish().map_err(io_err(dest))?;

    let size_bytes = std::fs::metadata(dest).map_err(io_err(dest))?.len();
    let digest = crate::hash::hash_file(dest)?;
    tracing::debug!(digest = %digest, size = size_bytes, "layer packed");
    Ok(Layer { digest, size_bytes })
}

fn append_dir_sorted<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    rel: &Path,
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
        let path = entry.path();
        let entry_rel = rel.join(entry.file_name());
        let meta = std::fs::symlink_metadata(&path).map_err(io_err(&path))?;

        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&path).map_err(io_err(&path))?;
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder
                .append_link(&mut header, &entry_rel, &target)
                .map_err(io_err(&path))?;
        } else if meta.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, &entry_rel, std::io::empty())
                .map_err(io_err(&path))?;
            append_dir_sorted(builder, &path, &entry_rel)?;
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(meta.len());
            header.set_mode(file_mode(&meta));
            let file = std::fs::File::open(&path).map_err(io_err(&path))?;
            builder
                .append_data(&mut header, &entry_rel, file)
                .map_err(io_err(&path))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 == 0 {
        0o644
    } else {
        0o755
    }
}

#[cfg(not(unix))]
const fn file_mode(_meta: &std::fs::Metadata) -> u32 {
    0o644
}

/// Extracts a layer blob into the target directory.
///
/// Supports both plain `.tar` and gzip-compressed `.tar.gz` / `.tgz`
/// archives; later layers extracted over the same target overwrite
/// earlier paths.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<()> {
    tracing::debug!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );

    std::fs::create_dir_all(target).map_err(|e| StrataError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;

    let file = std::fs::File::open(archive_path).map_err(|e| StrataError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;

    let unpack_err = |e| StrataError::Io {
        path: target.to_path_buf(),
        source: e,
    };
    if is_gzip_archive(archive_path) {
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        archive.set_overwrite(true);
        archive.unpack(target).map_err(unpack_err)?;
    } else {
        let mut archive = tar::Archive::new(file);
        archive.set_overwrite(true);
        archive.unpack(target).map_err(unpack_err)?;
    }
    Ok(())
}

/// Determines whether the archive is gzip-compressed based on extension.
fn is_gzip_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("tgz"))
}

/// Copies a tree into `dest`, skipping directories named in `ignore`.
///
/// Used to stage base directories and source snapshots before packing.
///
/// # Errors
///
/// Returns an error if any entry cannot be copied.
pub fn copy_tree(src: &Path, dest: &Path, ignore: &[&str]) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| StrataError::Io { path, source: e }
    };
    std::fs::create_dir_all(dest).map_err(io_err(dest))?;

    for entry in std::fs::read_dir(src).map_err(io_err(src))? {
        let entry = entry.map_err(io_err(src))?;
        let name = entry.file_name();
        if ignore.iter().any(|i| name.to_string_lossy() == *i) {
            continue;
        }
        let from = entry.path();
        let to = dest.join(&name);
        let meta = std::fs::symlink_metadata(&from).map_err(io_err(&from))?;

        if meta.file_type().is_symlink() {
            #[cfg(unix)]
            {
                let target = std::fs::read_link(&from).map_err(io_err(&from))?;
                std::os::unix::fs::symlink(&target, &to).map_err(io_err(&to))?;
            }
        } else if meta.is_dir() {
            copy_tree(&from, &to, ignore)?;
        } else {
            let _ = std::fs::copy(&from, &to).map_err(io_err(&to))?;
        }
    }
    Ok(())
}
