//! Content-addressed layer store with an explicit build cache.
//!
//! Blobs live under `layers/<digest>/` with a small metadata sidecar.
//! The build cache maps a chained step key to the digest of the layer
//! that step produced, so an unchanged step is reused without being
//! re-executed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::error::{Result, StrataError};
use strata_common::types::Sha256Hash;

/// Media type of a stored layer blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerMedia {
    /// Plain tar archive.
    Tar,
    /// Gzip-compressed tar archive.
    TarGzip,
}

impl LayerMedia {
    /// File name the blob is stored under.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Tar => "blob.tar",
            Self::TarGzip => "blob.tar.gz",
        }
    }

    /// Infers the media type from an archive path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let gz = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("gz") || e.eq_ignore_ascii_case("tgz"));
        if gz { Self::TarGzip } else { Self::Tar }
    }
}

/// Metadata sidecar stored next to each layer blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerMeta {
    /// Content-addressed digest of the blob.
    pub digest: Sha256Hash,
    /// Blob size in bytes.
    pub size_bytes: u64,
    /// Archive media type.
    pub media: LayerMedia,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

/// On-disk layer store.
#[derive(Debug)]
pub struct LayerStore {
    root: PathBuf,
}

impl LayerStore {
    /// Opens or initializes the store at the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tracing::debug!(path = %root.display(), "opening layer store");
        for sub in ["layers", "cache"] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| StrataError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(Self { root })
    }

    /// Returns the root storage path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding a layer's blob and metadata.
    #[must_use]
    pub fn layer_dir(&self, digest: &Sha256Hash) -> PathBuf {
        self.root.join("layers").join(digest.as_hex())
    }

    /// Checks whether a layer is present in the store.
    #[must_use]
    pub fn has_layer(&self, digest: &Sha256Hash) -> bool {
        self.layer_dir(digest).join("meta.json").exists()
    }

    /// Loads a layer's metadata.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if the layer is absent.
    pub fn layer_meta(&self, digest: &Sha256Hash) -> Result<LayerMeta> {
        let path = self.layer_dir(digest).join("meta.json");
        let content = std::fs::read_to_string(&path).map_err(|_| StrataError::NotFound {
            kind: "layer",
            id: digest.to_string(),
        })?;
        let meta: LayerMeta = serde_json::from_str(&content)?;
        Ok(meta)
    }

    /// Returns the path to a layer's blob file.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::NotFound` if the layer is absent.
    pub fn blob_path(&self, digest: &Sha256Hash) -> Result<PathBuf> {
        let meta = self.layer_meta(digest)?;
        Ok(self.layer_dir(digest).join(meta.media.file_name()))
    }

    /// Moves a packed blob into the store, content-addressed by its digest.
    ///
    /// Inserting an already-present digest is a no-op that returns the
    /// existing metadata, keeping stored bytes immutable.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be hashed or moved into place.
    pub fn insert_blob(&self, blob: &Path, media: LayerMedia) -> Result<LayerMeta> {
        let digest = crate::hash::hash_file(blob)?;
        if self.has_layer(&digest) {
            return self.layer_meta(&digest);
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |e| StrataError::Io { path, source: e }
        };
        let size_bytes = std::fs::metadata(blob).map_err(io_err(blob))?.len();
        let meta = LayerMeta {
            digest: digest.clone(),
            size_bytes,
            media,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        // Stage the full layer directory, then rename into place so a
        // half-written layer is never visible under its final digest.
        let staging = self.root.join("layers").join(format!(".tmp-{}", digest.as_hex()));
        std::fs::create_dir_all(&staging).map_err(io_err(&staging))?;
        let _ = std::fs::copy(blob, staging.join(media.file_name()))
            .map_err(io_err(&staging))?;
        std::fs::write(staging.join("meta.json"), serde_json::to_string_pretty(&meta)?)
            .map_err(io_err(&staging))?;

        let final_dir = self.layer_dir(&digest);
        match std::fs::rename(&staging, &final_dir) {
            Ok(()) => {}
            Err(_) if final_dir.join("meta.json").exists() => {
                // Lost a race with a concurrent insert of the same content.
                let _ = std::fs::remove_dir_all(&staging);
            }
            Err(e) => return Err(StrataError::Io {
                path: final_dir,
                source: e,
            }),
        }
        tracing::info!(digest = %digest, size = size_bytes, "layer stored");
        Ok(meta)
    }

    /// Looks up a build-cache entry: step key → layer digest.
    #[must_use]
    pub fn cache_lookup(&self, key: &Sha256Hash) -> Option<Sha256Hash> {
        let path = self.root.join("cache").join(key.as_hex());
        let hex = std::fs::read_to_string(path).ok()?;
        Sha256Hash::from_hex(hex.trim()).ok()
    }

    /// Records a build-cache entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn cache_record(&self, key: &Sha256Hash, digest: &Sha256Hash) -> Result<()> {
        let path = self.root.join("cache").join(key.as_hex());
        std::fs::write(&path, digest.as_hex()).map_err(|e| StrataError::Io {
            path,
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_blob(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("blob.tar.gz");
        std::fs::write(&path, content).expect("write blob");
        path
    }

    #[test]
    fn open_creates_store_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LayerStore::open(dir.path().join("store")).expect("open");
        assert!(store.root().join("layers").is_dir());
        assert!(store.root().join("cache").is_dir());
    }

    #[test]
    fn insert_blob_then_lookup_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LayerStore::open(dir.path().join("store")).expect("open");
        let blob = make_blob(dir.path(), b"layer content");

        let meta = store.insert_blob(&blob, LayerMedia::TarGzip).expect("insert");
        assert!(store.has_layer(&meta.digest));
        assert_eq!(store.layer_meta(&meta.digest).expect("meta").size_bytes, 13);

        let stored = store.blob_path(&meta.digest).expect("blob path");
        assert_eq!(std::fs::read(stored).expect("read"), b"layer content");
    }

    #[test]
    fn insert_blob_twice_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LayerStore::open(dir.path().join("store")).expect("open");
        let blob = make_blob(dir.path(), b"same content");

        let first = store.insert_blob(&blob, LayerMedia::TarGzip).expect("insert 1");
        let second = store.insert_blob(&blob, LayerMedia::TarGzip).expect("insert 2");
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn has_layer_false_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LayerStore::open(dir.path().join("store")).expect("open");
        let digest = crate::hash::hash_bytes(b"never stored");
        assert!(!store.has_layer(&digest));
        assert!(store.layer_meta(&digest).is_err());
    }

    #[test]
    fn cache_record_and_lookup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LayerStore::open(dir.path().join("store")).expect("open");
        let key = crate::hash::hash_bytes(b"step key");
        let digest = crate::hash::hash_bytes(b"layer digest");

        assert!(store.cache_lookup(&key).is_none());
        store.cache_record(&key, &digest).expect("record");
        assert_eq!(store.cache_lookup(&key), Some(digest));
    }

    #[test]
    fn media_from_path_detects_gzip() {
        assert_eq!(LayerMedia::from_path(Path::new("b.tar.gz")), LayerMedia::TarGzip);
        assert_eq!(LayerMedia::from_path(Path::new("b.tgz")), LayerMedia::TarGzip);
        assert_eq!(LayerMedia::from_path(Path::new("b.tar")), LayerMedia::Tar);
    }
}
