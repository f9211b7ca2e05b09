//! Typed, permission-hardened file I/O for per-record artifacts (spec C1).
//!
//! Every record file lives at `<datadir>/<64-hex id>/<name>`; the one
//! process-wide exception is the global MAC key at `<datadir>/key`, loaded
//! with an empty id (spec §9 / `original_source/pwdsphinx/oracle.py`'s
//! `load("", "key", 32)`).

use std::path::{Path, PathBuf};

use oprf_oracle_types::RecordId;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt as _;

/// The fixed set of file names a record directory may hold (spec §3).
///
/// `load`/`save`/`unlink` take one of these rather than an arbitrary
/// string, which is what rules out path traversal: whatever `id` and `name`
/// are, the resulting path is always `root/id_component/one_of_these`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileName {
    /// The record's current OPRF secret scalar.
    Key,
    /// The record's authentication public key.
    Pub,
    /// The opaque policy blob.
    Rules,
    /// The pending next OPRF scalar.
    New,
    /// The previous OPRF scalar, during the commit window.
    Old,
    /// The host-scoped signed opaque blob.
    Blob,
    /// The packed PoW difficulty state.
    Difficulty,
    /// The process-wide MAC key. Only valid with an empty id.
    GlobalMacKey,
}

impl FileName {
    fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Pub => "pub",
            Self::Rules => "rules",
            Self::New => "new",
            Self::Old => "old",
            Self::Blob => "blob",
            Self::Difficulty => "difficulty",
            Self::GlobalMacKey => "key",
        }
    }
}

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// Underlying filesystem failure.
    #[error("blob store io error: {0}")]
    Io(#[from] std::io::Error),
    /// `load` was given an `expected_size` that didn't match the file on disk.
    #[error("corrupted blob: expected {expected} bytes, found {actual}")]
    CorruptedBlob {
        /// The size the caller required.
        expected: usize,
        /// The size actually read.
        actual: usize,
    },
}

/// Filesystem-backed store for record and global artifacts, rooted at
/// `datadir`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Wraps a root data directory. Does not touch the filesystem; `root`
    /// is created lazily on first `save` (spec §3 SUPPLEMENT: the original
    /// creates `<datadir>` itself on first write, not only the per-record
    /// subdirectory).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir_for(&self, id: Option<RecordId>) -> PathBuf {
        match id {
            Some(id) => self.root.join(id.to_hex()),
            None => self.root.clone(),
        }
    }

    fn path_for(&self, id: Option<RecordId>, name: FileName) -> PathBuf {
        self.dir_for(id).join(name.as_str())
    }

    /// Reads `name` for `id` (or the global directory if `id` is `None`).
    /// Returns `Ok(None)` if the file is absent. If `expected_size` is
    /// given and the file's length differs, fails with
    /// [`BlobStoreError::CorruptedBlob`].
    pub async fn load(
        &self,
        id: Option<RecordId>,
        name: FileName,
        expected_size: Option<usize>,
    ) -> Result<Option<Vec<u8>>, BlobStoreError> {
        let path = self.path_for(id, name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                if let Some(expected) = expected_size {
                    if bytes.len() != expected {
                        return Err(BlobStoreError::CorruptedBlob {
                            expected,
                            actual: bytes.len(),
                        });
                    }
                }
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes `bytes` as `name` for `id`, creating every missing ancestor
    /// directory (mode 0700) up to and including the data root, and the
    /// file itself (mode 0600).
    pub async fn save(
        &self,
        id: Option<RecordId>,
        name: FileName,
        bytes: &[u8],
    ) -> Result<(), BlobStoreError> {
        let dir = self.dir_for(id);
        create_dir_tree(&self.root, &dir).await?;
        let path = dir.join(name.as_str());
        tokio::fs::write(&path, bytes).await?;
        set_file_mode(&path).await?;
        Ok(())
    }

    /// Writes `bytes` as `name` for `id` without creating any missing
    /// directory first. Returns `Ok(false)` if `id`'s directory does not
    /// exist (the write never happened), `Ok(true)` on success.
    ///
    /// Used only by the PoW difficulty writer (spec §4.6 step 4), which
    /// must not materialize a record directory for an id nobody has
    /// created yet — unlike every other `save`, which creates its parent
    /// tree unconditionally.
    pub async fn save_if_dir_exists(
        &self,
        id: Option<RecordId>,
        name: FileName,
        bytes: &[u8],
    ) -> Result<bool, BlobStoreError> {
        let path = self.path_for(id, name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                set_file_mode(&path).await?;
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes `name` for `id`, if present. Absence is not an error.
    pub async fn unlink(&self, id: Option<RecordId>, name: FileName) -> Result<(), BlobStoreError> {
        let path = self.path_for(id, name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Recursively removes a record's whole directory. Absence is not an
    /// error.
    pub async fn rmtree(&self, id: RecordId) -> Result<(), BlobStoreError> {
        let dir = self.dir_for(Some(id));
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns `true` if a record's directory exists at all, irrespective
    /// of which files it holds (used by the host-blob updater to tell a
    /// brand-new host apart from one with prior state).
    pub async fn record_dir_exists(&self, id: RecordId) -> bool {
        tokio::fs::metadata(self.dir_for(Some(id))).await.is_ok()
    }
}

/// Creates every ancestor directory between `root` (inclusive) and `leaf`
/// (inclusive), each with mode 0700 on unix.
async fn create_dir_tree(root: &Path, leaf: &Path) -> Result<(), BlobStoreError> {
    tokio::fs::create_dir_all(leaf).await?;
    let mut dir = Some(leaf);
    while let Some(d) = dir {
        set_dir_mode(d).await?;
        if d == root {
            break;
        }
        dir = d.parent();
    }
    Ok(())
}

#[cfg(unix)]
async fn set_dir_mode(path: &Path) -> std::io::Result<()> {
    let perms = std::fs::Permissions::from_mode(0o700);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn set_dir_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
async fn set_file_mode(path: &Path) -> std::io::Result<()> {
    let perms = std::fs::Permissions::from_mode(0o600);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn set_file_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RecordId {
        RecordId::from_bytes([0x42; 32])
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        assert!(store.load(Some(id()), FileName::Key, Some(32)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save(Some(id()), FileName::Key, &[7u8; 32]).await.unwrap();
        let loaded = store.load(Some(id()), FileName::Key, Some(32)).await.unwrap();
        assert_eq!(loaded, Some(vec![7u8; 32]));
    }

    #[tokio::test]
    async fn wrong_size_is_corrupted_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save(Some(id()), FileName::Key, &[7u8; 16]).await.unwrap();
        let err = store.load(Some(id()), FileName::Key, Some(32)).await.unwrap_err();
        assert!(matches!(err, BlobStoreError::CorruptedBlob { expected: 32, actual: 16 }));
    }

    #[tokio::test]
    async fn save_if_dir_exists_skips_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let wrote = store
            .save_if_dir_exists(Some(id()), FileName::Difficulty, &[0u8; 9])
            .await
            .unwrap();
        assert!(!wrote);
        assert!(!store.record_dir_exists(id()).await);

        store.save(Some(id()), FileName::Key, &[1u8; 32]).await.unwrap();
        let wrote = store
            .save_if_dir_exists(Some(id()), FileName::Difficulty, &[1u8; 9])
            .await
            .unwrap();
        assert!(wrote);
    }

    #[tokio::test]
    async fn unlink_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.unlink(Some(id()), FileName::New).await.unwrap();
        store.save(Some(id()), FileName::New, &[1u8; 32]).await.unwrap();
        store.unlink(Some(id()), FileName::New).await.unwrap();
        assert!(store.load(Some(id()), FileName::New, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rmtree_removes_whole_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save(Some(id()), FileName::Key, &[1u8; 32]).await.unwrap();
        store.save(Some(id()), FileName::Rules, &[2u8; 42]).await.unwrap();
        store.rmtree(id()).await.unwrap();
        assert!(!store.record_dir_exists(id()).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn files_and_dirs_get_hardened_permissions() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save(Some(id()), FileName::Key, &[1u8; 32]).await.unwrap();
        let file_mode = std::fs::metadata(dir.path().join(id().to_hex()).join("key"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(dir.path().join(id().to_hex()))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[tokio::test]
    async fn global_mac_key_lives_directly_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save(None, FileName::GlobalMacKey, &[9u8; 32]).await.unwrap();
        assert!(dir.path().join("key").is_file());
    }
}
