//! Byte stores holding index files

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::errors::{StorageError, StorageResult};

/// Name of the lock file guarding an index against concurrent writers.
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// A flat namespace of named files with atomic replace.
pub trait Store: Send + Sync + fmt::Debug {
    /// Location used in error messages.
    fn describe(&self) -> String;

    fn list(&self) -> StorageResult<Vec<String>>;

    fn exists(&self, name: &str) -> StorageResult<bool>;

    fn read(&self, name: &str) -> StorageResult<Vec<u8>>;

    /// Write `bytes` under `name` so readers see the old or the new
    /// content, never a mix.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Remove `name`. Removing a missing file is not an error.
    fn delete(&self, name: &str) -> StorageResult<()>;

    fn try_lock(&self, name: &str) -> StorageResult<()>;

    fn unlock(&self, name: &str) -> StorageResult<()>;

    fn resource(&self, name: &str) -> String {
        format!("{}/{}", self.describe(), name)
    }
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Directory-backed store.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    sync: bool,
}

impl FsStore {
    /// Open (creating if needed) the directory at `root`. With `sync`
    /// every write and rename is fsynced.
    pub fn open(root: impl AsRef<Path>, sync: bool) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| StorageError::io_error(format!("cannot create {}", root.display()), e))?;
        Ok(Self { root, sync })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fsync_dir(&self) -> StorageResult<()> {
        let dir = File::open(&self.root).map_err(|e| StorageError::io_error(self.describe(), e))?;
        dir.sync_all()
            .map_err(|e| StorageError::io_error(format!("fsync directory failed: {}", self.describe()), e))
    }
}

impl Store for FsStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::read_failed(self.describe(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::read_failed(self.describe(), e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.root.join(name).is_file())
    }

    fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        fs::read(self.root.join(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::file_not_found(self.resource(name)),
            _ => StorageError::read_failed(self.resource(name), e),
        })
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        let tmp = self.root.join(format!("{name}.tmp"));
        let target = self.root.join(name);
        let fail = |e| StorageError::write_failed(self.resource(name), e);

        let mut file = File::create(&tmp).map_err(fail)?;
        file.write_all(bytes).map_err(fail)?;
        if self.sync {
            file.sync_all().map_err(fail)?;
        }
        drop(file);

        fs::rename(&tmp, &target).map_err(fail)?;
        if self.sync {
            self.fsync_dir()?;
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::write_failed(self.resource(name), e)),
        }
    }

    fn try_lock(&self, name: &str) -> StorageResult<()> {
        match OpenOptions::new().write(true).create_new(true).open(self.root.join(name)) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StorageError::lock_obtain_failed(self.resource(name)))
            }
            Err(e) => Err(StorageError::write_failed(self.resource(name), e)),
        }
    }

    fn unlock(&self, name: &str) -> StorageResult<()> {
        self.delete(name)
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Heap-backed store, used by tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    locks: Mutex<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn locks(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite a file in place, bypassing atomic replace. Used to
    /// simulate damage.
    pub fn corrupt(&self, name: &str, f: impl FnOnce(&mut Vec<u8>)) {
        if let Some(bytes) = self.files().get_mut(name) {
            f(bytes);
        }
    }
}

impl Store for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self.files().keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.files().contains_key(name))
    }

    fn read(&self, name: &str) -> StorageResult<Vec<u8>> {
        self.files()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::file_not_found(self.resource(name)))
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.files().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.files().remove(name);
        Ok(())
    }

    fn try_lock(&self, name: &str) -> StorageResult<()> {
        if self.locks().insert(name.to_string()) {
            Ok(())
        } else {
            Err(StorageError::lock_obtain_failed(self.resource(name)))
        }
    }

    fn unlock(&self, name: &str) -> StorageResult<()> {
        self.locks().remove(name);
        Ok(())
    }
}

// =============================================================================
// LOCKING
// =============================================================================

/// Exclusive write access to an index, released on drop.
#[derive(Debug)]
pub struct WriteLock {
    store: Arc<dyn Store>,
}

impl WriteLock {
    pub fn obtain(store: &Arc<dyn Store>) -> StorageResult<Self> {
        store.try_lock(WRITE_LOCK_NAME)?;
        Ok(Self {
            store: Arc::clone(store),
        })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = self.store.unlock(WRITE_LOCK_NAME) {
            warn!(error = %e, "failed to release write lock");
        }
    }
}

// =============================================================================
// SELECTION
// =============================================================================

/// Store implementation selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreImpl {
    /// Filesystem, fsync on every write
    #[default]
    Fs,
    /// Filesystem without fsync
    FsNoSync,
}

impl StoreImpl {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreImpl::Fs => "fs",
            StoreImpl::FsNoSync => "fs-nosync",
        }
    }

    pub fn open(&self, path: impl AsRef<Path>) -> StorageResult<Arc<dyn Store>> {
        let store = FsStore::open(path, *self == StoreImpl::Fs)?;
        Ok(Arc::new(store))
    }
}

impl fmt::Display for StoreImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreImpl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fs" => Ok(StoreImpl::Fs),
            "fs-nosync" => Ok(StoreImpl::FsNoSync),
            other => Err(format!("unknown store implementation {other:?} (expected fs or fs-nosync)")),
        }
    }
}
