use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use tempfile::NamedTempFile;
use tokencache_core::{CacheAccessHooks, DataProtector, TokenCacheAccess, TokenCacheError};
use tracing::{debug, instrument};

/// Lifecycle of a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Memory reflects the file as of the last reload or write.
    Loaded,
    /// `clear()` emptied memory and removed the file.
    Cleared,
}

struct Inner<C> {
    cache: C,
    state: StoreState,
}

/// Keeps an in-memory token cache and its encrypted file in sync.
///
/// Every file read and write happens while holding this instance's lock, so
/// threads sharing one store never interleave a reload with a write. Separate
/// processes (or separate instances on the same path) are not coordinated:
/// the last writer wins. Readers still never see a partial file because
/// writes go through a temp file renamed over the target.
pub struct EncryptedFileTokenStore<C: TokenCacheAccess, D: DataProtector> {
    path: PathBuf,
    protector: D,
    inner: Mutex<Inner<C>>,
}

impl<C: TokenCacheAccess, D: DataProtector> EncryptedFileTokenStore<C, D> {
    /// Bind `cache` to the file at `path`, loading its current contents.
    /// A missing file leaves the cache empty.
    #[instrument(skip_all)]
    pub fn open(
        path: impl Into<PathBuf>,
        cache: C,
        protector: D,
    ) -> Result<Self, TokenCacheError> {
        let store = Self {
            path: path.into(),
            protector,
            inner: Mutex::new(Inner {
                cache,
                state: StoreState::Loaded,
            }),
        };
        debug!(path = %store.path.display(), "opening token cache");
        {
            let mut inner = store.lock()?;
            store.reload(&mut inner)?;
        }
        Ok(store)
    }

    pub fn cache_file_path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> Result<StoreState, TokenCacheError> {
        Ok(self.lock()?.state)
    }

    /// Empty the in-memory cache and delete the backing file.
    /// Succeeds when the file is already gone. Both steps always run; the
    /// first failure is returned.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn clear(&self) -> Result<(), TokenCacheError> {
        let mut inner = self.lock()?;
        let removed = remove_file(&self.path);
        let emptied = inner.cache.deserialize(None);
        inner.cache.set_dirty(false);
        removed?;
        emptied?;
        inner.state = StoreState::Cleared;
        Ok(())
    }

    /// Reload, run `f` against the cache, then persist if `f` left it dirty.
    /// The lock is held across all three steps.
    pub fn access<R>(&self, f: impl FnOnce(&mut C) -> R) -> Result<R, TokenCacheError> {
        let mut inner = self.lock()?;
        self.reload(&mut inner)?;
        let out = f(&mut inner.cache);
        self.persist(&mut inner)?;
        Ok(out)
    }

    /// Run `f` against the cache under the lock without touching the file.
    /// Callers bracketing accesses themselves pair this with the hooks.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut C) -> R) -> Result<R, TokenCacheError> {
        let mut inner = self.lock()?;
        Ok(f(&mut inner.cache))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<C>>, TokenCacheError> {
        self.inner.lock().map_err(|_| TokenCacheError::LockPoisoned)
    }

    fn reload(&self, inner: &mut Inner<C>) -> Result<(), TokenCacheError> {
        match read_if_exists(&self.path)? {
            Some(protected) => {
                let blob = self.protector.decrypt(&protected)?;
                debug!(bytes = blob.len(), "reloaded token cache from disk");
                inner.cache.deserialize(Some(blob.as_slice()))?;
            }
            None => {
                debug!("no cache file; starting empty");
                inner.cache.deserialize(None)?;
            }
        }
        inner.state = StoreState::Loaded;
        Ok(())
    }

    fn persist(&self, inner: &mut Inner<C>) -> Result<(), TokenCacheError> {
        if !inner.cache.is_dirty() {
            debug!("cache unchanged; skipping write");
            return Ok(());
        }

        let blob = inner.cache.serialize()?;
        if blob.is_empty() {
            remove_file(&self.path)?;
            debug!("cache serialized empty; removed file");
        } else {
            let protected = self.protector.encrypt(&blob)?;
            write_atomic(&self.path, &protected)?;
            debug!(bytes = protected.len(), "persisted token cache");
        }

        inner.cache.set_dirty(false);
        inner.state = StoreState::Loaded;
        Ok(())
    }
}

impl<C: TokenCacheAccess, D: DataProtector> CacheAccessHooks for EncryptedFileTokenStore<C, D> {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn on_before_access(&self) -> Result<(), TokenCacheError> {
        let mut inner = self.lock()?;
        self.reload(&mut inner)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn on_after_access(&self) -> Result<(), TokenCacheError> {
        let mut inner = self.lock()?;
        self.persist(&mut inner)
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, TokenCacheError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(TokenCacheError::file_access(path, err)),
    }
}

// Temp file in the target's directory so the rename stays on one file system.
// tempfile creates it owner-only (0600 on unix).
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TokenCacheError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let io_err = |err: std::io::Error| TokenCacheError::file_access(path, err);

    fs::create_dir_all(parent).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<(), TokenCacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(TokenCacheError::file_access(path, err)),
    }
}
