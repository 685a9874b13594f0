//! Process-wide cache handle.
//!
//! [`SharedCache`] serializes every directory operation behind one mutex and
//! turns the cache into a best-effort store: if the file cannot be opened the
//! cache is simply unavailable, and write failures are logged rather than
//! returned. Callers must always be able to recompute what they asked for.

use crate::config::CacheConfig;
use crate::directory::{CacheDirectory, DirectoryStats};
use crate::CacheError;
use cryptcache_codec::{compress, uncompress};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Thread-safe, clonable handle to an optional cache directory.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<Option<CacheDirectory>>>,
    multiplier: u32,
}

impl SharedCache {
    /// Open the cache described by `config`.
    ///
    /// Never fails. When the directory cannot be opened the returned handle
    /// reports [`is_available`](Self::is_available) as `false` and every
    /// operation becomes a miss or a no-op.
    pub fn open(config: &CacheConfig) -> Self {
        let directory = match CacheDirectory::from_config(config) {
            Ok(directory) => Some(directory),
            Err(e) => {
                warn!(
                    path = %config.path.display(),
                    error = %e,
                    "cache unavailable"
                );
                None
            }
        };

        Self {
            inner: Arc::new(Mutex::new(directory)),
            multiplier: config.uncompress_multiplier.max(1),
        }
    }

    /// Wrap an already opened directory.
    pub fn from_directory(directory: CacheDirectory, multiplier: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(directory))),
            multiplier: multiplier.max(1),
        }
    }

    /// A handle with no backing file.
    pub fn unavailable() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            multiplier: 1,
        }
    }

    /// Whether a cache file is open.
    pub fn is_available(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Whether a live entry named `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.inner
            .lock()
            .as_ref()
            .is_some_and(|directory| directory.exists(name))
    }

    /// Names of live entries starting with `prefix`.
    pub fn list(&self, prefix: &str) -> Vec<String> {
        self.inner
            .lock()
            .as_ref()
            .map(|directory| directory.list(prefix))
            .unwrap_or_default()
    }

    /// Store `data` under `name`. Returns whether the entry was written.
    pub fn put(&self, name: &str, data: &[u8]) -> bool {
        let mut guard = self.inner.lock();
        let Some(directory) = guard.as_mut() else {
            return false;
        };

        match directory.put(name, data) {
            Ok(()) => true,
            Err(e @ CacheError::DirectoryFull { .. }) => {
                error!(entry = name, error = %e, "cache entry not stored");
                false
            }
            Err(e) => {
                warn!(entry = name, error = %e, "cache entry not stored");
                false
            }
        }
    }

    /// Read the entry named `name`. Read failures count as a miss.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        let mut guard = self.inner.lock();
        let directory = guard.as_mut()?;

        match directory.get(name) {
            Ok(data) => data,
            Err(e) => {
                warn!(entry = name, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Remove the entry named `name`.
    pub fn erase(&self, name: &str) {
        let mut guard = self.inner.lock();
        if let Some(directory) = guard.as_mut()
            && let Err(e) = directory.erase(name)
        {
            warn!(entry = name, error = %e, "cache erase failed");
        }
    }

    /// Store a string entry.
    pub fn put_str(&self, name: &str, value: &str) -> bool {
        self.put(name, value.as_bytes())
    }

    /// Read a string entry; invalid UTF-8 is replaced.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
    }

    /// Compress `data` and store the framed stream under `name`.
    pub fn put_compressed(&self, name: &str, data: &[u8]) -> bool {
        match compress(data) {
            Ok(framed) => {
                debug!(entry = name, raw = data.len(), framed = framed.len(), "compressed entry");
                self.put(name, &framed)
            }
            Err(e) => {
                warn!(entry = name, error = %e, "cache entry not compressed");
                false
            }
        }
    }

    /// Read and decompress the entry named `name`.
    ///
    /// An entry that cannot be decoded is erased, so the caller recomputes it
    /// once and the next store replaces it.
    pub fn get_uncompressed(&self, name: &str) -> Option<Vec<u8>> {
        let framed = self.get(name)?;
        match uncompress(&framed, self.multiplier) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(entry = name, error = %e, "undecodable cache entry dropped");
                self.erase(name);
                None
            }
        }
    }

    /// Slot usage totals, if the cache is available.
    pub fn stats(&self) -> Option<DirectoryStats> {
        let mut guard = self.inner.lock();
        let directory = guard.as_mut()?;
        directory
            .stats()
            .inspect_err(|e| warn!(error = %e, "cache stats unavailable"))
            .ok()
    }

    /// Close the cache file. Later operations behave as if it was never open.
    pub fn close(&self) {
        if let Some(directory) = self.inner.lock().take() {
            if let Err(e) = directory.close() {
                warn!(error = %e, "cache close failed");
            }
            info!("cache closed");
        }
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("available", &self.is_available())
            .field("multiplier", &self.multiplier)
            .finish()
    }
}
