//! Cache configuration.

use crate::{CacheError, DEFAULT_CACHE_FILE, Result};
use cryptcache_codec::DEFAULT_MULTIPLIER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default ratio between compressed and expected uncompressed size.
pub const DEFAULT_UNCOMPRESS_MULTIPLIER: u32 = DEFAULT_MULTIPLIER;

/// Settings for opening a [`SharedCache`](crate::SharedCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location of the cache file.
    pub path: PathBuf,

    /// Initial output buffer multiplier for compressed entries.
    pub uncompress_multiplier: u32,

    /// Create missing parent directories of `path`.
    pub create_dirs: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".").join(DEFAULT_CACHE_FILE),
            uncompress_multiplier: DEFAULT_UNCOMPRESS_MULTIPLIER,
            create_dirs: true,
        }
    }
}

impl CacheConfig {
    /// Configuration for a cache file at `path` with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the cache file path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the uncompress buffer multiplier.
    #[must_use]
    pub const fn with_uncompress_multiplier(mut self, multiplier: u32) -> Self {
        self.uncompress_multiplier = multiplier;
        self
    }

    /// Enable or disable creation of parent directories.
    #[must_use]
    pub const fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CacheError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings for values the cache cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(CacheError::Config("cache path is empty".to_string()));
        }
        if self.uncompress_multiplier == 0 {
            return Err(CacheError::Config(
                "uncompress multiplier must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
