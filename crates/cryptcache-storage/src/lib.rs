//! Persistent named-blob cache backed by a single file.
//!
//! The cache file starts with a fixed array of 10001 slot descriptors and is
//! followed by an append-only payload region:
//!
//! ```text
//! [descriptor 0][descriptor 1]...[descriptor 10000][payload region ...]
//! ```
//!
//! Every descriptor carries its own 20-byte key. The key obfuscates the rest
//! of the descriptor and the slot's payload bytes. Slots are never compacted:
//! erased or outgrown slots keep their reserved capacity and are handed to
//! the next name that fits.
//!
//! The cache only holds data that can be rebuilt from original sources, so
//! corruption is repaired by forgetting entries rather than by reporting it.
//!
//! # Example
//!
//! ```rust,no_run
//! use cryptcache_storage::CacheDirectory;
//!
//! # fn example() -> Result<(), cryptcache_storage::CacheError> {
//! let mut cache = CacheDirectory::open("Cache.bin")?;
//! cache.put("lang/en/FOGAME", b"{100}{}{Hello}")?;
//! assert_eq!(cache.get("lang/en/FOGAME")?.as_deref(), Some(&b"{100}{}{Hello}"[..]));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use thiserror::Error;

// Cache configuration
pub mod config;

// On-disk slot descriptor
pub mod descriptor;

// Slot directory (put/get/erase/list)
pub mod directory;

// Backing file abstraction
pub mod file;

// Slot names
pub mod name;

// Process-wide, mutex-guarded cache handle
pub mod shared;

pub use config::CacheConfig;
pub use descriptor::{SlotDescriptor, SlotState};
pub use directory::{CacheDirectory, DirectoryStats, SlotInfo};
pub use file::CacheFile;
pub use name::{SlotName, normalize_name};
pub use shared::SharedCache;

pub use cryptcache_codec::CodecError;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every descriptor slot is in use.
    #[error("Cache table descriptors ended: all {slots} slots are in use")]
    DirectoryFull {
        /// Number of descriptor slots in the table
        slots: usize,
    },

    /// The entry name cannot be stored in a descriptor.
    #[error("Invalid cache name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The payload exceeds the per-entry ceiling.
    #[error("Payload of {len} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Maximum payload length in bytes
        limit: usize,
    },

    /// The file is not a cache table and was left untouched.
    #[error("{} is not a cache table: {reason}", path.display())]
    NotCacheTable {
        /// Inspected path
        path: std::path::PathBuf,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Corruption detected that could not be repaired in place.
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Compression or decompression failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of descriptor slots in a cache file.
///
/// Also the validity stamp every descriptor must carry. The table cannot grow;
/// a file with another slot count is treated as foreign and rebuilt.
pub const SLOT_COUNT: usize = 10001;

/// Size of the descriptor array at the head of the file.
pub const TABLE_SIZE: u64 = (SLOT_COUNT * descriptor::DESCRIPTOR_SIZE) as u64;

/// Largest payload a slot may hold (16 MiB - 1).
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// Smallest capacity reserved for a newly allocated slot.
pub const MIN_SLOT_CAPACITY: usize = 1024;

/// Default cache file name.
pub const DEFAULT_CACHE_FILE: &str = "Cache.bin";
