//! Codec primitives for the cryptcache blob store.
//!
//! This crate holds the byte-level building blocks shared by the cache
//! directory and its callers:
//!
//! - **XOR**: repeating-key XOR used for slot and payload obfuscation
//! - **CRC**: the reflected CRC-32 table, doubling as a public key table
//! - **Compression**: zlib compression wrapped in an obfuscated frame
//! - **Hashing**: MurmurHash2 variants used for name hashing by callers
//!
//! None of this is cryptography. The obfuscation only keeps cached bytes from
//! being readable with a hex viewer.
//!
//! # Examples
//!
//! ```
//! use cryptcache_codec::{compress, uncompress};
//!
//! let table = b"{100}{}{Hello}\n{101}{}{World}\n".repeat(16);
//! let framed = compress(&table).expect("compression should succeed");
//! let restored = uncompress(&framed, 4).expect("frame should decode");
//! assert_eq!(restored, table);
//! ```
//!
//! ```
//! use cryptcache_codec::xor_in_place;
//!
//! let mut data = b"payload".to_vec();
//! xor_in_place(&mut data, b"key");
//! xor_in_place(&mut data, b"key");
//! assert_eq!(data, b"payload");
//! ```

#![warn(missing_docs)]

pub mod compression;
pub mod crc;
pub mod error;
pub mod hash;
pub mod xor;

pub use compression::{
    DEFAULT_MULTIPLIER, MAX_UNCOMPRESSED_SIZE, ZLIB_SIGNATURE, compress, deobfuscate_frame,
    is_obfuscated, obfuscate_frame, uncompress,
};
pub use crc::{CRC_TABLE, Crc32, KEY_TABLE, crc32, crc_table};
pub use error::CodecError;
pub use hash::{murmur_hash2, murmur_hash2_64};
pub use xor::{xor_in_place, xor_to_vec};

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
