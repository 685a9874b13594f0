//! Error types for codec operations

use thiserror::Error;

/// Errors that can occur while compressing or decompressing frames
#[derive(Debug, Error)]
pub enum CodecError {
    /// The deflate compressor reported a failure
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Neither the raw nor the de-obfuscated frame starts with the zlib signature
    #[error("Unpack signature not found")]
    SignatureMismatch,

    /// The inflater rejected the stream
    #[error("Inflate failed: {0}")]
    Inflate(String),

    /// The output buffer would exceed the decompression cap
    #[error("Unpack buffer length is too large: requested {requested}, limit {limit}")]
    OutputTooLarge {
        /// Requested output buffer size in bytes
        requested: u64,
        /// Maximum allowed output size in bytes
        limit: u64,
    },
}
