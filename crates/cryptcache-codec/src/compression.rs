//! Framed zlib compression.
//!
//! [`compress`] produces a zlib stream and then disguises it in two passes:
//!
//! 1. XOR the whole stream with [`KEY_TABLE`]
//! 2. XOR bytes `0..4` with the (already transformed) bytes `4..8`
//!
//! The second pass scrambles the two-byte zlib signature so cached files do
//! not start with a recognisable `78 9C`. [`uncompress`] accepts both the
//! framed form and a plain zlib stream, telling them apart by that signature.
//!
//! Decompression starts from an output buffer of `input_len * multiplier`
//! bytes and doubles it whenever the inflater runs out of room, restarting
//! from the beginning each time. The buffer never grows past
//! [`MAX_UNCOMPRESSED_SIZE`].

use crate::crc::KEY_TABLE;
use crate::error::CodecError;
use crate::xor::xor_in_place;
use crate::Result;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tracing::{debug, warn};

/// Signature of a zlib stream compressed at the default level.
pub const ZLIB_SIGNATURE: [u8; 2] = [0x78, 0x9C];

/// Upper bound for the decompression output buffer (100 MB).
pub const MAX_UNCOMPRESSED_SIZE: u64 = 100_000_000;

/// Length multiplier callers use when they have no better estimate.
pub const DEFAULT_MULTIPLIER: u32 = 4;

/// Minimum frame length for the header self-XOR pass.
const HEADER_PASS_LEN: usize = 8;

/// Worst-case zlib output size: `ceil(len * 1.1) + 12`.
fn compress_bound(len: usize) -> usize {
    len + len.div_ceil(10) + 12
}

/// Compress `data` into an obfuscated zlib frame.
///
/// The default compression level is mandatory: the frame is recognised by
/// the `78 9C` header that level produces.
///
/// # Errors
///
/// Returns [`CodecError::Compression`] if the compressor fails or the output
/// does not fit the worst-case bound.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(compress_bound(data.len()));
    let mut compressor = Compress::new(Compression::default(), true);

    let status = compressor
        .compress_vec(data, &mut out, FlushCompress::Finish)
        .map_err(|e| CodecError::Compression(e.to_string()))?;
    if status != Status::StreamEnd {
        return Err(CodecError::Compression(format!(
            "stream not finished after {} of {} input bytes",
            compressor.total_in(),
            data.len()
        )));
    }

    out.shrink_to_fit();
    obfuscate_frame(&mut out);

    debug!(input = data.len(), output = out.len(), "compressed frame");
    Ok(out)
}

/// Apply the two obfuscation passes to a zlib stream in place.
pub fn obfuscate_frame(frame: &mut [u8]) {
    xor_in_place(frame, &KEY_TABLE);
    header_pass(frame);
}

/// Reverse [`obfuscate_frame`] in place.
pub fn deobfuscate_frame(frame: &mut [u8]) {
    header_pass(frame);
    xor_in_place(frame, &KEY_TABLE);
}

/// XOR bytes `0..4` with bytes `4..8`; frames shorter than 8 bytes are left alone.
fn header_pass(frame: &mut [u8]) {
    if frame.len() < HEADER_PASS_LEN {
        return;
    }
    let (head, rest) = frame.split_at_mut(4);
    xor_in_place(head, &rest[..4]);
}

fn has_signature(data: &[u8]) -> bool {
    data.starts_with(&ZLIB_SIGNATURE)
}

/// Whether `data` is not a plain zlib stream (and so needs de-obfuscation).
pub fn is_obfuscated(data: &[u8]) -> bool {
    !has_signature(data)
}

/// Decompress a framed or plain zlib stream.
///
/// `multiplier` is the expected ratio between output and input length; it
/// only sizes the first output buffer. Zero is treated as one.
///
/// # Errors
///
/// - [`CodecError::SignatureMismatch`] if no zlib signature can be recovered
/// - [`CodecError::Inflate`] if the stream is corrupt or truncated
/// - [`CodecError::OutputTooLarge`] if the output buffer would pass
///   [`MAX_UNCOMPRESSED_SIZE`]
pub fn uncompress(data: &[u8], multiplier: u32) -> Result<Vec<u8>> {
    let multiplier = u64::from(multiplier.max(1));
    let initial = (data.len() as u64).saturating_mul(multiplier);
    if initial > MAX_UNCOMPRESSED_SIZE {
        warn!(
            data_len = data.len(),
            multiplier, "unpack buffer length is too large"
        );
        return Err(CodecError::OutputTooLarge {
            requested: initial,
            limit: MAX_UNCOMPRESSED_SIZE,
        });
    }

    if has_signature(data) {
        match inflate(data, initial) {
            Ok(out) => return Ok(out),
            // A framed stream can start with the plain signature by chance.
            Err(CodecError::Inflate(reason)) if data.len() >= HEADER_PASS_LEN => {
                debug!(%reason, "plain inflate failed, retrying as framed stream");
                let mut framed = data.to_vec();
                deobfuscate_frame(&mut framed);
                if !has_signature(&framed) {
                    return Err(CodecError::Inflate(reason));
                }
                return inflate(&framed, initial);
            }
            Err(e) => return Err(e),
        }
    }

    let mut framed = data.to_vec();
    deobfuscate_frame(&mut framed);
    if !has_signature(&framed) {
        warn!(data_len = data.len(), "unpack signature not found");
        return Err(CodecError::SignatureMismatch);
    }

    inflate(&framed, initial)
}

/// Inflate `stream`, doubling the output buffer until the stream fits.
fn inflate(stream: &[u8], initial: u64) -> Result<Vec<u8>> {
    let mut capacity = initial.max(1);

    loop {
        let len = usize::try_from(capacity).map_err(|_| CodecError::OutputTooLarge {
            requested: capacity,
            limit: MAX_UNCOMPRESSED_SIZE,
        })?;
        let mut out = vec![0u8; len];
        let mut inflater = Decompress::new(true);

        let status = inflater
            .decompress(stream, &mut out, FlushDecompress::Finish)
            .map_err(|e| CodecError::Inflate(e.to_string()))?;
        let produced = usize::try_from(inflater.total_out())
            .map_err(|_| CodecError::Inflate("output length overflow".to_string()))?;

        match status {
            Status::StreamEnd => {
                out.truncate(produced);
                return Ok(out);
            }
            Status::Ok | Status::BufError if produced == out.len() => {
                let next = capacity.saturating_mul(2);
                if next > MAX_UNCOMPRESSED_SIZE {
                    warn!(
                        requested = next,
                        "unpack buffer would exceed the output cap"
                    );
                    return Err(CodecError::OutputTooLarge {
                        requested: next,
                        limit: MAX_UNCOMPRESSED_SIZE,
                    });
                }
                debug!(from = capacity, to = next, "growing unpack buffer");
                capacity = next;
            }
            Status::Ok | Status::BufError => {
                return Err(CodecError::Inflate(format!(
                    "stream ended early after {produced} output bytes"
                )));
            }
        }
    }
}
