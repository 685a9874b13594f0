//! MurmurHash2 (32-bit) and MurmurHash64A with a zero seed.
//!
//! Callers use these to derive stable identifiers from resource names.

const M32: u32 = 0x5BD1_E995;
const R32: u32 = 24;

const M64: u64 = 0xC6A4_A793_5BD1_E995;
const R64: u32 = 47;

/// 32-bit MurmurHash2 of `data` with seed 0.
///
/// # Examples
///
/// ```
/// use cryptcache_codec::murmur_hash2;
///
/// assert_eq!(murmur_hash2(b"abcdef"), 1271458169);
/// ```
pub fn murmur_hash2(data: &[u8]) -> u32 {
    #[allow(clippy::cast_possible_truncation)]
    let mut h = data.len() as u32;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M32);
        k ^= k >> R32;
        k = k.wrapping_mul(M32);

        h = h.wrapping_mul(M32);
        h ^= k;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        if tail.len() >= 3 {
            h ^= u32::from(tail[2]) << 16;
        }
        if tail.len() >= 2 {
            h ^= u32::from(tail[1]) << 8;
        }
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M32);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M32);
    h ^= h >> 15;
    h
}

/// 64-bit MurmurHash64A of `data` with seed 0.
///
/// Blocks are read as little-endian so results do not depend on the host.
pub fn murmur_hash2_64(data: &[u8]) -> u64 {
    let mut h = (data.len() as u64).wrapping_mul(M64);

    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let mut block = [0u8; 8];
        block.copy_from_slice(chunk);
        let mut k = u64::from_le_bytes(block);

        k = k.wrapping_mul(M64);
        k ^= k >> R64;
        k = k.wrapping_mul(M64);

        h ^= k;
        h = h.wrapping_mul(M64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        for (i, &byte) in tail.iter().enumerate().rev() {
            h ^= u64::from(byte) << (8 * i);
        }
        h = h.wrapping_mul(M64);
    }

    h ^= h >> R64;
    h = h.wrapping_mul(M64);
    h ^= h >> R64;
    h
}
