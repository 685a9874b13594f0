//! CRC-32 table and the key table derived from it.
//!
//! The 256-entry reflected CRC-32 table (polynomial `0xEDB88320`) is built at
//! compile time. Besides driving [`crc32`], entries `[1..256]` serialised as
//! little-endian bytes form [`KEY_TABLE`], the fixed key for the bulk pass of
//! the compression frame. The key is public; it only scrambles bytes.
//!
//! Checksums themselves come from `crc32fast`, which uses the same
//! polynomial as the table.

/// Reflected CRC-32 polynomial.
pub const CRC_POLY: u32 = 0xEDB8_8320;

/// Key table length: the CRC table in bytes minus its first entry.
pub const KEY_TABLE_LEN: usize = 256 * 4 - 4;

/// CRC-32 lookup table.
pub const CRC_TABLE: [u32; 256] = build_table();

/// Bulk obfuscation key: `CRC_TABLE[1..]` as little-endian bytes.
pub const KEY_TABLE: [u8; KEY_TABLE_LEN] = build_key_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = i as u32;
        let mut j = 0;
        while j < 8 {
            r = if r & 1 == 1 { (r >> 1) ^ CRC_POLY } else { r >> 1 };
            j += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

const fn build_key_table() -> [u8; KEY_TABLE_LEN] {
    let table = build_table();
    let mut key = [0u8; KEY_TABLE_LEN];
    let mut i = 1;
    while i < 256 {
        let bytes = table[i].to_le_bytes();
        let base = (i - 1) * 4;
        key[base] = bytes[0];
        key[base + 1] = bytes[1];
        key[base + 2] = bytes[2];
        key[base + 3] = bytes[3];
        i += 1;
    }
    key
}

/// Read-only access to the CRC-32 table.
pub fn crc_table() -> &'static [u32; 256] {
    &CRC_TABLE
}

/// Compute the standard CRC-32 (IEEE) of `data`.
///
/// # Examples
///
/// ```
/// use cryptcache_codec::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Incremental CRC-32 hasher.
#[derive(Debug, Clone, Default)]
pub struct Crc32 {
    inner: crc32fast::Hasher,
}

impl Crc32 {
    /// Start a new checksum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and return the checksum value.
    pub fn finalize(self) -> u32 {
        self.inner.finalize()
    }
}
