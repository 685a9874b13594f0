//! Repeating-key XOR.
//!
//! Byte `i` of the buffer is XORed with byte `i % key.len()` of the key.
//! Applying the same key twice restores the input, so one function serves
//! for both directions.

/// XOR `data` in place with a cyclically repeated `key`.
///
/// An empty key leaves the data untouched.
///
/// # Examples
///
/// ```
/// use cryptcache_codec::xor::xor_in_place;
///
/// let mut data = [0x00, 0xFF, 0x0F];
/// xor_in_place(&mut data, &[0xAA]);
/// assert_eq!(data, [0xAA, 0x55, 0xA5]);
/// ```
pub fn xor_in_place(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }

    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

/// XOR a copy of `data` with a cyclically repeated `key`.
pub fn xor_to_vec(data: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    xor_in_place(&mut out, key);
    out
}
