//! Most-significant-byte-first integer helpers.
//!
//! Every multi-byte field of the managed attribute is stored big-endian with a
//! width that is not always a native integer size, so fields are written and
//! read through these helpers rather than `to_be_bytes`.

/// Store `value` into `dest`, most significant byte first.
///
/// The width is `dest.len()`. Bits that do not fit are dropped.
pub fn store(dest: &mut [u8], mut value: u64) {
    for byte in dest.iter_mut().rev() {
        *byte = (value & 0xff) as u8;
        value >>= 8;
    }
}

/// Load a big-endian value from `src`. The width is `src.len()`.
pub fn load(src: &[u8]) -> u64 {
    src.iter().fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}
