//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masked payloads are XORed with a 4-byte key where byte `i` uses
//! `key[i % 4]`. When a payload is masked piecewise (one output buffer at a
//! time) the key phase has to carry over between pieces; [`mask_rolling`]
//! returns the key rotated to the phase of the next byte.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask_bytewise(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// XOR masking eight bytes at a time.
///
/// Produces the same output as [`apply_mask_bytewise`].
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let wide = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ wide;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    // Whole words are a multiple of 4 bytes, so the tail restarts at key[0].
    apply_mask_bytewise(chunks.into_remainder(), mask);
}

/// Mask `data` starting at the phase `key` is in, and return the key rotated
/// so that masking can resume at the next byte.
///
/// ```
/// use rsws_framer::protocol::mask::{apply_mask, mask_rolling};
///
/// let key = [0x37, 0xfa, 0x21, 0x3d];
/// let mut whole = b"Hello, rolling mask".to_vec();
/// apply_mask(&mut whole, key);
///
/// let mut split = b"Hello, rolling mask".to_vec();
/// let (head, tail) = split.split_at_mut(5);
/// let next = mask_rolling(key, head);
/// mask_rolling(next, tail);
///
/// assert_eq!(whole, split);
/// ```
#[inline]
pub fn mask_rolling(key: [u8; 4], data: &mut [u8]) -> [u8; 4] {
    apply_mask(data, key);
    let mut next = key;
    next.rotate_left(data.len() % 4);
    next
}
