//! Stable string hashing for posting keys.
//!
//! Posting keys are persisted in the binary index file, so the hash must be
//! deterministic across processes and runs. `FxHasher` has no random seed and
//! a fixed algorithm, which makes it safe to persist; the std `DefaultHasher`
//! and `ahash` are not (both are randomly seeded or unspecified).

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// 64-bit stable hash of a string, used as the posting `key`.
pub fn hash64(value: &str) -> i64 {
    let mut hasher = FxHasher::default();
    hasher.write(value.as_bytes());
    hasher.finish() as i64
}

/// 32-bit stable hash of a string, used as the posting `crc` discriminator
/// for property and number entries. Folds the 64-bit hash so both halves
/// contribute.
pub fn hash32(value: &str) -> i32 {
    let h = hash64(value) as u64;
    ((h >> 32) ^ (h & 0xFFFF_FFFF)) as u32 as i32
}

/// Order-preserving integer encoding of a double.
///
/// A plain bit-cast only orders correctly for non-negative values.
/// Complementing the magnitude bits of negatives (keeping their sign bit
/// set) yields an i64 whose natural ordering matches numeric ordering for
/// all finite doubles.
pub fn number_key(value: f64) -> i64 {
    let bits = value.to_bits();
    if bits & (1 << 63) != 0 {
        (!bits ^ (1 << 63)) as i64
    } else {
        bits as i64
    }
}

/// Inverse of [`number_key`].
pub fn number_from_key(key: i64) -> f64 {
    if key >= 0 {
        f64::from_bits(key as u64)
    } else {
        f64::from_bits(!((key as u64) ^ (1 << 63)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash64_deterministic() {
        assert_eq!(hash64("material"), hash64("material"));
        assert_ne!(hash64("material"), hash64("materials"));
    }

    #[test]
    fn test_hash32_differs_by_name() {
        assert_ne!(hash32("size"), hash32("width"));
    }

    #[test]
    fn test_number_key_preserves_order() {
        let values = [-1e30, -42.5, -1.0, -0.0, 0.0, 1e-9, 1.0, 42.5, 1e30];
        let keys: Vec<i64> = values.iter().map(|&v| number_key(v)).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_number_key_roundtrip() {
        for v in [-1234.5, -1.0, 0.0, 0.25, 7.0, 1e18] {
            assert_eq!(number_from_key(number_key(v)), v);
        }
    }
}
