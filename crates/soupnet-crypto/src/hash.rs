//! Content digests and the proof-of-work nibble check.
//!
//! Every hash in the system is a lowercase hex string. Production code
//! paths use SHA-256; the compatibility scaffold (no production swap)
//! uses a deterministic 64-bit FNV-1a so that a node without the full
//! crypto stack still produces stable content ids.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `payload` as 64 lowercase hex chars.
pub fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Deterministic 64-bit FNV-1a digest as lowercase hex.
///
/// Compatibility fallback only; never used where SHA-256 is available
/// and the production swap is requested.
pub fn fnv64_hex(payload: &[u8]) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in payload {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{hash:x}")
}

/// Returns `true` when `hex_hash` starts with at least `nibbles` zero
/// hex digits. Zero or negative difficulty always passes.
pub fn has_leading_zero_nibbles(hex_hash: &str, nibbles: i32) -> bool {
    if nibbles <= 0 {
        return true;
    }
    let wanted = nibbles as usize;
    if wanted > hex_hash.len() {
        return false;
    }
    hex_hash.bytes().take(wanted).all(|c| c == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256_hex(b"soup"), sha256_hex(b"soup"));
        assert_ne!(sha256_hex(b"soup"), sha256_hex(b"soups"));
    }

    #[test]
    fn fnv64_known_vector() {
        // FNV-1a of the empty input is the offset basis.
        assert_eq!(fnv64_hex(b""), "cbf29ce484222325");
    }

    #[test]
    fn fnv64_differs_on_single_byte_change() {
        assert_ne!(fnv64_hex(b"payload-a"), fnv64_hex(b"payload-b"));
    }

    #[test]
    fn nibble_check_zero_difficulty_always_passes() {
        assert!(has_leading_zero_nibbles("ff", 0));
        assert!(has_leading_zero_nibbles("", -3));
    }

    #[test]
    fn nibble_check_counts_leading_zeros() {
        assert!(has_leading_zero_nibbles("000a1b", 3));
        assert!(!has_leading_zero_nibbles("000a1b", 4));
    }

    #[test]
    fn nibble_check_rejects_when_hash_too_short() {
        assert!(!has_leading_zero_nibbles("00", 3));
    }
}
