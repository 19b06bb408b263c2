//! Proof-of-work over reward-claim material.
//!
//! The claimant builds `pow_material = community_id|author|block_index|
//! block_hash|merkle_root` and searches nonces until
//! `SHA-256(material + "|" + nonce)` carries the required number of
//! leading zero hex nibbles. Mainnet requires 4 nibbles, testnet 3.
//! Verification recomputes the hash from scratch; the embedded hash is
//! never trusted.

use serde::{Deserialize, Serialize};

use soupnet_crypto::{has_leading_zero_nibbles, sha256_hex};

/// A found nonce and its qualifying hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PowSolution {
    pub nonce: u64,
    pub hash: String,
}

/// Hash for one candidate nonce: `SHA-256(material + "|" + nonce)`.
pub fn pow_hash(material: &str, nonce: u64) -> String {
    sha256_hex(format!("{material}|{nonce}").as_bytes())
}

/// Iterates nonces `0..max_attempts` until a qualifying hash appears.
///
/// Returns `None` when the attempt budget is exhausted; the caller leaves
/// the block unclaimed this tick and retries later.
pub fn find_pow_nonce(material: &str, difficulty_nibbles: i32, max_attempts: u64) -> Option<PowSolution> {
    for nonce in 0..max_attempts {
        let hash = pow_hash(material, nonce);
        if has_leading_zero_nibbles(&hash, difficulty_nibbles) {
            return Some(PowSolution { nonce, hash });
        }
    }
    None
}

/// Verifies a claimed `(nonce, hash)` pair against the material.
pub fn verify_pow(material: &str, nonce_text: &str, claimed_hash: &str, difficulty_nibbles: i32) -> bool {
    if claimed_hash.is_empty() {
        return false;
    }
    let expected = sha256_hex(format!("{material}|{nonce_text}").as_bytes());
    expected == claimed_hash && has_leading_zero_nibbles(claimed_hash, difficulty_nibbles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_and_verify_roundtrip() {
        let material = "recipes|cid-author|3|blockhash|merkleroot";
        let solution = find_pow_nonce(material, 2, 1 << 16).expect("nonce within budget");
        assert!(verify_pow(
            material,
            &solution.nonce.to_string(),
            &solution.hash,
            2
        ));
    }

    #[test]
    fn verify_rejects_wrong_material() {
        let material = "recipes|cid-author|3|blockhash|merkleroot";
        let solution = find_pow_nonce(material, 2, 1 << 16).expect("nonce within budget");
        assert!(!verify_pow(
            "recipes|cid-other|3|blockhash|merkleroot",
            &solution.nonce.to_string(),
            &solution.hash,
            2
        ));
    }

    #[test]
    fn verify_rejects_tampered_nonce() {
        let material = "m";
        let solution = find_pow_nonce(material, 1, 1 << 12).expect("nonce within budget");
        assert!(!verify_pow(
            material,
            &(solution.nonce + 1).to_string(),
            &solution.hash,
            1
        ));
    }

    #[test]
    fn verify_rejects_empty_hash() {
        assert!(!verify_pow("m", "0", "", 0));
    }

    #[test]
    fn zero_difficulty_accepts_first_nonce() {
        let solution = find_pow_nonce("anything", 0, 4).expect("first nonce qualifies");
        assert_eq!(solution.nonce, 0);
    }

    #[test]
    fn exhausted_budget_returns_none() {
        // Twelve leading zero nibbles will not appear within 4 attempts.
        assert!(find_pow_nonce("m", 12, 4).is_none());
    }
}
