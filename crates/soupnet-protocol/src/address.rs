//! User-facing soup addresses.
//!
//! An address is `"S" + SHA-256(cid)[..39]` — short enough to paste,
//! deterministic from the CID, and prefix-checked on entry. An empty CID
//! maps to the all-zero address so display code never branches.

use soupnet_crypto::sha256_hex;

/// Leading character of every soup address.
pub const ADDRESS_PREFIX: &str = "S";

/// Derives the soup address for an author CID.
pub fn soup_address_from_cid(cid: &str) -> String {
    if cid.is_empty() {
        return format!("{ADDRESS_PREFIX}{}", "0".repeat(39));
    }
    let digest = sha256_hex(cid.as_bytes());
    format!("{ADDRESS_PREFIX}{}", &digest[..39])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_has_prefix_and_fixed_length() {
        let address = soup_address_from_cid("cid-abcdef");
        assert!(address.starts_with(ADDRESS_PREFIX));
        assert_eq!(address.len(), 40);
    }

    #[test]
    fn address_is_deterministic() {
        assert_eq!(
            soup_address_from_cid("cid-abcdef"),
            soup_address_from_cid("cid-abcdef")
        );
        assert_ne!(
            soup_address_from_cid("cid-abcdef"),
            soup_address_from_cid("cid-abcdeg")
        );
    }

    #[test]
    fn empty_cid_maps_to_zero_address() {
        assert_eq!(
            soup_address_from_cid(""),
            format!("S{}", "0".repeat(39))
        );
    }
}
