//! Merkle root over string leaves.
//!
//! Leaves are already hex digests; pairs are combined as
//! `H(left + "|" + right)` and an odd layer duplicates its last leaf.
//! The empty tree hashes the fixed sentinel `"merkle-empty"` so that an
//! empty block still carries a well-defined root.

use soupnet_crypto::sha256_hex;

/// Reduces `leaves` to a single merkle root.
pub fn compute_merkle_root(mut leaves: Vec<String>) -> String {
    if leaves.is_empty() {
        return sha256_hex(b"merkle-empty");
    }

    while leaves.len() > 1 {
        if leaves.len() % 2 != 0 {
            let last = leaves
                .last()
                .cloned()
                .unwrap_or_default();
            leaves.push(last);
        }

        let mut next = Vec::with_capacity(leaves.len() / 2);
        for pair in leaves.chunks(2) {
            next.push(sha256_hex(format!("{}|{}", pair[0], pair[1]).as_bytes()));
        }
        leaves = next;
    }

    leaves.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_has_fixed_sentinel_root() {
        assert_eq!(compute_merkle_root(vec![]), sha256_hex(b"merkle-empty"));
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let root = compute_merkle_root(vec!["leaf-a".into()]);
        assert_eq!(root, "leaf-a");
    }

    #[test]
    fn two_leaves_hash_as_pair() {
        let root = compute_merkle_root(vec!["a".into(), "b".into()]);
        assert_eq!(root, sha256_hex(b"a|b"));
    }

    #[test]
    fn odd_layer_duplicates_last_leaf() {
        let root = compute_merkle_root(vec!["a".into(), "b".into(), "c".into()]);
        let left = sha256_hex(b"a|b");
        let right = sha256_hex(b"c|c");
        assert_eq!(root, sha256_hex(format!("{left}|{right}").as_bytes()));
    }

    #[test]
    fn root_depends_on_leaf_order() {
        let forward = compute_merkle_root(vec!["a".into(), "b".into()]);
        let reversed = compute_merkle_root(vec!["b".into(), "a".into()]);
        assert_ne!(forward, reversed);
    }
}
