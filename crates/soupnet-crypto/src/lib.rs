//! Cryptographic primitives for the SoupNet core.
//!
//! This crate is the **sole** location for all cryptographic operations:
//!
//! - **SHA-256** content digests (production) and a deterministic 64-bit
//!   FNV-1a fallback (compatibility scaffold)
//! - **Ed25519** signing and verification
//! - **Argon2id** key derivation for the identity vault
//! - **XChaCha20-Poly1305** AEAD sealing of the production vault payload
//! - XOR-stream obfuscation for the compatibility vault and key backups
//!
//! No other crate in the workspace should perform raw crypto operations.

pub mod hash;
pub mod vault;

pub use hash::{fnv64_hex, has_leading_zero_nibbles, sha256_hex};
pub use vault::{IdentityKeyPair, IdentityVault};
