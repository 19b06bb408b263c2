//! Wire-level building blocks shared by the store and the orchestrator:
//! the canonical payload codec, merkle trees, proof-of-work, the reward
//! schedule and soup addresses.
//!
//! Everything here is pure and deterministic; all I/O lives in the
//! storage and service crates.

pub mod address;
pub mod canonical;
pub mod clock;
pub mod merkle;
pub mod pow;
pub mod reward;

pub use address::{soup_address_from_cid, ADDRESS_PREFIX};
pub use canonical::{canonical_join, parse_canonical_map};
pub use clock::unix_timestamp_now;
pub use merkle::compute_merkle_root;
pub use pow::{find_pow_nonce, pow_hash, verify_pow, PowSolution};
pub use reward::{
    expected_claim_reward_for_block, scheduled_reward_for_block, transfer_burn_fee, RewardSchedule,
};
