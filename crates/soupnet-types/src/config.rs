//! Node initialization configuration with release defaults.
//!
//! All operational parameters are centralized here. Every value has a
//! documented default matching the SoupNet release parameters; invalid
//! combinations are rejected by [`InitConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::{
    AnonymityMode, ChainPolicy, InitialAllocation, ModerationPolicy, Result, SoupNetError,
    ValidationLimits,
};

/// Mainnet chain identifier baked into every signed payload.
pub const MAINNET_CHAIN_ID: &str = "got-soup-mainnet-v1";
/// Testnet chain identifier.
pub const TESTNET_CHAIN_ID: &str = "got-soup-testnet-v1";

/// Release genesis anchor text, mainnet.
pub const MAINNET_GENESIS_PSZ: &str = "Got Soup::P2P Tomato Soup mainnet genesis | 2026-02-14";
/// Release genesis anchor text, testnet.
pub const TESTNET_GENESIS_PSZ: &str = "Got Soup::P2P Tomato Soup testnet genesis | 2026-02-14";

/// Pinned mainnet genesis merkle root.
pub const MAINNET_GENESIS_MERKLE_ROOT: &str =
    "31fa9d91e27f722cada145e858f90dcec257d92d2f9105cb4df7a88f3bf0b5f4";
/// Pinned testnet genesis merkle root.
pub const TESTNET_GENESIS_MERKLE_ROOT: &str =
    "15857bf7a332e27ac17388b05300a0b3b493f0fda96e1dae3e2b9fec3fb8b6bd";
/// Pinned mainnet genesis block hash.
pub const MAINNET_GENESIS_BLOCK_HASH: &str =
    "e96890f8c3254ed8926ab119747931cd4f595ccdde71badc857bb2ba7e78b50d";
/// Pinned testnet genesis block hash.
pub const TESTNET_GENESIS_BLOCK_HASH: &str =
    "ead35284e7ce7d379a08e0555e70a6e238a652e6fbdbae6a6b3fbfaf5eb4cd30";

/// Initialization options accepted by `Service::init`.
///
/// Only `app_data_dir` and `passphrase` are required; everything else
/// carries a release default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitConfig {
    /// Root directory for all node state. Required.
    pub app_data_dir: String,
    /// Vault passphrase. Required.
    pub passphrase: String,
    /// Active anonymity transport.
    pub mode: AnonymityMode,
    /// Fallback seed peers applied to whichever network list is empty.
    pub seed_peers: Vec<String>,
    pub seed_peers_mainnet: Vec<String>,
    pub seed_peers_testnet: Vec<String>,

    /// Localhost/testnet mode for development.
    pub alpha_test_mode: bool,
    /// Explicit peers file; empty means derive per community and network.
    pub peers_dat_path: String,
    /// Community id or profile file path; empty means `recipes`.
    pub community_profile_path: String,
    /// Prefer the production vault format and Ed25519 signing.
    pub production_swap: bool,
    /// Seconds between block slots.
    pub block_interval_seconds: u64,
    /// Ticks between scheduled backtest runs.
    pub validation_interval_ticks: u64,
    pub block_reward_units: i64,
    pub minimum_post_value: i64,
    /// Override for the genesis anchor text; empty picks the network default.
    pub genesis_psz_timestamp: String,
    pub mainnet_chain_id: String,
    pub testnet_chain_id: String,
    pub mainnet_genesis_psz_timestamp: String,
    pub testnet_genesis_psz_timestamp: String,
    pub mainnet_genesis_merkle_root: String,
    pub testnet_genesis_merkle_root: String,
    pub mainnet_genesis_block_hash: String,
    pub testnet_genesis_block_hash: String,
    pub mainnet_initial_allocations: Vec<InitialAllocation>,
    pub testnet_initial_allocations: Vec<InitialAllocation>,

    pub chain_policy: ChainPolicy,
    pub validation_limits: ValidationLimits,
    pub default_moderation_policy: ModerationPolicy,
    /// Extra moderator CIDs merged into new community profiles.
    pub default_moderators: Vec<String>,
    pub blockdata_format_version: u32,
    pub enable_snapshots: bool,
    pub snapshot_interval_blocks: u64,
    pub enable_pruning: bool,
    pub prune_keep_recent_blocks: u64,
    pub p2p_mainnet_port: u16,
    pub p2p_testnet_port: u16,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            app_data_dir: String::new(),
            passphrase: String::new(),
            mode: AnonymityMode::Tor,
            seed_peers: Vec::new(),
            seed_peers_mainnet: Vec::new(),
            seed_peers_testnet: Vec::new(),
            alpha_test_mode: false,
            peers_dat_path: String::new(),
            community_profile_path: String::new(),
            production_swap: true,
            block_interval_seconds: 25,
            validation_interval_ticks: 10,
            block_reward_units: 50,
            minimum_post_value: 0,
            genesis_psz_timestamp: String::new(),
            mainnet_chain_id: MAINNET_CHAIN_ID.into(),
            testnet_chain_id: TESTNET_CHAIN_ID.into(),
            mainnet_genesis_psz_timestamp: MAINNET_GENESIS_PSZ.into(),
            testnet_genesis_psz_timestamp: TESTNET_GENESIS_PSZ.into(),
            mainnet_genesis_merkle_root: MAINNET_GENESIS_MERKLE_ROOT.into(),
            testnet_genesis_merkle_root: TESTNET_GENESIS_MERKLE_ROOT.into(),
            mainnet_genesis_block_hash: MAINNET_GENESIS_BLOCK_HASH.into(),
            testnet_genesis_block_hash: TESTNET_GENESIS_BLOCK_HASH.into(),
            mainnet_initial_allocations: Vec::new(),
            testnet_initial_allocations: Vec::new(),
            chain_policy: ChainPolicy::default(),
            validation_limits: ValidationLimits::default(),
            default_moderation_policy: ModerationPolicy::default(),
            default_moderators: Vec::new(),
            blockdata_format_version: 2,
            enable_snapshots: true,
            snapshot_interval_blocks: 128,
            enable_pruning: false,
            prune_keep_recent_blocks: 4096,
            p2p_mainnet_port: 4001,
            p2p_testnet_port: 14001,
        }
    }
}

impl InitConfig {
    /// Validates the required fields and obviously-broken combinations.
    ///
    /// Zero-valued tunables are not errors; the storage layer clamps them
    /// to their floors instead, so an embedder passing `..Default::default()`
    /// with partial overrides keeps working.
    pub fn validate(&self) -> Result<()> {
        if self.app_data_dir.trim().is_empty() {
            return Err(SoupNetError::Config {
                reason: "app_data_dir is required".into(),
            });
        }
        if self.passphrase.is_empty() {
            return Err(SoupNetError::Config {
                reason: "passphrase is required".into(),
            });
        }
        if self.minimum_post_value < 0 {
            return Err(SoupNetError::Config {
                reason: "minimum_post_value cannot be negative".into(),
            });
        }
        if self.block_reward_units < 0 {
            return Err(SoupNetError::Config {
                reason: "block_reward_units cannot be negative".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> InitConfig {
        InitConfig {
            app_data_dir: "/tmp/soupnet".into(),
            passphrase: "pass".into(),
            ..InitConfig::default()
        }
    }

    #[test]
    fn default_config_has_release_identifiers() {
        let config = InitConfig::default();
        assert_eq!(config.mainnet_chain_id, "got-soup-mainnet-v1");
        assert_eq!(config.testnet_chain_id, "got-soup-testnet-v1");
        assert_eq!(config.p2p_mainnet_port, 4001);
        assert_eq!(config.p2p_testnet_port, 14001);
        assert_eq!(config.blockdata_format_version, 2);
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn missing_data_dir_rejected() {
        let config = InitConfig {
            app_data_dir: "  ".into(),
            ..minimal()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_passphrase_rejected() {
        let config = InitConfig {
            passphrase: String::new(),
            ..minimal()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_minimum_post_value_rejected() {
        let config = InitConfig {
            minimum_post_value: -1,
            ..minimal()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn genesis_pins_are_distinct_per_network() {
        let config = InitConfig::default();
        assert_ne!(
            config.mainnet_genesis_merkle_root,
            config.testnet_genesis_merkle_root
        );
        assert_ne!(
            config.mainnet_genesis_block_hash,
            config.testnet_genesis_block_hash
        );
    }
}
