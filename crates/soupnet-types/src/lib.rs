//! Core shared types for the SoupNet peer-to-peer content network.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types — everything lives here.

pub mod config;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// SoupNetError
// ---------------------------------------------------------------------------

/// Central error type for the SoupNet core.
///
/// All crates in the workspace convert their internal errors into variants
/// of this enum, ensuring a unified error handling surface. Errors never
/// carry panics across the command boundary; the orchestrator converts
/// them into [`CommandOutcome`] records.
#[derive(Debug, Error)]
pub enum SoupNetError {
    /// A command precondition failed (validation, authority, balance,
    /// locked wallet, unknown target). No state was mutated.
    #[error("{reason}")]
    InvalidInput {
        /// Human-readable description of the failed precondition.
        reason: String,
    },

    /// A cryptographic operation failed (wrong passphrase, corrupt vault
    /// or backup, signature mismatch).
    #[error("{reason}")]
    Crypto {
        /// Human-readable description of the cryptographic failure.
        reason: String,
    },

    /// A storage or filesystem operation failed.
    #[error("{reason}")]
    Storage {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A gossip or transport operation failed.
    #[error("{reason}")]
    Network {
        /// Human-readable description of the network failure.
        reason: String,
    },

    /// A protocol-level error (canonical form, hex payloads, schema).
    #[error("{reason}")]
    Protocol {
        /// Human-readable description of the protocol failure.
        reason: String,
    },

    /// A configuration value is invalid or missing.
    #[error("{reason}")]
    Config {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// Replay-integrity validation reported issues. The message carries
    /// the backtest detail lines; the orchestrator matches on them to
    /// decide between quarantine and rollback.
    #[error("{reason}")]
    Validation {
        /// Aggregated validator detail lines.
        reason: String,
    },
}

/// Convenience result type using [`SoupNetError`].
pub type Result<T> = std::result::Result<T, SoupNetError>;

// ---------------------------------------------------------------------------
// CommandOutcome
// ---------------------------------------------------------------------------

/// Uniform result record returned by every orchestrator command.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Human-readable status message.
    pub message: String,
    /// Optional payload (event id, path, cid, …) for the embedder.
    pub data: String,
}

impl CommandOutcome {
    /// Builds a successful outcome with an empty data field.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: String::new(),
        }
    }

    /// Builds a successful outcome carrying a data payload.
    pub fn success_with(message: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: data.into(),
        }
    }

    /// Builds a failed outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: String::new(),
        }
    }
}

impl From<SoupNetError> for CommandOutcome {
    fn from(err: SoupNetError) -> Self {
        Self::failure(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Closed tagged union over every event type the log can carry.
///
/// The numeric code embedded in canonical payloads is the declaration
/// order, starting at zero. New kinds append at the end; reordering would
/// change signed payloads across the network.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    RecipeCreated,
    ThreadCreated,
    ReplyCreated,
    ReviewAdded,
    ThumbsUpAdded,
    BlockRewardClaimed,
    RewardTransferred,
    ProfileUpdated,
    KeyRotated,
    ModeratorAdded,
    ModeratorRemoved,
    ContentFlagged,
    ContentHidden,
    ContentUnhidden,
    CoreTopicPinned,
    CoreTopicUnpinned,
    PolicyUpdated,
}

impl EventKind {
    /// All kinds in declaration order.
    pub const ALL: [EventKind; 17] = [
        EventKind::RecipeCreated,
        EventKind::ThreadCreated,
        EventKind::ReplyCreated,
        EventKind::ReviewAdded,
        EventKind::ThumbsUpAdded,
        EventKind::BlockRewardClaimed,
        EventKind::RewardTransferred,
        EventKind::ProfileUpdated,
        EventKind::KeyRotated,
        EventKind::ModeratorAdded,
        EventKind::ModeratorRemoved,
        EventKind::ContentFlagged,
        EventKind::ContentHidden,
        EventKind::ContentUnhidden,
        EventKind::CoreTopicPinned,
        EventKind::CoreTopicUnpinned,
        EventKind::PolicyUpdated,
    ];

    /// Numeric code carried in the canonical payload's `kind` field.
    pub fn code(self) -> u32 {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(0) as u32
    }

    /// Stable wire name used in the event log.
    pub fn name(self) -> &'static str {
        match self {
            Self::RecipeCreated => "RecipeCreated",
            Self::ThreadCreated => "ThreadCreated",
            Self::ReplyCreated => "ReplyCreated",
            Self::ReviewAdded => "ReviewAdded",
            Self::ThumbsUpAdded => "ThumbsUpAdded",
            Self::BlockRewardClaimed => "BlockRewardClaimed",
            Self::RewardTransferred => "RewardTransferred",
            Self::ProfileUpdated => "ProfileUpdated",
            Self::KeyRotated => "KeyRotated",
            Self::ModeratorAdded => "ModeratorAdded",
            Self::ModeratorRemoved => "ModeratorRemoved",
            Self::ContentFlagged => "ContentFlagged",
            Self::ContentHidden => "ContentHidden",
            Self::ContentUnhidden => "ContentUnhidden",
            Self::CoreTopicPinned => "CoreTopicPinned",
            Self::CoreTopicUnpinned => "CoreTopicUnpinned",
            Self::PolicyUpdated => "PolicyUpdated",
        }
    }

    /// Parses a wire name back into a kind. Unknown names are rejected so
    /// that log replay counts them as corrupted lines.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns `true` for events that spend `post_value` when accepted.
    pub fn is_post_kind(self) -> bool {
        matches!(
            self,
            Self::RecipeCreated
                | Self::ThreadCreated
                | Self::ReplyCreated
                | Self::ReviewAdded
                | Self::ThumbsUpAdded
        )
    }

    /// Returns `true` for events handled by the moderation state machine.
    pub fn is_moderation_kind(self) -> bool {
        matches!(
            self,
            Self::ModeratorAdded
                | Self::ModeratorRemoved
                | Self::ContentFlagged
                | Self::ContentHidden
                | Self::ContentUnhidden
                | Self::CoreTopicPinned
                | Self::CoreTopicUnpinned
                | Self::PolicyUpdated
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for EventKind {
    fn default() -> Self {
        Self::RecipeCreated
    }
}

// ---------------------------------------------------------------------------
// EventEnvelope
// ---------------------------------------------------------------------------

/// Signed, content-addressed event as it travels the log and the gossip
/// layer.
///
/// # Invariants
///
/// - `event_id == "evt-" + H(payload)` under the vault's digest.
/// - `verify(payload, signature, pubkey_of(author_cid))` holds.
/// - `payload` is the canonical `key=value\n` form and round-trips exactly.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Content id: `"evt-" + H(payload)`.
    pub event_id: String,
    /// Event tag.
    pub kind: EventKind,
    /// CID of the signer.
    pub author_cid: String,
    /// Wall-clock seconds at signing; strictly monotonic per node.
    pub unix_ts: i64,
    /// Canonical payload (also embeds author/community/chain/network/kind).
    pub payload: String,
    /// Signature over `payload`.
    pub signature: String,
}

// ---------------------------------------------------------------------------
// Drafts (command inputs)
// ---------------------------------------------------------------------------

/// Input for `create_recipe`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub category: String,
    pub title: String,
    pub markdown: String,
    /// Core-menu topics skip the minimum-post-value floor.
    pub core_topic: bool,
    pub menu_segment: String,
    pub value_units: i64,
}

/// Input for `create_thread`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ThreadDraft {
    pub recipe_id: String,
    pub title: String,
    pub markdown: String,
    pub value_units: i64,
}

/// Input for `create_reply`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub thread_id: String,
    pub markdown: String,
    pub value_units: i64,
}

/// Input for `add_review`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub recipe_id: String,
    /// Star rating, 1–5 inclusive.
    pub rating: i32,
    pub markdown: String,
    pub value_units: i64,
}

/// Input for `transfer_rewards` (display-name addressed).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RewardTransferDraft {
    pub to_display_name: String,
    pub amount: i64,
    pub memo: String,
}

/// Input for `transfer_rewards_to_address` (`S…` addressed).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RewardTransferAddressDraft {
    pub to_address: String,
    pub amount: i64,
    pub memo: String,
}

/// Read-only recipe search query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive substring over title and recipe id.
    pub text: String,
    /// Exact category filter; empty matches all.
    pub category: String,
}

// ---------------------------------------------------------------------------
// Materialized view summaries
// ---------------------------------------------------------------------------

/// Materialized recipe row.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub recipe_id: String,
    pub source_event_id: String,
    pub title: String,
    pub category: String,
    pub author_cid: String,
    pub updated_unix: i64,
    pub average_rating: f64,
    pub review_count: i32,
    pub thumbs_up_count: i32,
    pub core_topic: bool,
    pub menu_segment: String,
    pub value_units: i64,
    pub confirmation_count: u64,
    pub confirmation_age_seconds: i64,
}

/// Materialized thread row.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub source_event_id: String,
    pub recipe_id: String,
    pub title: String,
    pub author_cid: String,
    pub updated_unix: i64,
    pub reply_count: i32,
    pub value_units: i64,
    pub confirmation_count: u64,
    pub confirmation_age_seconds: i64,
}

/// Materialized reply row.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplySummary {
    pub reply_id: String,
    pub source_event_id: String,
    pub thread_id: String,
    pub author_cid: String,
    pub markdown: String,
    pub updated_unix: i64,
    pub value_units: i64,
    pub confirmation_count: u64,
    pub confirmation_age_seconds: i64,
}

/// One row of the reward balance ledger.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RewardBalanceSummary {
    pub cid: String,
    /// Display name observed from `ProfileUpdated` events, if any.
    pub display_name: String,
    pub balance: i64,
}

/// One accepted-or-observed `RewardTransferred` event, newest first.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RewardTransactionSummary {
    pub transfer_id: String,
    pub event_id: String,
    pub from_cid: String,
    pub to_cid: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: i64,
    pub fee: i64,
    pub memo: String,
    pub unix_ts: i64,
    pub confirmation_count: u64,
    pub confirmation_age_seconds: i64,
}

/// Local identity as seen by the embedder.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub cid: String,
    pub display_name: String,
    pub bio_markdown: String,
    pub display_name_immortalized: bool,
    pub reject_duplicate_names: bool,
    pub duplicate_name_detected: bool,
    pub duplicate_name_count: usize,
}

/// Receive-side identity bundle (address, keys) for the wallet UI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReceiveAddressInfo {
    pub cid: String,
    pub display_name: String,
    pub address: String,
    pub public_key: String,
    pub private_key: String,
}

/// Result of signing an arbitrary message with the local key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageSignatureSummary {
    pub message: String,
    pub signature: String,
    pub public_key: String,
    pub cid: String,
    pub address: String,
    pub wallet_locked: bool,
}

// ---------------------------------------------------------------------------
// Anonymity transport
// ---------------------------------------------------------------------------

/// Which anonymity transport the node routes through.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AnonymityMode {
    Tor,
    I2p,
}

impl fmt::Display for AnonymityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tor => write!(f, "Tor"),
            Self::I2p => write!(f, "I2P"),
        }
    }
}

/// SOCKS-style proxy endpoint produced by a transport provider.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
}

/// Status record reported by a transport provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnonymityStatus {
    pub running: bool,
    pub mode: String,
    pub version: String,
    pub details: String,
    pub last_started_unix: i64,
    pub last_stopped_unix: i64,
    pub update_count: u64,
    pub endpoint: ProxyEndpoint,
}

/// Runtime counters for the gossip node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeRuntimeStats {
    pub running: bool,
    pub alpha_test_mode: bool,
    pub network: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub proxy_port: u16,
    pub peer_count: usize,
    pub outbound_queue: usize,
    pub seen_event_count: usize,
    pub sync_tick_count: u64,
}

// ---------------------------------------------------------------------------
// Chain configuration
// ---------------------------------------------------------------------------

/// Confirmation and checkpoint policy for the local chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainPolicy {
    /// Minimum confirmations before a block's rewards are claimable.
    pub confirmation_threshold: u64,
    pub fork_choice_rule: String,
    pub max_reorg_depth: u64,
    /// A checkpoint is recorded every this-many block indices.
    pub checkpoint_interval_blocks: u64,
    /// Confirmations a block needs before it qualifies as a checkpoint.
    pub checkpoint_confirmations: u64,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            confirmation_threshold: 1,
            fork_choice_rule: "most-work-then-oldest".into(),
            max_reorg_depth: 6,
            checkpoint_interval_blocks: 288,
            checkpoint_confirmations: 24,
        }
    }
}

/// Size and drift bounds enforced on events and blocks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub max_block_events: usize,
    pub max_block_bytes: usize,
    pub max_event_bytes: usize,
    pub max_future_drift_seconds: i64,
    pub max_past_drift_seconds: i64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_block_events: 512,
            max_block_bytes: 1 << 20,
            max_event_bytes: 64 << 10,
            max_future_drift_seconds: 120,
            max_past_drift_seconds: 7 * 24 * 60 * 60,
        }
    }
}

/// Community moderation policy, seeded from the community profile and
/// overridable by accepted `PolicyUpdated` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModerationPolicy {
    pub moderation_enabled: bool,
    pub require_finality_for_actions: bool,
    pub min_confirmations_for_enforcement: u64,
    pub max_flags_before_auto_hide: usize,
    pub role_model: String,
    pub moderator_cids: Vec<String>,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            moderation_enabled: true,
            require_finality_for_actions: true,
            min_confirmations_for_enforcement: 6,
            max_flags_before_auto_hide: 3,
            role_model: "single-signer".into(),
            moderator_cids: Vec::new(),
        }
    }
}

/// Per-object moderation state, as exposed in status reports.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModerationObjectState {
    pub object_id: String,
    pub flag_count: usize,
    pub hidden: bool,
    pub auto_hidden: bool,
    pub core_topic_pinned: bool,
}

/// Aggregate moderation status for the current community.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModerationStatus {
    pub enabled: bool,
    pub policy: ModerationPolicy,
    pub active_moderators: Vec<String>,
    pub objects: Vec<ModerationObjectState>,
    pub invalid_event_count: usize,
}

/// A pre-credited balance in the genesis spec.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InitialAllocation {
    pub identity: String,
    pub amount: i64,
}

/// The release genesis parameters active for the current network.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenesisSpec {
    pub chain_id: String,
    pub network_id: String,
    pub psz_timestamp: String,
    pub merkle_root: String,
    pub block_hash: String,
    pub seed_peers: Vec<String>,
    pub initial_allocations: Vec<InitialAllocation>,
}

// ---------------------------------------------------------------------------
// Community profile
// ---------------------------------------------------------------------------

/// Persistent description of one community, stored as `#`-commented
/// `key=value` lines under `communities/<id>.dat`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommunityProfile {
    pub community_id: String,
    pub display_name: String,
    pub description: String,
    pub profile_path: String,
    pub cipher_key: String,
    pub peers_dat_path: String,
    pub store_path: String,
    pub minimum_post_value: i64,
    pub block_reward_units: i64,
    pub genesis_psz_timestamp: String,
    pub moderation_enabled: bool,
    pub moderation_require_finality: bool,
    pub moderation_min_confirmations: u64,
    pub moderation_auto_hide_flags: usize,
    pub moderator_cids: Vec<String>,
}

impl Default for CommunityProfile {
    fn default() -> Self {
        Self {
            community_id: String::new(),
            display_name: String::new(),
            description: String::new(),
            profile_path: String::new(),
            cipher_key: String::new(),
            peers_dat_path: String::new(),
            store_path: String::new(),
            minimum_post_value: 0,
            block_reward_units: 50,
            genesis_psz_timestamp: String::new(),
            moderation_enabled: true,
            moderation_require_finality: true,
            moderation_min_confirmations: 6,
            moderation_auto_hide_flags: 3,
            moderator_cids: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health and wallet reports
// ---------------------------------------------------------------------------

/// Store health report surfaced through `node_status().db`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DbHealthReport {
    pub healthy: bool,
    pub details: String,
    pub data_dir: String,
    pub events_file: String,
    pub blockdata_file: String,
    pub snapshot_file: String,
    pub blockdata_format_version: u32,
    pub recovered_from_corruption: bool,
    pub invalid_event_drop_count: usize,
    pub event_count: usize,
    pub recipe_count: usize,
    pub thread_count: usize,
    pub reply_count: usize,
    pub event_log_size_bytes: u64,
    pub consensus_hash: String,
    pub timeline_hash: String,
    pub block_count: usize,
    pub reserved_block_count: usize,
    pub confirmed_block_count: usize,
    pub backfilled_block_count: usize,
    pub block_interval_seconds: u64,
    pub pow_difficulty_nibbles: i32,
    pub last_block_unix: i64,
    pub genesis_psz_timestamp: String,
    pub latest_merkle_root: String,
    pub backtest_ok: bool,
    pub backtest_details: String,
    pub last_backtest_unix: i64,
    pub reward_supply: i64,
    pub issued_reward_total: i64,
    pub burned_fee_total: i64,
    pub max_token_supply: i64,
    pub reward_claim_event_count: usize,
    pub reward_transfer_event_count: usize,
    pub invalid_economic_event_count: usize,
    pub chain_id: String,
    pub network_id: String,
    pub confirmation_threshold: u64,
    pub fork_choice_rule: String,
    pub max_reorg_depth: u64,
    pub checkpoint_interval_blocks: u64,
    pub checkpoint_confirmations: u64,
    pub checkpoint_count: usize,
    pub max_block_events: usize,
    pub max_block_bytes: usize,
    pub max_event_bytes: usize,
    pub max_future_drift_seconds: i64,
    pub max_past_drift_seconds: i64,
    pub moderation_enabled: bool,
    pub moderation_min_confirmations: u64,
    pub moderator_count: usize,
    pub flagged_object_count: usize,
    pub hidden_object_count: usize,
    pub pinned_core_topic_count: usize,
    pub invalid_moderation_event_count: usize,
}

/// Wallet lifecycle state surfaced through `node_status().wallet`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WalletStatusReport {
    pub locked: bool,
    pub destroyed: bool,
    pub recovery_required: bool,
    pub vault_path: String,
    pub backup_last_path: String,
    pub last_unlocked_unix: i64,
    pub last_locked_unix: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_codes_follow_declaration_order() {
        assert_eq!(EventKind::RecipeCreated.code(), 0);
        assert_eq!(EventKind::BlockRewardClaimed.code(), 5);
        assert_eq!(EventKind::PolicyUpdated.code(), 16);
    }

    #[test]
    fn event_kind_name_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("NotAKind"), None);
    }

    #[test]
    fn post_kinds_are_exactly_the_content_events() {
        let posts: Vec<_> = EventKind::ALL
            .into_iter()
            .filter(|k| k.is_post_kind())
            .collect();
        assert_eq!(
            posts,
            vec![
                EventKind::RecipeCreated,
                EventKind::ThreadCreated,
                EventKind::ReplyCreated,
                EventKind::ReviewAdded,
                EventKind::ThumbsUpAdded,
            ]
        );
    }

    #[test]
    fn moderation_kinds_do_not_overlap_post_kinds() {
        for kind in EventKind::ALL {
            assert!(!(kind.is_post_kind() && kind.is_moderation_kind()));
        }
    }

    #[test]
    fn outcome_from_error_carries_message() {
        let outcome: CommandOutcome = SoupNetError::InvalidInput {
            reason: "balance too low".into(),
        }
        .into();
        assert!(!outcome.ok);
        assert!(outcome.message.contains("balance too low"));
    }

    #[test]
    fn default_chain_policy_matches_release_values() {
        let policy = ChainPolicy::default();
        assert_eq!(policy.confirmation_threshold, 1);
        assert_eq!(policy.checkpoint_interval_blocks, 288);
        assert_eq!(policy.checkpoint_confirmations, 24);
        assert_eq!(policy.fork_choice_rule, "most-work-then-oldest");
    }

    #[test]
    fn default_validation_limits_match_release_values() {
        let limits = ValidationLimits::default();
        assert_eq!(limits.max_block_events, 512);
        assert_eq!(limits.max_block_bytes, 1 << 20);
        assert_eq!(limits.max_event_bytes, 64 << 10);
        assert_eq!(limits.max_future_drift_seconds, 120);
        assert_eq!(limits.max_past_drift_seconds, 604_800);
    }

    #[test]
    fn envelope_serde_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let envelope = EventEnvelope {
            event_id: "evt-abc".into(),
            kind: EventKind::ReviewAdded,
            author_cid: "cid-xyz".into(),
            unix_ts: 1_700_000_000,
            payload: "rating=5\n".into(),
            signature: "sig".into(),
        };
        let json = serde_json::to_string(&envelope)?;
        let parsed: EventEnvelope = serde_json::from_str(&json)?;
        assert_eq!(envelope, parsed);
        Ok(())
    }

    #[test]
    fn anonymity_mode_display() {
        assert_eq!(AnonymityMode::Tor.to_string(), "Tor");
        assert_eq!(AnonymityMode::I2p.to_string(), "I2P");
    }
}
