//! The service orchestrator: init sequence, event factory, tick loop,
//! community switching, recovery and status reporting.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use soupnet_crypto::IdentityVault;
use soupnet_node::{make_anonymity_provider, AnonymityProvider, GossipNode};
use soupnet_protocol::address::soup_address_from_cid;
use soupnet_protocol::canonical::{canonical_join, parse_canonical_map};
use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_storage::Store;
use soupnet_types::config::InitConfig;
use soupnet_types::{
    AnonymityMode, AnonymityStatus, ChainPolicy, CommandOutcome, CommunityProfile, DbHealthReport,
    EventEnvelope, EventKind, GenesisSpec, MessageSignatureSummary, ModerationStatus,
    NodeRuntimeStats, ProfileSummary, ProxyEndpoint, ReceiveAddressInfo, RecipeSummary,
    ReplySummary, Result, RewardBalanceSummary, RewardTransactionSummary, SearchQuery,
    SoupNetError, ThreadSummary, ValidationLimits, WalletStatusReport,
};

use crate::community::{sanitize_display_name, split_csv};
use crate::profile_state::ProfileState;
use crate::recovery::{
    has_duplicate_reward_claim_error, quarantine_and_reset_store_dir, should_rebuild_local_store,
};

/// Attempt budget for one reward-claim PoW search.
const MAX_POW_ATTEMPTS: u64 = 2_500_000;

/// Aggregate node status returned by [`Service::node_status`].
#[derive(Clone, Debug)]
pub struct NodeStatusReport {
    pub tor: AnonymityStatus,
    pub i2p: AnonymityStatus,
    pub tor_enabled: bool,
    pub i2p_enabled: bool,
    pub active_mode: AnonymityMode,
    pub alpha_test_mode: bool,
    pub p2p: NodeRuntimeStats,
    pub db: DbHealthReport,
    pub local_reward_balance: i64,
    pub reward_balances: Vec<RewardBalanceSummary>,
    pub moderation: ModerationStatus,
    pub p2p_mainnet_port: u16,
    pub p2p_testnet_port: u16,
    pub data_dir: String,
    pub chain_policy: ChainPolicy,
    pub validation_limits: ValidationLimits,
    pub genesis: GenesisSpec,
    pub wallet: WalletStatusReport,
    pub peers_dat_path: String,
    pub peers: Vec<String>,
    pub community: CommunityProfile,
    pub known_communities: Vec<CommunityProfile>,
    pub core_phase_status: String,
}

/// The embeddable SoupNet core.
///
/// One instance owns one `data_dir` exclusively. Commands complete
/// before returning; the embedder drives [`sync_tick`](Self::sync_tick)
/// on its own cadence.
pub struct Service {
    pub(crate) config: InitConfig,
    pub(crate) communities_dir: PathBuf,
    pub(crate) peers_dat_path: PathBuf,
    pub(crate) profile_state_path: PathBuf,

    pub(crate) initialized: bool,
    pub(crate) tor_enabled: bool,
    pub(crate) i2p_enabled: bool,
    pub(crate) alpha_test_mode: bool,
    pub(crate) active_mode: AnonymityMode,
    pub(crate) profile_state: ProfileState,
    pub(crate) last_local_event_unix_ts: i64,
    pub(crate) validation_interval_ticks: u64,
    pub(crate) ticks_since_last_validation: u64,

    pub(crate) vault: IdentityVault,
    pub(crate) store: Store,
    pub(crate) tor_provider: Box<dyn AnonymityProvider>,
    pub(crate) i2p_provider: Box<dyn AnonymityProvider>,
    pub(crate) node: GossipNode,
    pub(crate) current_community: CommunityProfile,
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl Service {
    pub fn new() -> Self {
        Self {
            config: InitConfig::default(),
            communities_dir: PathBuf::new(),
            peers_dat_path: PathBuf::new(),
            profile_state_path: PathBuf::new(),
            initialized: false,
            tor_enabled: true,
            i2p_enabled: true,
            alpha_test_mode: false,
            active_mode: AnonymityMode::Tor,
            profile_state: ProfileState::default(),
            last_local_event_unix_ts: 0,
            validation_interval_ticks: 10,
            ticks_since_last_validation: 0,
            vault: IdentityVault::default(),
            store: Store::new(),
            tor_provider: make_anonymity_provider(AnonymityMode::Tor),
            i2p_provider: make_anonymity_provider(AnonymityMode::I2p),
            node: GossipNode::default(),
            current_community: CommunityProfile::default(),
        }
    }

    // -- Init -------------------------------------------------------------

    /// Full init sequence: data dirs, vault, profile state, providers,
    /// community selection (which opens the store) and the initial
    /// backtest.
    pub fn init(&mut self, config: InitConfig) -> CommandOutcome {
        self.config = config;
        if self.config.p2p_mainnet_port == 0 {
            self.config.p2p_mainnet_port = 4001;
        }
        if self.config.p2p_testnet_port == 0 {
            self.config.p2p_testnet_port = 14001;
        }

        if self.config.app_data_dir.is_empty() {
            return CommandOutcome::failure("Init failed: app_data_dir is required.");
        }
        if self.config.passphrase.is_empty() {
            return CommandOutcome::failure("Init failed: passphrase is required.");
        }

        let data_dir = PathBuf::from(&self.config.app_data_dir);
        if let Err(e) = fs::create_dir_all(&data_dir) {
            return CommandOutcome::failure(format!(
                "Init failed: unable to create app_data_dir: {e}"
            ));
        }
        if let Err(e) = fs::create_dir_all(data_dir.join("assets")) {
            return CommandOutcome::failure(format!("Init failed: unable to create assets dir: {e}"));
        }

        if let Err(err) = self.vault.initialize(
            &data_dir,
            &self.config.passphrase.clone(),
            self.config.production_swap,
        ) {
            return err.into();
        }

        self.communities_dir = data_dir.join("communities");
        if let Err(e) = fs::create_dir_all(&self.communities_dir) {
            return CommandOutcome::failure(format!(
                "Init failed: unable to create communities dir: {e}"
            ));
        }

        self.profile_state_path = data_dir.join("profile-state.dat");
        self.profile_state = ProfileState::load(&self.profile_state_path);
        self.profile_state.wallet_last_unlocked_unix = self.vault.last_unlocked_unix();

        self.alpha_test_mode = self.config.alpha_test_mode;
        self.active_mode = self.config.mode;
        if self.config.seed_peers_mainnet.is_empty() {
            self.config.seed_peers_mainnet = self.config.seed_peers.clone();
        }
        if self.config.seed_peers_testnet.is_empty() {
            self.config.seed_peers_testnet = self.config.seed_peers_mainnet.clone();
        }
        if self.config.seed_peers_mainnet.is_empty() {
            self.config.seed_peers_mainnet = vec![
                "seed.got-soup.local:4001".into(),
                "24.188.147.247:4001".into(),
            ];
        }
        if self.config.seed_peers_testnet.is_empty() {
            self.config.seed_peers_testnet = vec!["seed.got-soup.local:14001".into()];
        }

        if self.config.genesis_psz_timestamp.is_empty() {
            self.config.genesis_psz_timestamp = if self.use_testnet() {
                self.config.testnet_genesis_psz_timestamp.clone()
            } else {
                self.config.mainnet_genesis_psz_timestamp.clone()
            };
        }

        self.tor_enabled = true;
        self.i2p_enabled = true;
        self.validation_interval_ticks = if self.config.validation_interval_ticks == 0 {
            10
        } else {
            self.config.validation_interval_ticks
        };
        self.ticks_since_last_validation = 0;
        self.profile_state.wallet_destroyed = false;
        self.profile_state.wallet_recovery_required = false;

        self.store.set_block_timing(self.config.block_interval_seconds);
        self.store
            .set_block_reward_units(self.config.block_reward_units);
        self.store.set_chain_policy(self.config.chain_policy.clone());
        self.store.set_validation_limits(self.config.validation_limits);
        self.store
            .set_moderation_policy(self.config.default_moderation_policy.clone());
        self.store.set_state_options(
            self.config.blockdata_format_version,
            self.config.enable_snapshots,
            self.config.snapshot_interval_blocks,
            self.config.enable_pruning,
            self.config.prune_keep_recent_blocks,
        );
        if !self.config.genesis_psz_timestamp.is_empty() {
            let psz = self.config.genesis_psz_timestamp.clone();
            self.store.set_genesis_psz_timestamp(&psz);
        }

        self.tor_provider.set_alpha_test_mode(self.alpha_test_mode);
        self.i2p_provider.set_alpha_test_mode(self.alpha_test_mode);
        if let Err(err) = self.ensure_provider_state(AnonymityMode::Tor, self.tor_enabled) {
            return err.into();
        }
        if let Err(err) = self.ensure_provider_state(AnonymityMode::I2p, self.i2p_enabled) {
            return err.into();
        }

        let community_selector = if self.config.community_profile_path.is_empty() {
            "recipes".to_string()
        } else {
            self.config.community_profile_path.clone()
        };
        if let Err(err) = self.switch_community(&community_selector, "", "") {
            return err.into();
        }

        if let Err(err) = self.run_backtest() {
            return err.into();
        }

        self.initialized = true;
        info!(data_dir = %self.config.app_data_dir, "service initialized");
        CommandOutcome::success(
            "SoupNet service initialized with node status controls, peers.dat and community profiles.",
        )
    }

    // -- Small shared helpers ---------------------------------------------

    /// Whether `init` has completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn use_testnet(&self) -> bool {
        self.alpha_test_mode || self.active_mode == AnonymityMode::I2p
    }

    pub(crate) fn wallet_locked(&self) -> bool {
        !self.vault.ready()
    }

    pub(crate) fn ensure_wallet_unlocked(&self, operation: &str) -> Result<()> {
        if self.wallet_locked() {
            return Err(SoupNetError::InvalidInput {
                reason: format!("Wallet is locked; unlock required before `{operation}`."),
            });
        }
        Ok(())
    }

    pub(crate) fn is_local_moderator(&self) -> bool {
        let local_cid = &self.vault.identity().cid;
        if local_cid.is_empty() {
            return false;
        }
        self.store.is_moderator(local_cid)
            || self.current_community.moderator_cids.contains(local_cid)
    }

    pub(crate) fn ensure_local_moderator(&self, operation: &str) -> Result<()> {
        if !self.current_community.moderation_enabled {
            return Err(SoupNetError::InvalidInput {
                reason: "Moderation is disabled for this community.".into(),
            });
        }
        if !self.is_local_moderator() {
            return Err(SoupNetError::InvalidInput {
                reason: format!("Moderator authority required before `{operation}`."),
            });
        }
        Ok(())
    }

    /// Applies the community's minimum-post-value floor and checks the
    /// spend is affordable. Returns the units that will be burned.
    pub(crate) fn validate_and_apply_post_cost(&self, requested_units: i64) -> Result<i64> {
        if requested_units < 0 {
            return Err(SoupNetError::InvalidInput {
                reason: "Post value cannot be negative.".into(),
            });
        }

        let minimum_required = self.current_community.minimum_post_value.max(0);
        let applied = requested_units.max(minimum_required);
        let balance = self.store.reward_balance(&self.vault.identity().cid);
        if applied > 0 && balance < applied {
            return Err(SoupNetError::InvalidInput {
                reason: "Insufficient reward balance for this post value requirement.".into(),
            });
        }
        Ok(applied)
    }

    pub(crate) fn short_id_hash(&self, material: &str) -> String {
        let digest = self.vault.hash_bytes(material.as_bytes());
        digest[..digest.len().min(16)].to_string()
    }

    pub(crate) fn active_genesis_spec(&self) -> GenesisSpec {
        let testnet = self.use_testnet();
        let mut seeds = if testnet {
            self.config.seed_peers_testnet.clone()
        } else {
            self.config.seed_peers_mainnet.clone()
        };
        if seeds.is_empty() {
            seeds = self.config.seed_peers.clone();
        }

        GenesisSpec {
            chain_id: if testnet {
                self.config.testnet_chain_id.clone()
            } else {
                self.config.mainnet_chain_id.clone()
            },
            network_id: if testnet { "testnet" } else { "mainnet" }.into(),
            psz_timestamp: if !self.config.genesis_psz_timestamp.is_empty() {
                self.config.genesis_psz_timestamp.clone()
            } else if testnet {
                self.config.testnet_genesis_psz_timestamp.clone()
            } else {
                self.config.mainnet_genesis_psz_timestamp.clone()
            },
            merkle_root: if testnet {
                self.config.testnet_genesis_merkle_root.clone()
            } else {
                self.config.mainnet_genesis_merkle_root.clone()
            },
            block_hash: if testnet {
                self.config.testnet_genesis_block_hash.clone()
            } else {
                self.config.mainnet_genesis_block_hash.clone()
            },
            seed_peers: seeds,
            initial_allocations: if testnet {
                self.config.testnet_initial_allocations.clone()
            } else {
                self.config.mainnet_initial_allocations.clone()
            },
        }
    }

    pub(crate) fn save_profile_state(&self) -> Result<()> {
        self.profile_state.save(&self.profile_state_path)
    }

    // -- Event factory ----------------------------------------------------

    /// Builds a signed canonical event. Spins in 2 ms steps until the
    /// wall clock strictly advances past the previous local event, so two
    /// commands issued in order always observe increasing timestamps.
    pub(crate) fn make_event(
        &mut self,
        kind: EventKind,
        mut payload_fields: Vec<(String, String)>,
    ) -> EventEnvelope {
        let now = unix_timestamp_now();
        let mut event_unix_ts = now;
        if event_unix_ts <= self.last_local_event_unix_ts {
            let target = self.last_local_event_unix_ts + 1;
            while event_unix_ts < target {
                thread::sleep(Duration::from_millis(2));
                event_unix_ts = unix_timestamp_now();
            }
        }
        self.last_local_event_unix_ts = event_unix_ts;

        let genesis = self.active_genesis_spec();
        payload_fields.push(("author_cid".into(), self.vault.identity().cid.clone()));
        payload_fields.push((
            "community_id".into(),
            self.current_community.community_id.clone(),
        ));
        payload_fields.push(("chain_id".into(), genesis.chain_id));
        payload_fields.push(("network_id".into(), genesis.network_id));
        payload_fields.push(("kind".into(), kind.code().to_string()));
        payload_fields.push(("unix_ts".into(), event_unix_ts.to_string()));

        let payload = canonical_join(payload_fields);
        EventEnvelope {
            event_id: self.vault.content_id(payload.as_bytes()),
            kind,
            author_cid: self.vault.identity().cid.clone(),
            unix_ts: event_unix_ts,
            signature: self.vault.sign(payload.as_bytes()),
            payload,
        }
    }

    /// Appends a locally-authored event, revalidates the chain and
    /// queues the event for gossip.
    pub(crate) fn append_locally_and_queue(&mut self, event: EventEnvelope) -> CommandOutcome {
        if event.signature.is_empty() {
            return CommandOutcome::failure(
                "Local event signature is empty. Unlock wallet and retry.",
            );
        }
        if let Err(err) = self.store.append_event(&event) {
            return err.into();
        }
        if let Err(err) = self.run_backtest() {
            return err.into();
        }
        self.node.queue_local_event(&event);
        CommandOutcome::success_with("Event appended and queued for sync.", event.event_id)
    }

    pub(crate) fn run_backtest(&mut self) -> Result<String> {
        let vault = &self.vault;
        let content_id_fn = |payload: &str| vault.content_id(payload.as_bytes());
        self.store
            .backtest_validate(&content_id_fn, &self.current_community.community_id.clone())
    }

    // -- Reward claims ----------------------------------------------------

    /// Builds and appends one PoW-backed claim per claimable confirmed
    /// block. A block whose nonce search exhausts the budget simply stays
    /// unclaimed this tick.
    pub(crate) fn try_claim_confirmed_block_rewards(&mut self) -> Result<String> {
        if self.wallet_locked() {
            return Ok("Wallet locked; reward claims paused.".into());
        }
        let local_cid = self.vault.identity().cid.clone();
        if local_cid.is_empty() {
            return Err(SoupNetError::InvalidInput {
                reason: "Reward claim failed: local CID is empty.".into(),
            });
        }

        let claimable_blocks = self.store.claimable_confirmed_blocks();
        if claimable_blocks.is_empty() {
            return Ok("No claimable confirmed blocks.".into());
        }

        let difficulty_nibbles = if self.use_testnet() { 3 } else { 4 };
        let mut claimed_any = false;
        for block in claimable_blocks {
            let reward_units = self.store.next_claim_reward(block.index);
            if reward_units <= 0 {
                continue;
            }

            let pow_material = format!(
                "{}|{local_cid}|{}|{}|{}",
                self.current_community.community_id,
                block.index,
                block.block_hash,
                block.merkle_root
            );
            let Some(solution) =
                soupnet_protocol::pow::find_pow_nonce(&pow_material, difficulty_nibbles, MAX_POW_ATTEMPTS)
            else {
                continue;
            };

            let claim_id = format!(
                "clm-{}",
                self.short_id_hash(&format!(
                    "{}{local_cid}{}{}",
                    self.current_community.community_id, block.index, block.block_hash
                ))
            );
            let witness_root = soupnet_crypto::sha256_hex(
                format!(
                    "{local_cid}|{}|{reward_units}|{}",
                    block.index, solution.hash
                )
                .as_bytes(),
            );

            let claim = self.make_event(
                EventKind::BlockRewardClaimed,
                vec![
                    ("claim_id".into(), claim_id),
                    ("block_index".into(), block.index.to_string()),
                    ("reward".into(), reward_units.to_string()),
                    ("pow_difficulty".into(), difficulty_nibbles.to_string()),
                    ("pow_nonce".into(), solution.nonce.to_string()),
                    ("pow_material".into(), pow_material),
                    ("pow_hash".into(), solution.hash.clone()),
                    ("witness_root".into(), witness_root),
                    ("block_hash".into(), block.block_hash.clone()),
                    ("merkle_root".into(), block.merkle_root.clone()),
                    ("psz_timestamp".into(), block.psz_timestamp.clone()),
                ],
            );

            self.store.append_event(&claim)?;
            self.node.queue_local_event(&claim);
            claimed_any = true;
            info!(block_index = block.index, reward_units, "claimed block reward");
        }

        if !claimed_any {
            return Ok("No reward claims generated.".into());
        }
        self.run_backtest()
    }

    // -- Tick -------------------------------------------------------------

    /// One cooperative tick: confirm due blocks, claim rewards, run the
    /// scheduled backtest and flush the gossip queue. Returns the events
    /// that would be published this tick.
    pub fn sync_tick(&mut self) -> Vec<EventEnvelope> {
        if self
            .store
            .routine_block_check(unix_timestamp_now())
            .is_err()
        {
            return Vec::new();
        }

        if self.try_claim_confirmed_block_rewards().is_err() {
            return Vec::new();
        }

        self.ticks_since_last_validation += 1;
        if self.ticks_since_last_validation >= self.validation_interval_ticks {
            // Keep the network tick alive even if validation reports issues.
            let _ = self.run_backtest();
            self.ticks_since_last_validation = 0;
        }

        self.node.sync_tick()
    }

    /// Ingests an event received from a peer. Duplicates are ignored
    /// successfully; new events go through full append validation.
    pub fn ingest_remote_event(&mut self, event: &EventEnvelope) -> CommandOutcome {
        if !self.node.ingest_remote_event(event) {
            return CommandOutcome::success("Duplicate or ignored remote event.");
        }
        if event.signature.is_empty() {
            return CommandOutcome::failure("Remote event signature is missing.");
        }
        match self.store.append_event(event) {
            Ok(()) => CommandOutcome::success_with("Remote event appended.", event.event_id.clone()),
            Err(err) => err.into(),
        }
    }

    // -- Network plumbing -------------------------------------------------

    pub(crate) fn ensure_provider_state(
        &mut self,
        mode: AnonymityMode,
        enabled: bool,
    ) -> Result<()> {
        let alpha = self.alpha_test_mode;
        let provider = match mode {
            AnonymityMode::Tor => &mut self.tor_provider,
            AnonymityMode::I2p => &mut self.i2p_provider,
        };
        provider.set_alpha_test_mode(alpha);

        if !enabled {
            provider.stop();
            return Ok(());
        }
        if provider.status().running {
            return Ok(());
        }
        provider.start()
    }

    pub(crate) fn active_proxy_endpoint(&self) -> ProxyEndpoint {
        if self.active_mode == AnonymityMode::I2p && self.i2p_enabled {
            return self.i2p_provider.proxy_endpoint();
        }
        if self.tor_enabled {
            return self.tor_provider.proxy_endpoint();
        }
        if self.i2p_enabled {
            return self.i2p_provider.proxy_endpoint();
        }
        ProxyEndpoint::default()
    }

    pub(crate) fn restart_network(&mut self) -> Result<()> {
        self.node.stop();

        if !self.tor_enabled && !self.i2p_enabled {
            // No active anonymity providers; the node stays offline.
            return Ok(());
        }

        if self.active_mode == AnonymityMode::Tor && !self.tor_enabled && self.i2p_enabled {
            self.active_mode = AnonymityMode::I2p;
        }
        if self.active_mode == AnonymityMode::I2p && !self.i2p_enabled && self.tor_enabled {
            self.active_mode = AnonymityMode::Tor;
        }

        let endpoint = self.active_proxy_endpoint();
        if endpoint.host.is_empty() || endpoint.port == 0 {
            return Err(SoupNetError::Network {
                reason: "Unable to restart P2P node: no active proxy endpoint.".into(),
            });
        }

        let testnet = self.use_testnet();
        let p2p_port = if testnet {
            self.config.p2p_testnet_port
        } else {
            self.config.p2p_mainnet_port
        };
        let network_name = if testnet { "testnet" } else { "mainnet" };
        let mut seeds = if testnet {
            self.config.seed_peers_testnet.clone()
        } else {
            self.config.seed_peers_mainnet.clone()
        };
        if seeds.is_empty() {
            seeds = self.config.seed_peers.clone();
        }
        if self.alpha_test_mode {
            seeds.push(format!("127.0.0.1:{p2p_port}"));
        }

        let local_cid = self.vault.identity().cid.clone();
        self.node.start(
            &seeds,
            endpoint,
            &local_cid,
            self.alpha_test_mode,
            p2p_port,
            network_name,
        )
    }

    // -- Community switching ----------------------------------------------

    /// Loads or creates a community profile, retargets the store, peers
    /// file and network at it, and validates the resulting chain,
    /// quarantining or rolling back as the validator dictates.
    pub(crate) fn switch_community(
        &mut self,
        community_or_path: &str,
        display_name: &str,
        description: &str,
    ) -> Result<String> {
        self.load_or_create_community_profile(community_or_path, display_name, description)?;

        let testnet = self.use_testnet();
        let network_suffix = if testnet { "testnet" } else { "mainnet" };
        let chain_id = if testnet {
            self.config.testnet_chain_id.clone()
        } else {
            self.config.mainnet_chain_id.clone()
        };
        let genesis_merkle = if testnet {
            self.config.testnet_genesis_merkle_root.clone()
        } else {
            self.config.mainnet_genesis_merkle_root.clone()
        };
        let genesis_block_hash = if testnet {
            self.config.testnet_genesis_block_hash.clone()
        } else {
            self.config.mainnet_genesis_block_hash.clone()
        };
        let genesis_psz = if testnet {
            self.config.testnet_genesis_psz_timestamp.clone()
        } else {
            self.config.mainnet_genesis_psz_timestamp.clone()
        };

        self.store.set_chain_identity(&chain_id, network_suffix);
        self.store
            .set_genesis_hashes(&genesis_merkle, &genesis_block_hash);
        self.store.set_chain_policy(self.config.chain_policy.clone());
        self.store.set_validation_limits(self.config.validation_limits);
        self.store
            .set_moderation_policy(moderation_policy_from_profile(&self.current_community));
        self.store.set_state_options(
            self.config.blockdata_format_version,
            self.config.enable_snapshots,
            self.config.snapshot_interval_blocks,
            self.config.enable_pruning,
            self.config.prune_keep_recent_blocks,
        );
        self.store.set_pow_difficulty_nibbles(if testnet { 3 } else { 4 });

        let reward_units = if self.current_community.block_reward_units <= 0 {
            if self.config.block_reward_units <= 0 {
                115
            } else {
                self.config.block_reward_units
            }
        } else {
            self.current_community.block_reward_units
        };
        self.store.set_block_reward_units(reward_units);

        // The release genesis anchor is authoritative for this node.
        let effective_psz = if !genesis_psz.is_empty() {
            genesis_psz.clone()
        } else {
            self.config.genesis_psz_timestamp.clone()
        };
        if !effective_psz.is_empty() {
            self.store.set_genesis_psz_timestamp(&effective_psz);
            if self.current_community.genesis_psz_timestamp != effective_psz {
                self.current_community.genesis_psz_timestamp = effective_psz.clone();
                self.write_community_profile_file(&self.current_community.clone())?;
            }
        }

        let effective_store_path = self.resolve_data_path(
            &format!("{}-{network_suffix}", self.current_community.store_path),
            &format!("db-{}", self.current_community.community_id),
        );
        let store_key = self.vault.derive_vault_key(
            &self.config.passphrase,
            &format!(
                "store:{}:{network_suffix}",
                self.current_community.community_id
            ),
        );

        let mut store_result = self.store.open(&effective_store_path, &store_key);
        if let Err(err) = &store_result {
            if should_rebuild_local_store(&err.to_string()) {
                quarantine_and_reset_store_dir(
                    Path::new(&self.config.app_data_dir),
                    &effective_store_path,
                    &err.to_string(),
                )?;
                store_result = self.store.open(&effective_store_path, &store_key);
            }
        }
        store_result?;

        // A mismatched release genesis means this directory belongs to a
        // different chain lineage.
        let genesis_mismatch = match self.store.all_blocks().first() {
            Some(genesis_block) => {
                let merkle_differs = !genesis_merkle.is_empty()
                    && !genesis_block.merkle_root.is_empty()
                    && genesis_block.merkle_root != genesis_merkle;
                let hash_differs = !genesis_block_hash.is_empty()
                    && !genesis_block.block_hash.is_empty()
                    && genesis_block.block_hash != genesis_block_hash;
                let psz_differs = !genesis_psz.is_empty()
                    && !genesis_block.psz_timestamp.is_empty()
                    && genesis_block.psz_timestamp != genesis_psz;
                merkle_differs || hash_differs || psz_differs
            }
            None => false,
        };
        if genesis_mismatch {
            warn!("genesis release spec mismatch; quarantining store");
            quarantine_and_reset_store_dir(
                Path::new(&self.config.app_data_dir),
                &effective_store_path,
                "Genesis release spec mismatch.",
            )?;
            self.store.open(&effective_store_path, &store_key)?;
        }

        self.store.routine_block_check(unix_timestamp_now())?;

        let base_peers_path = if self.config.peers_dat_path.is_empty() {
            self.current_community.peers_dat_path.clone()
        } else {
            self.config.peers_dat_path.clone()
        };
        let base_trimmed = base_peers_path
            .strip_suffix(".dat")
            .unwrap_or(&base_peers_path)
            .to_string();
        self.peers_dat_path = self.resolve_data_path(
            &format!("{base_trimmed}.{network_suffix}.dat"),
            &format!(
                "peers-{}.{network_suffix}.dat",
                self.current_community.community_id
            ),
        );

        // Reset peer state when switching communities, then load the
        // external peers file.
        self.node = GossipNode::default();
        self.node.load_peers_dat(&self.peers_dat_path.clone())?;
        self.restart_network()?;
        self.node.save_peers_dat(&self.peers_dat_path.clone())?;

        let mut validation = self.run_backtest();
        if let Err(err) = &validation {
            if has_duplicate_reward_claim_error(&err.to_string()) {
                self.store
                    .rollback_to_last_checkpoint("duplicate reward-claim conflict")?;
                self.store.routine_block_check(unix_timestamp_now())?;
                validation = self.run_backtest();
            }
        }
        if let Err(err) = &validation {
            if should_rebuild_local_store(&err.to_string()) {
                quarantine_and_reset_store_dir(
                    Path::new(&self.config.app_data_dir),
                    &effective_store_path,
                    &err.to_string(),
                )?;
                self.store.open(&effective_store_path, &store_key)?;
                self.store.routine_block_check(unix_timestamp_now())?;
                validation = self.run_backtest();
            }
        }

        validation
    }

    // -- Observed identities ----------------------------------------------

    /// Display names observed on the log (`ProfileUpdated` events), with
    /// the local cached name overlaid.
    pub(crate) fn observed_display_names_by_cid(
        &self,
    ) -> std::collections::HashMap<String, String> {
        let mut names = std::collections::HashMap::new();
        for event in self.store.all_events() {
            if event.kind != EventKind::ProfileUpdated {
                continue;
            }
            let payload = parse_canonical_map(&event.payload);
            let Some(raw_name) = payload.get("display_name") else {
                continue;
            };
            let name = sanitize_display_name(raw_name);
            if !name.is_empty() {
                names.insert(event.author_cid.clone(), name);
            }
        }

        if !self.profile_state.display_name.is_empty() {
            names.insert(
                self.vault.identity().cid.clone(),
                self.profile_state.display_name.clone(),
            );
        }
        names
    }

    pub(crate) fn resolve_display_name_to_cid(&self, display_name: &str) -> Option<String> {
        let normalized = sanitize_display_name(display_name).to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        let observed = self.observed_display_names_by_cid();
        let mut matched: Option<String> = None;
        for (cid, name) in observed {
            if name.to_lowercase() != normalized {
                continue;
            }
            if let Some(existing) = &matched {
                if existing != &cid {
                    // Ambiguous name; refuse to guess.
                    return None;
                }
            }
            matched = Some(cid);
        }
        matched
    }

    pub(crate) fn resolve_address_to_cid(&self, address: &str) -> Option<String> {
        let needle = address.trim();
        if needle.is_empty() {
            return None;
        }

        let own_cid = self.vault.identity().cid.clone();
        if soup_address_from_cid(&own_cid) == needle {
            return Some(own_cid);
        }

        for balance in self.store.reward_balance_summaries() {
            if soup_address_from_cid(&balance.cid) == needle {
                return Some(balance.cid);
            }
        }

        for cid in self.observed_display_names_by_cid().into_keys() {
            if soup_address_from_cid(&cid) == needle {
                return Some(cid);
            }
        }

        None
    }

    // -- Read-only views --------------------------------------------------

    pub fn search(&self, query: &SearchQuery) -> Vec<RecipeSummary> {
        self.store.query_recipes(query)
    }

    pub fn threads(&self, recipe_id: &str) -> Vec<ThreadSummary> {
        self.store.query_threads(recipe_id)
    }

    pub fn replies(&self, thread_id: &str) -> Vec<ReplySummary> {
        self.store.query_replies(thread_id)
    }

    /// All observed reward transfers, newest first.
    pub fn reward_transactions(&self) -> Vec<RewardTransactionSummary> {
        let mut out = Vec::new();
        for event in self.store.all_events() {
            if event.kind != EventKind::RewardTransferred {
                continue;
            }
            let payload = parse_canonical_map(&event.payload);
            let (Some(to_cid), Some(amount)) = (payload.get("to_cid"), payload.get("amount"))
            else {
                continue;
            };

            let (confirmation_count, confirmation_age_seconds) = self
                .store
                .confirmation_metrics_for_event(&event.event_id, event.unix_ts)
                .unwrap_or((0, 0));

            let from_address = soup_address_from_cid(&event.author_cid);
            out.push(RewardTransactionSummary {
                transfer_id: payload.get("transfer_id").cloned().unwrap_or_default(),
                event_id: event.event_id.clone(),
                from_cid: event.author_cid.clone(),
                to_cid: to_cid.clone(),
                from_address,
                to_address: payload
                    .get("to_address")
                    .cloned()
                    .unwrap_or_else(|| soup_address_from_cid(to_cid)),
                amount: amount.parse().unwrap_or(0),
                fee: payload
                    .get("fee")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0),
                memo: payload.get("memo").cloned().unwrap_or_default(),
                unix_ts: event.unix_ts,
                confirmation_count,
                confirmation_age_seconds,
            });
        }

        out.sort_by(|lhs, rhs| {
            rhs.unix_ts
                .cmp(&lhs.unix_ts)
                .then(rhs.event_id.cmp(&lhs.event_id))
        });
        out
    }

    pub fn profile(&self) -> ProfileSummary {
        let observed = self.observed_display_names_by_cid();
        let own_cid = self.vault.identity().cid.clone();

        let mut display_name = self.profile_state.display_name.clone();
        if display_name.is_empty() {
            if let Some(name) = observed.get(&own_cid) {
                display_name = name.clone();
            }
        }
        if display_name.is_empty() {
            display_name = "SoupNet User".into();
        }

        let target = display_name.to_lowercase();
        let duplicate_count = observed
            .iter()
            .filter(|(cid, name)| **cid != own_cid && name.to_lowercase() == target)
            .count();

        let bio = format!(
            "Pseudonymous contributor in community `{}`.\n\
             Duplicate-name policy: {}\n\
             Display name state: {}\n\
             Reward balance: {}",
            self.current_community.community_id,
            if self.profile_state.reject_duplicate_names {
                "REJECT"
            } else {
                "ALLOW"
            },
            if self.profile_state.display_name_immortalized {
                "IMMORTALIZED"
            } else {
                "not set"
            },
            self.store.reward_balance(&own_cid)
        );

        ProfileSummary {
            cid: own_cid,
            display_name,
            bio_markdown: bio,
            display_name_immortalized: self.profile_state.display_name_immortalized,
            reject_duplicate_names: self.profile_state.reject_duplicate_names,
            duplicate_name_detected: duplicate_count > 0,
            duplicate_name_count: duplicate_count,
        }
    }

    pub fn anonymity_status(&self) -> AnonymityStatus {
        if self.active_mode == AnonymityMode::I2p {
            self.i2p_provider.status()
        } else {
            self.tor_provider.status()
        }
    }

    pub fn node_status(&self) -> NodeStatusReport {
        NodeStatusReport {
            tor: self.tor_provider.status(),
            i2p: self.i2p_provider.status(),
            tor_enabled: self.tor_enabled,
            i2p_enabled: self.i2p_enabled,
            active_mode: self.active_mode,
            alpha_test_mode: self.alpha_test_mode,
            p2p: self.node.runtime_status(),
            db: self.store.health_report(),
            local_reward_balance: self.store.reward_balance(&self.vault.identity().cid),
            reward_balances: self.reward_balances(),
            moderation: self.store.moderation_status(),
            p2p_mainnet_port: self.config.p2p_mainnet_port,
            p2p_testnet_port: self.config.p2p_testnet_port,
            data_dir: self.config.app_data_dir.clone(),
            chain_policy: self.config.chain_policy.clone(),
            validation_limits: self.config.validation_limits,
            genesis: self.active_genesis_spec(),
            wallet: WalletStatusReport {
                locked: self.wallet_locked(),
                destroyed: self.profile_state.wallet_destroyed,
                recovery_required: self.profile_state.wallet_recovery_required,
                vault_path: self.vault.vault_path(),
                backup_last_path: self.profile_state.last_key_backup_path.clone(),
                last_unlocked_unix: self.profile_state.wallet_last_unlocked_unix,
                last_locked_unix: self.profile_state.wallet_last_locked_unix,
            },
            peers_dat_path: self.peers_dat_path.display().to_string(),
            peers: self.node.peers().to_vec(),
            community: self.current_community.clone(),
            known_communities: self.community_profiles(),
            core_phase_status: self.vault.core_phase_status(),
        }
    }

    pub fn local_reward_balance(&self) -> i64 {
        self.store.reward_balance(&self.vault.identity().cid)
    }

    /// Balances joined with observed display names.
    pub fn reward_balances(&self) -> Vec<RewardBalanceSummary> {
        let mut balances = self.store.reward_balance_summaries();
        let names = self.observed_display_names_by_cid();
        for entry in &mut balances {
            if let Some(name) = names.get(&entry.cid) {
                entry.display_name = name.clone();
            }
        }
        balances
    }

    pub fn receive_info(&self) -> ReceiveAddressInfo {
        let cid = self.vault.identity().cid.clone();
        ReceiveAddressInfo {
            address: soup_address_from_cid(&cid),
            cid,
            display_name: self.profile_state.display_name.clone(),
            public_key: self.vault.identity().public_key.clone(),
            private_key: self.vault.identity().private_key.clone(),
        }
    }

    pub fn soup_address(&self) -> String {
        soup_address_from_cid(&self.vault.identity().cid)
    }

    pub fn public_key(&self) -> String {
        self.vault.identity().public_key.clone()
    }

    pub fn private_key(&self) -> String {
        self.vault.identity().private_key.clone()
    }

    pub fn sign_message(&self, message: &str) -> MessageSignatureSummary {
        let cid = self.vault.identity().cid.clone();
        MessageSignatureSummary {
            message: message.to_string(),
            signature: self.vault.sign(message.as_bytes()),
            public_key: self.vault.identity().public_key.clone(),
            address: soup_address_from_cid(&cid),
            cid,
            wallet_locked: self.wallet_locked(),
        }
    }

    pub fn verify_message_signature(
        &self,
        message: &str,
        signature: &str,
        public_key: &str,
    ) -> bool {
        if message.is_empty() || signature.is_empty() || public_key.is_empty() {
            return false;
        }
        self.vault.verify(message.as_bytes(), signature, public_key)
    }

    pub fn moderation_status(&self) -> ModerationStatus {
        self.store.moderation_status()
    }

    pub fn current_community(&self) -> CommunityProfile {
        self.current_community.clone()
    }
}

/// Maps a community profile's moderation fields onto the store policy.
pub(crate) fn moderation_policy_from_profile(
    profile: &CommunityProfile,
) -> soupnet_types::ModerationPolicy {
    soupnet_types::ModerationPolicy {
        moderation_enabled: profile.moderation_enabled,
        require_finality_for_actions: profile.moderation_require_finality,
        min_confirmations_for_enforcement: profile.moderation_min_confirmations,
        max_flags_before_auto_hide: profile.moderation_auto_hide_flags,
        role_model: "single-signer".into(),
        moderator_cids: split_csv(&profile.moderator_cids.join(",")),
    }
}
