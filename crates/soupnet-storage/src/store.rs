//! Store lifecycle, event persistence, rollback and the health report.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use soupnet_crypto::sha256_hex;
use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_protocol::reward::RewardSchedule;
use soupnet_types::{
    ChainPolicy, DbHealthReport, EventEnvelope, ModerationPolicy, RecipeSummary, ReplySummary,
    Result, SoupNetError, ThreadSummary, ValidationLimits,
};

use crate::record::{
    parse_block_line, parse_event_line, serialize_block_line, serialize_event_line, BlockRecord,
};

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

const EVENT_LOG_FILE: &str = "events.log";
const BLOCK_LOG_FILE: &str = "blockdata.dat";
const LEGACY_BLOCK_LOG_FILE: &str = "blocks.log";
const INVALID_EVENT_LOG_FILE: &str = "invalid-events.log";
const SNAPSHOT_FILE: &str = "state.snapshot";
const CHECKPOINTS_FILE: &str = "checkpoints.dat";
const BLOCK_HEADER_PREFIX: &str = "# got-soup blockdata";

fn storage_err(reason: impl Into<String>) -> SoupNetError {
    SoupNetError::Storage {
        reason: reason.into(),
    }
}

/// Digest used for merkle leaves, content hashes and chain hashes.
///
/// Always SHA-256, independent of the vault's compatibility fallback, so
/// the timeline is comparable across peers in either crypto mode.
pub(crate) fn stable_hash(payload: &str) -> String {
    sha256_hex(payload.as_bytes())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One community's event log, block timeline and materialized views.
///
/// All mutating entry points leave the on-disk files consistent with the
/// in-memory state before returning. Two instances over the same
/// directory are undefined behavior; the embedder owns exclusivity.
#[derive(Default)]
pub struct Store {
    pub(crate) app_data_dir: PathBuf,
    pub(crate) event_log_path: PathBuf,
    pub(crate) block_log_path: PathBuf,
    pub(crate) invalid_event_log_path: PathBuf,
    pub(crate) snapshot_path: PathBuf,
    pub(crate) checkpoints_path: PathBuf,

    pub(crate) events: Vec<EventEnvelope>,
    pub(crate) blocks: Vec<BlockRecord>,
    pub(crate) event_to_block: HashMap<String, usize>,

    pub(crate) recipes: HashMap<String, RecipeSummary>,
    pub(crate) threads: HashMap<String, ThreadSummary>,
    pub(crate) replies_by_thread: HashMap<String, Vec<ReplySummary>>,
    pub(crate) review_totals: HashMap<String, (i32, i32)>,
    pub(crate) thumbs_up_totals: HashMap<String, i32>,
    pub(crate) reward_balances: HashMap<String, i64>,
    pub(crate) claimed_blocks: HashMap<u64, String>,
    pub(crate) transfer_nonce_by_cid: HashMap<String, u64>,
    pub(crate) invalid_economic_events: HashMap<String, String>,
    pub(crate) invalid_moderation_events: HashMap<String, String>,
    pub(crate) moderators: HashSet<String>,
    pub(crate) moderation_flag_counts: HashMap<String, usize>,
    pub(crate) moderation_hidden_objects: HashSet<String>,
    pub(crate) moderation_auto_hidden_objects: HashSet<String>,
    pub(crate) moderation_core_topic_overrides: HashMap<String, bool>,

    pub(crate) issued_reward_total: i64,
    pub(crate) burned_fee_total: i64,

    pub(crate) block_interval_seconds: u64,
    pub(crate) reward_schedule: RewardSchedule,
    pub(crate) pow_difficulty_nibbles: i32,
    pub(crate) chain_id: String,
    pub(crate) network_id: String,
    pub(crate) genesis_psz_timestamp: String,
    pub(crate) hardcoded_genesis_merkle_root: String,
    pub(crate) hardcoded_genesis_block_hash: String,
    pub(crate) chain_policy: ChainPolicy,
    pub(crate) validation_limits: ValidationLimits,
    pub(crate) moderation_policy: ModerationPolicy,
    pub(crate) blockdata_format_version: u32,
    pub(crate) enable_snapshots: bool,
    pub(crate) snapshot_interval_blocks: u64,
    pub(crate) enable_pruning: bool,
    pub(crate) prune_keep_recent_blocks: u64,

    pub(crate) invalid_event_drop_count: usize,
    pub(crate) recovered_from_corruption: bool,
    pub(crate) checkpoint_count: usize,
    pub(crate) backtest_ok: bool,
    pub(crate) backtest_details: String,
    pub(crate) last_backtest_unix: i64,
}

impl Store {
    /// A store with release defaults, not yet bound to a directory.
    pub fn new() -> Self {
        Self {
            block_interval_seconds: 150,
            reward_schedule: RewardSchedule::default(),
            pow_difficulty_nibbles: 4,
            chain_id: "got-soup-mainnet-v1".into(),
            network_id: "mainnet".into(),
            chain_policy: ChainPolicy::default(),
            validation_limits: ValidationLimits::default(),
            moderation_policy: ModerationPolicy::default(),
            blockdata_format_version: 2,
            enable_snapshots: true,
            snapshot_interval_blocks: 128,
            prune_keep_recent_blocks: 4096,
            backtest_details: "Backtest has not run.".into(),
            ..Self::default()
        }
    }

    // -- Configuration ----------------------------------------------------

    pub fn set_block_timing(&mut self, block_interval_seconds: u64) {
        self.block_interval_seconds = if block_interval_seconds == 0 {
            150
        } else {
            block_interval_seconds
        };
    }

    pub fn set_genesis_psz_timestamp(&mut self, psz_timestamp: &str) {
        self.genesis_psz_timestamp = psz_timestamp.to_string();
    }

    pub fn set_block_reward_units(&mut self, units: i64) {
        self.reward_schedule = RewardSchedule {
            block_reward_units: if units <= 0 { 115 } else { units },
            ..RewardSchedule::default()
        };
    }

    pub fn set_pow_difficulty_nibbles(&mut self, nibbles: i32) {
        self.pow_difficulty_nibbles = nibbles.max(1);
    }

    pub fn set_chain_identity(&mut self, chain_id: &str, network_id: &str) {
        if !chain_id.is_empty() {
            self.chain_id = chain_id.to_string();
        }
        if !network_id.is_empty() {
            self.network_id = network_id.to_string();
        }
    }

    pub fn set_genesis_hashes(&mut self, merkle_root: &str, block_hash: &str) {
        self.hardcoded_genesis_merkle_root = merkle_root.to_string();
        self.hardcoded_genesis_block_hash = block_hash.to_string();
    }

    pub fn set_chain_policy(&mut self, policy: ChainPolicy) {
        self.chain_policy = policy;
        if self.chain_policy.confirmation_threshold == 0 {
            self.chain_policy.confirmation_threshold = 1;
        }
        if self.chain_policy.max_reorg_depth == 0 {
            self.chain_policy.max_reorg_depth = 1;
        }
        if self.chain_policy.checkpoint_interval_blocks == 0 {
            self.chain_policy.checkpoint_interval_blocks = 288;
        }
        if self.chain_policy.checkpoint_confirmations == 0 {
            self.chain_policy.checkpoint_confirmations = 24;
        }
        if self.chain_policy.fork_choice_rule.is_empty() {
            self.chain_policy.fork_choice_rule = "most-work-then-oldest".into();
        }
    }

    pub fn set_validation_limits(&mut self, limits: ValidationLimits) {
        self.validation_limits = ValidationLimits {
            max_block_events: limits.max_block_events.max(1),
            max_block_bytes: limits.max_block_bytes.max(1024),
            max_event_bytes: limits.max_event_bytes.max(256),
            max_future_drift_seconds: limits.max_future_drift_seconds.max(0),
            max_past_drift_seconds: limits.max_past_drift_seconds.max(0),
        };
    }

    pub fn set_moderation_policy(&mut self, policy: ModerationPolicy) {
        let mut policy = policy;
        policy.min_confirmations_for_enforcement =
            policy.min_confirmations_for_enforcement.max(1);
        policy.max_flags_before_auto_hide = policy.max_flags_before_auto_hide.max(1);
        if policy.role_model.is_empty() {
            policy.role_model = "single-signer".into();
        }

        let mut unique = HashSet::new();
        let mut sanitized: Vec<String> = policy
            .moderator_cids
            .iter()
            .map(|cid| cid.trim().to_string())
            .filter(|cid| !cid.is_empty())
            .filter(|cid| unique.insert(cid.clone()))
            .collect();
        sanitized.sort();
        policy.moderator_cids = sanitized;
        self.moderation_policy = policy;
    }

    pub fn set_state_options(
        &mut self,
        blockdata_format_version: u32,
        enable_snapshots: bool,
        snapshot_interval_blocks: u64,
        enable_pruning: bool,
        prune_keep_recent_blocks: u64,
    ) {
        self.blockdata_format_version = if blockdata_format_version == 0 {
            2
        } else {
            blockdata_format_version
        };
        self.enable_snapshots = enable_snapshots;
        self.snapshot_interval_blocks = if snapshot_interval_blocks == 0 {
            128
        } else {
            snapshot_interval_blocks
        };
        self.enable_pruning = enable_pruning;
        self.prune_keep_recent_blocks = if prune_keep_recent_blocks == 0 {
            4096
        } else {
            prune_keep_recent_blocks
        };
    }

    // -- Open -------------------------------------------------------------

    /// Opens (or creates) the store directory, replays both logs, reassigns
    /// orphan events, recomputes hashes and persists the derived files.
    ///
    /// The `_vault_key` reserves the slot for at-rest encryption of future
    /// formats; current formats are plaintext line files.
    pub fn open(&mut self, app_data_dir: &Path, _vault_key: &str) -> Result<()> {
        self.app_data_dir = app_data_dir.to_path_buf();
        fs::create_dir_all(app_data_dir)
            .map_err(|e| storage_err(format!("Failed to create store directory: {e}")))?;

        self.event_log_path = app_data_dir.join(EVENT_LOG_FILE);
        self.block_log_path = app_data_dir.join(BLOCK_LOG_FILE);
        self.invalid_event_log_path = app_data_dir.join(INVALID_EVENT_LOG_FILE);
        self.snapshot_path = app_data_dir.join(SNAPSHOT_FILE);
        self.checkpoints_path = app_data_dir.join(CHECKPOINTS_FILE);
        self.invalid_event_drop_count = 0;
        self.recovered_from_corruption = false;
        self.checkpoint_count = 0;

        self.load_event_log()?;
        self.load_block_log()?;

        let now = unix_timestamp_now();
        self.ensure_genesis_block(now);
        self.assign_unassigned_events_to_blocks();
        self.ensure_block_slots_until(now);
        self.recompute_block_hashes();
        self.materialize_views();
        self.persist_block_log()?;
        self.persist_checkpoints()?;
        self.persist_snapshot()?;

        self.backtest_ok = true;
        self.backtest_details = "Backtest pending first scheduled run.".into();
        self.last_backtest_unix = 0;
        info!(
            events = self.events.len(),
            blocks = self.blocks.len(),
            dir = %app_data_dir.display(),
            "store opened with block timeline"
        );
        Ok(())
    }

    // -- Append -----------------------------------------------------------

    /// Validates and appends one event (local or gossip-ingested), then
    /// refreshes block assignment, hashes, views, checkpoints and the
    /// snapshot. Appending a known `event_id` is an idempotent success.
    pub fn append_event(&mut self, event: &EventEnvelope) -> Result<()> {
        if event.event_id.is_empty() {
            return Err(self.reject_event("", "append_event failed: missing event id."));
        }
        if event.payload.is_empty() {
            return Err(self.reject_event(&event.event_id, "append_event failed: missing payload."));
        }
        if event.signature.is_empty() {
            return Err(
                self.reject_event(&event.event_id, "append_event failed: missing signature.")
            );
        }
        if event.payload.len() > self.validation_limits.max_event_bytes {
            return Err(self.reject_event(
                &event.event_id,
                "append_event failed: payload exceeds max_event_bytes.",
            ));
        }

        let now = unix_timestamp_now();
        if event.unix_ts > now + self.validation_limits.max_future_drift_seconds {
            return Err(self.reject_event(
                &event.event_id,
                "append_event failed: timestamp exceeds future drift limit.",
            ));
        }
        if event.unix_ts < now - self.validation_limits.max_past_drift_seconds {
            return Err(self.reject_event(
                &event.event_id,
                "append_event failed: timestamp exceeds past drift limit.",
            ));
        }

        if self.has_event(&event.event_id) {
            debug!(event_id = %event.event_id, "idempotent append of known event");
            return Ok(());
        }

        self.events.push(event.clone());
        self.persist_event(event)?;

        self.assign_unassigned_events_to_blocks();
        self.ensure_block_slots_until(unix_timestamp_now());
        self.recompute_block_hashes();
        self.persist_block_log()?;
        self.materialize_views();
        self.persist_checkpoints()?;
        self.persist_snapshot()
    }

    fn reject_event(&mut self, event_id: &str, reason: &str) -> SoupNetError {
        self.record_invalid_event(event_id, reason);
        SoupNetError::InvalidInput {
            reason: reason.to_string(),
        }
    }

    /// Whether the log already carries `event_id`.
    pub fn has_event(&self, event_id: &str) -> bool {
        self.events.iter().any(|event| event.event_id == event_id)
    }

    /// All events in append order.
    pub fn all_events(&self) -> &[EventEnvelope] {
        &self.events
    }

    /// All blocks in index order.
    pub fn all_blocks(&self) -> &[BlockRecord] {
        &self.blocks
    }

    // -- Event log I/O ----------------------------------------------------

    fn load_event_log(&mut self) -> Result<()> {
        self.events.clear();

        let Ok(contents) = fs::read_to_string(&self.event_log_path) else {
            // Created on first write.
            return Ok(());
        };

        for line in contents.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_event_line(line) {
                Some(event) => self.events.push(event),
                None => {
                    self.recovered_from_corruption = true;
                    self.record_invalid_event("load-event-log", "Failed to parse event line.");
                }
            }
        }

        self.materialize_views();
        Ok(())
    }

    fn persist_event(&self, event: &EventEnvelope) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.event_log_path)
            .map_err(|e| storage_err(format!("Failed to write event log file: {e}")))?;
        file.write_all(serialize_event_line(event).as_bytes())
            .map_err(|e| storage_err(format!("Failed to flush event log file: {e}")))
    }

    pub(crate) fn persist_event_log(&self) -> Result<()> {
        let mut contents = String::new();
        for event in &self.events {
            contents.push_str(&serialize_event_line(event));
        }
        fs::write(&self.event_log_path, contents)
            .map_err(|e| storage_err(format!("Failed to rewrite event log file: {e}")))
    }

    // -- Block log I/O ----------------------------------------------------

    fn load_block_log(&mut self) -> Result<()> {
        self.blocks.clear();
        self.event_to_block.clear();

        let contents = match fs::read_to_string(&self.block_log_path) {
            Ok(contents) => contents,
            Err(_) => {
                let legacy = self
                    .block_log_path
                    .parent()
                    .map(|dir| dir.join(LEGACY_BLOCK_LOG_FILE));
                match legacy.and_then(|path| fs::read_to_string(path).ok()) {
                    Some(contents) => {
                        info!("loaded legacy blocks.log; will persist as blockdata.dat");
                        contents
                    }
                    // Created on first write.
                    None => return Ok(()),
                }
            }
        };

        let mut parse_errors = 0usize;
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if line.starts_with(BLOCK_HEADER_PREFIX) {
                    self.parse_block_header(line);
                }
                continue;
            }

            match parse_block_line(line) {
                Some(block) => self.blocks.push(block),
                None => parse_errors += 1,
            }
        }

        self.blocks.sort_by_key(|block| block.index);
        self.rebuild_event_to_block_index();

        if parse_errors > 0 {
            self.recovered_from_corruption = true;
            self.record_invalid_event(
                "load-block-log",
                &format!("Failed to parse {parse_errors} blockdata line(s)."),
            );
            warn!(parse_errors, "blockdata contained unparseable lines");
        }
        if self.blockdata_format_version < 2 {
            self.recovered_from_corruption = true;
            self.blockdata_format_version = 2;
            self.record_invalid_event("load-block-log", "Migrated blockdata format to version 2.");
        }
        Ok(())
    }

    fn parse_block_header(&mut self, header: &str) {
        for token in header.split_whitespace() {
            if let Some(version) = token.strip_prefix("version=") {
                if let Ok(parsed) = version.parse::<u32>() {
                    if parsed > 0 {
                        self.blockdata_format_version = parsed;
                    }
                }
            } else if let Some(chain_id) = token.strip_prefix("chain_id=") {
                self.chain_id = chain_id.to_string();
            } else if let Some(network) = token.strip_prefix("network=") {
                self.network_id = network.to_string();
            }
        }
    }

    pub(crate) fn persist_block_log(&self) -> Result<()> {
        let mut contents = format!(
            "{BLOCK_HEADER_PREFIX} version={} chain_id={} network={}\n",
            self.blockdata_format_version, self.chain_id, self.network_id
        );
        for block in &self.blocks {
            contents.push_str(&serialize_block_line(block));
        }
        fs::write(&self.block_log_path, contents)
            .map_err(|e| storage_err(format!("Failed to write block log file: {e}")))
    }

    // -- Snapshot and checkpoints -----------------------------------------

    pub(crate) fn persist_snapshot(&mut self) -> Result<()> {
        if !self.enable_snapshots || self.snapshot_path.as_os_str().is_empty() {
            return Ok(());
        }
        let tip_index = self.blocks.last().map(|block| block.index).unwrap_or(0);
        if !self.blocks.is_empty()
            && self.snapshot_interval_blocks > 1
            && tip_index % self.snapshot_interval_blocks != 0
            && self.snapshot_path.exists()
        {
            return Ok(());
        }

        let contents = format!(
            "format=got-soup-snapshot-v1\n\
             chain_id={}\n\
             network={}\n\
             blockdata_format_version={}\n\
             event_count={}\n\
             block_count={}\n\
             consensus_hash={}\n\
             timeline_hash={}\n\
             tip_block_index={}\n\
             checkpoint_count={}\n\
             invalid_event_drop_count={}\n\
             created_unix={}\n",
            self.chain_id,
            self.network_id,
            self.blockdata_format_version,
            self.events.len(),
            self.blocks.len(),
            self.consensus_hash(),
            self.timeline_hash(),
            tip_index,
            self.checkpoint_count,
            self.invalid_event_drop_count,
            unix_timestamp_now()
        );
        fs::write(&self.snapshot_path, contents)
            .map_err(|e| storage_err(format!("Failed to write snapshot file: {e}")))
    }

    pub(crate) fn persist_checkpoints(&mut self) -> Result<()> {
        if self.checkpoints_path.as_os_str().is_empty() {
            return Ok(());
        }

        let mut contents = format!(
            "# got-soup checkpoints\n\
             chain_id={}\n\
             network={}\n\
             policy_interval={}\n\
             policy_confirmations={}\n",
            self.chain_id,
            self.network_id,
            self.chain_policy.checkpoint_interval_blocks,
            self.chain_policy.checkpoint_confirmations
        );

        self.checkpoint_count = 0;
        if let Some(latest_confirmed) = self.latest_confirmed_block_index() {
            for block in &self.blocks {
                if !block.confirmed || block.index == 0 {
                    continue;
                }
                if block.index % self.chain_policy.checkpoint_interval_blocks != 0 {
                    continue;
                }
                let confirmations = if latest_confirmed >= block.index {
                    latest_confirmed - block.index + 1
                } else {
                    0
                };
                if confirmations < self.chain_policy.checkpoint_confirmations {
                    continue;
                }
                self.checkpoint_count += 1;
                contents.push_str(&format!(
                    "{}\t{}\t{}\n",
                    block.index, block.block_hash, block.merkle_root
                ));
            }
        }

        fs::write(&self.checkpoints_path, contents)
            .map_err(|e| storage_err(format!("Failed to write checkpoints file: {e}")))
    }

    // -- Rollback ---------------------------------------------------------

    /// Retains only blocks up to the greatest qualifying checkpoint, drops
    /// events the retained blocks do not reference, rehashes and rewrites
    /// every derived file. Running it again immediately is a no-op.
    pub fn rollback_to_last_checkpoint(&mut self, reason: &str) -> Result<String> {
        self.ensure_genesis_block(unix_timestamp_now());

        let confirmed_tip = self.latest_confirmed_block_index();
        let mut checkpoint_index = 0u64;
        if let Some(tip) = confirmed_tip {
            for block in &self.blocks {
                if !block.confirmed {
                    continue;
                }
                if self.chain_policy.checkpoint_interval_blocks > 0
                    && block.index % self.chain_policy.checkpoint_interval_blocks != 0
                {
                    continue;
                }
                let confirmations = if tip >= block.index {
                    tip - block.index + 1
                } else {
                    0
                };
                if confirmations < self.chain_policy.checkpoint_confirmations {
                    continue;
                }
                checkpoint_index = checkpoint_index.max(block.index);
            }
        }

        let mut retained_blocks = Vec::with_capacity(self.blocks.len());
        let mut retained_event_ids = HashSet::new();
        for block in &self.blocks {
            if block.index > checkpoint_index {
                continue;
            }
            for event_id in &block.event_ids {
                retained_event_ids.insert(event_id.clone());
            }
            retained_blocks.push(block.clone());
        }

        if retained_blocks.is_empty() {
            retained_blocks.push(BlockRecord {
                index: 0,
                opened_unix: unix_timestamp_now(),
                reserved: true,
                psz_timestamp: self.genesis_psz_timestamp.clone(),
                ..BlockRecord::default()
            });
        }

        self.events
            .retain(|event| retained_event_ids.contains(&event.event_id));
        self.blocks = retained_blocks;

        self.rebuild_event_to_block_index();
        self.recompute_block_hashes();
        self.materialize_views();

        self.persist_event_log()?;
        self.persist_block_log()?;
        self.persist_checkpoints()?;
        self.persist_snapshot()?;

        warn!(checkpoint_index, reason, "rolled back chain to checkpoint");
        let mut message = format!("Rolled back chain to checkpoint block {checkpoint_index}");
        if !reason.is_empty() {
            message.push_str(&format!(" ({reason})"));
        }
        Ok(message)
    }

    // -- Quarantine log ---------------------------------------------------

    pub(crate) fn record_invalid_event(&mut self, event_id: &str, reason: &str) {
        if self.invalid_event_log_path.as_os_str().is_empty() {
            return;
        }
        self.invalid_event_drop_count += 1;
        let line = format!("{}\t{}\t{}\n", unix_timestamp_now(), event_id, reason);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.invalid_event_log_path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }

    // -- Chain-wide hashes ------------------------------------------------

    /// Hash over the **sorted** set of `event_id:H(payload)` strings.
    /// Sorted, not block-ordered, so two peers can compare logs without
    /// agreeing on assignment; see `timeline_hash` for the ordered form.
    pub fn consensus_hash(&self) -> String {
        let mut chunks: Vec<String> = self
            .events
            .iter()
            .map(|event| format!("{}:{}", event.event_id, stable_hash(&event.payload)))
            .collect();
        chunks.sort();

        let mut joined = String::new();
        for chunk in &chunks {
            joined.push_str(chunk);
            joined.push('\n');
        }
        stable_hash(&joined)
    }

    /// Hash over `index:block_hash` in block order.
    pub fn timeline_hash(&self) -> String {
        let mut joined = String::new();
        for block in &self.blocks {
            joined.push_str(&format!("{}:{}\n", block.index, block.block_hash));
        }
        stable_hash(&joined)
    }

    // -- Health -----------------------------------------------------------

    /// Current health snapshot; never touches disk beyond a size probe.
    pub fn health_report(&self) -> DbHealthReport {
        let mut report = DbHealthReport {
            healthy: true,
            details: "Store health check passed.".into(),
            data_dir: self.app_data_dir.display().to_string(),
            events_file: self.event_log_path.display().to_string(),
            blockdata_file: self.block_log_path.display().to_string(),
            snapshot_file: self.snapshot_path.display().to_string(),
            blockdata_format_version: self.blockdata_format_version,
            recovered_from_corruption: self.recovered_from_corruption,
            invalid_event_drop_count: self.invalid_event_drop_count,
            event_count: self.events.len(),
            recipe_count: self.recipes.len(),
            thread_count: self.threads.len(),
            reply_count: self.replies_by_thread.values().map(Vec::len).sum(),
            consensus_hash: self.consensus_hash(),
            timeline_hash: self.timeline_hash(),
            block_count: self.blocks.len(),
            block_interval_seconds: self.block_interval_seconds,
            pow_difficulty_nibbles: self.pow_difficulty_nibbles,
            backtest_ok: self.backtest_ok,
            backtest_details: self.backtest_details.clone(),
            last_backtest_unix: self.last_backtest_unix,
            invalid_economic_event_count: self.invalid_economic_events.len(),
            chain_id: self.chain_id.clone(),
            network_id: self.network_id.clone(),
            confirmation_threshold: self.chain_policy.confirmation_threshold,
            fork_choice_rule: self.chain_policy.fork_choice_rule.clone(),
            max_reorg_depth: self.chain_policy.max_reorg_depth,
            checkpoint_interval_blocks: self.chain_policy.checkpoint_interval_blocks,
            checkpoint_confirmations: self.chain_policy.checkpoint_confirmations,
            checkpoint_count: self.checkpoint_count,
            max_block_events: self.validation_limits.max_block_events,
            max_block_bytes: self.validation_limits.max_block_bytes,
            max_event_bytes: self.validation_limits.max_event_bytes,
            max_future_drift_seconds: self.validation_limits.max_future_drift_seconds,
            max_past_drift_seconds: self.validation_limits.max_past_drift_seconds,
            moderation_enabled: self.moderation_policy.moderation_enabled,
            moderation_min_confirmations: self.moderation_policy.min_confirmations_for_enforcement,
            moderator_count: self.moderators.len(),
            flagged_object_count: self.moderation_flag_counts.len(),
            hidden_object_count: self.moderation_hidden_objects.len(),
            pinned_core_topic_count: self.moderation_core_topic_overrides.len(),
            invalid_moderation_event_count: self.invalid_moderation_events.len(),
            issued_reward_total: self.issued_reward_total,
            burned_fee_total: self.burned_fee_total,
            max_token_supply: self.reward_schedule.max_token_supply_units,
            ..DbHealthReport::default()
        };

        if let Ok(metadata) = fs::metadata(&self.event_log_path) {
            report.event_log_size_bytes = metadata.len();
        }

        report.reward_supply = self.reward_balances.values().sum();

        let mut last_block_unix = 0i64;
        for block in &self.blocks {
            if block.reserved && block.event_ids.is_empty() {
                report.reserved_block_count += 1;
            }
            if block.confirmed {
                report.confirmed_block_count += 1;
            }
            if block.backfilled {
                report.backfilled_block_count += 1;
            }
            last_block_unix = last_block_unix.max(block.opened_unix);
        }
        report.last_block_unix = last_block_unix;
        if let Some(genesis) = self.blocks.first() {
            report.genesis_psz_timestamp = genesis.psz_timestamp.clone();
        } else {
            report.genesis_psz_timestamp = self.genesis_psz_timestamp.clone();
        }
        if let Some(tip) = self.blocks.last() {
            report.latest_merkle_root = tip.merkle_root.clone();
        }

        for event in &self.events {
            match event.kind {
                soupnet_types::EventKind::BlockRewardClaimed => {
                    report.reward_claim_event_count += 1;
                }
                soupnet_types::EventKind::RewardTransferred => {
                    report.reward_transfer_event_count += 1;
                }
                _ => {}
            }
        }

        if !self.backtest_ok {
            report.healthy = false;
            report.details = "Store health warning: backtest validation failed.".into();
        }
        if self.recovered_from_corruption {
            report.healthy = false;
            report.details =
                "Store health warning: blockdata recovery mode is active (corruption detected)."
                    .into();
        }
        if !self.invalid_economic_events.is_empty() {
            report.healthy = false;
            report.details = format!(
                "Store health warning: {} economically-invalid events detected.",
                self.invalid_economic_events.len()
            );
        }
        if !self.invalid_moderation_events.is_empty() {
            report.healthy = false;
            report.details = format!(
                "Store health warning: {} moderation-invalid events detected.",
                self.invalid_moderation_events.len()
            );
        }
        if self.invalid_event_drop_count > 0 {
            report.healthy = false;
            report.details = format!(
                "Store health warning: dropped {} invalid event(s).",
                self.invalid_event_drop_count
            );
        }

        report
    }
}
