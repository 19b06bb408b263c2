//! Block engine: slot reservation, event assignment, hashing,
//! confirmation, pruning and confirmation metrics.
//!
//! Blocks are time slots. A slot opens `reserved` and empty; events are
//! assigned deterministically to the earliest non-confirmed slot with
//! room, and a slot that receives events after opening is marked
//! `backfilled`. A slot confirms once a full interval has elapsed since
//! it opened.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_protocol::merkle::compute_merkle_root;
use soupnet_types::Result;

use crate::record::BlockRecord;
use crate::store::{stable_hash, Store};

/// Upper bound on reserved slots appended per check, so a node waking
/// from a long sleep cannot allocate unbounded slots in one call.
const MAX_RESERVE_PER_CHECK: usize = 256;

/// Byte overhead charged per event on top of id+payload+signature.
const PER_EVENT_BYTE_OVERHEAD: usize = 24;

/// Byte estimate for an event referenced by a block but missing from the
/// log (only possible mid-recovery).
const MISSING_EVENT_BYTE_ESTIMATE: usize = 64;

impl Store {
    /// Creates block 0 if the timeline is empty; backfills the genesis
    /// anchor text if a loaded genesis block lacks one.
    pub(crate) fn ensure_genesis_block(&mut self, now_unix: i64) {
        if let Some(genesis) = self.blocks.first_mut() {
            if genesis.psz_timestamp.is_empty() && !self.genesis_psz_timestamp.is_empty() {
                genesis.psz_timestamp = self.genesis_psz_timestamp.clone();
            }
            return;
        }

        if self.genesis_psz_timestamp.is_empty() {
            self.genesis_psz_timestamp = format!(
                "SoupNet::P2P Tomato Soup {} genesis | {}",
                self.network_id, now_unix
            );
        }

        self.blocks.push(BlockRecord {
            index: 0,
            opened_unix: now_unix,
            reserved: true,
            confirmed: false,
            backfilled: false,
            psz_timestamp: self.genesis_psz_timestamp.clone(),
            merkle_root: self.hardcoded_genesis_merkle_root.clone(),
            block_hash: self.hardcoded_genesis_block_hash.clone(),
            ..BlockRecord::default()
        });
    }

    /// Appends reserved slots while the tip slot's interval has fully
    /// elapsed, up to the per-call safety cap.
    pub(crate) fn ensure_block_slots_until(&mut self, now_unix: i64) {
        if self.block_interval_seconds == 0 {
            self.block_interval_seconds = 150;
        }
        self.ensure_genesis_block(now_unix);

        let interval = self.block_interval_seconds as i64;
        let mut created = 0usize;
        while created < MAX_RESERVE_PER_CHECK {
            let Some(back) = self.blocks.last() else {
                break;
            };
            if now_unix - back.opened_unix < interval {
                break;
            }
            let reserved = BlockRecord {
                index: back.index + 1,
                opened_unix: back.opened_unix + interval,
                reserved: true,
                ..BlockRecord::default()
            };
            self.blocks.push(reserved);
            created += 1;
        }
    }

    /// Deterministically places every unassigned event into the earliest
    /// non-confirmed block with room under the event-count and byte
    /// limits, appending a fresh backfilled slot when none fits.
    pub(crate) fn assign_unassigned_events_to_blocks(&mut self) {
        if self.events.is_empty() {
            self.rebuild_event_to_block_index();
            return;
        }

        let first_ts = self.events[0].unix_ts;
        self.ensure_genesis_block(first_ts);

        let mut assigned: HashSet<String> = HashSet::new();
        for block in &self.blocks {
            for event_id in &block.event_ids {
                assigned.insert(event_id.clone());
            }
        }

        let events: Vec<(String, i64, usize)> = self
            .events
            .iter()
            .map(|event| {
                (
                    event.event_id.clone(),
                    event.unix_ts,
                    event.event_id.len()
                        + event.payload.len()
                        + event.signature.len()
                        + PER_EVENT_BYTE_OVERHEAD,
                )
            })
            .collect();

        for (event_id, unix_ts, event_bytes) in events {
            if assigned.contains(&event_id) {
                continue;
            }

            let slot_position = {
                let max_events = self.validation_limits.max_block_events;
                let max_bytes = self.validation_limits.max_block_bytes;
                (0..self.blocks.len()).find(|&i| {
                    let block = &self.blocks[i];
                    !block.confirmed
                        && block.event_ids.len() < max_events
                        && self.block_event_bytes(block) + event_bytes <= max_bytes
                })
            };

            let position = match slot_position {
                Some(position) => position,
                None => {
                    let appended = BlockRecord {
                        index: self.blocks.last().map(|b| b.index + 1).unwrap_or(0),
                        opened_unix: unix_ts,
                        reserved: true,
                        ..BlockRecord::default()
                    };
                    self.blocks.push(appended);
                    self.blocks.len() - 1
                }
            };

            let slot = &mut self.blocks[position];
            if slot.reserved {
                slot.backfilled = true;
            }
            slot.reserved = false;
            slot.event_ids.push(event_id.clone());
            assigned.insert(event_id);
        }

        self.rebuild_event_to_block_index();
    }

    pub(crate) fn rebuild_event_to_block_index(&mut self) {
        self.event_to_block.clear();
        for (position, block) in self.blocks.iter().enumerate() {
            for event_id in &block.event_ids {
                self.event_to_block.insert(event_id.clone(), position);
            }
        }
    }

    /// Rebuilds `merkle_root`, `content_hash`, `prev_hash` and
    /// `block_hash` for every block in order. An empty genesis keeps the
    /// hardcoded release hashes when configured.
    pub(crate) fn recompute_block_hashes(&mut self) {
        self.rebuild_event_to_block_index();

        let mut event_payload_hash: HashMap<&str, String> =
            HashMap::with_capacity(self.events.len());
        for event in &self.events {
            event_payload_hash.insert(&event.event_id, stable_hash(&event.payload));
        }

        let default_psz = if self.genesis_psz_timestamp.is_empty() {
            None
        } else {
            Some(self.genesis_psz_timestamp.clone())
        };

        let mut prev_hash = "genesis".to_string();
        let mut new_genesis_psz: Option<String> = None;
        for block in &mut self.blocks {
            if block.index == 0 && block.psz_timestamp.is_empty() {
                block.psz_timestamp = match &default_psz {
                    Some(psz) => psz.clone(),
                    None => {
                        let generated = format!(
                            "SoupNet::P2P Tomato Soup {} genesis | {}",
                            self.network_id, block.opened_unix
                        );
                        new_genesis_psz = Some(generated.clone());
                        generated
                    }
                };
            }

            let mut merkle_leaves = Vec::with_capacity(block.event_ids.len());
            let mut content_parts = Vec::with_capacity(block.event_ids.len());
            for event_id in &block.event_ids {
                let payload_hash = event_payload_hash
                    .get(event_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| "missing".into());
                merkle_leaves.push(stable_hash(&format!("{event_id}:{payload_hash}")));
                content_parts.push(format!("{event_id}:{payload_hash}"));
            }

            block.merkle_root = compute_merkle_root(merkle_leaves);
            block.content_hash = stable_hash(&content_parts.join(","));
            block.prev_hash = prev_hash.clone();
            block.block_hash = stable_hash(&format!(
                "{}|{}|{}|{}|{}|{}|{}|{}|{}",
                block.index,
                block.opened_unix,
                u8::from(block.reserved),
                u8::from(block.confirmed),
                u8::from(block.backfilled),
                block.prev_hash,
                block.merkle_root,
                block.content_hash,
                block.psz_timestamp
            ));

            if block.index == 0 && block.event_ids.is_empty() {
                if !self.hardcoded_genesis_merkle_root.is_empty() {
                    block.merkle_root = self.hardcoded_genesis_merkle_root.clone();
                }
                if !self.hardcoded_genesis_block_hash.is_empty() {
                    block.block_hash = self.hardcoded_genesis_block_hash.clone();
                }
            }
            prev_hash = block.block_hash.clone();
        }

        if let Some(psz) = new_genesis_psz {
            self.genesis_psz_timestamp = psz;
        }
    }

    /// Confirms due slots, rehashes, reapplies confirmation metrics,
    /// prunes and persists blocks, checkpoints and the snapshot.
    pub fn routine_block_check(&mut self, now_unix: i64) -> Result<()> {
        self.ensure_genesis_block(now_unix);
        self.ensure_block_slots_until(now_unix);
        self.assign_unassigned_events_to_blocks();

        let interval = self.block_interval_seconds as i64;
        let mut confirmed = 0usize;
        for block in &mut self.blocks {
            if !block.confirmed && now_unix - block.opened_unix >= interval {
                block.confirmed = true;
                confirmed += 1;
            }
        }
        if confirmed > 0 {
            debug!(confirmed, "blocks confirmed on tick");
        }

        // New assignments may have changed hashes even when nothing
        // confirmed this tick.
        self.recompute_block_hashes();
        self.apply_confirmation_metrics();
        self.prune_blocks_if_needed();
        self.persist_block_log()?;
        self.persist_checkpoints()?;
        self.persist_snapshot()
    }

    /// Removes the oldest empty-and-confirmed blocks once the timeline
    /// exceeds the retention bound. Genesis is never pruned.
    pub(crate) fn prune_blocks_if_needed(&mut self) {
        if !self.enable_pruning {
            return;
        }
        let keep = (self.prune_keep_recent_blocks as usize).max(2);
        if self.blocks.len() <= keep {
            return;
        }

        let mut target_remove = self.blocks.len() - keep;
        let mut removed = 0usize;
        let mut position = 1;
        while position < self.blocks.len() && target_remove > 0 {
            let block = &self.blocks[position];
            if block.event_ids.is_empty() && block.confirmed {
                self.blocks.remove(position);
                removed += 1;
                target_remove -= 1;
            } else {
                position += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "pruned empty confirmed blocks");
            self.rebuild_event_to_block_index();
        }
    }

    /// Highest confirmed block index, if any block is confirmed.
    pub(crate) fn latest_confirmed_block_index(&self) -> Option<u64> {
        self.blocks
            .iter()
            .filter(|block| block.confirmed)
            .map(|block| block.index)
            .max()
    }

    /// The block an event is assigned to, if any.
    pub fn block_for_event(&self, event_id: &str) -> Option<&BlockRecord> {
        self.event_to_block
            .get(event_id)
            .and_then(|position| self.blocks.get(*position))
    }

    /// `(confirmations, age_seconds)` for a view row's source event.
    pub fn confirmation_metrics_for_event(
        &self,
        source_event_id: &str,
        updated_unix: i64,
    ) -> Option<(u64, i64)> {
        let block = self.block_for_event(source_event_id)?;
        let age_seconds = (unix_timestamp_now() - updated_unix).max(0);

        let latest_confirmed = self.latest_confirmed_block_index();
        match latest_confirmed {
            Some(tip) if block.confirmed && tip >= block.index => {
                Some((tip - block.index + 1, age_seconds))
            }
            _ => Some((0, age_seconds)),
        }
    }

    /// Confirmed, past-threshold, unclaimed blocks in index order.
    /// Genesis never yields a claim.
    pub fn claimable_confirmed_blocks(&self) -> Vec<BlockRecord> {
        let Some(latest_confirmed) = self.latest_confirmed_block_index() else {
            return Vec::new();
        };

        let mut claimable: Vec<BlockRecord> = self
            .blocks
            .iter()
            .filter(|block| block.index != 0 && block.confirmed)
            .filter(|block| {
                let confirmations = if latest_confirmed >= block.index {
                    latest_confirmed - block.index + 1
                } else {
                    0
                };
                confirmations >= self.chain_policy.confirmation_threshold
            })
            .filter(|block| !self.has_block_claim(block.index))
            .cloned()
            .collect();

        claimable.sort_by_key(|block| block.index);
        claimable
    }

    /// Projected byte total of a block under the assignment estimate.
    pub(crate) fn block_event_bytes(&self, block: &BlockRecord) -> usize {
        block
            .event_ids
            .iter()
            .map(|event_id| {
                match self.events.iter().find(|event| &event.event_id == event_id) {
                    Some(event) => {
                        event_id.len()
                            + event.payload.len()
                            + event.signature.len()
                            + PER_EVENT_BYTE_OVERHEAD
                    }
                    None => event_id.len() + MISSING_EVENT_BYTE_ESTIMATE,
                }
            })
            .sum()
    }
}
