//! Backtest validator: reverifies chain, event, economic and moderation
//! invariants over the whole log.
//!
//! Every failing invariant contributes one detail line. The orchestrator
//! matches on those lines to decide between quarantining the store
//! (identity/parse mismatches) and rolling back to the last checkpoint
//! (duplicate reward claims), so the phrases are part of the contract.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use tracing::warn;

use soupnet_protocol::canonical::parse_canonical_map;
use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_protocol::merkle::compute_merkle_root;
use soupnet_types::{EventKind, Result, SoupNetError};

use crate::store::{stable_hash, Store};

impl Store {
    /// Runs every invariant check and records the outcome on the store.
    ///
    /// `content_id_fn` is injected so the validator recomputes ids under
    /// the same digest the vault used to author them.
    pub fn backtest_validate(
        &mut self,
        content_id_fn: &dyn Fn(&str) -> String,
        expected_community_id: &str,
    ) -> Result<String> {
        let mut issues = 0usize;
        let mut details = String::new();
        let mut event_payload_hash: HashMap<String, String> = HashMap::new();

        let now = unix_timestamp_now();
        for event in &self.events {
            if event.event_id != content_id_fn(&event.payload) {
                issues += 1;
                let _ = writeln!(details, "Event ID mismatch: {}", event.event_id);
            }
            if event.payload.len() > self.validation_limits.max_event_bytes {
                issues += 1;
                let _ = writeln!(
                    details,
                    "Event payload exceeds max_event_bytes: {}",
                    event.event_id
                );
            }
            if event.unix_ts > now + self.validation_limits.max_future_drift_seconds {
                issues += 1;
                let _ = writeln!(
                    details,
                    "Event timestamp exceeds future drift: {}",
                    event.event_id
                );
            }
            if event.unix_ts < now - self.validation_limits.max_past_drift_seconds {
                issues += 1;
                let _ = writeln!(
                    details,
                    "Event timestamp exceeds past drift: {}",
                    event.event_id
                );
            }

            let payload = parse_canonical_map(&event.payload);
            let field = |key: &str| payload.get(key).map(String::as_str).unwrap_or("");
            if !expected_community_id.is_empty()
                && payload.contains_key("community_id")
                && field("community_id") != expected_community_id
            {
                issues += 1;
                let _ = writeln!(details, "Community mismatch in event: {}", event.event_id);
            }
            if payload.contains_key("chain_id") && field("chain_id") != self.chain_id {
                issues += 1;
                let _ = writeln!(details, "Chain ID mismatch in event: {}", event.event_id);
            }
            if payload.contains_key("network_id") && field("network_id") != self.network_id {
                issues += 1;
                let _ = writeln!(details, "Network ID mismatch in event: {}", event.event_id);
            }

            match event.kind {
                EventKind::RecipeCreated => {
                    if field("recipe_id").is_empty() {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Recipe event missing recipe_id: {}",
                            event.event_id
                        );
                    }
                }
                EventKind::ThreadCreated => {
                    if field("thread_id").is_empty() || field("recipe_id").is_empty() {
                        issues += 1;
                        let _ = writeln!(details, "Thread event missing IDs: {}", event.event_id);
                    }
                }
                EventKind::ReplyCreated => {
                    if field("reply_id").is_empty() || field("thread_id").is_empty() {
                        issues += 1;
                        let _ = writeln!(details, "Reply event missing IDs: {}", event.event_id);
                    }
                }
                EventKind::BlockRewardClaimed => {
                    let block_index_ok = payload
                        .get("block_index")
                        .map(|value| value.parse::<u64>().is_ok())
                        .unwrap_or(false);
                    if !block_index_ok {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Reward claim missing block_index: {}",
                            event.event_id
                        );
                    }
                    let reward: i64 = field("reward").parse().unwrap_or(0);
                    if reward <= 0 {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Reward claim missing positive reward: {}",
                            event.event_id
                        );
                    }
                }
                EventKind::RewardTransferred => {
                    let amount: i64 = field("amount").parse().unwrap_or(0);
                    if field("to_cid").is_empty() || amount <= 0 {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Reward transfer missing target or amount: {}",
                            event.event_id
                        );
                    }
                }
                EventKind::ModeratorAdded | EventKind::ModeratorRemoved => {
                    if field("target_cid").is_empty() {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Moderator event missing target_cid: {}",
                            event.event_id
                        );
                    }
                }
                EventKind::ContentFlagged
                | EventKind::ContentHidden
                | EventKind::ContentUnhidden => {
                    if field("object_id").is_empty()
                        && field("recipe_id").is_empty()
                        && field("thread_id").is_empty()
                        && field("reply_id").is_empty()
                    {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Content moderation event missing object_id: {}",
                            event.event_id
                        );
                    }
                }
                EventKind::CoreTopicPinned | EventKind::CoreTopicUnpinned => {
                    if field("recipe_id").is_empty() {
                        issues += 1;
                        let _ = writeln!(
                            details,
                            "Core topic moderation event missing recipe_id: {}",
                            event.event_id
                        );
                    }
                }
                _ => {}
            }

            if event.kind.is_post_kind() {
                let post_value: i64 = field("post_value").parse().unwrap_or(0);
                if post_value < 0 {
                    issues += 1;
                    let _ = writeln!(details, "Post value is negative: {}", event.event_id);
                }
            }

            if event.signature.is_empty() {
                issues += 1;
                let _ = writeln!(details, "Empty signature: {}", event.event_id);
            }

            event_payload_hash.insert(event.event_id.clone(), stable_hash(&event.payload));
        }

        let mut block_event_ids: HashSet<String> = HashSet::new();
        for (position, block) in self.blocks.iter().enumerate() {
            if block.index == 0 && block.psz_timestamp.is_empty() {
                issues += 1;
                details.push_str("Genesis block missing pszTimestamp metadata.\n");
            }
            if position == 0 && block.prev_hash != "genesis" {
                issues += 1;
                details.push_str("Genesis block prev_hash must be `genesis`.\n");
            }
            if position > 0 && block.prev_hash != self.blocks[position - 1].block_hash {
                issues += 1;
                let _ = writeln!(details, "Block prev_hash mismatch at index {}", block.index);
            }

            let mut leaves = Vec::with_capacity(block.event_ids.len());
            let mut content_parts = Vec::with_capacity(block.event_ids.len());
            for event_id in &block.event_ids {
                let payload_hash = event_payload_hash
                    .get(event_id)
                    .cloned()
                    .unwrap_or_else(|| "missing".into());
                leaves.push(stable_hash(&format!("{event_id}:{payload_hash}")));
                content_parts.push(format!("{event_id}:{payload_hash}"));
            }

            let mut expected_merkle = compute_merkle_root(leaves);
            let expected_content = stable_hash(&content_parts.join(","));
            let mut expected_block_hash = stable_hash(&format!(
                "{}|{}|{}|{}|{}|{}|{expected_merkle}|{expected_content}|{}",
                block.index,
                block.opened_unix,
                u8::from(block.reserved),
                u8::from(block.confirmed),
                u8::from(block.backfilled),
                block.prev_hash,
                block.psz_timestamp
            ));
            if block.index == 0 && block.event_ids.is_empty() {
                if !self.hardcoded_genesis_merkle_root.is_empty() {
                    expected_merkle = self.hardcoded_genesis_merkle_root.clone();
                }
                if !self.hardcoded_genesis_block_hash.is_empty() {
                    expected_block_hash = self.hardcoded_genesis_block_hash.clone();
                }
            }

            if block.merkle_root != expected_merkle {
                issues += 1;
                let _ = writeln!(details, "Merkle root mismatch at block {}", block.index);
            }
            if block.content_hash != expected_content {
                issues += 1;
                let _ = writeln!(details, "Content hash mismatch at block {}", block.index);
            }
            if block.block_hash != expected_block_hash {
                issues += 1;
                let _ = writeln!(details, "Block hash mismatch at block {}", block.index);
            }
            if block.event_ids.len() > self.validation_limits.max_block_events {
                issues += 1;
                let _ = writeln!(
                    details,
                    "Block event count exceeds configured max at block {}",
                    block.index
                );
            }
            if self.block_event_bytes(block) > self.validation_limits.max_block_bytes {
                issues += 1;
                let _ = writeln!(
                    details,
                    "Block byte size exceeds configured max at block {}",
                    block.index
                );
            }

            for event_id in &block.event_ids {
                if !self.has_event(event_id) {
                    issues += 1;
                    let _ = writeln!(details, "Block references missing event: {event_id}");
                }
                if !block_event_ids.insert(event_id.clone()) {
                    issues += 1;
                    let _ =
                        writeln!(details, "Duplicate event assignment in blocks: {event_id}");
                }
            }
        }

        for event in &self.events {
            if !block_event_ids.contains(&event.event_id) {
                issues += 1;
                let _ = writeln!(
                    details,
                    "Event not assigned to any block: {}",
                    event.event_id
                );
            }
        }

        for (event_id, reason) in &self.invalid_economic_events {
            issues += 1;
            let _ = writeln!(details, "Economic validation failure: {event_id} ({reason})");
        }
        for (event_id, reason) in &self.invalid_moderation_events {
            issues += 1;
            let _ = writeln!(
                details,
                "Moderation validation failure: {event_id} ({reason})"
            );
        }

        self.last_backtest_unix = unix_timestamp_now();
        if issues == 0 {
            self.backtest_ok = true;
            self.backtest_details =
                "Backtest validation passed. Event and block timelines are immutable and coherent."
                    .into();
            return Ok(self.backtest_details.clone());
        }

        self.backtest_ok = false;
        self.backtest_details = if details.is_empty() {
            "Backtest failed with unknown validation issue.".into()
        } else {
            details
        };
        warn!(issues, "backtest validation reported issues");
        Err(SoupNetError::Validation {
            reason: self.backtest_details.clone(),
        })
    }
}
