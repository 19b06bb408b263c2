//! View materializer: deterministic fold of the event log into recipes,
//! threads, replies, reviews, thumbs, reward balances and moderation
//! state.
//!
//! The fold is rebuilt in full on every change. Ordering is independent
//! of arrival order: primary key is the containing block position
//! (unassigned sorts last), then `unix_ts`, then an economic-priority
//! bucket (claims before transfers before everything else), then
//! `event_id`. Replaying the same log therefore reproduces identical
//! views on every node.

use std::collections::HashMap;

use soupnet_protocol::canonical::parse_canonical_map;
use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_protocol::pow::verify_pow;
use soupnet_protocol::reward::{expected_claim_reward_for_block, transfer_burn_fee};
use soupnet_types::{
    EventEnvelope, EventKind, ModerationObjectState, ModerationStatus, RecipeSummary,
    ReplySummary, RewardBalanceSummary, SearchQuery, ThreadSummary,
};

use crate::store::{stable_hash, Store};

// ---------------------------------------------------------------------------
// Fold helpers
// ---------------------------------------------------------------------------

/// Spendable value attached to a post event, under any of its accepted
/// key spellings.
fn parse_post_value(payload: &HashMap<String, String>) -> i64 {
    for key in ["post_value", "value_units", "value"] {
        if let Some(value) = payload.get(key) {
            return value.parse().unwrap_or(0);
        }
    }
    0
}

fn parse_i64(payload: &HashMap<String, String>, key: &str) -> i64 {
    payload
        .get(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn payload_str<'a>(payload: &'a HashMap<String, String>, key: &str) -> &'a str {
    payload.get(key).map(String::as_str).unwrap_or("")
}

fn parse_boolish(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

/// Claims settle before transfers, transfers before content, inside one
/// `(block, timestamp)` bucket.
fn economic_priority(kind: EventKind) -> i32 {
    match kind {
        EventKind::BlockRewardClaimed => 0,
        EventKind::RewardTransferred => 1,
        _ => 2,
    }
}

/// Moderation target id, under any of its accepted key spellings; falls
/// back to the event id so a flag is never silently dropped.
fn object_id_from_payload(payload: &HashMap<String, String>, event_id: &str) -> String {
    for key in ["object_id", "recipe_id", "thread_id", "reply_id", "target_id"] {
        if let Some(value) = payload.get(key) {
            return value.clone();
        }
    }
    event_id.to_string()
}

/// Kinds that demand moderator authority (flagging is open to anyone).
fn moderator_required(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::ModeratorAdded
            | EventKind::ModeratorRemoved
            | EventKind::ContentHidden
            | EventKind::ContentUnhidden
            | EventKind::CoreTopicPinned
            | EventKind::CoreTopicUnpinned
            | EventKind::PolicyUpdated
    )
}

// ---------------------------------------------------------------------------
// Materializer
// ---------------------------------------------------------------------------

impl Store {
    fn confirmations_for_event_id(&self, event_id: &str, confirmed_tip: Option<u64>) -> u64 {
        let Some(tip) = confirmed_tip else {
            return 0;
        };
        let Some(position) = self.event_to_block.get(event_id) else {
            return 0;
        };
        let Some(block) = self.blocks.get(*position) else {
            return 0;
        };
        if tip < block.index {
            return 0;
        }
        tip - block.index + 1
    }

    fn moderation_event_is_effective(&self, event_id: &str, confirmed_tip: Option<u64>) -> bool {
        if !self.moderation_policy.moderation_enabled {
            return false;
        }
        if !self.moderation_policy.require_finality_for_actions {
            return true;
        }
        self.confirmations_for_event_id(event_id, confirmed_tip)
            >= self.moderation_policy.min_confirmations_for_enforcement
    }

    /// Clears and rebuilds every derived map from the full event log.
    pub(crate) fn materialize_views(&mut self) {
        self.recipes.clear();
        self.threads.clear();
        self.replies_by_thread.clear();
        self.review_totals.clear();
        self.thumbs_up_totals.clear();
        self.reward_balances.clear();
        self.claimed_blocks.clear();
        self.transfer_nonce_by_cid.clear();
        self.invalid_economic_events.clear();
        self.invalid_moderation_events.clear();
        self.moderators.clear();
        self.moderation_flag_counts.clear();
        self.moderation_hidden_objects.clear();
        self.moderation_auto_hidden_objects.clear();
        self.moderation_core_topic_overrides.clear();
        self.issued_reward_total = 0;
        self.burned_fee_total = 0;

        // Stable deterministic ordering over event indices.
        let mut order: Vec<usize> = (0..self.events.len()).collect();
        order.sort_by(|&lhs, &rhs| {
            let lhs_block = self
                .event_to_block
                .get(&self.events[lhs].event_id)
                .copied()
                .unwrap_or(usize::MAX);
            let rhs_block = self
                .event_to_block
                .get(&self.events[rhs].event_id)
                .copied()
                .unwrap_or(usize::MAX);
            lhs_block
                .cmp(&rhs_block)
                .then(self.events[lhs].unix_ts.cmp(&self.events[rhs].unix_ts))
                .then(
                    economic_priority(self.events[lhs].kind)
                        .cmp(&economic_priority(self.events[rhs].kind)),
                )
                .then(self.events[lhs].event_id.cmp(&self.events[rhs].event_id))
        });

        let confirmed_tip = self.latest_confirmed_block_index();

        for cid in &self.moderation_policy.moderator_cids {
            let trimmed = cid.trim();
            if !trimmed.is_empty() {
                self.moderators.insert(trimmed.to_string());
            }
        }

        self.economic_pass(&order, confirmed_tip);
        self.content_and_moderation_pass(&order, confirmed_tip);
        self.finalize_summaries();
        self.apply_moderation_hiding();
        self.apply_confirmation_metrics();
    }

    // -- Economic pass ----------------------------------------------------

    fn economic_pass(&mut self, order: &[usize], confirmed_tip: Option<u64>) {
        let mut issued_so_far: i64 = 0;

        for &idx in order {
            let event = self.events[idx].clone();
            let payload = parse_canonical_map(&event.payload);

            match event.kind {
                EventKind::BlockRewardClaimed => {
                    let Some(block_index) = payload
                        .get("block_index")
                        .and_then(|value| value.parse::<u64>().ok())
                    else {
                        self.invalid_economic_events.insert(
                            event.event_id,
                            "Reward claim missing valid block_index.".into(),
                        );
                        continue;
                    };

                    let reward = parse_i64(&payload, "reward");
                    let expected_reward = expected_claim_reward_for_block(
                        block_index,
                        issued_so_far,
                        &self.reward_schedule,
                    );
                    if reward <= 0 || reward != expected_reward {
                        self.invalid_economic_events.insert(
                            event.event_id,
                            "Reward claim amount does not match deterministic schedule.".into(),
                        );
                        continue;
                    }

                    let block_confirmed = self
                        .blocks
                        .iter()
                        .find(|block| block.index == block_index)
                        .map(|block| block.confirmed)
                        .unwrap_or(false);
                    let within_confirmed_prefix = matches!(
                        confirmed_tip, Some(tip) if block_index <= tip
                    );
                    if !block_confirmed || !within_confirmed_prefix {
                        self.invalid_economic_events.insert(
                            event.event_id,
                            "Reward claim references an unconfirmed block.".into(),
                        );
                        continue;
                    }

                    if self.claimed_blocks.contains_key(&block_index) {
                        self.invalid_economic_events.insert(
                            event.event_id,
                            "Duplicate reward claim for block.".into(),
                        );
                        continue;
                    }

                    let difficulty = payload
                        .get("pow_difficulty")
                        .and_then(|value| value.parse::<i32>().ok())
                        .unwrap_or(self.pow_difficulty_nibbles);
                    let pow_nonce = payload_str(&payload, "pow_nonce");
                    let pow_hash = payload_str(&payload, "pow_hash");
                    let pow_material = payload_str(&payload, "pow_material");
                    if !verify_pow(pow_material, pow_nonce, pow_hash, difficulty) {
                        self.invalid_economic_events
                            .insert(event.event_id, "Reward claim PoW is invalid.".into());
                        continue;
                    }

                    let expected_witness = stable_hash(&format!(
                        "{}|{block_index}|{reward}|{pow_hash}",
                        event.author_cid
                    ));
                    if payload_str(&payload, "witness_root") != expected_witness {
                        self.invalid_economic_events
                            .insert(event.event_id, "Reward claim witness is invalid.".into());
                        continue;
                    }

                    self.claimed_blocks
                        .insert(block_index, event.author_cid.clone());
                    *self.reward_balances.entry(event.author_cid).or_insert(0) += reward;
                    issued_so_far += reward;
                    self.issued_reward_total = issued_so_far;
                }

                EventKind::RewardTransferred => {
                    let to_cid = payload_str(&payload, "to_cid").to_string();
                    let amount = parse_i64(&payload, "amount");
                    let fee = parse_i64(&payload, "fee");
                    let nonce = payload
                        .get("nonce")
                        .and_then(|value| value.parse::<u64>().ok())
                        .unwrap_or(0);
                    if to_cid.is_empty() || amount <= 0 || fee < 0 || nonce == 0 {
                        self.invalid_economic_events.insert(
                            event.event_id,
                            "Reward transfer has invalid target or amount.".into(),
                        );
                        continue;
                    }

                    let expected_nonce = self
                        .transfer_nonce_by_cid
                        .get(&event.author_cid)
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    if nonce != expected_nonce {
                        self.invalid_economic_events
                            .insert(event.event_id, "Reward transfer nonce is invalid.".into());
                        continue;
                    }

                    if fee != transfer_burn_fee(amount) {
                        self.invalid_economic_events
                            .insert(event.event_id, "Reward transfer fee is invalid.".into());
                        continue;
                    }

                    let expected_witness = stable_hash(&format!(
                        "{}|{to_cid}|{amount}|{fee}|{nonce}",
                        event.author_cid
                    ));
                    if payload_str(&payload, "witness_root") != expected_witness {
                        self.invalid_economic_events
                            .insert(event.event_id, "Reward transfer witness is invalid.".into());
                        continue;
                    }

                    let sender_balance = self
                        .reward_balances
                        .get(&event.author_cid)
                        .copied()
                        .unwrap_or(0);
                    if sender_balance < amount + fee {
                        self.invalid_economic_events.insert(
                            event.event_id,
                            "Reward transfer exceeds sender balance.".into(),
                        );
                        continue;
                    }

                    *self
                        .reward_balances
                        .entry(event.author_cid.clone())
                        .or_insert(0) -= amount + fee;
                    *self.reward_balances.entry(to_cid).or_insert(0) += amount;
                    self.burned_fee_total += fee;
                    self.transfer_nonce_by_cid.insert(event.author_cid, nonce);
                }

                kind if kind.is_post_kind() => {
                    let post_value = parse_post_value(&payload);
                    if post_value < 0 {
                        self.invalid_economic_events
                            .insert(event.event_id, "Post value cannot be negative.".into());
                        continue;
                    }
                    if post_value > 0 {
                        let balance = self
                            .reward_balances
                            .get(&event.author_cid)
                            .copied()
                            .unwrap_or(0);
                        if balance < post_value {
                            self.invalid_economic_events.insert(
                                event.event_id,
                                "Insufficient balance for post value spend.".into(),
                            );
                            continue;
                        }
                        *self.reward_balances.entry(event.author_cid).or_insert(0) -= post_value;
                        self.burned_fee_total += post_value;
                    }
                }

                _ => {}
            }
        }
    }

    // -- Content and moderation pass --------------------------------------

    fn content_and_moderation_pass(&mut self, order: &[usize], confirmed_tip: Option<u64>) {
        for &idx in order {
            let event = self.events[idx].clone();
            if event.kind.is_post_kind()
                && self.invalid_economic_events.contains_key(&event.event_id)
            {
                continue;
            }

            let payload = parse_canonical_map(&event.payload);

            if event.kind.is_moderation_kind() {
                self.apply_moderation_event(&event, &payload, confirmed_tip);
                continue;
            }

            match event.kind {
                EventKind::RecipeCreated => {
                    let recipe_id = payload
                        .get("recipe_id")
                        .cloned()
                        .unwrap_or_else(|| event.event_id.clone());
                    let core_topic = parse_boolish(payload_str(&payload, "core_topic"))
                        || parse_boolish(payload_str(&payload, "moderator_core"));
                    let menu_segment = match payload.get("menu_segment") {
                        Some(segment) => segment.clone(),
                        None if core_topic => "core-menu".into(),
                        None => "community-post".into(),
                    };

                    let mut summary = RecipeSummary {
                        recipe_id: recipe_id.clone(),
                        source_event_id: event.event_id.clone(),
                        title: payload
                            .get("title")
                            .cloned()
                            .unwrap_or_else(|| "Untitled recipe".into()),
                        category: payload
                            .get("category")
                            .cloned()
                            .unwrap_or_else(|| "General".into()),
                        author_cid: event.author_cid.clone(),
                        updated_unix: event.unix_ts,
                        core_topic,
                        menu_segment,
                        value_units: parse_post_value(&payload),
                        ..RecipeSummary::default()
                    };

                    if let Some((sum, count)) = self.review_totals.get(&recipe_id) {
                        if *count > 0 {
                            summary.review_count = *count;
                            summary.average_rating = f64::from(*sum) / f64::from(*count);
                        }
                    }
                    if let Some(thumbs) = self.thumbs_up_totals.get(&recipe_id) {
                        summary.thumbs_up_count = *thumbs;
                    }

                    self.recipes.insert(recipe_id, summary);
                }

                EventKind::ThreadCreated => {
                    let thread_id = payload
                        .get("thread_id")
                        .cloned()
                        .unwrap_or_else(|| event.event_id.clone());
                    let thread = ThreadSummary {
                        thread_id: thread_id.clone(),
                        source_event_id: event.event_id.clone(),
                        recipe_id: payload_str(&payload, "recipe_id").to_string(),
                        title: payload
                            .get("title")
                            .cloned()
                            .unwrap_or_else(|| "Untitled thread".into()),
                        author_cid: event.author_cid.clone(),
                        updated_unix: event.unix_ts,
                        value_units: parse_post_value(&payload),
                        ..ThreadSummary::default()
                    };
                    self.threads.insert(thread_id, thread);
                }

                EventKind::ReplyCreated => {
                    let thread_id = payload_str(&payload, "thread_id").to_string();
                    if thread_id.is_empty() {
                        continue;
                    }
                    let reply = ReplySummary {
                        reply_id: payload
                            .get("reply_id")
                            .cloned()
                            .unwrap_or_else(|| event.event_id.clone()),
                        source_event_id: event.event_id.clone(),
                        thread_id: thread_id.clone(),
                        author_cid: event.author_cid.clone(),
                        markdown: payload_str(&payload, "markdown").to_string(),
                        updated_unix: event.unix_ts,
                        value_units: parse_post_value(&payload),
                        ..ReplySummary::default()
                    };
                    self.replies_by_thread
                        .entry(thread_id)
                        .or_default()
                        .push(reply);
                }

                EventKind::ReviewAdded => {
                    let recipe_id = payload_str(&payload, "recipe_id").to_string();
                    if !recipe_id.is_empty() {
                        let totals = self.review_totals.entry(recipe_id).or_insert((0, 0));
                        totals.0 += payload
                            .get("rating")
                            .and_then(|value| value.parse::<i32>().ok())
                            .unwrap_or(0);
                        totals.1 += 1;
                    }
                }

                EventKind::ThumbsUpAdded => {
                    let recipe_id = payload_str(&payload, "recipe_id").to_string();
                    if !recipe_id.is_empty() {
                        *self.thumbs_up_totals.entry(recipe_id).or_insert(0) += 1;
                    }
                }

                _ => {}
            }
        }
    }

    fn apply_moderation_event(
        &mut self,
        event: &EventEnvelope,
        payload: &HashMap<String, String>,
        confirmed_tip: Option<u64>,
    ) {
        if !self.moderation_event_is_effective(&event.event_id, confirmed_tip) {
            return;
        }

        if moderator_required(event.kind) && !self.moderators.contains(&event.author_cid) {
            self.invalid_moderation_events.insert(
                event.event_id.clone(),
                format!(
                    "Moderator authority required for moderation event by {}.",
                    event.author_cid
                ),
            );
            return;
        }

        match event.kind {
            EventKind::ModeratorAdded => {
                let target_cid = payload_str(payload, "target_cid").trim().to_string();
                if target_cid.is_empty() {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ModeratorAdded missing target_cid.".into(),
                    );
                    return;
                }
                self.moderators.insert(target_cid);
            }

            EventKind::ModeratorRemoved => {
                let target_cid = payload_str(payload, "target_cid").trim().to_string();
                if target_cid.is_empty() {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ModeratorRemoved missing target_cid.".into(),
                    );
                    return;
                }
                if !self.moderators.contains(&target_cid) {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ModeratorRemoved references unknown target_cid.".into(),
                    );
                    return;
                }
                if self.moderators.len() <= 1 {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ModeratorRemoved would leave community without moderators.".into(),
                    );
                    return;
                }
                self.moderators.remove(&target_cid);
            }

            EventKind::ContentFlagged => {
                let object_id = object_id_from_payload(payload, &event.event_id);
                if object_id.is_empty() {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ContentFlagged missing object_id.".into(),
                    );
                    return;
                }
                let count = self
                    .moderation_flag_counts
                    .entry(object_id.clone())
                    .or_insert(0);
                *count += 1;
                if *count >= self.moderation_policy.max_flags_before_auto_hide {
                    self.moderation_hidden_objects.insert(object_id.clone());
                    self.moderation_auto_hidden_objects.insert(object_id);
                }
            }

            EventKind::ContentHidden => {
                let object_id = object_id_from_payload(payload, &event.event_id);
                if object_id.is_empty() {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ContentHidden missing object_id.".into(),
                    );
                    return;
                }
                self.moderation_hidden_objects.insert(object_id.clone());
                self.moderation_auto_hidden_objects.remove(&object_id);
            }

            EventKind::ContentUnhidden => {
                let object_id = object_id_from_payload(payload, &event.event_id);
                if object_id.is_empty() {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        "ContentUnhidden missing object_id.".into(),
                    );
                    return;
                }
                self.moderation_hidden_objects.remove(&object_id);
                self.moderation_auto_hidden_objects.remove(&object_id);
            }

            EventKind::CoreTopicPinned | EventKind::CoreTopicUnpinned => {
                let recipe_id = payload_str(payload, "recipe_id").to_string();
                if recipe_id.is_empty() {
                    self.invalid_moderation_events.insert(
                        event.event_id.clone(),
                        format!("{} missing recipe_id.", event.kind.name()),
                    );
                    return;
                }
                self.moderation_core_topic_overrides
                    .insert(recipe_id, event.kind == EventKind::CoreTopicPinned);
            }

            EventKind::PolicyUpdated => {
                if let Some(value) = payload.get("max_flags_before_auto_hide") {
                    if let Ok(parsed) = value.parse::<i64>() {
                        if parsed > 0 {
                            self.moderation_policy.max_flags_before_auto_hide = parsed as usize;
                        }
                    }
                }
                if let Some(value) = payload.get("min_confirmations_for_enforcement") {
                    if let Ok(parsed) = value.parse::<i64>() {
                        if parsed > 0 {
                            self.moderation_policy.min_confirmations_for_enforcement =
                                parsed as u64;
                        }
                    }
                }
                if let Some(value) = payload.get("require_finality_for_actions") {
                    self.moderation_policy.require_finality_for_actions = parse_boolish(value);
                }
            }

            _ => {}
        }
    }

    // -- Summary finalization ---------------------------------------------

    fn finalize_summaries(&mut self) {
        for (recipe_id, summary) in &mut self.recipes {
            if let Some((sum, count)) = self.review_totals.get(recipe_id) {
                if *count > 0 {
                    summary.review_count = *count;
                    summary.average_rating = f64::from(*sum) / f64::from(*count);
                }
            }
            if let Some(thumbs) = self.thumbs_up_totals.get(recipe_id) {
                summary.thumbs_up_count = *thumbs;
            }
        }

        for (thread_id, replies) in &self.replies_by_thread {
            if let Some(thread) = self.threads.get_mut(thread_id) {
                thread.reply_count = replies.len() as i32;
            }
        }

        for (recipe_id, core_topic) in &self.moderation_core_topic_overrides {
            if let Some(recipe) = self.recipes.get_mut(recipe_id) {
                recipe.core_topic = *core_topic;
                recipe.menu_segment = if *core_topic {
                    "core-menu".into()
                } else {
                    "community-post".into()
                };
            }
        }
    }

    /// Removes hidden objects and their descendants from the views.
    fn apply_moderation_hiding(&mut self) {
        let hidden = &self.moderation_hidden_objects;

        let threads_to_remove: Vec<String> = self
            .threads
            .iter()
            .filter(|(thread_id, thread)| {
                hidden.contains(*thread_id) || hidden.contains(&thread.recipe_id)
            })
            .map(|(thread_id, _)| thread_id.clone())
            .collect();
        for thread_id in &threads_to_remove {
            self.threads.remove(thread_id);
            self.replies_by_thread.remove(thread_id);
        }

        let hidden = &self.moderation_hidden_objects;
        self.replies_by_thread.retain(|_, replies| {
            replies.retain(|reply| {
                !hidden.contains(&reply.reply_id) && !hidden.contains(&reply.thread_id)
            });
            !replies.is_empty()
        });

        let hidden = &self.moderation_hidden_objects;
        self.recipes
            .retain(|recipe_id, _| !hidden.contains(recipe_id));

        for (thread_id, thread) in &mut self.threads {
            thread.reply_count = self
                .replies_by_thread
                .get(thread_id)
                .map(|replies| replies.len() as i32)
                .unwrap_or(0);
        }
    }

    /// Recomputes `(confirmations, age_seconds)` on every summary row.
    pub(crate) fn apply_confirmation_metrics(&mut self) {
        let now = unix_timestamp_now();

        let recipe_updates: Vec<(String, u64, i64)> = self
            .recipes
            .iter()
            .map(|(id, recipe)| {
                match self
                    .confirmation_metrics_for_event(&recipe.source_event_id, recipe.updated_unix)
                {
                    Some((confirmations, age)) => (id.clone(), confirmations, age),
                    None => (id.clone(), 0, (now - recipe.updated_unix).max(0)),
                }
            })
            .collect();
        for (id, confirmations, age) in recipe_updates {
            if let Some(recipe) = self.recipes.get_mut(&id) {
                recipe.confirmation_count = confirmations;
                recipe.confirmation_age_seconds = age;
            }
        }

        let thread_updates: Vec<(String, u64, i64)> = self
            .threads
            .iter()
            .map(|(id, thread)| {
                match self
                    .confirmation_metrics_for_event(&thread.source_event_id, thread.updated_unix)
                {
                    Some((confirmations, age)) => (id.clone(), confirmations, age),
                    None => (id.clone(), 0, (now - thread.updated_unix).max(0)),
                }
            })
            .collect();
        for (id, confirmations, age) in thread_updates {
            if let Some(thread) = self.threads.get_mut(&id) {
                thread.confirmation_count = confirmations;
                thread.confirmation_age_seconds = age;
            }
        }

        let reply_updates: Vec<(String, usize, u64, i64)> = self
            .replies_by_thread
            .iter()
            .flat_map(|(thread_id, replies)| {
                replies.iter().enumerate().map(|(position, reply)| {
                    match self
                        .confirmation_metrics_for_event(&reply.source_event_id, reply.updated_unix)
                    {
                        Some((confirmations, age)) => {
                            (thread_id.clone(), position, confirmations, age)
                        }
                        None => (
                            thread_id.clone(),
                            position,
                            0,
                            (now - reply.updated_unix).max(0),
                        ),
                    }
                })
            })
            .collect();
        for (thread_id, position, confirmations, age) in reply_updates {
            if let Some(replies) = self.replies_by_thread.get_mut(&thread_id) {
                if let Some(reply) = replies.get_mut(position) {
                    reply.confirmation_count = confirmations;
                    reply.confirmation_age_seconds = age;
                }
            }
        }
    }

    // -- Read-only queries ------------------------------------------------

    /// Recipes matching the query: core topics first, then newest.
    pub fn query_recipes(&self, query: &SearchQuery) -> Vec<RecipeSummary> {
        let text = query.text.to_lowercase();
        let mut results: Vec<RecipeSummary> = self
            .recipes
            .values()
            .filter(|summary| query.category.is_empty() || summary.category == query.category)
            .filter(|summary| {
                text.is_empty()
                    || summary.title.to_lowercase().contains(&text)
                    || summary.recipe_id.to_lowercase().contains(&text)
            })
            .cloned()
            .collect();

        results.sort_by(|lhs, rhs| {
            rhs.core_topic
                .cmp(&lhs.core_topic)
                .then(rhs.updated_unix.cmp(&lhs.updated_unix))
                .then(lhs.recipe_id.cmp(&rhs.recipe_id))
        });
        results
    }

    /// Threads for a recipe (all threads when `recipe_id` is empty),
    /// newest first.
    pub fn query_threads(&self, recipe_id: &str) -> Vec<ThreadSummary> {
        let mut results: Vec<ThreadSummary> = self
            .threads
            .values()
            .filter(|thread| recipe_id.is_empty() || thread.recipe_id == recipe_id)
            .cloned()
            .collect();

        results.sort_by(|lhs, rhs| {
            rhs.updated_unix
                .cmp(&lhs.updated_unix)
                .then(lhs.thread_id.cmp(&rhs.thread_id))
        });
        results
    }

    /// Replies for a thread, oldest first.
    pub fn query_replies(&self, thread_id: &str) -> Vec<ReplySummary> {
        let mut replies = self
            .replies_by_thread
            .get(thread_id)
            .cloned()
            .unwrap_or_default();
        replies.sort_by(|lhs, rhs| {
            lhs.updated_unix
                .cmp(&rhs.updated_unix)
                .then(lhs.reply_id.cmp(&rhs.reply_id))
        });
        replies
    }

    /// Ledger balance for one CID; unknown CIDs hold zero.
    pub fn reward_balance(&self, cid: &str) -> i64 {
        self.reward_balances.get(cid).copied().unwrap_or(0)
    }

    /// All balances, richest first, ties by CID.
    pub fn reward_balance_summaries(&self) -> Vec<RewardBalanceSummary> {
        let mut balances: Vec<RewardBalanceSummary> = self
            .reward_balances
            .iter()
            .map(|(cid, balance)| RewardBalanceSummary {
                cid: cid.clone(),
                display_name: String::new(),
                balance: *balance,
            })
            .collect();
        balances.sort_by(|lhs, rhs| {
            rhs.balance
                .cmp(&lhs.balance)
                .then(lhs.cid.cmp(&rhs.cid))
        });
        balances
    }

    /// Whether an accepted claim exists for `block_index`.
    pub fn has_block_claim(&self, block_index: u64) -> bool {
        self.claimed_blocks.contains_key(&block_index)
    }

    /// Reward the next valid claim for `block_index` must carry.
    pub fn next_claim_reward(&self, block_index: u64) -> i64 {
        expected_claim_reward_for_block(block_index, self.issued_reward_total, &self.reward_schedule)
    }

    /// The nonce the CID's next transfer must carry.
    pub fn next_transfer_nonce(&self, cid: &str) -> u64 {
        self.transfer_nonce_by_cid.get(cid).copied().unwrap_or(0) + 1
    }

    /// Burn fee for a transfer amount.
    pub fn transfer_burn_fee(&self, amount: i64) -> i64 {
        transfer_burn_fee(amount)
    }

    /// Whether the CID currently holds moderator authority.
    pub fn is_moderator(&self, cid: &str) -> bool {
        !cid.is_empty() && self.moderators.contains(cid)
    }

    /// Aggregate moderation state for status reports.
    pub fn moderation_status(&self) -> ModerationStatus {
        let mut active_moderators: Vec<String> = self.moderators.iter().cloned().collect();
        active_moderators.sort();

        let mut object_ids: Vec<String> = self
            .moderation_flag_counts
            .keys()
            .chain(self.moderation_hidden_objects.iter())
            .chain(self.moderation_core_topic_overrides.keys())
            .cloned()
            .collect();
        object_ids.sort();
        object_ids.dedup();

        let objects = object_ids
            .into_iter()
            .map(|object_id| ModerationObjectState {
                flag_count: self
                    .moderation_flag_counts
                    .get(&object_id)
                    .copied()
                    .unwrap_or(0),
                hidden: self.moderation_hidden_objects.contains(&object_id),
                auto_hidden: self.moderation_auto_hidden_objects.contains(&object_id),
                core_topic_pinned: self
                    .moderation_core_topic_overrides
                    .get(&object_id)
                    .copied()
                    .unwrap_or(false),
                object_id,
            })
            .collect();

        ModerationStatus {
            enabled: self.moderation_policy.moderation_enabled,
            policy: self.moderation_policy.clone(),
            active_moderators,
            objects,
            invalid_event_count: self.invalid_moderation_events.len(),
        }
    }

    /// Confirmation detail line for a content object, used by reference
    /// lookups. `None` when no event references the object.
    pub fn confirmation_for_object(&self, object_id: &str) -> Option<String> {
        if object_id.is_empty() {
            return None;
        }

        let global = self.consensus_hash();
        for event in &self.events {
            let payload = parse_canonical_map(&event.payload);
            let matches = ["recipe_id", "thread_id", "reply_id"]
                .iter()
                .any(|key| payload.get(*key).map(String::as_str) == Some(object_id));
            if !matches {
                continue;
            }

            let Some(block) = self.block_for_event(&event.event_id) else {
                return Some(format!(
                    "event={} hash={}",
                    event.event_id,
                    stable_hash(&format!("{global}{}", event.event_id))
                ));
            };

            let (confirmations, age_seconds) = self
                .confirmation_metrics_for_event(&event.event_id, event.unix_ts)
                .unwrap_or((0, (unix_timestamp_now() - event.unix_ts).max(0)));

            return Some(format!(
                "event={} block={} confirmations={confirmations} age_s={age_seconds} \
                 finality_threshold={} merkle={} hash={}",
                event.event_id,
                block.index,
                self.chain_policy.confirmation_threshold,
                block.merkle_root,
                stable_hash(&format!("{global}|{}|{}", event.event_id, block.block_hash))
            ));
        }

        None
    }
}
