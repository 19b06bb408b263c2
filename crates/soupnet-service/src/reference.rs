//! Forum-backed reference browsing and the hashspec console.
//!
//! The reference surface projects the materialized store views into a
//! menu/opening/entry shape (`forum::recipe::…`, `forum::thread::…`,
//! `forum::reply::…`, `forum::moderation::…`) so an embedder can browse
//! the community like a reference pad. The hashspec console renders a
//! textual anticipation of the next block plus a bounded PoW preview.

use std::collections::HashMap;
use std::fmt::Write as _;

use soupnet_crypto::{has_leading_zero_nibbles, sha256_hex};
use soupnet_protocol::merkle::compute_merkle_root;
use soupnet_types::{RecipeSummary, SearchQuery};

use crate::service::Service;

/// Bounded nonce search budget for the console preview.
const PREVIEW_POW_ATTEMPTS: u64 = 200_000;

/// One browsable reference entry.
#[derive(Clone, Debug)]
pub struct ReferenceEntry {
    pub parent_menu: String,
    pub secondary_menu: String,
    pub key: String,
    pub title: String,
    pub body: String,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn segment_label(recipe: &RecipeSummary) -> &'static str {
    if recipe.core_topic {
        "CORE"
    } else {
        "COMMUNITY"
    }
}

impl Service {
    pub fn reference_parent_menus(&self) -> Vec<String> {
        vec!["Forum".into()]
    }

    pub fn reference_secondary_menus(&self, parent: &str) -> Vec<String> {
        if parent != "Forum" {
            return Vec::new();
        }
        vec![
            "Core Menu".into(),
            "Community Posts".into(),
            "Threads".into(),
            "Replies".into(),
            "Recipes".into(),
            "Moderation".into(),
        ]
    }

    pub fn reference_openings(&self, parent: &str, secondary: &str, query: &str) -> Vec<String> {
        if parent != "Forum" {
            return Vec::new();
        }

        let mut keys = Vec::new();
        match secondary {
            "Recipes" | "Core Menu" | "Community Posts" => {
                let recipes = self.store.query_recipes(&SearchQuery {
                    text: query.to_string(),
                    category: String::new(),
                });
                for recipe in recipes {
                    let wanted = match secondary {
                        "Core Menu" => recipe.core_topic,
                        "Community Posts" => !recipe.core_topic,
                        _ => true,
                    };
                    if wanted {
                        keys.push(format!("forum::recipe::{}", recipe.recipe_id));
                    }
                }
            }

            "Threads" => {
                for thread in self.store.query_threads("") {
                    if contains_ci(&thread.title, query)
                        || contains_ci(&thread.thread_id, query)
                        || contains_ci(&thread.recipe_id, query)
                    {
                        keys.push(format!("forum::thread::{}", thread.thread_id));
                    }
                }
            }

            "Replies" => {
                for thread in self.store.query_threads("") {
                    for reply in self.store.query_replies(&thread.thread_id) {
                        if contains_ci(&reply.reply_id, query)
                            || contains_ci(&reply.author_cid, query)
                            || contains_ci(&reply.markdown, query)
                        {
                            keys.push(format!("forum::reply::{}", reply.reply_id));
                        }
                    }
                }
            }

            "Moderation" => {
                keys.push("forum::moderation::summary".into());
                for object in self.store.moderation_status().objects {
                    let key = format!("forum::moderation::object::{}", object.object_id);
                    if contains_ci(&key, query) || contains_ci(&object.object_id, query) {
                        keys.push(key);
                    }
                }
            }

            _ => {}
        }
        keys
    }

    pub fn reference_lookup(&self, key: &str) -> Option<ReferenceEntry> {
        let health = self.store.health_report();

        if let Some(recipe_id) = key.strip_prefix("forum::recipe::") {
            let recipe = self
                .store
                .query_recipes(&SearchQuery::default())
                .into_iter()
                .find(|recipe| recipe.recipe_id == recipe_id)?;
            let thread_count = self.store.query_threads(&recipe.recipe_id).len();

            let mut body = String::new();
            let _ = writeln!(body, "Community: {}", self.current_community.community_id);
            let _ = writeln!(body, "Chain: {} ({})", health.chain_id, health.network_id);
            let _ = writeln!(body, "Recipe ID: {}", recipe.recipe_id);
            let _ = writeln!(body, "Confirmation Event ID: {}", recipe.source_event_id);
            if let Some(confirmation) = self.store.confirmation_for_object(&recipe.recipe_id) {
                let _ = writeln!(body, "Universal Confirmation: {confirmation}");
            }
            let _ = writeln!(body, "Consensus Hash: {}", health.consensus_hash);
            let _ = writeln!(body, "Category: {}", recipe.category);
            let _ = writeln!(body, "Segment: {}", segment_label(&recipe));
            let _ = writeln!(body, "Menu Segment: {}", recipe.menu_segment);
            let _ = writeln!(body, "Post Value: {}", recipe.value_units);
            let _ = writeln!(body, "Confirmations: {}", recipe.confirmation_count);
            let _ = writeln!(
                body,
                "Finality Threshold: {}",
                health.confirmation_threshold
            );
            let _ = writeln!(body, "Age (s): {}", recipe.confirmation_age_seconds);
            let _ = writeln!(body, "Author CID: {}", recipe.author_cid);
            let _ = writeln!(body, "Thumbs Up: {}", recipe.thumbs_up_count);
            let _ = writeln!(body, "Average Rating: {}", recipe.average_rating);
            let _ = writeln!(body, "Review Count: {}", recipe.review_count);
            let _ = writeln!(body, "Thread Count: {thread_count}");

            return Some(ReferenceEntry {
                parent_menu: "Forum".into(),
                secondary_menu: if recipe.core_topic {
                    "Core Menu"
                } else {
                    "Community Posts"
                }
                .into(),
                key: key.to_string(),
                title: format!("[{}] Recipe: {}", segment_label(&recipe), recipe.title),
                body,
            });
        }

        if let Some(thread_id) = key.strip_prefix("forum::thread::") {
            let thread = self
                .store
                .query_threads("")
                .into_iter()
                .find(|thread| thread.thread_id == thread_id)?;
            let replies = self.store.query_replies(&thread.thread_id);

            let mut body = String::new();
            let _ = writeln!(body, "Community: {}", self.current_community.community_id);
            let _ = writeln!(body, "Chain: {} ({})", health.chain_id, health.network_id);
            let _ = writeln!(body, "Thread ID: {}", thread.thread_id);
            let _ = writeln!(body, "Confirmation Event ID: {}", thread.source_event_id);
            if let Some(confirmation) = self.store.confirmation_for_object(&thread.thread_id) {
                let _ = writeln!(body, "Universal Confirmation: {confirmation}");
            }
            let _ = writeln!(body, "Consensus Hash: {}", health.consensus_hash);
            let _ = writeln!(body, "Recipe ID: {}", thread.recipe_id);
            let _ = writeln!(body, "Post Value: {}", thread.value_units);
            let _ = writeln!(body, "Confirmations: {}", thread.confirmation_count);
            let _ = writeln!(
                body,
                "Finality Threshold: {}",
                health.confirmation_threshold
            );
            let _ = writeln!(body, "Age (s): {}", thread.confirmation_age_seconds);
            let _ = writeln!(body, "Author CID: {}", thread.author_cid);
            let _ = writeln!(body, "Reply Count: {}\n", replies.len());
            body.push_str("Replies\n");
            for reply in &replies {
                let _ = writeln!(body, "- [{}] {}", reply.reply_id, reply.author_cid);
            }

            return Some(ReferenceEntry {
                parent_menu: "Forum".into(),
                secondary_menu: "Threads".into(),
                key: key.to_string(),
                title: format!("Thread: {}", thread.title),
                body,
            });
        }

        if let Some(reply_id) = key.strip_prefix("forum::reply::") {
            for thread in self.store.query_threads("") {
                for reply in self.store.query_replies(&thread.thread_id) {
                    if reply.reply_id != reply_id {
                        continue;
                    }

                    let mut body = String::new();
                    let _ =
                        writeln!(body, "Community: {}", self.current_community.community_id);
                    let _ =
                        writeln!(body, "Chain: {} ({})", health.chain_id, health.network_id);
                    let _ = writeln!(body, "Reply ID: {}", reply.reply_id);
                    let _ = writeln!(body, "Confirmation Event ID: {}", reply.source_event_id);
                    if let Some(confirmation) =
                        self.store.confirmation_for_object(&reply.reply_id)
                    {
                        let _ = writeln!(body, "Universal Confirmation: {confirmation}");
                    }
                    let _ = writeln!(body, "Consensus Hash: {}", health.consensus_hash);
                    let _ = writeln!(body, "Thread ID: {}", reply.thread_id);
                    let _ = writeln!(body, "Post Value: {}", reply.value_units);
                    let _ = writeln!(body, "Confirmations: {}", reply.confirmation_count);
                    let _ = writeln!(
                        body,
                        "Finality Threshold: {}",
                        health.confirmation_threshold
                    );
                    let _ = writeln!(body, "Age (s): {}", reply.confirmation_age_seconds);
                    let _ = writeln!(body, "Author CID: {}\n", reply.author_cid);
                    body.push_str(&reply.markdown);

                    return Some(ReferenceEntry {
                        parent_menu: "Forum".into(),
                        secondary_menu: "Replies".into(),
                        key: key.to_string(),
                        title: format!("Reply: {}", reply.reply_id),
                        body,
                    });
                }
            }
            return None;
        }

        if key == "forum::moderation::summary" {
            let moderation = self.store.moderation_status();
            let mut body = String::new();
            let _ = writeln!(body, "Community: {}", self.current_community.community_id);
            let _ = writeln!(
                body,
                "Moderation Enabled: {}",
                if moderation.enabled { "YES" } else { "NO" }
            );
            let _ = writeln!(
                body,
                "Require Finality: {}",
                if moderation.policy.require_finality_for_actions {
                    "YES"
                } else {
                    "NO"
                }
            );
            let _ = writeln!(
                body,
                "Min Confirmations: {}",
                moderation.policy.min_confirmations_for_enforcement
            );
            let _ = writeln!(
                body,
                "Auto Hide Flags: {}",
                moderation.policy.max_flags_before_auto_hide
            );
            let _ = writeln!(body, "Role Model: {}", moderation.policy.role_model);
            let _ = writeln!(
                body,
                "Invalid Moderation Events: {}",
                moderation.invalid_event_count
            );
            let _ = writeln!(
                body,
                "Active Moderators: {}",
                moderation.active_moderators.len()
            );
            for moderator_cid in &moderation.active_moderators {
                let _ = writeln!(body, "- {moderator_cid}");
            }
            let _ = writeln!(body, "\nModerated Objects: {}", moderation.objects.len());

            return Some(ReferenceEntry {
                parent_menu: "Forum".into(),
                secondary_menu: "Moderation".into(),
                key: key.to_string(),
                title: "Moderation Summary".into(),
                body,
            });
        }

        if let Some(object_id) = key.strip_prefix("forum::moderation::object::") {
            let moderation = self.store.moderation_status();
            let object = moderation
                .objects
                .into_iter()
                .find(|object| object.object_id == object_id)?;

            let mut body = String::new();
            let _ = writeln!(body, "Object ID: {}", object.object_id);
            let _ = writeln!(body, "Flags: {}", object.flag_count);
            let _ = writeln!(body, "Hidden: {}", if object.hidden { "YES" } else { "NO" });
            let _ = writeln!(
                body,
                "Auto Hidden: {}",
                if object.auto_hidden { "YES" } else { "NO" }
            );
            let _ = writeln!(
                body,
                "Core Topic Pinned: {}",
                if object.core_topic_pinned { "YES" } else { "NO" }
            );
            let _ = writeln!(body, "Consensus Hash: {}", health.consensus_hash);

            return Some(ReferenceEntry {
                parent_menu: "Forum".into(),
                secondary_menu: "Moderation".into(),
                key: key.to_string(),
                title: format!("Moderation Object: {}", object.object_id),
                body,
            });
        }

        None
    }

    /// Textual next-block anticipation with a bounded PoW preview.
    pub fn hashspec_console(&self) -> String {
        let blocks = self.store.all_blocks();
        let events = self.store.all_events();
        let mut text = String::from("HashSpec Console\n\n");
        let Some(latest) = blocks.last() else {
            text.push_str("No blocks found.\n");
            return text;
        };

        let mut payload_hash_by_event: HashMap<&str, String> =
            HashMap::with_capacity(events.len());
        for event in events {
            payload_hash_by_event
                .insert(&event.event_id, sha256_hex(event.payload.as_bytes()));
        }

        let next_index = latest.index + 1;
        let next_open_unix =
            latest.opened_unix + self.config.block_interval_seconds.max(1) as i64;
        let prev_hash = if latest.block_hash.is_empty() {
            "genesis".to_string()
        } else {
            latest.block_hash.clone()
        };

        // The successor slot opens empty; anticipate it as such.
        let anticipated_merkle = compute_merkle_root(Vec::new());
        let anticipated_content_hash = sha256_hex(b"");
        let anticipated_block_hash = sha256_hex(
            format!(
                "{next_index}|{next_open_unix}|1|0|0|{prev_hash}|{anticipated_merkle}|{anticipated_content_hash}|"
            )
            .as_bytes(),
        );

        let testnet = self.use_testnet();
        let difficulty_nibbles = if testnet { 3 } else { 4 };
        let pow_material = format!(
            "{}|{}|{next_index}|{anticipated_block_hash}|{anticipated_merkle}",
            self.current_community.community_id,
            self.vault.identity().cid
        );

        let _ = writeln!(
            text,
            "Chain: {}",
            if testnet {
                &self.config.testnet_chain_id
            } else {
                &self.config.mainnet_chain_id
            }
        );
        let _ = writeln!(text, "Network: {}", if testnet { "testnet" } else { "mainnet" });
        let _ = writeln!(text, "Latest Block Index: {}", latest.index);
        let _ = writeln!(text, "Latest Block Hash: {}", latest.block_hash);
        let _ = writeln!(text, "Latest Merkle Root: {}\n", latest.merkle_root);

        text.push_str("Next Block Anticipation\n");
        let _ = writeln!(text, "- Next Index: {next_index}");
        let _ = writeln!(text, "- Prev Hash: {prev_hash}");
        let _ = writeln!(text, "- Anticipated Merkle Root: {anticipated_merkle}");
        let _ = writeln!(text, "- Anticipated Content Hash: {anticipated_content_hash}");
        let _ = writeln!(text, "- Anticipated Block Hash: {anticipated_block_hash}\n");

        text.push_str("PoW Preview\n");
        let _ = writeln!(
            text,
            "- Difficulty (leading zero nibbles): {difficulty_nibbles}"
        );
        let _ = writeln!(text, "- Material: {pow_material}");
        text.push_str("- Samples:\n");
        for attempt in 0..5u64 {
            let sample = sha256_hex(format!("{pow_material}|{attempt}").as_bytes());
            let _ = writeln!(text, "  nonce {attempt} => {sample}");
        }

        let mut found: Option<(u64, String)> = None;
        for attempt in 0..PREVIEW_POW_ATTEMPTS {
            let candidate = sha256_hex(format!("{pow_material}|{attempt}").as_bytes());
            if has_leading_zero_nibbles(&candidate, difficulty_nibbles) {
                found = Some((attempt, candidate));
                break;
            }
        }

        match found {
            Some((nonce, hash)) => {
                let _ = writeln!(text, "- First match nonce: {nonce}");
                let _ = writeln!(text, "- First match hash: {hash}");
            }
            None => {
                let _ = writeln!(
                    text,
                    "- Match not found in first {PREVIEW_POW_ATTEMPTS} attempts."
                );
            }
        }
        text
    }
}
