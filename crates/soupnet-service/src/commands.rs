//! Public command API: content creation, reward transfers, moderation,
//! wallet lifecycle, transports, peers and profile controls.
//!
//! Every command validates its preconditions (wallet unlocked, balance
//! sufficient, authority present), constructs a canonical signed event
//! where one is called for, and returns a [`CommandOutcome`] — never a
//! panic.

use soupnet_protocol::address::ADDRESS_PREFIX;
use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_crypto::sha256_hex;
use soupnet_types::{
    AnonymityMode, CommandOutcome, EventKind, RecipeDraft, ReplyDraft, ReviewDraft,
    RewardTransferAddressDraft, RewardTransferDraft, SearchQuery, ThreadDraft,
};

use crate::community::sanitize_display_name;
use crate::service::Service;

impl Service {
    // -- Content ----------------------------------------------------------

    pub fn create_recipe(&mut self, draft: &RecipeDraft) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("create_recipe") {
            return err.into();
        }
        if draft.title.is_empty() {
            return CommandOutcome::failure("Recipe title is required.");
        }
        if draft.markdown.is_empty() {
            return CommandOutcome::failure("Recipe markdown content is required.");
        }
        if draft.value_units < 0 {
            return CommandOutcome::failure("Recipe post value cannot be negative.");
        }

        // Core topics skip the community minimum; they spend exactly what
        // the draft declares.
        let post_value = if draft.core_topic {
            let requested = draft.value_units;
            if requested > 0
                && self.store.reward_balance(&self.vault.identity().cid) < requested
            {
                return CommandOutcome::failure(
                    "Insufficient reward balance to publish this core topic value.",
                );
            }
            requested
        } else {
            match self.validate_and_apply_post_cost(draft.value_units) {
                Ok(applied) => applied,
                Err(err) => return err.into(),
            }
        };

        let recipe_id = format!(
            "rcp-{}",
            self.short_id_hash(&format!(
                "{}{}{}{}",
                self.current_community.community_id,
                draft.title,
                draft.markdown,
                unix_timestamp_now()
            ))
        );
        let menu_segment = if draft.menu_segment.is_empty() {
            if draft.core_topic {
                "core-menu"
            } else {
                "community-post"
            }
            .to_string()
        } else {
            draft.menu_segment.clone()
        };

        let event = self.make_event(
            EventKind::RecipeCreated,
            vec![
                ("recipe_id".into(), recipe_id),
                (
                    "category".into(),
                    if draft.category.is_empty() {
                        "General".into()
                    } else {
                        draft.category.clone()
                    },
                ),
                ("title".into(), draft.title.clone()),
                ("markdown".into(), draft.markdown.clone()),
                ("post_value".into(), post_value.to_string()),
                (
                    "core_topic".into(),
                    if draft.core_topic { "1" } else { "0" }.into(),
                ),
                ("menu_segment".into(), menu_segment),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn create_thread(&mut self, draft: &ThreadDraft) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("create_thread") {
            return err.into();
        }
        if draft.recipe_id.is_empty() {
            return CommandOutcome::failure("Thread creation requires recipe_id.");
        }
        if draft.title.is_empty() {
            return CommandOutcome::failure("Thread title is required.");
        }

        let post_value = match self.validate_and_apply_post_cost(draft.value_units) {
            Ok(applied) => applied,
            Err(err) => return err.into(),
        };

        let thread_id = format!(
            "thr-{}",
            self.short_id_hash(&format!(
                "{}{}{}{}",
                self.current_community.community_id,
                draft.recipe_id,
                draft.title,
                unix_timestamp_now()
            ))
        );

        let event = self.make_event(
            EventKind::ThreadCreated,
            vec![
                ("thread_id".into(), thread_id),
                ("recipe_id".into(), draft.recipe_id.clone()),
                ("title".into(), draft.title.clone()),
                ("markdown".into(), draft.markdown.clone()),
                ("post_value".into(), post_value.to_string()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn create_reply(&mut self, draft: &ReplyDraft) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("create_reply") {
            return err.into();
        }
        if draft.thread_id.is_empty() {
            return CommandOutcome::failure("Reply creation requires thread_id.");
        }
        if draft.markdown.is_empty() {
            return CommandOutcome::failure("Reply markdown content is required.");
        }

        let post_value = match self.validate_and_apply_post_cost(draft.value_units) {
            Ok(applied) => applied,
            Err(err) => return err.into(),
        };

        let reply_id = format!(
            "rpl-{}",
            self.short_id_hash(&format!(
                "{}{}{}{}",
                self.current_community.community_id,
                draft.thread_id,
                draft.markdown,
                unix_timestamp_now()
            ))
        );

        let event = self.make_event(
            EventKind::ReplyCreated,
            vec![
                ("reply_id".into(), reply_id),
                ("thread_id".into(), draft.thread_id.clone()),
                ("markdown".into(), draft.markdown.clone()),
                ("post_value".into(), post_value.to_string()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn add_review(&mut self, draft: &ReviewDraft) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("add_review") {
            return err.into();
        }
        if draft.recipe_id.is_empty() {
            return CommandOutcome::failure("Review requires recipe_id.");
        }
        if !(1..=5).contains(&draft.rating) {
            return CommandOutcome::failure("Review rating must be between 1 and 5.");
        }

        let post_value = match self.validate_and_apply_post_cost(draft.value_units) {
            Ok(applied) => applied,
            Err(err) => return err.into(),
        };

        let review_id = format!(
            "rev-{}",
            self.short_id_hash(&format!(
                "{}{}{}{}",
                self.current_community.community_id,
                draft.recipe_id,
                draft.rating,
                draft.markdown
            ))
        );

        let event = self.make_event(
            EventKind::ReviewAdded,
            vec![
                ("review_id".into(), review_id),
                ("recipe_id".into(), draft.recipe_id.clone()),
                ("rating".into(), draft.rating.to_string()),
                ("markdown".into(), draft.markdown.clone()),
                ("post_value".into(), post_value.to_string()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn add_thumb_up(&mut self, recipe_id: &str) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("add_thumb_up") {
            return err.into();
        }
        if recipe_id.is_empty() {
            return CommandOutcome::failure("Thumbs up requires recipe_id.");
        }

        let recipes = self.store.query_recipes(&SearchQuery::default());
        if !recipes.iter().any(|summary| summary.recipe_id == recipe_id) {
            return CommandOutcome::failure("Thumbs up target recipe was not found.");
        }

        let thumb_id = format!(
            "thm-{}",
            self.short_id_hash(&format!(
                "{}{}{}",
                self.current_community.community_id,
                recipe_id,
                unix_timestamp_now()
            ))
        );

        let event = self.make_event(
            EventKind::ThumbsUpAdded,
            vec![
                ("thumb_id".into(), thumb_id),
                ("recipe_id".into(), recipe_id.to_string()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    // -- Reward transfers -------------------------------------------------

    pub fn transfer_rewards(&mut self, draft: &RewardTransferDraft) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("transfer_rewards") {
            return err.into();
        }
        let target_name = sanitize_display_name(&draft.to_display_name);
        if target_name.is_empty() {
            return CommandOutcome::failure("Reward transfer requires a target display name.");
        }
        if draft.amount <= 0 {
            return CommandOutcome::failure("Reward transfer amount must be positive.");
        }

        let fee = self.store.transfer_burn_fee(draft.amount);
        let nonce = self.store.next_transfer_nonce(&self.vault.identity().cid);
        let local_balance = self.store.reward_balance(&self.vault.identity().cid);
        if local_balance < draft.amount + fee {
            return CommandOutcome::failure("Insufficient reward balance for transfer.");
        }

        let Some(target_cid) = self.resolve_display_name_to_cid(&target_name) else {
            return CommandOutcome::failure("Target display name is unknown or ambiguous.");
        };

        self.build_and_queue_transfer(
            &target_cid,
            draft.amount,
            fee,
            nonce,
            &draft.memo,
            vec![("to_display_name".into(), target_name)],
        )
    }

    pub fn transfer_rewards_to_address(
        &mut self,
        draft: &RewardTransferAddressDraft,
    ) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("transfer_rewards_to_address") {
            return err.into();
        }
        let target_address = draft.to_address.trim().to_string();
        if target_address.is_empty() {
            return CommandOutcome::failure("Reward transfer requires a target address.");
        }
        if !target_address.starts_with(ADDRESS_PREFIX) {
            return CommandOutcome::failure("Invalid address prefix for target address.");
        }
        if draft.amount <= 0 {
            return CommandOutcome::failure("Reward transfer amount must be positive.");
        }

        let fee = self.store.transfer_burn_fee(draft.amount);
        let nonce = self.store.next_transfer_nonce(&self.vault.identity().cid);
        let local_balance = self.store.reward_balance(&self.vault.identity().cid);
        if local_balance < draft.amount + fee {
            return CommandOutcome::failure("Insufficient reward balance for transfer.");
        }

        let Some(target_cid) = self.resolve_address_to_cid(&target_address) else {
            return CommandOutcome::failure("Target address is unknown in current community.");
        };

        self.build_and_queue_transfer(
            &target_cid,
            draft.amount,
            fee,
            nonce,
            &draft.memo,
            vec![("to_address".into(), target_address)],
        )
    }

    fn build_and_queue_transfer(
        &mut self,
        target_cid: &str,
        amount: i64,
        fee: i64,
        nonce: u64,
        memo: &str,
        extra_fields: Vec<(String, String)>,
    ) -> CommandOutcome {
        let sender_cid = self.vault.identity().cid.clone();
        let transfer_id = format!(
            "xfr-{}",
            self.short_id_hash(&format!(
                "{}{sender_cid}{target_cid}{amount}{}",
                self.current_community.community_id,
                unix_timestamp_now()
            ))
        );
        let witness_root =
            sha256_hex(format!("{sender_cid}|{target_cid}|{amount}|{fee}|{nonce}").as_bytes());

        let mut fields = vec![
            ("transfer_id".into(), transfer_id),
            ("to_cid".into(), target_cid.to_string()),
            ("amount".into(), amount.to_string()),
            ("fee".into(), fee.to_string()),
            ("nonce".into(), nonce.to_string()),
            ("witness_root".into(), witness_root),
            ("memo".into(), memo.to_string()),
        ];
        fields.extend(extra_fields);

        let event = self.make_event(EventKind::RewardTransferred, fields);
        self.append_locally_and_queue(event)
    }

    // -- Transports and peers ---------------------------------------------

    pub fn set_transport_enabled(&mut self, mode: AnonymityMode, enabled: bool) -> CommandOutcome {
        match mode {
            AnonymityMode::Tor => self.tor_enabled = enabled,
            AnonymityMode::I2p => self.i2p_enabled = enabled,
        }

        if let Err(err) = self.ensure_provider_state(mode, enabled) {
            return err.into();
        }

        if !self.tor_enabled && !self.i2p_enabled {
            self.node.stop();
            return CommandOutcome::success("All anonymity transports disabled; P2P node stopped.");
        }

        if self.active_mode == AnonymityMode::Tor && !self.tor_enabled && self.i2p_enabled {
            self.active_mode = AnonymityMode::I2p;
        } else if self.active_mode == AnonymityMode::I2p && !self.i2p_enabled && self.tor_enabled {
            self.active_mode = AnonymityMode::Tor;
        }

        self.reapply_network_target()
    }

    pub fn set_active_transport(&mut self, mode: AnonymityMode) -> CommandOutcome {
        if mode == AnonymityMode::Tor && !self.tor_enabled {
            return CommandOutcome::failure("Cannot activate Tor: Tor toggle is OFF.");
        }
        if mode == AnonymityMode::I2p && !self.i2p_enabled {
            return CommandOutcome::failure("Cannot activate I2P: I2P toggle is OFF.");
        }

        self.active_mode = mode;
        self.reapply_network_target()
    }

    pub fn set_alpha_test_mode(&mut self, enabled: bool) -> CommandOutcome {
        self.alpha_test_mode = enabled;
        self.tor_provider.set_alpha_test_mode(enabled);
        self.i2p_provider.set_alpha_test_mode(enabled);

        if self.tor_enabled {
            if let Err(err) = self.ensure_provider_state(AnonymityMode::Tor, true) {
                return err.into();
            }
        }
        if self.i2p_enabled {
            if let Err(err) = self.ensure_provider_state(AnonymityMode::I2p, true) {
                return err.into();
            }
        }

        self.reapply_network_target()
    }

    /// Switching transports or networks re-targets the community (and
    /// with it the per-network store and peers file).
    fn reapply_network_target(&mut self) -> CommandOutcome {
        if !self.current_community.profile_path.is_empty() {
            let profile_path = self.current_community.profile_path.clone();
            let display_name = self.current_community.display_name.clone();
            let description = self.current_community.description.clone();
            return match self.switch_community(&profile_path, &display_name, &description) {
                Ok(message) => CommandOutcome::success(message),
                Err(err) => err.into(),
            };
        }
        match self.restart_network() {
            Ok(()) => CommandOutcome::success("P2P node restarted."),
            Err(err) => err.into(),
        }
    }

    pub fn add_peer(&mut self, peer: &str) -> CommandOutcome {
        if let Err(err) = self.node.add_peer(peer) {
            return err.into();
        }
        match self.node.save_peers_dat(&self.peers_dat_path.clone()) {
            Ok(()) => CommandOutcome::success("Peer added."),
            Err(err) => err.into(),
        }
    }

    pub fn reload_peers_dat(&mut self) -> CommandOutcome {
        let path = self.peers_dat_path.clone();
        if let Err(err) = self.node.load_peers_dat(&path) {
            return err.into();
        }
        if let Err(err) = self.node.save_peers_dat(&path) {
            return err.into();
        }
        match self.restart_network() {
            Ok(()) => CommandOutcome::success("Peers reloaded and network restarted."),
            Err(err) => err.into(),
        }
    }

    // -- Profile controls -------------------------------------------------

    pub fn set_profile_display_name(&mut self, display_name: &str) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("set_profile_display_name") {
            return err.into();
        }
        let sanitized = sanitize_display_name(display_name);
        if sanitized.is_empty() {
            return CommandOutcome::failure(
                "Display name is required and must contain letters or numbers.",
            );
        }

        if self.profile_state.display_name_immortalized
            && !self.profile_state.display_name.is_empty()
            && sanitized != self.profile_state.display_name
        {
            return CommandOutcome::failure(
                "Display name is immortalized and cannot be changed for this CID.",
            );
        }

        if self.profile_state.reject_duplicate_names {
            let observed = self.observed_display_names_by_cid();
            let own_cid = self.vault.identity().cid.clone();
            let requested = sanitized.to_lowercase();
            for (cid, name) in observed {
                if cid != own_cid && name.to_lowercase() == requested {
                    return CommandOutcome::failure(format!(
                        "Duplicate name rejected: already used by CID {cid}"
                    ));
                }
            }
        }

        self.profile_state.display_name = sanitized;
        self.profile_state.display_name_immortalized = true;
        if let Err(err) = self.save_profile_state() {
            return err.into();
        }

        let event = self.make_event(
            EventKind::ProfileUpdated,
            vec![
                (
                    "display_name".into(),
                    self.profile_state.display_name.clone(),
                ),
                ("display_name_immortalized".into(), "1".into()),
                (
                    "duplicate_policy".into(),
                    if self.profile_state.reject_duplicate_names {
                        "reject"
                    } else {
                        "allow"
                    }
                    .into(),
                ),
            ],
        );
        self.append_locally_and_queue(event)
    }

    /// Immortal name flow: cipher password update, then the immortalized
    /// display name, then a key announcement to peers.
    pub fn set_immortal_name_with_cipher(
        &mut self,
        display_name: &str,
        cipher_password: &str,
        cipher_salt: &str,
    ) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("set_immortal_name_with_cipher") {
            return err.into();
        }
        if cipher_password.trim().is_empty() {
            return CommandOutcome::failure("Immortal name requires cipher password.");
        }

        let cipher_result = self.set_profile_cipher_password(cipher_password, cipher_salt);
        if !cipher_result.ok {
            return cipher_result;
        }

        let name_result = self.set_profile_display_name(display_name);
        if !name_result.ok {
            return name_result;
        }

        let sync_result = self.update_key_to_peers();
        if !sync_result.ok {
            return sync_result;
        }

        CommandOutcome::success("Immortal name processed with required cipher and peer update.")
    }

    pub fn set_duplicate_name_policy(&mut self, reject_duplicates: bool) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("set_duplicate_name_policy") {
            return err.into();
        }
        self.profile_state.reject_duplicate_names = reject_duplicates;
        if let Err(err) = self.save_profile_state() {
            return err.into();
        }

        let mut fields = vec![
            (
                "duplicate_policy".into(),
                if reject_duplicates { "reject" } else { "allow" }
                    .to_string(),
            ),
            (
                "display_name_immortalized".into(),
                if self.profile_state.display_name_immortalized {
                    "1"
                } else {
                    "0"
                }
                .to_string(),
            ),
        ];
        if !self.profile_state.display_name.is_empty() {
            fields.push((
                "display_name".into(),
                self.profile_state.display_name.clone(),
            ));
        }

        let event = self.make_event(EventKind::ProfileUpdated, fields);
        self.append_locally_and_queue(event)
    }

    pub fn set_profile_cipher_password(&mut self, password: &str, salt: &str) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("set_profile_cipher_password") {
            return err.into();
        }
        let pass = password.trim();
        if pass.is_empty() {
            return CommandOutcome::failure("Cipher key update failed: password is required.");
        }

        let mut applied_salt = salt.trim().to_string();
        if applied_salt.is_empty() {
            applied_salt = format!(
                "{}:{}",
                self.current_community.community_id,
                self.vault.identity().cid
            );
        }

        self.current_community.cipher_key = self
            .vault
            .derive_vault_key(pass, &format!("community-cipher:{applied_salt}"));
        let profile = self.current_community.clone();
        if let Err(err) = self.write_community_profile_file(&profile) {
            return err.into();
        }

        CommandOutcome::success_with("Community cipher key updated.", applied_salt)
    }

    pub fn update_key_to_peers(&mut self) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("update_key_to_peers") {
            return err.into();
        }
        let event = self.make_event(
            EventKind::KeyRotated,
            vec![
                ("action".into(), "announce".into()),
                ("cid".into(), self.vault.identity().cid.clone()),
                (
                    "public_key".into(),
                    self.vault.identity().public_key.clone(),
                ),
            ],
        );
        self.append_locally_and_queue(event)
    }

    // -- Moderation -------------------------------------------------------

    pub fn add_moderator(&mut self, cid: &str) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("add_moderator") {
            return err.into();
        }
        if let Err(err) = self.ensure_local_moderator("add_moderator") {
            return err.into();
        }
        let target_cid = cid.trim().to_string();
        if target_cid.is_empty() {
            return CommandOutcome::failure("Add moderator requires a non-empty CID.");
        }

        let event = self.make_event(
            EventKind::ModeratorAdded,
            vec![
                ("target_cid".into(), target_cid),
                ("action".into(), "moderator-add".into()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn remove_moderator(&mut self, cid: &str) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("remove_moderator") {
            return err.into();
        }
        if let Err(err) = self.ensure_local_moderator("remove_moderator") {
            return err.into();
        }
        let target_cid = cid.trim().to_string();
        if target_cid.is_empty() {
            return CommandOutcome::failure("Remove moderator requires a non-empty CID.");
        }

        // Refuse up front rather than shipping an event the fold will
        // reject: the last moderator cannot remove themselves.
        let status = self.store.moderation_status();
        if status.active_moderators.len() <= 1
            && status.active_moderators.contains(&target_cid)
        {
            return CommandOutcome::failure(
                "Cannot remove the last moderator of the community.",
            );
        }

        let event = self.make_event(
            EventKind::ModeratorRemoved,
            vec![
                ("target_cid".into(), target_cid),
                ("action".into(), "moderator-remove".into()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn flag_content(&mut self, object_id: &str, reason: &str) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("flag_content") {
            return err.into();
        }
        let target_id = object_id.trim().to_string();
        if target_id.is_empty() {
            return CommandOutcome::failure("Flag content requires an object_id.");
        }
        let reason_text = reason.trim();

        let event = self.make_event(
            EventKind::ContentFlagged,
            vec![
                ("object_id".into(), target_id),
                (
                    "reason".into(),
                    if reason_text.is_empty() {
                        "flagged"
                    } else {
                        reason_text
                    }
                    .to_string(),
                ),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn set_content_hidden(
        &mut self,
        object_id: &str,
        hidden: bool,
        reason: &str,
    ) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("set_content_hidden") {
            return err.into();
        }
        if let Err(err) = self.ensure_local_moderator("set_content_hidden") {
            return err.into();
        }
        let target_id = object_id.trim().to_string();
        if target_id.is_empty() {
            return CommandOutcome::failure("Set content hidden requires an object_id.");
        }
        let reason_text = reason.trim();

        let kind = if hidden {
            EventKind::ContentHidden
        } else {
            EventKind::ContentUnhidden
        };
        let event = self.make_event(
            kind,
            vec![
                ("object_id".into(), target_id),
                ("hidden".into(), if hidden { "1" } else { "0" }.into()),
                (
                    "reason".into(),
                    if reason_text.is_empty() {
                        if hidden {
                            "hidden"
                        } else {
                            "unhidden"
                        }
                    } else {
                        reason_text
                    }
                    .to_string(),
                ),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn pin_core_topic(&mut self, recipe_id: &str, pinned: bool) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("pin_core_topic") {
            return err.into();
        }
        if let Err(err) = self.ensure_local_moderator("pin_core_topic") {
            return err.into();
        }
        let target_recipe = recipe_id.trim().to_string();
        if target_recipe.is_empty() {
            return CommandOutcome::failure("Pin core topic requires a recipe_id.");
        }

        let kind = if pinned {
            EventKind::CoreTopicPinned
        } else {
            EventKind::CoreTopicUnpinned
        };
        let event = self.make_event(
            kind,
            vec![
                ("recipe_id".into(), target_recipe),
                ("pinned".into(), if pinned { "1" } else { "0" }.into()),
            ],
        );
        self.append_locally_and_queue(event)
    }

    // -- Wallet lifecycle -------------------------------------------------

    pub fn export_key_backup(
        &mut self,
        backup_path: &str,
        password: &str,
        salt: &str,
    ) -> CommandOutcome {
        if let Err(err) = self.ensure_wallet_unlocked("export_key_backup") {
            return err.into();
        }
        let resolved = self.resolve_data_path(backup_path, "backup/identity-backup.dat");
        match self.vault.export_identity_backup(&resolved, password, salt) {
            Ok(path) => {
                self.profile_state.last_key_backup_path = path.clone();
                let _ = self.save_profile_state();
                CommandOutcome::success_with("Key export completed.", path)
            }
            Err(err) => err.into(),
        }
    }

    pub fn import_key_backup(&mut self, backup_path: &str, password: &str) -> CommandOutcome {
        let resolved = self.resolve_data_path(backup_path, "backup/identity-backup.dat");
        let previous_cid = self.vault.identity().cid.clone();
        let passphrase = self.config.passphrase.clone();
        if let Err(err) = self
            .vault
            .import_identity_backup(&resolved, password, &passphrase)
        {
            return err.into();
        }

        self.profile_state.display_name.clear();
        self.profile_state.display_name_immortalized = false;
        self.profile_state.wallet_destroyed = false;
        self.profile_state.wallet_recovery_required = false;
        self.profile_state.wallet_last_unlocked_unix = self.vault.last_unlocked_unix();
        self.profile_state.wallet_last_locked_unix = self.vault.last_locked_unix();
        self.profile_state.last_key_backup_path = resolved.display().to_string();
        if let Err(err) = self.save_profile_state() {
            return err.into();
        }

        if let Err(err) = self.restart_network() {
            return err.into();
        }

        let current_cid = self.vault.identity().cid.clone();
        let event = self.make_event(
            EventKind::KeyRotated,
            vec![
                ("action".into(), "import".into()),
                ("previous_cid".into(), previous_cid),
                ("current_cid".into(), current_cid),
            ],
        );
        self.append_locally_and_queue(event)
    }

    pub fn lock_wallet(&mut self) -> CommandOutcome {
        self.vault.lock_identity();
        self.profile_state.wallet_last_locked_unix = self.vault.last_locked_unix();
        self.profile_state.wallet_recovery_required = false;
        let _ = self.save_profile_state();
        CommandOutcome::success("Wallet locked.")
    }

    pub fn unlock_wallet(&mut self, passphrase: &str) -> CommandOutcome {
        if let Err(err) = self.vault.unlock_identity(passphrase) {
            self.profile_state.wallet_recovery_required = true;
            return err.into();
        }
        self.profile_state.wallet_last_unlocked_unix = self.vault.last_unlocked_unix();
        self.profile_state.wallet_recovery_required = false;
        self.profile_state.wallet_destroyed = false;
        let _ = self.save_profile_state();
        match self.restart_network() {
            Ok(()) => CommandOutcome::success("Wallet unlocked."),
            Err(err) => err.into(),
        }
    }

    pub fn recover_wallet(
        &mut self,
        backup_path: &str,
        backup_password: &str,
        new_local_passphrase: &str,
    ) -> CommandOutcome {
        let local_pass = new_local_passphrase.trim().to_string();
        if local_pass.is_empty() {
            return CommandOutcome::failure(
                "Wallet recovery failed: new local passphrase is required.",
            );
        }

        self.config.passphrase = local_pass.clone();
        let resolved = self.resolve_data_path(backup_path, "backup/identity-backup.dat");
        if let Err(err) = self
            .vault
            .import_identity_backup(&resolved, backup_password, &local_pass)
        {
            self.profile_state.wallet_recovery_required = true;
            return err.into();
        }

        self.profile_state.wallet_recovery_required = false;
        self.profile_state.wallet_destroyed = false;
        self.profile_state.wallet_last_unlocked_unix = self.vault.last_unlocked_unix();
        self.profile_state.last_key_backup_path = resolved.display().to_string();
        let _ = self.save_profile_state();
        match self.restart_network() {
            Ok(()) => CommandOutcome::success("Wallet recovered from backup."),
            Err(err) => err.into(),
        }
    }

    /// Destroys the current key and generates a fresh one. Requires the
    /// literal confirmation phrase; the old key is unrecoverable without
    /// a prior backup.
    pub fn nuke_key(&mut self, confirmation_phrase: &str) -> CommandOutcome {
        let confirm = confirmation_phrase.trim();
        if confirm != "NUKE-KEY" && confirm != "NUKE" {
            return CommandOutcome::failure("Nuke key requires confirmation text: NUKE-KEY");
        }

        let previous_cid = self.vault.identity().cid.clone();
        let passphrase = self.config.passphrase.clone();
        let production_swap = self.config.production_swap;
        if let Err(err) = self.vault.nuke_identity(&passphrase, production_swap) {
            return err.into();
        }

        self.profile_state.display_name.clear();
        self.profile_state.display_name_immortalized = false;
        self.profile_state.wallet_destroyed = true;
        self.profile_state.wallet_recovery_required = true;
        self.profile_state.wallet_last_unlocked_unix = self.vault.last_unlocked_unix();
        self.profile_state.wallet_last_locked_unix = self.vault.last_locked_unix();
        if let Err(err) = self.save_profile_state() {
            return err.into();
        }

        if let Err(err) = self.restart_network() {
            return err.into();
        }

        let current_cid = self.vault.identity().cid.clone();
        let event = self.make_event(
            EventKind::KeyRotated,
            vec![
                ("action".into(), "nuke".into()),
                ("previous_cid".into(), previous_cid),
                ("current_cid".into(), current_cid),
            ],
        );
        self.append_locally_and_queue(event)
    }

    // -- Validation and community -----------------------------------------

    pub fn run_backtest_validation(&mut self) -> CommandOutcome {
        match self.run_backtest() {
            Ok(message) => CommandOutcome::success(message),
            Err(err) => err.into(),
        }
    }

    pub fn use_community_profile(
        &mut self,
        community_or_path: &str,
        display_name: &str,
        description: &str,
    ) -> CommandOutcome {
        match self.switch_community(community_or_path, display_name, description) {
            Ok(message) => CommandOutcome::success(message),
            Err(err) => err.into(),
        }
    }
}
