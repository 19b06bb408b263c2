//! End-to-end orchestrator flows: content, wallet lifecycle, reward
//! gating, moderation, community switching and node status controls.

use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use soupnet_service::Service;
use soupnet_types::config::InitConfig;
use soupnet_types::{
    AnonymityMode, ModerationPolicy, RecipeDraft, ReviewDraft, RewardTransferDraft, SearchQuery,
    ThreadDraft,
};

fn base_config(dir: &TempDir) -> InitConfig {
    InitConfig {
        app_data_dir: dir.path().display().to_string(),
        passphrase: "integration-passphrase".into(),
        mode: AnonymityMode::Tor,
        seed_peers: vec!["seed-a".into(), "seed-b".into()],
        community_profile_path: "recipes".into(),
        production_swap: true,
        ..InitConfig::default()
    }
}

fn init_service(config: InitConfig) -> Service {
    let mut service = Service::new();
    let outcome = service.init(config);
    assert!(outcome.ok, "{}", outcome.message);
    service
}

#[test]
fn garlic_pasta_flow_produces_searchable_recipe_and_gossip() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let create = service.create_recipe(&RecipeDraft {
        category: "Dinner".into(),
        title: "Garlic Pasta".into(),
        markdown: "Cook pasta and add garlic butter.".into(),
        ..RecipeDraft::default()
    });
    assert!(create.ok, "{}", create.message);
    assert!(create.data.starts_with("evt-"), "{}", create.data);

    let recipes = service.search(&SearchQuery {
        text: "garlic".into(),
        category: String::new(),
    });
    assert_eq!(recipes.len(), 1);
    assert!(!recipes[0].core_topic);
    let recipe_id = recipes[0].recipe_id.clone();

    let review = service.add_review(&ReviewDraft {
        recipe_id: recipe_id.clone(),
        rating: 5,
        markdown: "Great recipe".into(),
        ..ReviewDraft::default()
    });
    assert!(review.ok, "{}", review.message);

    let thumb = service.add_thumb_up(&recipe_id);
    assert!(thumb.ok, "{}", thumb.message);

    let recipes = service.search(&SearchQuery {
        text: "garlic".into(),
        category: String::new(),
    });
    assert!(!recipes.is_empty());
    assert!(recipes[0].review_count >= 1);
    assert!(recipes[0].thumbs_up_count >= 1);
    assert!((recipes[0].average_rating - 5.0).abs() < f64::EPSILON);

    let published = service.sync_tick();
    assert_eq!(published.len(), 3);
}

#[test]
fn invalid_drafts_are_rejected_without_state_change() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    assert!(!service.create_recipe(&RecipeDraft::default()).ok);
    assert!(
        !service
            .add_review(&ReviewDraft {
                recipe_id: "rcp-x".into(),
                rating: 6,
                ..ReviewDraft::default()
            })
            .ok
    );
    assert!(!service.add_thumb_up("rcp-unknown").ok);
    assert!(
        !service
            .create_thread(&ThreadDraft {
                recipe_id: String::new(),
                title: "No recipe".into(),
                ..ThreadDraft::default()
            })
            .ok
    );

    assert!(service.search(&SearchQuery::default()).is_empty());
    let status = service.node_status();
    assert!(status.db.backtest_ok);
}

#[test]
fn wallet_lifecycle_lock_unlock_nuke_recover() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let set_name = service.set_immortal_name_with_cipher("Wallet Chef", "cipher-pass", "salt");
    assert!(set_name.ok, "{}", set_name.message);

    let before_cid = service.profile().cid;
    let backup_path = dir.path().join("backup").join("wallet.dat");
    let backup = service.export_key_backup(
        &backup_path.display().to_string(),
        "backup-pass",
        "salt",
    );
    assert!(backup.ok, "{}", backup.message);
    assert!(backup_path.exists());

    let lock = service.lock_wallet();
    assert!(lock.ok);
    let create_locked = service.create_recipe(&RecipeDraft {
        category: "Locked".into(),
        title: "Should Fail".into(),
        markdown: "wallet locked".into(),
        ..RecipeDraft::default()
    });
    assert!(!create_locked.ok);
    assert!(create_locked.message.contains("locked"), "{}", create_locked.message);

    let unlock_bad = service.unlock_wallet("wrong-pass");
    assert!(!unlock_bad.ok);
    let unlock = service.unlock_wallet("integration-passphrase");
    assert!(unlock.ok, "{}", unlock.message);

    let create_unlocked = service.create_recipe(&RecipeDraft {
        category: "Unlocked".into(),
        title: "Should Pass".into(),
        markdown: "wallet unlocked".into(),
        ..RecipeDraft::default()
    });
    assert!(create_unlocked.ok, "{}", create_unlocked.message);

    let nuke = service.nuke_key("NUKE-KEY");
    assert!(nuke.ok, "{}", nuke.message);
    let nuked_cid = service.profile().cid;
    assert_ne!(nuked_cid, before_cid);

    let recover = service.recover_wallet(
        &backup_path.display().to_string(),
        "backup-pass",
        "integration-passphrase",
    );
    assert!(recover.ok, "{}", recover.message);
    assert_eq!(service.profile().cid, before_cid);
}

#[test]
fn nuke_key_requires_confirmation_phrase() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));
    assert!(!service.nuke_key("yes please").ok);
    assert!(service.nuke_key("NUKE-KEY").ok);
}

#[test]
fn reward_gating_blocks_posts_until_rewards_are_mined() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(InitConfig {
        block_interval_seconds: 1,
        block_reward_units: 6,
        minimum_post_value: 3,
        genesis_psz_timestamp: "Alpha-One genesis: got-soup reward ledger start".into(),
        ..base_config(&dir)
    });

    let create_core = service.create_recipe(&RecipeDraft {
        category: "Core Topic".into(),
        title: "Core Tomato Base".into(),
        markdown: "Core baseline recipe.".into(),
        core_topic: true,
        menu_segment: "core-menu".into(),
        value_units: 0,
    });
    assert!(create_core.ok, "{}", create_core.message);

    let recipes = service.search(&SearchQuery {
        text: "Core Tomato Base".into(),
        category: String::new(),
    });
    assert!(!recipes.is_empty());
    let recipe_id = recipes[0].recipe_id.clone();

    // Minimum post value is 3 and no rewards exist yet.
    let create_thread_fail = service.create_thread(&ThreadDraft {
        recipe_id: recipe_id.clone(),
        title: "Needs rewards first".into(),
        markdown: "Should fail before mining rewards.".into(),
        value_units: 0,
    });
    assert!(!create_thread_fail.ok);

    let mut balance_after_claim = service.local_reward_balance();
    for _ in 0..20 {
        if balance_after_claim >= 6 {
            break;
        }
        thread::sleep(Duration::from_millis(200));
        let _ = service.sync_tick();
        balance_after_claim = service.local_reward_balance();
    }
    assert!(balance_after_claim >= 6, "balance {balance_after_claim}");

    let create_thread_ok = service.create_thread(&ThreadDraft {
        recipe_id,
        title: "Now funded".into(),
        markdown: "Posting after reward claim.".into(),
        value_units: 0,
    });
    assert!(create_thread_ok.ok, "{}", create_thread_ok.message);

    let balance_after_post = service.local_reward_balance();
    assert!(balance_after_post <= balance_after_claim - 3);
}

#[test]
fn reward_transfer_debits_amount_plus_burned_fee() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(InitConfig {
        block_interval_seconds: 1,
        block_reward_units: 4,
        genesis_psz_timestamp: "The Times 14/Feb/2026 got-soup genesis".into(),
        ..base_config(&dir)
    });

    let set_name = service.set_immortal_name_with_cipher("Genesis Chef", "cipher-pass", "salt");
    assert!(set_name.ok, "{}", set_name.message);

    let create = service.create_recipe(&RecipeDraft {
        category: "Dinner".into(),
        title: "Merkle Soup".into(),
        markdown: "Check confirmations and merkle roots.".into(),
        ..RecipeDraft::default()
    });
    assert!(create.ok, "{}", create.message);

    let mut balance = service.local_reward_balance();
    for _ in 0..20 {
        if balance >= 4 {
            break;
        }
        thread::sleep(Duration::from_millis(200));
        let _ = service.sync_tick();
        balance = service.local_reward_balance();
    }
    assert!(balance >= 4, "balance {balance}");

    let status = service.node_status();
    assert!(status.db.reward_claim_event_count >= 1);
    assert!(!status.db.latest_merkle_root.is_empty());

    // Transfer to self: debit amount+fee, credit amount back, burn fee.
    let before = service.local_reward_balance();
    let transfer = service.transfer_rewards(&RewardTransferDraft {
        to_display_name: "Genesis Chef".into(),
        amount: 1,
        memo: "self-check".into(),
    });
    assert!(transfer.ok, "{}", transfer.message);
    assert_eq!(service.local_reward_balance(), before - 1);

    let transactions = service.reward_transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, 1);
    assert_eq!(transactions[0].fee, 1);

    let balances = service.reward_balances();
    assert!(!balances.is_empty());
    assert_eq!(balances[0].display_name, "Genesis Chef");

    let status = service.node_status();
    assert_eq!(status.db.burned_fee_total, 1);
}

#[test]
fn transfer_to_unknown_name_or_without_funds_fails() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let no_funds = service.transfer_rewards(&RewardTransferDraft {
        to_display_name: "Anyone".into(),
        amount: 5,
        memo: String::new(),
    });
    assert!(!no_funds.ok);

    assert!(
        !service
            .transfer_rewards(&RewardTransferDraft {
                to_display_name: String::new(),
                amount: 1,
                memo: String::new(),
            })
            .ok
    );
}

#[test]
fn moderation_flow_auto_hide_restore_and_pin_roundtrip() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(InitConfig {
        default_moderation_policy: ModerationPolicy {
            moderation_enabled: true,
            require_finality_for_actions: false,
            min_confirmations_for_enforcement: 1,
            max_flags_before_auto_hide: 2,
            role_model: "single-signer".into(),
            moderator_cids: Vec::new(),
        },
        ..base_config(&dir)
    });

    let local_cid = service.profile().cid;
    let moderation = service.moderation_status();
    assert!(moderation.enabled);
    assert!(moderation.active_moderators.contains(&local_cid));

    let create = service.create_recipe(&RecipeDraft {
        category: "Moderation".into(),
        title: "Flaggable Soup".into(),
        markdown: "Needs moderation flow test.".into(),
        ..RecipeDraft::default()
    });
    assert!(create.ok, "{}", create.message);

    let search = |service: &Service| {
        service.search(&SearchQuery {
            text: "Flaggable Soup".into(),
            category: String::new(),
        })
    };

    let recipe_id = search(&service)[0].recipe_id.clone();

    let flag_once = service.flag_content(&recipe_id, "test-flag-1");
    assert!(flag_once.ok, "{}", flag_once.message);
    assert!(!search(&service).is_empty());

    let flag_twice = service.flag_content(&recipe_id, "test-flag-2");
    assert!(flag_twice.ok, "{}", flag_twice.message);
    assert!(search(&service).is_empty());

    let unhide = service.set_content_hidden(&recipe_id, false, "manual-restore");
    assert!(unhide.ok, "{}", unhide.message);
    let restored = search(&service);
    assert!(!restored.is_empty());
    assert!(!restored[0].core_topic);

    let pin = service.pin_core_topic(&recipe_id, true);
    assert!(pin.ok, "{}", pin.message);
    assert!(search(&service)[0].core_topic);

    let unpin = service.pin_core_topic(&recipe_id, false);
    assert!(unpin.ok, "{}", unpin.message);
    assert!(!search(&service)[0].core_topic);

    let add = service.add_moderator("cid-external-moderator");
    assert!(add.ok, "{}", add.message);
    assert!(service
        .moderation_status()
        .active_moderators
        .contains(&"cid-external-moderator".to_string()));

    let remove = service.remove_moderator("cid-external-moderator");
    assert!(remove.ok, "{}", remove.message);
    assert!(!service
        .moderation_status()
        .active_moderators
        .contains(&"cid-external-moderator".to_string()));

    let remove_last = service.remove_moderator(&local_cid);
    assert!(!remove_last.ok);
}

#[test]
fn node_status_toggles_and_alpha_mode_switch_networks() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let status = service.node_status();
    assert!(status.tor_enabled);
    assert!(status.i2p_enabled);
    assert!(status.db.healthy, "{}", status.db.details);
    assert_eq!(status.p2p.network, "mainnet");
    assert_eq!(status.p2p.bind_port, 4001);

    let disable_i2p = service.set_transport_enabled(AnonymityMode::I2p, false);
    assert!(disable_i2p.ok, "{}", disable_i2p.message);
    assert!(!service.node_status().i2p_enabled);

    let alpha = service.set_alpha_test_mode(true);
    assert!(alpha.ok, "{}", alpha.message);
    let status = service.node_status();
    assert!(status.alpha_test_mode);
    assert_eq!(status.p2p.bind_host, "127.0.0.1");
    assert_eq!(status.p2p.network, "testnet");
    assert_eq!(status.p2p.bind_port, 14001);
    assert!(!status.db.consensus_hash.is_empty());
    assert!(status.db.block_count >= 1);
}

#[test]
fn i2p_mode_selects_testnet_chain_and_store() {
    let dir = TempDir::new().expect("tempdir");
    let service = init_service(InitConfig {
        mode: AnonymityMode::I2p,
        ..base_config(&dir)
    });

    let status = service.node_status();
    assert_eq!(status.p2p.network, "testnet");
    assert_eq!(status.p2p.bind_port, 14001);
    assert!(status
        .db
        .genesis_psz_timestamp
        .starts_with("Got Soup::P2P Tomato Soup testnet genesis"));
    assert!(dir
        .path()
        .join("db-recipes-testnet")
        .join("blockdata.dat")
        .exists());
    assert_eq!(status.genesis.chain_id, "got-soup-testnet-v1");
    assert!(!status.genesis.merkle_root.is_empty());
    assert!(status.chain_policy.confirmation_threshold >= 1);
    assert!(status.validation_limits.max_block_events >= 1);
}

#[test]
fn peers_dat_and_community_switching() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let status = service.node_status();
    assert!(!status.peers_dat_path.is_empty());
    assert!(std::path::Path::new(&status.peers_dat_path).exists());

    let add_peer = service.add_peer("peer.alpha.local:4001");
    assert!(add_peer.ok, "{}", add_peer.message);
    let contents = std::fs::read_to_string(&status.peers_dat_path).expect("peers file");
    assert!(contents.contains("peer.alpha.local:4001"));

    let switch = service.use_community_profile(
        "woodworking",
        "Woodworking Community",
        "Project-focused wood recipes",
    );
    assert!(switch.ok, "{}", switch.message);

    let current = service.current_community();
    assert_eq!(current.community_id, "woodworking");
    assert!(std::path::Path::new(&current.profile_path).exists());
    assert!(!service.community_profiles().is_empty());

    let create = service.create_recipe(&RecipeDraft {
        category: "Shop".into(),
        title: "Workbench Oil Finish".into(),
        markdown: "Apply two coats and cure for 24h.".into(),
        ..RecipeDraft::default()
    });
    assert!(create.ok, "{}", create.message);
    assert!(!service
        .search(&SearchQuery {
            text: "Workbench".into(),
            category: String::new(),
        })
        .is_empty());
}

#[test]
fn profile_identity_controls_and_duplicate_policy() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let missing_password = service.set_immortal_name_with_cipher("Chef Tomato", "", "recipe-salt");
    assert!(!missing_password.ok);

    let set_name =
        service.set_immortal_name_with_cipher("Chef Tomato", "cipher-pass", "recipe-salt");
    assert!(set_name.ok, "{}", set_name.message);
    let named = service.profile();
    assert_eq!(named.display_name, "Chef Tomato");
    assert!(named.display_name_immortalized);

    let rename = service.set_profile_display_name("Chef Basil");
    assert!(!rename.ok);

    let allow_dups = service.set_duplicate_name_policy(false);
    assert!(allow_dups.ok, "{}", allow_dups.message);
    assert!(!service.profile().reject_duplicate_names);

    let cipher = service.set_profile_cipher_password("cipher-pass-2", "recipe-salt-2");
    assert!(cipher.ok, "{}", cipher.message);

    let backtest = service.run_backtest_validation();
    assert!(backtest.ok, "{}", backtest.message);
}

#[test]
fn remote_ingest_is_deduplicated() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let create = service.create_recipe(&RecipeDraft {
        category: "Dinner".into(),
        title: "Gossip Soup".into(),
        markdown: "Shared around the network.".into(),
        ..RecipeDraft::default()
    });
    assert!(create.ok, "{}", create.message);

    // Drain the queue so the event counts as seen.
    let published = service.sync_tick();
    assert_eq!(published.len(), 1);

    let echoed = service.ingest_remote_event(&published[0]);
    assert!(echoed.ok);
    assert!(echoed.message.contains("Duplicate"), "{}", echoed.message);
    assert_eq!(
        service.node_status().db.event_count,
        1,
        "echoed event must not duplicate the log"
    );
}

#[test]
fn reference_forum_projection_covers_store_views() {
    let dir = TempDir::new().expect("tempdir");
    let mut service = init_service(base_config(&dir));

    let core = service.create_recipe(&RecipeDraft {
        category: "Lunch".into(),
        title: "Tomato Toast".into(),
        markdown: "Toast bread, add tomato and olive oil.".into(),
        core_topic: true,
        menu_segment: "core-menu".into(),
        ..RecipeDraft::default()
    });
    assert!(core.ok, "{}", core.message);

    let post = service.create_recipe(&RecipeDraft {
        category: "Community".into(),
        title: "Tomato Toast Remix".into(),
        markdown: "I add basil and black pepper.".into(),
        ..RecipeDraft::default()
    });
    assert!(post.ok, "{}", post.message);

    let recipes = service.search(&SearchQuery {
        text: "Tomato Toast".into(),
        category: String::new(),
    });
    assert!(!recipes.is_empty());

    let thread = service.create_thread(&ThreadDraft {
        recipe_id: recipes[0].recipe_id.clone(),
        title: "Texture tips".into(),
        markdown: "How crisp should the toast be?".into(),
        ..ThreadDraft::default()
    });
    assert!(thread.ok, "{}", thread.message);

    let threads = service.threads(&recipes[0].recipe_id);
    assert!(!threads.is_empty());

    let reply = service.create_reply(&soupnet_types::ReplyDraft {
        thread_id: threads[0].thread_id.clone(),
        markdown: "I prefer medium-crisp for soaking juices.".into(),
        ..soupnet_types::ReplyDraft::default()
    });
    assert!(reply.ok, "{}", reply.message);

    let parents = service.reference_parent_menus();
    assert!(parents.contains(&"Forum".to_string()));

    let secondary = service.reference_secondary_menus("Forum");
    for expected in ["Core Menu", "Community Posts", "Recipes", "Threads", "Replies"] {
        assert!(secondary.contains(&expected.to_string()), "{expected}");
    }

    let core_openings = service.reference_openings("Forum", "Core Menu", "Tomato Toast");
    assert!(!core_openings.is_empty());
    let core_entry = service.reference_lookup(&core_openings[0]).expect("entry");
    assert!(core_entry.title.contains("[CORE]"), "{}", core_entry.title);

    let post_openings = service.reference_openings("Forum", "Community Posts", "Remix");
    assert!(!post_openings.is_empty());
    let post_entry = service.reference_lookup(&post_openings[0]).expect("entry");
    assert!(post_entry.title.contains("[COMMUNITY]"), "{}", post_entry.title);

    let recipe_openings = service.reference_openings("Forum", "Recipes", "Tomato Toast");
    assert!(recipe_openings[0].starts_with("forum::recipe::"));
    let recipe_entry = service.reference_lookup(&recipe_openings[0]).expect("entry");
    assert!(recipe_entry.title.contains("Recipe:"));
    assert!(recipe_entry.body.contains("Universal Confirmation:"));
    assert!(recipe_entry.body.contains("Consensus Hash:"));

    let thread_openings = service.reference_openings("Forum", "Threads", "Texture");
    assert!(!thread_openings.is_empty());
    let thread_entry = service.reference_lookup(&thread_openings[0]).expect("entry");
    assert!(thread_entry.title.starts_with("Thread:"));

    let reply_openings = service.reference_openings("Forum", "Replies", "medium-crisp");
    assert!(!reply_openings.is_empty());
    let reply_entry = service.reference_lookup(&reply_openings[0]).expect("entry");
    assert!(reply_entry.title.starts_with("Reply:"));

    let console = service.hashspec_console();
    assert!(console.contains("HashSpec Console"));
    assert!(console.contains("Next Block Anticipation"));
}
