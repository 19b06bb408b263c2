//! Integration coverage for the store: append semantics, replay
//! determinism, chain linkage, confirmation, rollback and the backtest
//! validator.

use std::fs;

use tempfile::TempDir;

use soupnet_crypto::sha256_hex;
use soupnet_protocol::canonical::canonical_join;
use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_storage::Store;
use soupnet_types::{EventEnvelope, EventKind, ModerationPolicy, SearchQuery};

fn content_id(payload: &str) -> String {
    format!("evt-{}", sha256_hex(payload.as_bytes()))
}

fn make_event(kind: EventKind, author: &str, unix_ts: i64, fields: Vec<(&str, &str)>) -> EventEnvelope {
    let mut all: Vec<(String, String)> = fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    all.push(("author_cid".into(), author.to_string()));
    all.push(("kind".into(), kind.code().to_string()));
    all.push(("unix_ts".into(), unix_ts.to_string()));
    let payload = canonical_join(all);

    EventEnvelope {
        event_id: content_id(&payload),
        kind,
        author_cid: author.to_string(),
        unix_ts,
        payload,
        signature: "sig".into(),
    }
}

fn recipe_event(recipe_id: &str, title: &str, unix_ts: i64) -> EventEnvelope {
    make_event(
        EventKind::RecipeCreated,
        "cid-test-author",
        unix_ts,
        vec![
            ("recipe_id", recipe_id),
            ("category", "Soup"),
            ("title", title),
            ("markdown", "Boil water."),
        ],
    )
}

fn open_store(dir: &TempDir) -> Store {
    let mut store = Store::new();
    store.open(dir.path(), "vault-key").expect("store opens");
    store
}

#[test]
fn append_is_idempotent_and_materializes() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(&dir);

    let event = recipe_event("rcp-1", "Test Soup", unix_timestamp_now());
    store.append_event(&event).expect("first append");
    assert_eq!(store.all_events().len(), 1);
    assert!(dir.path().join("blockdata.dat").exists());
    assert!(dir.path().join("events.log").exists());

    store.append_event(&event).expect("idempotent append");
    assert_eq!(store.all_events().len(), 1);

    let recipes = store.query_recipes(&SearchQuery {
        text: "soup".into(),
        category: String::new(),
    });
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].title, "Test Soup");

    let health = store.health_report();
    assert!(health.healthy, "{}", health.details);
    assert_eq!(health.event_count, 1);
    assert_eq!(store.next_claim_reward(1), 115);
}

#[test]
fn append_rejects_oversize_and_drifted_events() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(&dir);

    let mut oversize = recipe_event("rcp-big", "Big", unix_timestamp_now());
    oversize.payload = "x=".to_string() + &"y".repeat(70_000);
    assert!(store.append_event(&oversize).is_err());

    let stale = recipe_event("rcp-old", "Old", unix_timestamp_now() - 10 * 24 * 60 * 60);
    assert!(store.append_event(&stale).is_err());

    let future = recipe_event("rcp-future", "Future", unix_timestamp_now() + 3_600);
    assert!(store.append_event(&future).is_err());

    let health = store.health_report();
    assert!(!health.healthy);
    assert_eq!(health.invalid_event_drop_count, 3);
    assert!(dir.path().join("invalid-events.log").exists());
}

#[test]
fn chain_links_and_block_hashes_hold_after_appends() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(&dir);

    let base = unix_timestamp_now();
    for i in 0..5 {
        let event = recipe_event(&format!("rcp-{i}"), &format!("Recipe {i}"), base + i);
        store.append_event(&event).expect("append");
    }

    let blocks = store.all_blocks();
    assert!(!blocks.is_empty());
    assert_eq!(blocks[0].prev_hash, "genesis");
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].block_hash);
    }

    let ok = store.backtest_validate(&|payload| content_id(payload), "");
    assert!(ok.is_ok(), "{:?}", ok.err().map(|e| e.to_string()));
}

#[test]
fn replay_from_copied_files_is_deterministic() {
    let source_dir = TempDir::new().expect("tempdir");
    let mut source = open_store(&source_dir);

    let base = unix_timestamp_now();
    for i in 0..4 {
        let event = recipe_event(&format!("rcp-{i}"), &format!("Copy Soup {i}"), base + i);
        source.append_event(&event).expect("append");
    }
    let source_consensus = source.consensus_hash();
    let source_timeline = source.timeline_hash();

    let replica_dir = TempDir::new().expect("tempdir");
    for file in ["events.log", "blockdata.dat", "checkpoints.dat"] {
        fs::copy(source_dir.path().join(file), replica_dir.path().join(file))
            .expect("copy store file");
    }

    let replica = open_store(&replica_dir);
    assert_eq!(replica.consensus_hash(), source_consensus);
    assert_eq!(replica.timeline_hash(), source_timeline);
    assert_eq!(replica.all_events().len(), 4);
}

#[test]
fn routine_block_check_confirms_elapsed_slots() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = Store::new();
    store.set_block_timing(1);
    store.open(dir.path(), "vault-key").expect("store opens");

    let event = recipe_event("rcp-1", "Confirm Soup", unix_timestamp_now());
    store.append_event(&event).expect("append");

    // Pretend two intervals elapsed; the occupied slot must confirm.
    store
        .routine_block_check(unix_timestamp_now() + 3)
        .expect("block check");

    let confirmed = store.all_blocks().iter().filter(|b| b.confirmed).count();
    assert!(confirmed >= 1);
    let health = store.health_report();
    assert!(health.confirmed_block_count >= 1);
}

#[test]
fn corrupt_event_line_is_quarantined_not_fatal() {
    let dir = TempDir::new().expect("tempdir");
    {
        let mut store = open_store(&dir);
        let event = recipe_event("rcp-1", "Good Soup", unix_timestamp_now());
        store.append_event(&event).expect("append");
    }

    let log_path = dir.path().join("events.log");
    let mut contents = fs::read_to_string(&log_path).expect("read log");
    contents.push_str("this line is not a valid event\n");
    fs::write(&log_path, contents).expect("write log");

    let store = open_store(&dir);
    assert_eq!(store.all_events().len(), 1);
    let health = store.health_report();
    assert!(health.recovered_from_corruption);
    assert!(health.invalid_event_drop_count >= 1);
}

#[test]
fn backtest_flags_tampered_event_id() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(&dir);

    let mut event = recipe_event("rcp-1", "Tamper Soup", unix_timestamp_now());
    event.event_id = "evt-forged".into();
    store.append_event(&event).expect("append");

    let result = store.backtest_validate(&|payload| content_id(payload), "");
    let details = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(details.contains("Event ID mismatch"), "{details}");

    let health = store.health_report();
    assert!(!health.backtest_ok);
}

#[test]
fn rollback_to_checkpoint_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(&dir);

    let base = unix_timestamp_now();
    for i in 0..3 {
        let event = recipe_event(&format!("rcp-{i}"), &format!("Rollback Soup {i}"), base + i);
        store.append_event(&event).expect("append");
    }

    store.rollback_to_last_checkpoint("test rollback").expect("rollback");
    let first_timeline = store.timeline_hash();
    let first_events = store.all_events().len();

    store.rollback_to_last_checkpoint("test rollback again").expect("rollback");
    assert_eq!(store.timeline_hash(), first_timeline);
    assert_eq!(store.all_events().len(), first_events);
}

#[test]
fn moderation_auto_hide_and_unhide_roundtrip() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = Store::new();
    store.set_moderation_policy(ModerationPolicy {
        moderation_enabled: true,
        require_finality_for_actions: false,
        min_confirmations_for_enforcement: 1,
        max_flags_before_auto_hide: 2,
        role_model: "single-signer".into(),
        moderator_cids: vec!["cid-test-author".into()],
    });
    store.open(dir.path(), "vault-key").expect("store opens");

    let base = unix_timestamp_now();
    let recipe = recipe_event("rcp-flag", "Flaggable Soup", base);
    store.append_event(&recipe).expect("append recipe");

    let flag_one = make_event(
        EventKind::ContentFlagged,
        "cid-flagger-one",
        base + 1,
        vec![("object_id", "rcp-flag"), ("reason", "r1")],
    );
    store.append_event(&flag_one).expect("append flag one");
    assert_eq!(
        store
            .query_recipes(&SearchQuery { text: "Flaggable".into(), category: String::new() })
            .len(),
        1
    );

    let flag_two = make_event(
        EventKind::ContentFlagged,
        "cid-flagger-two",
        base + 2,
        vec![("object_id", "rcp-flag"), ("reason", "r2")],
    );
    store.append_event(&flag_two).expect("append flag two");
    assert!(store
        .query_recipes(&SearchQuery { text: "Flaggable".into(), category: String::new() })
        .is_empty());

    let unhide = make_event(
        EventKind::ContentUnhidden,
        "cid-test-author",
        base + 3,
        vec![("object_id", "rcp-flag"), ("reason", "manual-restore")],
    );
    store.append_event(&unhide).expect("append unhide");
    assert_eq!(
        store
            .query_recipes(&SearchQuery { text: "Flaggable".into(), category: String::new() })
            .len(),
        1
    );
}

#[test]
fn moderator_set_never_empties() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = Store::new();
    store.set_moderation_policy(ModerationPolicy {
        moderation_enabled: true,
        require_finality_for_actions: false,
        min_confirmations_for_enforcement: 1,
        max_flags_before_auto_hide: 3,
        role_model: "single-signer".into(),
        moderator_cids: vec!["cid-only-mod".into()],
    });
    store.open(dir.path(), "vault-key").expect("store opens");

    let removal = make_event(
        EventKind::ModeratorRemoved,
        "cid-only-mod",
        unix_timestamp_now(),
        vec![("target_cid", "cid-only-mod")],
    );
    store.append_event(&removal).expect("append removal");

    assert!(store.is_moderator("cid-only-mod"));
    let status = store.moderation_status();
    assert_eq!(status.invalid_event_count, 1);
}

#[test]
fn legacy_blocks_log_is_migrated_on_open() {
    let source_dir = TempDir::new().expect("tempdir");
    {
        let mut store = open_store(&source_dir);
        let event = recipe_event("rcp-legacy", "Legacy Soup", unix_timestamp_now());
        store.append_event(&event).expect("append");
    }

    let legacy_dir = TempDir::new().expect("tempdir");
    fs::copy(
        source_dir.path().join("events.log"),
        legacy_dir.path().join("events.log"),
    )
    .expect("copy events");
    fs::copy(
        source_dir.path().join("blockdata.dat"),
        legacy_dir.path().join("blocks.log"),
    )
    .expect("copy blocks to legacy name");

    let store = open_store(&legacy_dir);
    assert_eq!(store.all_events().len(), 1);
    assert!(legacy_dir.path().join("blockdata.dat").exists());
}

fn claim_event(
    author: &str,
    block_index: u64,
    reward: i64,
    block_hash: &str,
    merkle_root: &str,
    unix_ts: i64,
) -> EventEnvelope {
    let pow_material = format!("recipes|{author}|{block_index}|{block_hash}|{merkle_root}");
    let solution = soupnet_protocol::pow::find_pow_nonce(&pow_material, 1, 1 << 20)
        .expect("low-difficulty nonce");
    let witness = sha256_hex(format!("{author}|{block_index}|{reward}|{}", solution.hash).as_bytes());

    make_event(
        EventKind::BlockRewardClaimed,
        author,
        unix_ts,
        vec![
            ("block_index", &block_index.to_string()),
            ("reward", &reward.to_string()),
            ("pow_difficulty", "1"),
            ("pow_nonce", &solution.nonce.to_string()),
            ("pow_material", &pow_material),
            ("pow_hash", &solution.hash),
            ("witness_root", &witness),
        ],
    )
}

fn transfer_event(
    from: &str,
    to: &str,
    amount: i64,
    fee: i64,
    nonce: u64,
    unix_ts: i64,
) -> EventEnvelope {
    let witness = sha256_hex(format!("{from}|{to}|{amount}|{fee}|{nonce}").as_bytes());
    make_event(
        EventKind::RewardTransferred,
        from,
        unix_ts,
        vec![
            ("to_cid", to),
            ("amount", &amount.to_string()),
            ("fee", &fee.to_string()),
            ("nonce", &nonce.to_string()),
            ("witness_root", &witness),
        ],
    )
}

#[test]
fn claims_and_transfers_conserve_balances_and_nonces() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = Store::new();
    store.set_block_timing(1);
    store.open(dir.path(), "vault-key").expect("store opens");

    // Open and confirm a run of slots so block 1 is claimable.
    store
        .routine_block_check(unix_timestamp_now() + 5)
        .expect("block check");
    let block_one = store
        .all_blocks()
        .iter()
        .find(|block| block.index == 1)
        .cloned()
        .expect("block 1 exists");
    assert!(block_one.confirmed);

    let reward = store.next_claim_reward(1);
    assert_eq!(reward, 115);

    let base = unix_timestamp_now();
    let claim = claim_event(
        "cid-miner",
        1,
        reward,
        &block_one.block_hash,
        &block_one.merkle_root,
        base,
    );
    store.append_event(&claim).expect("append claim");
    assert_eq!(store.reward_balance("cid-miner"), 115);
    assert!(store.has_block_claim(1));

    // First transfer: amount 100 burns a fee of 1 under nonce 1.
    let send = transfer_event("cid-miner", "cid-friend", 100, 1, 1, base + 1);
    store.append_event(&send).expect("append transfer");
    assert_eq!(store.reward_balance("cid-miner"), 14);
    assert_eq!(store.reward_balance("cid-friend"), 100);

    // Replayed nonce is rejected and leaves balances untouched.
    let replay = transfer_event("cid-miner", "cid-friend", 5, 1, 1, base + 2);
    store.append_event(&replay).expect("append replayed nonce");
    assert_eq!(store.reward_balance("cid-miner"), 14);
    assert_eq!(store.reward_balance("cid-friend"), 100);

    // The next accepted transfer must carry nonce 2.
    assert_eq!(store.next_transfer_nonce("cid-miner"), 2);
    let second = transfer_event("cid-miner", "cid-friend", 10, 1, 2, base + 3);
    store.append_event(&second).expect("append second transfer");
    assert_eq!(store.reward_balance("cid-miner"), 3);
    assert_eq!(store.reward_balance("cid-friend"), 110);
    assert_eq!(store.next_transfer_nonce("cid-miner"), 3);

    let health = store.health_report();
    assert_eq!(health.issued_reward_total, 115);
    assert_eq!(health.burned_fee_total, 2);
    assert_eq!(health.reward_supply, 113);
    assert_eq!(health.invalid_economic_event_count, 1);
}

#[test]
fn transfer_with_wrong_fee_or_overdraft_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = Store::new();
    store.set_block_timing(1);
    store.open(dir.path(), "vault-key").expect("store opens");
    store
        .routine_block_check(unix_timestamp_now() + 5)
        .expect("block check");

    let block_one = store
        .all_blocks()
        .iter()
        .find(|block| block.index == 1)
        .cloned()
        .expect("block 1 exists");
    let base = unix_timestamp_now();
    let claim = claim_event(
        "cid-miner",
        1,
        store.next_claim_reward(1),
        &block_one.block_hash,
        &block_one.merkle_root,
        base,
    );
    store.append_event(&claim).expect("append claim");

    // Fee must be exactly max(1, amount/100).
    let wrong_fee = transfer_event("cid-miner", "cid-friend", 100, 7, 1, base + 1);
    store.append_event(&wrong_fee).expect("append wrong fee");
    assert_eq!(store.reward_balance("cid-friend"), 0);

    // Amount + fee beyond the balance is rejected.
    let overdraft = transfer_event("cid-miner", "cid-friend", 200, 2, 1, base + 2);
    store.append_event(&overdraft).expect("append overdraft");
    assert_eq!(store.reward_balance("cid-friend"), 0);
    assert_eq!(store.reward_balance("cid-miner"), 115);

    let health = store.health_report();
    assert_eq!(health.invalid_economic_event_count, 2);
}

#[test]
fn duplicate_claim_surfaces_the_rollback_trigger_phrase() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = Store::new();
    store.set_block_timing(1);
    store.open(dir.path(), "vault-key").expect("store opens");
    store
        .routine_block_check(unix_timestamp_now() + 5)
        .expect("block check");

    let block_one = store
        .all_blocks()
        .iter()
        .find(|block| block.index == 1)
        .cloned()
        .expect("block 1 exists");
    let base = unix_timestamp_now();
    let reward = store.next_claim_reward(1);

    let first = claim_event(
        "cid-miner",
        1,
        reward,
        &block_one.block_hash,
        &block_one.merkle_root,
        base,
    );
    store.append_event(&first).expect("append first claim");

    let second = claim_event(
        "cid-rival",
        1,
        reward,
        &block_one.block_hash,
        &block_one.merkle_root,
        base + 1,
    );
    store.append_event(&second).expect("append second claim");

    let result = store.backtest_validate(&|payload| content_id(payload), "");
    let details = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(
        details.contains("Duplicate reward claim for block."),
        "{details}"
    );
}
