//! Corruption recovery: quarantining a store directory and classifying
//! validator failures.
//!
//! Identity and parse mismatches mean the on-disk store belongs to a
//! different chain or is damaged beyond trust — it is moved aside under
//! `recovery/` and rebuilt empty. A duplicate reward claim is narrower:
//! the chain itself is fine up to the conflict, so the caller rolls back
//! to the last checkpoint instead.

use std::fs;
use std::path::Path;

use tracing::warn;

use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_types::{Result, SoupNetError};

/// Failures that require moving the store aside and starting fresh.
pub(crate) fn should_rebuild_local_store(message: &str) -> bool {
    message.contains("Chain ID mismatch")
        || message.contains("Network ID mismatch")
        || message.contains("Community mismatch")
        || message.contains("Failed to parse")
        || message.contains("Event ID mismatch")
}

/// Failures resolved by rolling back to the last checkpoint.
pub(crate) fn has_duplicate_reward_claim_error(message: &str) -> bool {
    message.contains("Duplicate reward claim for block.")
}

/// Moves a corrupted store directory to
/// `<app_data_dir>/recovery/<name>-quarantine-<now>` and recreates it
/// empty. Falls back to deletion when the rename fails (cross-device).
pub(crate) fn quarantine_and_reset_store_dir(
    app_data_dir: &Path,
    store_dir: &Path,
    reason: &str,
) -> Result<String> {
    let recovery_root = app_data_dir.join("recovery");
    fs::create_dir_all(&recovery_root).map_err(|e| SoupNetError::Storage {
        reason: format!("Unable to create recovery directory: {e}"),
    })?;

    if store_dir.exists() {
        let folder_name = store_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".into());
        let quarantine = recovery_root.join(format!(
            "{folder_name}-quarantine-{}",
            unix_timestamp_now()
        ));
        if fs::rename(store_dir, &quarantine).is_err() {
            fs::remove_dir_all(store_dir).map_err(|e| SoupNetError::Storage {
                reason: format!("Unable to reset corrupted store path: {e}"),
            })?;
        }
        warn!(store = %store_dir.display(), reason, "store directory quarantined");
    }

    fs::create_dir_all(store_dir).map_err(|e| SoupNetError::Storage {
        reason: format!("Unable to recreate store directory: {e}"),
    })?;

    Ok(format!("Local store reset: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rebuild_triggers_match_validator_phrases() {
        assert!(should_rebuild_local_store("Chain ID mismatch in event: evt-1"));
        assert!(should_rebuild_local_store("Network ID mismatch in event: evt-1"));
        assert!(should_rebuild_local_store("Community mismatch in event: evt-1"));
        assert!(should_rebuild_local_store("Failed to parse 2 blockdata line(s)."));
        assert!(should_rebuild_local_store("Event ID mismatch: evt-1"));
        assert!(!should_rebuild_local_store("Merkle root mismatch at block 3"));
    }

    #[test]
    fn duplicate_claim_detection_is_exact_phrase() {
        assert!(has_duplicate_reward_claim_error(
            "Economic validation failure: evt-1 (Duplicate reward claim for block.)"
        ));
        assert!(!has_duplicate_reward_claim_error(
            "Reward claim references an unconfirmed block."
        ));
    }

    #[test]
    fn quarantine_moves_and_recreates_directory() {
        let root = TempDir::new().expect("tempdir");
        let store_dir = root.path().join("db-test-mainnet");
        fs::create_dir_all(&store_dir).expect("mkdir");
        fs::write(store_dir.join("events.log"), "junk").expect("write");

        quarantine_and_reset_store_dir(root.path(), &store_dir, "test reason")
            .expect("quarantine");

        assert!(store_dir.exists());
        assert!(!store_dir.join("events.log").exists());

        let recovery_entries: Vec<_> = fs::read_dir(root.path().join("recovery"))
            .expect("recovery dir")
            .filter_map(|entry| entry.ok())
            .collect();
        assert_eq!(recovery_entries.len(), 1);
        let name = recovery_entries[0].file_name().to_string_lossy().into_owned();
        assert!(name.starts_with("db-test-mainnet-quarantine-"), "{name}");
    }
}
