//! Local profile preferences, persisted as `#`-commented `key=value`
//! lines in `profile-state.dat`. These are node-local (never gossiped):
//! the display name cache, duplicate-name policy and wallet lifecycle
//! bookkeeping.

use std::fs;
use std::path::Path;

use soupnet_types::{Result, SoupNetError};

/// Node-local preferences and wallet bookkeeping.
#[derive(Clone, Debug)]
pub(crate) struct ProfileState {
    pub display_name: String,
    pub display_name_immortalized: bool,
    pub reject_duplicate_names: bool,
    pub wallet_destroyed: bool,
    pub wallet_recovery_required: bool,
    pub last_key_backup_path: String,
    pub wallet_last_locked_unix: i64,
    pub wallet_last_unlocked_unix: i64,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            display_name_immortalized: false,
            reject_duplicate_names: true,
            wallet_destroyed: false,
            wallet_recovery_required: false,
            last_key_backup_path: String::new(),
            wallet_last_locked_unix: 0,
            wallet_last_unlocked_unix: 0,
        }
    }
}

impl ProfileState {
    /// Loads the state file; a missing file yields defaults (it is
    /// created on first update).
    pub fn load(path: &Path) -> Self {
        let mut state = Self::default();
        let Ok(contents) = fs::read_to_string(path) else {
            return state;
        };

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "display_name" => state.display_name = value.to_string(),
                "display_name_immortalized" => {
                    state.display_name_immortalized = value == "1" || value == "true";
                }
                "duplicate_policy" => state.reject_duplicate_names = value != "allow",
                "wallet_destroyed" => {
                    state.wallet_destroyed = value == "1" || value == "true";
                }
                "wallet_recovery_required" => {
                    state.wallet_recovery_required = value == "1" || value == "true";
                }
                "last_key_backup_path" => state.last_key_backup_path = value.to_string(),
                "wallet_last_locked_unix" => {
                    state.wallet_last_locked_unix = value.parse().unwrap_or(0);
                }
                "wallet_last_unlocked_unix" => {
                    state.wallet_last_unlocked_unix = value.parse().unwrap_or(0);
                }
                _ => {}
            }
        }

        state
    }

    /// Writes the state file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(SoupNetError::Config {
                reason: "Profile state path is not configured.".into(),
            });
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SoupNetError::Storage {
                    reason: format!("Unable to create profile state directory: {e}"),
                })?;
            }
        }

        let contents = format!(
            "# got-soup profile state\n\
             display_name={}\n\
             display_name_immortalized={}\n\
             duplicate_policy={}\n\
             wallet_destroyed={}\n\
             wallet_recovery_required={}\n\
             last_key_backup_path={}\n\
             wallet_last_locked_unix={}\n\
             wallet_last_unlocked_unix={}\n",
            self.display_name,
            u8::from(self.display_name_immortalized),
            if self.reject_duplicate_names {
                "reject"
            } else {
                "allow"
            },
            u8::from(self.wallet_destroyed),
            u8::from(self.wallet_recovery_required),
            self.last_key_backup_path,
            self.wallet_last_locked_unix,
            self.wallet_last_unlocked_unix,
        );
        fs::write(path, contents).map_err(|e| SoupNetError::Storage {
            reason: format!("Unable to write profile state file: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let state = ProfileState::load(&dir.path().join("profile-state.dat"));
        assert!(state.display_name.is_empty());
        assert!(state.reject_duplicate_names);
        assert!(!state.wallet_destroyed);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("profile-state.dat");

        let state = ProfileState {
            display_name: "Chef Tomato".into(),
            display_name_immortalized: true,
            reject_duplicate_names: false,
            wallet_destroyed: false,
            wallet_recovery_required: true,
            last_key_backup_path: "/tmp/backup.dat".into(),
            wallet_last_locked_unix: 123,
            wallet_last_unlocked_unix: 456,
        };
        state.save(&path).expect("save");

        let loaded = ProfileState::load(&path);
        assert_eq!(loaded.display_name, "Chef Tomato");
        assert!(loaded.display_name_immortalized);
        assert!(!loaded.reject_duplicate_names);
        assert!(loaded.wallet_recovery_required);
        assert_eq!(loaded.wallet_last_locked_unix, 123);
        assert_eq!(loaded.wallet_last_unlocked_unix, 456);
    }

    #[test]
    fn comments_and_garbage_lines_are_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("profile-state.dat");
        std::fs::write(
            &path,
            "# comment\nnot a pair\ndisplay_name=Kept\nunknown_key=x\n",
        )
        .expect("write");

        let loaded = ProfileState::load(&path);
        assert_eq!(loaded.display_name, "Kept");
    }
}
