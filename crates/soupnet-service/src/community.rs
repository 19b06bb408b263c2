//! Community profile I/O and path/name sanitizing.
//!
//! A community profile is a `#`-commented `key=value` file under
//! `communities/<id>.dat`. Missing fields fall back to the init config;
//! unparseable files are rejected so the orchestrator can surface the
//! failure instead of silently adopting a half-read community.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use soupnet_types::{CommunityProfile, Result, SoupNetError};

use crate::service::Service;

pub(crate) fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\') || value.ends_with(".dat")
}

pub(crate) fn split_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trims, drops empties, sorts and dedups before joining.
pub(crate) fn join_csv(values: &[String]) -> String {
    let mut cleaned: Vec<String> = values
        .iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned.join(",")
}

/// Lowercases and restricts a community id to `[a-z0-9-]`.
pub(crate) fn sanitize_community_id(id: &str) -> String {
    let mut cleaned = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            'a'..='z' | '0'..='9' => cleaned.push(c),
            'A'..='Z' => cleaned.push(c.to_ascii_lowercase()),
            '_' | '-' | ' ' => cleaned.push('-'),
            _ => {}
        }
    }
    cleaned.trim_matches('-').to_string()
}

/// Trims and caps a display name at 48 chars.
pub(crate) fn sanitize_display_name(value: &str) -> String {
    let cleaned = value.trim();
    cleaned.chars().take(48).collect()
}

fn parse_bool_field(fields: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match fields.get(key) {
        Some(value) => value != "0",
        None => default,
    }
}

fn parse_i64_field(fields: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    fields
        .get(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Service {
    pub(crate) fn resolve_data_path(&self, input_path: &str, fallback_name: &str) -> PathBuf {
        let mut path = input_path.trim().to_string();
        if path.is_empty() {
            path = fallback_name.to_string();
        }
        if path.is_empty() {
            return PathBuf::from(&self.config.app_data_dir);
        }
        let candidate = PathBuf::from(&path);
        if candidate.is_absolute() {
            return candidate;
        }
        Path::new(&self.config.app_data_dir).join(candidate)
    }

    /// Loads an existing profile or creates one from the selector
    /// (community id or file path) and persists it.
    pub(crate) fn load_or_create_community_profile(
        &mut self,
        profile_path_or_id: &str,
        display_name: &str,
        description: &str,
    ) -> Result<String> {
        let mut profile_path = PathBuf::new();
        let mut proposed_id;

        if profile_path_or_id.is_empty() {
            proposed_id = "recipes".to_string();
        } else if looks_like_path(profile_path_or_id) {
            profile_path = self.resolve_data_path(profile_path_or_id, profile_path_or_id);
            proposed_id = sanitize_community_id(
                &profile_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        } else {
            proposed_id = sanitize_community_id(profile_path_or_id);
        }

        if proposed_id.is_empty() {
            proposed_id = "community".to_string();
        }
        if profile_path.as_os_str().is_empty() {
            profile_path = self.communities_dir.join(format!("{proposed_id}.dat"));
        }

        if profile_path.exists() {
            let Some(loaded) = self.parse_community_profile_file(&profile_path) else {
                return Err(SoupNetError::Config {
                    reason: format!(
                        "Community profile exists but could not be parsed: {}",
                        profile_path.display()
                    ),
                });
            };
            self.current_community = loaded;
            return Ok(format!(
                "Loaded community profile: {}",
                self.current_community.community_id
            ));
        }

        let mut created = CommunityProfile {
            community_id: proposed_id.clone(),
            display_name: if display_name.is_empty() {
                format!("Community {proposed_id}")
            } else {
                display_name.to_string()
            },
            description: if description.is_empty() {
                "Modular got-soup community profile.".to_string()
            } else {
                description.to_string()
            },
            profile_path: profile_path.display().to_string(),
            cipher_key: self
                .vault
                .derive_vault_key(&self.config.passphrase, &format!("community:{proposed_id}")),
            peers_dat_path: Path::new(&self.config.app_data_dir)
                .join(format!("peers-{proposed_id}.dat"))
                .display()
                .to_string(),
            store_path: Path::new(&self.config.app_data_dir)
                .join(format!("db-{proposed_id}"))
                .display()
                .to_string(),
            minimum_post_value: self.config.minimum_post_value.max(0),
            block_reward_units: if self.config.block_reward_units <= 0 {
                115
            } else {
                self.config.block_reward_units
            },
            moderation_enabled: self.config.default_moderation_policy.moderation_enabled,
            moderation_require_finality: self
                .config
                .default_moderation_policy
                .require_finality_for_actions,
            moderation_min_confirmations: self
                .config
                .default_moderation_policy
                .min_confirmations_for_enforcement
                .max(1),
            moderation_auto_hide_flags: self
                .config
                .default_moderation_policy
                .max_flags_before_auto_hide
                .max(1),
            moderator_cids: if self.config.default_moderators.is_empty() {
                self.config.default_moderation_policy.moderator_cids.clone()
            } else {
                self.config.default_moderators.clone()
            },
            genesis_psz_timestamp: String::new(),
        };

        created.moderator_cids.push(self.vault.identity().cid.clone());
        created.moderator_cids = split_csv(&join_csv(&created.moderator_cids));

        created.genesis_psz_timestamp = if !self.config.genesis_psz_timestamp.is_empty() {
            self.config.genesis_psz_timestamp.clone()
        } else if self.use_testnet() {
            self.config.testnet_genesis_psz_timestamp.clone()
        } else {
            self.config.mainnet_genesis_psz_timestamp.clone()
        };

        self.write_community_profile_file(&created)?;
        self.current_community = created;
        Ok(format!(
            "Created community profile: {}",
            self.current_community.community_id
        ))
    }

    pub(crate) fn parse_community_profile_file(&self, path: &Path) -> Option<CommunityProfile> {
        let contents = fs::read_to_string(path).ok()?;

        let mut fields = HashMap::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }

        let community_id = sanitize_community_id(fields.get("community_id")?);
        if community_id.is_empty() {
            return None;
        }

        let defaults = &self.config.default_moderation_policy;
        let mut profile = CommunityProfile {
            display_name: fields
                .get("display_name")
                .cloned()
                .unwrap_or_else(|| community_id.clone()),
            description: fields.get("description").cloned().unwrap_or_default(),
            profile_path: path.display().to_string(),
            cipher_key: fields.get("cipher_key").cloned().unwrap_or_else(|| {
                self.vault
                    .derive_vault_key(&self.config.passphrase, &format!("community:{community_id}"))
            }),
            peers_dat_path: match fields.get("peers_dat_path") {
                Some(value) => self
                    .resolve_data_path(value, &format!("peers-{community_id}.dat"))
                    .display()
                    .to_string(),
                None => Path::new(&self.config.app_data_dir)
                    .join(format!("peers-{community_id}.dat"))
                    .display()
                    .to_string(),
            },
            store_path: match fields.get("store_path") {
                Some(value) => self
                    .resolve_data_path(value, &format!("db-{community_id}"))
                    .display()
                    .to_string(),
                None => Path::new(&self.config.app_data_dir)
                    .join(format!("db-{community_id}"))
                    .display()
                    .to_string(),
            },
            minimum_post_value: parse_i64_field(
                &fields,
                "minimum_post_value",
                self.config.minimum_post_value,
            )
            .max(0),
            block_reward_units: parse_i64_field(
                &fields,
                "block_reward_units",
                if self.config.block_reward_units <= 0 {
                    115
                } else {
                    self.config.block_reward_units
                },
            )
            .max(1),
            moderation_enabled: parse_bool_field(&fields, "moderation_enabled", true),
            moderation_require_finality: parse_bool_field(
                &fields,
                "moderation_require_finality",
                true,
            ),
            moderation_min_confirmations: parse_i64_field(
                &fields,
                "moderation_min_confirmations",
                defaults.min_confirmations_for_enforcement as i64,
            )
            .max(1) as u64,
            moderation_auto_hide_flags: parse_i64_field(
                &fields,
                "moderation_auto_hide_flags",
                defaults.max_flags_before_auto_hide as i64,
            )
            .max(1) as usize,
            moderator_cids: match fields.get("moderators") {
                Some(value) => split_csv(value),
                None => {
                    if self.config.default_moderators.is_empty() {
                        defaults.moderator_cids.clone()
                    } else {
                        self.config.default_moderators.clone()
                    }
                }
            },
            genesis_psz_timestamp: match fields.get("genesis_psz_timestamp") {
                Some(value) => value.clone(),
                None if !self.config.genesis_psz_timestamp.is_empty() => {
                    self.config.genesis_psz_timestamp.clone()
                }
                None if self.use_testnet() => self.config.testnet_genesis_psz_timestamp.clone(),
                None => self.config.mainnet_genesis_psz_timestamp.clone(),
            },
            community_id,
        };

        if profile.moderator_cids.is_empty() {
            profile.moderator_cids.push(self.vault.identity().cid.clone());
        }
        profile.moderator_cids = split_csv(&join_csv(&profile.moderator_cids));

        Some(profile)
    }

    pub(crate) fn write_community_profile_file(&self, profile: &CommunityProfile) -> Result<()> {
        if profile.profile_path.is_empty() {
            return Err(SoupNetError::Config {
                reason: "Community profile write failed: empty profile path.".into(),
            });
        }

        let file_path = Path::new(&profile.profile_path);
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SoupNetError::Storage {
                    reason: format!("Unable to create community profile directory: {e}"),
                })?;
            }
        }

        let contents = format!(
            "# got-soup community profile\n\
             community_id={}\n\
             display_name={}\n\
             description={}\n\
             cipher_key={}\n\
             peers_dat_path={}\n\
             store_path={}\n\
             minimum_post_value={}\n\
             block_reward_units={}\n\
             moderation_enabled={}\n\
             moderation_require_finality={}\n\
             moderation_min_confirmations={}\n\
             moderation_auto_hide_flags={}\n\
             moderators={}\n\
             genesis_psz_timestamp={}\n",
            profile.community_id,
            profile.display_name,
            profile.description,
            profile.cipher_key,
            profile.peers_dat_path,
            profile.store_path,
            profile.minimum_post_value,
            profile.block_reward_units,
            u8::from(profile.moderation_enabled),
            u8::from(profile.moderation_require_finality),
            profile.moderation_min_confirmations,
            profile.moderation_auto_hide_flags,
            join_csv(&profile.moderator_cids),
            profile.genesis_psz_timestamp,
        );
        fs::write(file_path, contents).map_err(|e| SoupNetError::Storage {
            reason: format!(
                "Unable to write community profile file: {}: {e}",
                profile.profile_path
            ),
        })
    }

    /// Every parseable profile under `communities/`, sorted by id; falls
    /// back to the current community when the directory is empty.
    pub fn community_profiles(&self) -> Vec<CommunityProfile> {
        let mut profiles = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.communities_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() || path.extension().map(|ext| ext != "dat").unwrap_or(true) {
                    continue;
                }
                if let Some(parsed) = self.parse_community_profile_file(&path) {
                    profiles.push(parsed);
                }
            }
        }

        if profiles.is_empty() && !self.current_community.community_id.is_empty() {
            profiles.push(self.current_community.clone());
        }

        profiles.sort_by(|lhs, rhs| lhs.community_id.cmp(&rhs.community_id));
        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn community_id_sanitizing() {
        assert_eq!(sanitize_community_id("Wood Working"), "wood-working");
        assert_eq!(sanitize_community_id("--recipes--"), "recipes");
        assert_eq!(sanitize_community_id("So*up!42"), "soup42");
        assert_eq!(sanitize_community_id("***"), "");
    }

    #[test]
    fn display_name_is_trimmed_and_capped() {
        assert_eq!(sanitize_display_name("  Chef Tomato  "), "Chef Tomato");
        let long = "x".repeat(64);
        assert_eq!(sanitize_display_name(&long).len(), 48);
    }

    #[test]
    fn csv_join_sorts_and_dedups() {
        let joined = join_csv(&[
            " cid-b ".into(),
            "cid-a".into(),
            "".into(),
            "cid-b".into(),
        ]);
        assert_eq!(joined, "cid-a,cid-b");
        assert_eq!(split_csv(&joined), vec!["cid-a", "cid-b"]);
    }

    #[test]
    fn path_detection() {
        assert!(looks_like_path("communities/custom.dat"));
        assert!(looks_like_path("custom.dat"));
        assert!(!looks_like_path("recipes"));
    }
}
