//! Password-gated identity vault and canonical signing.
//!
//! The vault persists one Ed25519 keypair under `identity.vault` in the
//! node's data directory. Two on-disk formats coexist:
//!
//! - **Production** (`format=prod-v1`): the serialized keypair is sealed
//!   with XChaCha20-Poly1305 under an Argon2id-derived key. Wrong
//!   passphrases fail AEAD authentication.
//! - **Compatibility**: a single hex blob, XOR-streamed with a key derived
//!   from the passphrase and the data directory path. Kept so that nodes
//!   built without the production swap can still join a community.
//!
//! The private key lives in memory only while the vault is `ready`;
//! [`IdentityVault::lock_identity`] zeroizes it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use soupnet_types::{Result, SoupNetError};

use crate::hash::{fnv64_hex, sha256_hex};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Vault file name under the app data directory.
const VAULT_FILE_NAME: &str = "identity.vault";

/// Format tag of the production vault.
const PROD_VAULT_FORMAT: &str = "prod-v1";

/// AEAD backend recorded in the production vault header. Readers key on
/// `format=`, not on this value.
const PROD_VAULT_MODE: &str = "xchacha20poly1305";

/// Format tag of exported key backups.
const BACKUP_FORMAT: &str = "got-soup-key-backup-v1";

/// Argon2id salt length fed into the KDF.
const ARGON_SALT_LEN: usize = 16;

/// XChaCha20-Poly1305 nonce length.
const AEAD_NONCE_LEN: usize = 24;

/// Poly1305 tag length appended to the ciphertext.
const AEAD_TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// IdentityKeyPair
// ---------------------------------------------------------------------------

/// Hex-encoded signing keypair plus its derived CID.
///
/// `cid = "cid-" + H(public_key)[..20]` under the active digest.
#[derive(Clone, Debug, Default)]
pub struct IdentityKeyPair {
    pub public_key: String,
    pub private_key: String,
    pub cid: String,
}

impl IdentityKeyPair {
    fn is_complete(&self) -> bool {
        !self.public_key.is_empty() && !self.private_key.is_empty() && !self.cid.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn crypto_err(reason: impl Into<String>) -> SoupNetError {
    SoupNetError::Crypto {
        reason: reason.into(),
    }
}

/// XORs `input` with a repeating `key`. Empty keys pass the input through.
fn xor_stream(input: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return input.to_vec();
    }
    input
        .iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % key.len()])
        .collect()
}

fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| crypto_err(format!("failed to gather entropy: {e}")))?;
    Ok(out)
}

/// Hashes an arbitrary salt string down to the fixed Argon2id salt size.
fn salt_from_string(salt_input: &str) -> [u8; ARGON_SALT_LEN] {
    let digest = sha256_hex(salt_input.as_bytes());
    let bytes = hex::decode(&digest).unwrap_or_default();
    let mut salt = [0u8; ARGON_SALT_LEN];
    for (i, byte) in bytes.iter().take(ARGON_SALT_LEN).enumerate() {
        salt[i] = *byte;
    }
    salt
}

/// Derives a 256-bit vault key with Argon2id (64 MiB, 3 passes).
fn derive_argon2id_key(passphrase: &[u8], salt: &[u8]) -> Result<[u8; 32]> {
    let params = argon2::Params::new(65_536, 3, 1, Some(32))
        .map_err(|e| crypto_err(format!("invalid Argon2 parameters: {e}")))?;
    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| crypto_err(format!("Argon2id derivation failed: {e}")))?;
    Ok(output)
}

fn parse_key_values(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.to_string(), value.to_string());
        }
    }
    values
}

fn parse_identity(plain: &[u8]) -> IdentityKeyPair {
    let text = String::from_utf8_lossy(plain);
    let values = parse_key_values(&text);
    IdentityKeyPair {
        public_key: values.get("public_key").cloned().unwrap_or_default(),
        private_key: values.get("private_key").cloned().unwrap_or_default(),
        cid: values.get("cid").cloned().unwrap_or_default(),
    }
}

fn serialize_identity(key_pair: &IdentityKeyPair) -> String {
    format!(
        "public_key={}\nprivate_key={}\ncid={}\n",
        key_pair.public_key, key_pair.private_key, key_pair.cid
    )
}

/// Truncates a hex digest to at most `len` chars (FNV digests are shorter
/// than the requested CID width).
fn short_hash(digest: &str, len: usize) -> &str {
    &digest[..digest.len().min(len)]
}

/// Returns `true` when the identity holds a genuine Ed25519 keypair:
/// both keys decode to 32 bytes and the public key re-derives from the
/// secret.
fn is_production_keypair(identity: &IdentityKeyPair) -> bool {
    let secret = hex::decode(&identity.private_key)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok());
    let public = hex::decode(&identity.public_key)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok());
    let (Some(secret), Some(public)) = (secret, public) else {
        return false;
    };
    let signing = SigningKey::from_bytes(&secret);
    signing.verifying_key().to_bytes() == public
}

// ---------------------------------------------------------------------------
// IdentityVault
// ---------------------------------------------------------------------------

/// Password-gated key material and canonical signing for one node.
///
/// # States
///
/// - **ready**: the keypair is decrypted in memory; signing works.
/// - **locked**: the private key has been zeroized; [`sign`](Self::sign)
///   returns an empty signature and callers must check.
#[derive(Default)]
pub struct IdentityVault {
    app_data_dir: PathBuf,
    identity: IdentityKeyPair,
    ready: bool,
    production_swap_requested: bool,
    production_mode_active: bool,
    last_unlocked_unix: i64,
    last_locked_unix: i64,
}

impl IdentityVault {
    // -- Accessors --------------------------------------------------------

    /// Whether the keypair is decrypted and signing is available.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Whether the production crypto path (Ed25519 + sealed vault) is live.
    pub fn production_mode_active(&self) -> bool {
        self.production_mode_active
    }

    /// The current identity. `private_key` is empty while locked.
    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    pub fn last_unlocked_unix(&self) -> i64 {
        self.last_unlocked_unix
    }

    pub fn last_locked_unix(&self) -> i64 {
        self.last_locked_unix
    }

    /// Absolute path of the vault file, or empty before `initialize`.
    pub fn vault_path(&self) -> String {
        if self.app_data_dir.as_os_str().is_empty() {
            return String::new();
        }
        self.app_data_dir
            .join(VAULT_FILE_NAME)
            .display()
            .to_string()
    }

    // -- Lifecycle --------------------------------------------------------

    /// Creates or unlocks the vault at `<app_data_dir>/identity.vault`.
    ///
    /// A fresh keypair is generated and persisted when no vault exists;
    /// otherwise whichever format the on-disk file declares is read. With
    /// `production_swap_requested` the engine prefers the production
    /// format and Ed25519 keys.
    pub fn initialize(
        &mut self,
        app_data_dir: &Path,
        passphrase: &str,
        production_swap_requested: bool,
    ) -> Result<()> {
        self.app_data_dir = app_data_dir.to_path_buf();
        self.production_swap_requested = production_swap_requested;
        self.production_mode_active = false;
        self.ready = false;

        if passphrase.is_empty() {
            return Err(crypto_err(
                "Passphrase is required to unlock the local identity vault.",
            ));
        }

        fs::create_dir_all(app_data_dir).map_err(|e| SoupNetError::Storage {
            reason: format!("Failed to create app data directory: {e}"),
        })?;

        let vault = app_data_dir.join(VAULT_FILE_NAME);
        if vault.exists() {
            return self.unlock_from_vault(passphrase);
        }

        self.generate_identity(production_swap_requested);
        self.persist_identity_vault(passphrase)?;
        self.ready = true;
        self.last_unlocked_unix = unix_now();
        Ok(())
    }

    fn unlock_from_vault(&mut self, passphrase: &str) -> Result<()> {
        let vault = self.app_data_dir.join(VAULT_FILE_NAME);
        let vault_text = fs::read_to_string(&vault).unwrap_or_default();
        if vault_text.is_empty() {
            return Err(crypto_err("Identity vault exists but is empty."));
        }

        let values = parse_key_values(&vault_text);
        if values.get("format").map(String::as_str) == Some(PROD_VAULT_FORMAT) {
            let salt = hex::decode(values.get("salt").map(String::as_str).unwrap_or_default())
                .unwrap_or_default();
            let nonce = hex::decode(values.get("nonce").map(String::as_str).unwrap_or_default())
                .unwrap_or_default();
            let cipher = hex::decode(values.get("cipher").map(String::as_str).unwrap_or_default())
                .unwrap_or_default();
            if salt.len() != ARGON_SALT_LEN
                || nonce.len() != AEAD_NONCE_LEN
                || cipher.len() < AEAD_TAG_LEN
            {
                return Err(crypto_err("Production identity vault format is invalid."));
            }

            let mut key = derive_argon2id_key(passphrase.as_bytes(), &salt)?;
            let aead = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
            let plain = aead
                .decrypt(XNonce::from_slice(&nonce), cipher.as_slice())
                .map_err(|_| {
                    crypto_err(
                        "Identity vault could not be decrypted. Wrong passphrase or corrupt file.",
                    )
                });
            key.zeroize();
            let mut plain = plain?;

            self.identity = parse_identity(&plain);
            plain.zeroize();
            if !self.identity.is_complete() {
                return Err(crypto_err(
                    "Production identity vault payload could not be parsed.",
                ));
            }

            self.production_mode_active = true;
            self.ready = true;
            self.last_unlocked_unix = unix_now();
            return Ok(());
        }

        // Compatibility vault path.
        let vault_key = self.derive_vault_key(passphrase, &self.app_data_dir.display().to_string());
        let encrypted = hex::decode(vault_text.trim()).unwrap_or_default();
        if encrypted.is_empty() {
            return Err(crypto_err(
                "Compatibility identity vault format is invalid.",
            ));
        }
        let plain = xor_stream(&encrypted, vault_key.as_bytes());
        self.identity = parse_identity(&plain);

        if !self.identity.is_complete() {
            return Err(crypto_err(
                "Identity vault could not be parsed. Wrong passphrase or corrupt file.",
            ));
        }

        if self.production_swap_requested {
            self.production_mode_active = is_production_keypair(&self.identity);
        }

        self.ready = true;
        self.last_unlocked_unix = unix_now();
        Ok(())
    }

    fn persist_identity_vault(&self, passphrase: &str) -> Result<()> {
        if self.app_data_dir.as_os_str().is_empty() {
            return Err(crypto_err(
                "Identity vault persistence failed: app_data_dir is not configured.",
            ));
        }

        fs::create_dir_all(&self.app_data_dir).map_err(|e| SoupNetError::Storage {
            reason: format!("Failed to create app data directory: {e}"),
        })?;

        let vault = self.app_data_dir.join(VAULT_FILE_NAME);
        let plain = serialize_identity(&self.identity);

        if self.production_mode_active {
            let salt = random_bytes(ARGON_SALT_LEN)?;
            let nonce = random_bytes(AEAD_NONCE_LEN)?;
            let mut key = derive_argon2id_key(passphrase.as_bytes(), &salt)?;
            let aead = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
            let cipher = aead
                .encrypt(XNonce::from_slice(&nonce), plain.as_bytes())
                .map_err(|_| crypto_err("Failed to seal production identity vault."));
            key.zeroize();
            let cipher = cipher?;

            let contents = format!(
                "format={PROD_VAULT_FORMAT}\nmode={PROD_VAULT_MODE}\nsalt={}\nnonce={}\ncipher={}\n",
                hex::encode(&salt),
                hex::encode(&nonce),
                hex::encode(&cipher)
            );
            return fs::write(&vault, contents).map_err(|e| SoupNetError::Storage {
                reason: format!("Failed to write production identity vault: {e}"),
            });
        }

        let vault_key = self.derive_vault_key(passphrase, &self.app_data_dir.display().to_string());
        let encrypted = xor_stream(plain.as_bytes(), vault_key.as_bytes());
        fs::write(&vault, hex::encode(encrypted)).map_err(|e| SoupNetError::Storage {
            reason: format!("Failed to write compatibility identity vault: {e}"),
        })
    }

    fn generate_identity(&mut self, prefer_production_keys: bool) {
        if prefer_production_keys {
            let mut secret = [0u8; 32];
            OsRng.fill_bytes(&mut secret);
            let signing = SigningKey::from_bytes(&secret);
            secret.zeroize();

            self.production_mode_active = true;
            self.identity.public_key = hex::encode(signing.verifying_key().to_bytes());
            self.identity.private_key = hex::encode(signing.to_bytes());
            self.identity.cid = format!(
                "cid-{}",
                short_hash(&self.hash_bytes(self.identity.public_key.as_bytes()), 20)
            );
            return;
        }

        self.production_mode_active = false;
        let secret = random_bytes(32).unwrap_or_else(|_| vec![0u8; 32]);
        self.identity.private_key = hex::encode(secret);
        self.identity.public_key =
            self.hash_bytes(format!("{}:public", self.identity.private_key).as_bytes());
        self.identity.cid = format!(
            "cid-{}",
            short_hash(&self.hash_bytes(self.identity.public_key.as_bytes()), 20)
        );
    }

    // -- Backup -----------------------------------------------------------

    /// Writes an encrypted identity backup to `backup_path`.
    ///
    /// The keypair is XOR-streamed with `derive(password, "backup:"+salt)`
    /// so the backup opens on any node, production or compatibility.
    pub fn export_identity_backup(
        &self,
        backup_path: &Path,
        password: &str,
        salt: &str,
    ) -> Result<String> {
        if !self.ready {
            return Err(crypto_err("Key export failed: identity is not ready."));
        }
        if backup_path.as_os_str().is_empty() {
            return Err(crypto_err("Key export failed: backup path is required."));
        }
        if password.is_empty() {
            return Err(crypto_err(
                "Key export failed: backup password is required.",
            ));
        }
        if salt.is_empty() {
            return Err(crypto_err("Key export failed: salt is required."));
        }

        if let Some(parent) = backup_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SoupNetError::Storage {
                    reason: format!("Key export failed: unable to create backup directory: {e}"),
                })?;
            }
        }

        let key = self.derive_vault_key(password, &format!("backup:{salt}"));
        let plain = serialize_identity(&self.identity);
        let cipher = xor_stream(plain.as_bytes(), key.as_bytes());

        let contents = format!(
            "format={BACKUP_FORMAT}\nsalt={salt}\ncid={}\npublic_key={}\ncipher={}\n",
            self.identity.cid,
            self.identity.public_key,
            hex::encode(cipher)
        );
        fs::write(backup_path, contents).map_err(|e| SoupNetError::Storage {
            reason: format!("Key export failed: unable to write backup file: {e}"),
        })?;
        Ok(backup_path.display().to_string())
    }

    /// Replaces the vault keypair with one decrypted from a backup file
    /// and re-persists the vault under `local_passphrase`.
    pub fn import_identity_backup(
        &mut self,
        backup_path: &Path,
        password: &str,
        local_passphrase: &str,
    ) -> Result<String> {
        if backup_path.as_os_str().is_empty() {
            return Err(crypto_err("Key import failed: backup path is required."));
        }
        if password.is_empty() {
            return Err(crypto_err(
                "Key import failed: backup password is required.",
            ));
        }
        if local_passphrase.is_empty() {
            return Err(crypto_err(
                "Key import failed: local passphrase is required.",
            ));
        }

        let file_text = fs::read_to_string(backup_path).unwrap_or_default();
        if file_text.is_empty() {
            return Err(crypto_err(
                "Key import failed: backup file could not be read.",
            ));
        }

        let values = parse_key_values(&file_text);
        if values.get("format").map(String::as_str) != Some(BACKUP_FORMAT) {
            return Err(crypto_err("Key import failed: unsupported backup format."));
        }
        let (Some(salt), Some(cipher_hex)) = (values.get("salt"), values.get("cipher")) else {
            return Err(crypto_err("Key import failed: missing salt/cipher fields."));
        };

        let key = self.derive_vault_key(password, &format!("backup:{salt}"));
        let cipher = hex::decode(cipher_hex).unwrap_or_default();
        if cipher.is_empty() {
            return Err(crypto_err("Key import failed: cipher payload is invalid."));
        }

        let plain = xor_stream(&cipher, key.as_bytes());
        let imported = parse_identity(&plain);
        if !imported.is_complete() {
            return Err(crypto_err(
                "Key import failed: wrong password or corrupt backup.",
            ));
        }

        self.identity = imported;
        self.production_mode_active =
            self.production_swap_requested && is_production_keypair(&self.identity);

        self.persist_identity_vault(local_passphrase)?;
        self.ready = true;
        self.last_unlocked_unix = unix_now();
        Ok(self.identity.cid.clone())
    }

    // -- Lock state -------------------------------------------------------

    /// Wipes the private key from memory and marks the vault not-ready.
    pub fn lock_identity(&mut self) {
        if !self.ready {
            return;
        }
        self.ready = false;
        self.identity.private_key.zeroize();
        self.identity.private_key.clear();
        self.last_locked_unix = unix_now();
    }

    /// Re-reads and decrypts the vault after a lock.
    pub fn unlock_identity(&mut self, passphrase: &str) -> Result<()> {
        if passphrase.is_empty() {
            return Err(crypto_err("Wallet unlock failed: passphrase is required."));
        }
        self.unlock_from_vault(passphrase)
    }

    /// Generates a fresh keypair and persists it. The previous key is
    /// irrecoverable without a prior backup.
    pub fn nuke_identity(
        &mut self,
        local_passphrase: &str,
        production_swap_requested: bool,
    ) -> Result<String> {
        if local_passphrase.is_empty() {
            return Err(crypto_err("Nuke key failed: local passphrase is required."));
        }

        self.production_swap_requested = production_swap_requested;
        self.generate_identity(production_swap_requested);
        self.persist_identity_vault(local_passphrase)?;
        self.ready = true;
        self.last_unlocked_unix = unix_now();
        self.last_locked_unix = 0;
        Ok(self.identity.cid.clone())
    }

    // -- Digests and signatures -------------------------------------------

    /// Derives a hex key for vault/backup/community ciphers.
    ///
    /// Argon2id over a digest-fixed salt in production; a digest of the
    /// concatenated inputs in the compatibility scaffold.
    pub fn derive_vault_key(&self, passphrase: &str, salt: &str) -> String {
        if self.production_mode_active || self.production_swap_requested {
            if let Ok(mut key) = derive_argon2id_key(passphrase.as_bytes(), &salt_from_string(salt))
            {
                let encoded = hex::encode(key);
                key.zeroize();
                return encoded;
            }
        }
        self.hash_bytes(format!("{passphrase}::{salt}::argon2id-placeholder").as_bytes())
    }

    /// Content digest under the active mode: SHA-256 when the production
    /// swap is requested or active, FNV-64 otherwise.
    pub fn hash_bytes(&self, payload: &[u8]) -> String {
        if self.production_mode_active || self.production_swap_requested {
            return sha256_hex(payload);
        }
        fnv64_hex(payload)
    }

    /// Content id for an event payload: `"evt-" + hash_bytes(payload)`.
    pub fn content_id(&self, payload: &[u8]) -> String {
        format!("evt-{}", self.hash_bytes(payload))
    }

    /// Signs a payload. Returns an **empty string** while locked or when
    /// the stored key is unusable; callers must check.
    pub fn sign(&self, payload: &[u8]) -> String {
        if !self.ready {
            return String::new();
        }

        if self.production_mode_active {
            let Some(secret) = hex::decode(&self.identity.private_key)
                .ok()
                .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            else {
                return String::new();
            };
            let signing = SigningKey::from_bytes(&secret);
            return hex::encode(signing.sign(payload).to_bytes());
        }

        self.hash_bytes(format!("{}::{}", String::from_utf8_lossy(payload), self.identity.public_key).as_bytes())
    }

    /// Verifies a signature against a public key under the active mode.
    pub fn verify(&self, payload: &[u8], signature: &str, public_key: &str) -> bool {
        if self.production_mode_active {
            let sig_bytes = hex::decode(signature)
                .ok()
                .and_then(|bytes| <[u8; 64]>::try_from(bytes).ok());
            let pub_bytes = hex::decode(public_key)
                .ok()
                .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok());
            let (Some(sig_bytes), Some(pub_bytes)) = (sig_bytes, pub_bytes) else {
                return false;
            };
            let Ok(verifying) = VerifyingKey::from_bytes(&pub_bytes) else {
                return false;
            };
            return verifying
                .verify(payload, &Signature::from_bytes(&sig_bytes))
                .is_ok();
        }

        let expected = self
            .hash_bytes(format!("{}::{public_key}", String::from_utf8_lossy(payload)).as_bytes());
        expected == signature
    }

    /// Human-readable description of the crypto phase, surfaced in
    /// `node_status()`.
    pub fn core_phase_status(&self) -> String {
        if !self.ready {
            return "Core Phase 1 pending: wallet is locked or crypto engine not initialized."
                .into();
        }
        if self.production_mode_active {
            return "Core Phase 1 active: Production Swap enabled (Argon2id + Ed25519).".into();
        }
        if self.production_swap_requested {
            return "Core Phase 1 active: Production Swap requested, running compatibility \
                    scaffold until all production dependencies are linked."
                .into();
        }
        "Core Phase 1 active: compatibility scaffold mode.".into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
