//! The keystore actor (spec §4.1, §5): owns the on-disk store, the
//! passphrase-derived master key, and the in-memory key cache behind a
//! single `RwLock` so callers never take a lock themselves — they call an
//! `async fn` and get a result. A `tokio::sync::broadcast` channel carries
//! change notifications (`generate`/`delete`) out to interested transports
//! (the admin IPC's `KeysChanged` frame).

use crate::cache::Cache;
use crate::error::{KeystoreError, Result};
use crate::model::{
    KeyInfo, KeyRecord, KeystoreMetadata, RuntimeArgSpec, CURRENT_FORMAT_VERSION,
    VERIFICATION_PLAINTEXT,
};
use crate::store::IdentityStore;
use apsigner_crypto::signatures::{ed25519, falcon};
use apsigner_crypto::{aead, kdf, MasterKey};
use apsigner_lsig::LsigRegistry;
use apsigner_providers::KeyCategory;
use std::collections::BTreeMap;
use std::path::Path;
use time::OffsetDateTime;
use tokio::sync::{broadcast, RwLock};

pub type KeyCount = usize;

#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Generated(String),
    Deleted(String),
}

enum LockState {
    Locked,
    Unlocked { master: MasterKey, cache: Cache },
}

pub struct Keystore {
    store: IdentityStore,
    lsig: LsigRegistry,
    state: RwLock<LockState>,
    change_tx: broadcast::Sender<ChangeEvent>,
}

impl Keystore {
    pub fn new(data_dir: impl AsRef<Path>, identity: &str) -> Self {
        let (change_tx, _rx) = broadcast::channel(64);
        Self {
            store: IdentityStore::new(data_dir, identity),
            lsig: LsigRegistry::new(),
            state: RwLock::new(LockState::Locked),
            change_tx,
        }
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }

    pub async fn is_unlocked(&self) -> bool {
        matches!(*self.state.read().await, LockState::Unlocked { .. })
    }

    /// First call on a fresh store creates the metadata (random salt,
    /// verification ciphertext); every later call derives the master key
    /// and rejects with `BadPassphrase` on AEAD authentication failure —
    /// which is itself the constant-time passphrase check (spec §4.1).
    pub async fn initialize_or_unlock(&self, passphrase: &[u8]) -> Result<KeyCount> {
        self.store.ensure_dirs()?;
        let metadata = if self.store.metadata_exists() {
            self.store.load_metadata()?
        } else {
            let salt = kdf::generate_salt().to_vec();
            let master = kdf::derive_master_key(passphrase, &salt);
            let verification_ciphertext = aead::encrypt(&master, VERIFICATION_PLAINTEXT)?;
            let metadata = KeystoreMetadata {
                format_version: CURRENT_FORMAT_VERSION,
                salt,
                verification_ciphertext,
            };
            self.store.save_metadata(&metadata)?;
            metadata
        };

        let master = kdf::derive_master_key(passphrase, &metadata.salt);
        aead::decrypt(&master, &metadata.verification_ciphertext)
            .map_err(|_| KeystoreError::BadPassphrase)?;

        let mut cache = Cache::new();
        for address in self.store.list_key_files()? {
            let envelope = self.store.read_key_envelope(&address)?;
            let plaintext = aead::decrypt(&master, &envelope)
                .map_err(|_| KeystoreError::BadPassphrase)?;
            let record: KeyRecord = serde_json::from_slice(&plaintext)
                .map_err(|e| KeystoreError::MalformedKeyFile(address.clone(), e.to_string()))?;
            cache.insert(record);
        }
        let count = cache.len();
        *self.state.write().await = LockState::Unlocked { master, cache };
        Ok(count)
    }

    /// Zeroize the master key and every decrypted record, then drop the
    /// cache entirely (spec §4.1, §8: "no decrypted key byte is reachable
    /// from any reachable heap reference").
    pub async fn lock(&self) {
        *self.state.write().await = LockState::Locked;
    }

    /// Verify a passphrase against the on-disk verification ciphertext
    /// without transitioning the lock state (spec §6: the admin IPC's
    /// `Auth` handshake authenticates independently of `Unlock`, so an
    /// operator can connect and be recognized while the signer stays
    /// locked). Requires the store to already be initialized.
    pub async fn verify_passphrase(&self, passphrase: &[u8]) -> Result<()> {
        let metadata = self.store.load_metadata()?;
        let candidate = kdf::derive_master_key(passphrase, &metadata.salt);
        aead::decrypt(&candidate, &metadata.verification_ciphertext).map_err(|_| KeystoreError::BadPassphrase)?;
        Ok(())
    }

    pub async fn list(&self) -> Result<(Vec<KeyInfo>, String)> {
        let guard = self.state.read().await;
        let LockState::Unlocked { cache, .. } = &*guard else {
            return Err(KeystoreError::SignerLocked);
        };
        Ok((cache.list_info(), cache.checksum()))
    }

    pub async fn checksum(&self) -> Result<String> {
        let guard = self.state.read().await;
        let LockState::Unlocked { cache, .. } = &*guard else {
            return Err(KeystoreError::SignerLocked);
        };
        Ok(cache.checksum())
    }

    /// Look up the decrypted key material + category needed to sign, for
    /// the planner's SIGN-entry dispatch. Returns `None` for addresses with
    /// no private material (`generic_lsig`).
    pub async fn signing_material(
        &self,
        address: &str,
    ) -> Result<(String, KeyCategory, Option<Vec<u8>>, Option<Vec<u8>>, Vec<RuntimeArgSpec>)> {
        let guard = self.state.read().await;
        let LockState::Unlocked { cache, .. } = &*guard else {
            return Err(KeystoreError::SignerLocked);
        };
        let record = cache
            .get(address)
            .ok_or_else(|| KeystoreError::UnknownAddress(address.to_string()))?;
        Ok((
            record.key_type.clone(),
            record.category,
            record.private_bytes.clone(),
            record.lsig_bytecode.clone(),
            record.runtime_args_schema.clone(),
        ))
    }

    pub async fn generate(
        &self,
        key_type: &str,
        params: BTreeMap<String, String>,
    ) -> Result<(String, Option<String>)> {
        let built = self.build_record(key_type, params, None)?;
        self.persist_new(built).await
    }

    pub async fn import(
        &self,
        key_type: &str,
        mnemonic: &str,
        params: BTreeMap<String, String>,
    ) -> Result<(String, Option<String>)> {
        let secret = hex::decode(mnemonic)
            .map_err(|_| KeystoreError::MalformedKeyFile(key_type.to_string(), "mnemonic is not valid hex".into()))?;
        let built = self.build_record(key_type, params, Some(secret))?;
        self.persist_new(built).await
    }

    pub async fn delete(&self, address: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        let LockState::Unlocked { cache, .. } = &mut *guard else {
            return Err(KeystoreError::SignerLocked);
        };
        if !cache.contains(address) {
            return Err(KeystoreError::UnknownAddress(address.to_string()));
        }
        self.store.delete_key_file(address)?;
        cache.remove(address);
        drop(guard);
        let _ = self.change_tx.send(ChangeEvent::Deleted(address.to_string()));
        Ok(())
    }

    /// Re-verify the passphrase against the stored verification ciphertext
    /// and return the mnemonic/entropy recorded for `address` (spec §4.1).
    pub async fn export(&self, address: &str, passphrase: &[u8]) -> Result<String> {
        let metadata = self.store.load_metadata()?;
        let candidate = kdf::derive_master_key(passphrase, &metadata.salt);
        aead::decrypt(&candidate, &metadata.verification_ciphertext)
            .map_err(|_| KeystoreError::BadPassphrase)?;

        let guard = self.state.read().await;
        let LockState::Unlocked { cache, .. } = &*guard else {
            return Err(KeystoreError::SignerLocked);
        };
        let record = cache
            .get(address)
            .ok_or_else(|| KeystoreError::UnknownAddress(address.to_string()))?;
        record
            .private_bytes
            .as_ref()
            .map(hex::encode)
            .ok_or_else(|| KeystoreError::NoMnemonic(record.key_type.clone()))
    }

    fn build_record(
        &self,
        key_type: &str,
        params: BTreeMap<String, String>,
        imported_secret: Option<Vec<u8>>,
    ) -> Result<KeyRecord> {
        if key_type == "ed25519" {
            let (secret, public) = match imported_secret {
                Some(secret) => {
                    let public = ed25519::public_key_from_seed(&secret)?;
                    (secret, public)
                }
                None => {
                    let (secret, public) = ed25519::generate();
                    (secret.expose().to_vec(), public)
                }
            };
            return Ok(KeyRecord {
                address: apsigner_crypto::address::encode_address(&public),
                key_type: key_type.to_string(),
                category: KeyCategory::Ed25519,
                public_bytes: public.to_vec(),
                private_bytes: Some(secret),
                lsig_bytecode: None,
                params: BTreeMap::new(),
                runtime_args_schema: Vec::new(),
                teal_source: None,
                created_at: now(),
            });
        }

        let category = self.lsig.category(key_type)?;
        match category {
            KeyCategory::GenericLsig => {
                let compiled = self.lsig.compile(key_type, &params, None)?;
                let schema = self
                    .lsig
                    .runtime_args_schema(key_type)?
                    .iter()
                    .map(RuntimeArgSpec::from)
                    .collect();
                Ok(KeyRecord {
                    address: compiled.address,
                    key_type: key_type.to_string(),
                    category,
                    public_bytes: Vec::new(),
                    private_bytes: None,
                    lsig_bytecode: Some(compiled.bytecode),
                    params,
                    runtime_args_schema: schema,
                    teal_source: Some(compiled.teal_source),
                    created_at: now(),
                })
            }
            KeyCategory::DsaLsig => {
                let (secret, public) = match imported_secret {
                    Some(secret) => {
                        // Falcon has no cheap public-key-from-secret derivation
                        // exposed by this crate; import requires the caller to
                        // have supplied the matching public key as a param.
                        let public_hex = params
                            .get("public_key")
                            .ok_or_else(|| KeystoreError::MalformedKeyFile(
                                key_type.to_string(),
                                "import requires a 'public_key' param for falcon key types".into(),
                            ))?;
                        let public = hex::decode(public_hex).map_err(|_| {
                            KeystoreError::MalformedKeyFile(
                                key_type.to_string(),
                                "public_key param is not valid hex".into(),
                            )
                        })?;
                        (secret, public)
                    }
                    None => {
                        let (secret, public) = falcon::generate();
                        (secret.expose().to_vec(), public)
                    }
                };
                let compiled = self.lsig.compile(key_type, &params, Some(&public))?;
                let schema = self
                    .lsig
                    .runtime_args_schema(key_type)?
                    .iter()
                    .map(RuntimeArgSpec::from)
                    .collect();
                Ok(KeyRecord {
                    address: compiled.address,
                    key_type: key_type.to_string(),
                    category,
                    public_bytes: public,
                    private_bytes: Some(secret),
                    lsig_bytecode: Some(compiled.bytecode),
                    params,
                    runtime_args_schema: schema,
                    teal_source: Some(compiled.teal_source),
                    created_at: now(),
                })
            }
            KeyCategory::Ed25519 => unreachable!("ed25519 handled above, before reaching the lsig registry"),
        }
    }

    async fn persist_new(&self, record: KeyRecord) -> Result<(String, Option<String>)> {
        let mut guard = self.state.write().await;
        let LockState::Unlocked { master, cache } = &mut *guard else {
            return Err(KeystoreError::SignerLocked);
        };
        if cache.contains(&record.address) {
            return Err(KeystoreError::DuplicateAddress);
        }
        let mnemonic = record.private_bytes.as_ref().map(hex::encode);
        let plaintext = serde_json::to_vec(&record)
            .map_err(|e| KeystoreError::DiskPersistence(format!("encode key record: {e}")))?;
        let envelope = aead::encrypt(master, &plaintext)?;
        self.store.write_key_envelope(&record.address, &envelope)?;
        let address = record.address.clone();
        cache.insert(record);
        drop(guard);
        let _ = self.change_tx.send(ChangeEvent::Generated(address.clone()));
        Ok((address, mnemonic))
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystore() -> (tempfile::TempDir, Keystore) {
        let dir = tempfile::tempdir().unwrap();
        let ks = Keystore::new(dir.path(), "default");
        (dir, ks)
    }

    #[tokio::test]
    async fn first_unlock_creates_metadata_and_is_empty() {
        let (_dir, ks) = keystore();
        let count = ks.initialize_or_unlock(b"pw").await.unwrap();
        assert_eq!(count, 0);
        assert!(ks.is_unlocked().await);
    }

    #[tokio::test]
    async fn wrong_passphrase_rejected_on_second_open() {
        let (dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        drop(ks);
        let ks2 = Keystore::new(dir.path(), "default");
        let err = ks2.initialize_or_unlock(b"wrong").await.unwrap_err();
        assert!(matches!(err, KeystoreError::BadPassphrase));
    }

    #[tokio::test]
    async fn generate_export_import_round_trips_address() {
        let (_dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        let (address, mnemonic) = ks.generate("ed25519", BTreeMap::new()).await.unwrap();
        let mnemonic = mnemonic.unwrap();
        let exported = ks.export(&address, b"pw").await.unwrap();
        assert_eq!(exported, mnemonic);
        ks.delete(&address).await.unwrap();
        let (reimported, _) = ks.import("ed25519", &mnemonic, BTreeMap::new()).await.unwrap();
        assert_eq!(reimported, address);
    }

    #[tokio::test]
    async fn export_rejects_bad_passphrase_even_when_unlocked() {
        let (_dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        let (address, _) = ks.generate("ed25519", BTreeMap::new()).await.unwrap();
        let err = ks.export(&address, b"wrong").await.unwrap_err();
        assert!(matches!(err, KeystoreError::BadPassphrase));
    }

    #[tokio::test]
    async fn lock_rejects_further_reads() {
        let (_dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        ks.generate("ed25519", BTreeMap::new()).await.unwrap();
        ks.lock().await;
        assert!(matches!(ks.list().await, Err(KeystoreError::SignerLocked)));
    }

    #[tokio::test]
    async fn checksum_changes_on_generate_and_delete() {
        let (_dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        let empty_sum = ks.checksum().await.unwrap();
        let (address, _) = ks.generate("ed25519", BTreeMap::new()).await.unwrap();
        let after_gen = ks.checksum().await.unwrap();
        assert_ne!(empty_sum, after_gen);
        ks.delete(&address).await.unwrap();
        assert_eq!(ks.checksum().await.unwrap(), empty_sum);
    }

    #[tokio::test]
    async fn generic_lsig_has_no_mnemonic() {
        let (_dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        let mut params = BTreeMap::new();
        params.insert("recipient".to_string(), "A".repeat(58));
        params.insert("unlock_round".to_string(), "100".to_string());
        params.insert("hash_commitment".to_string(), hex::encode([1u8; 32]));
        let (address, mnemonic) = ks.generate("hashlock-v3", params).await.unwrap();
        assert!(mnemonic.is_none());
        let err = ks.export(&address, b"pw").await.unwrap_err();
        assert!(matches!(err, KeystoreError::NoMnemonic(_)));
    }

    #[tokio::test]
    async fn reopen_after_unlock_restores_cache_from_disk() {
        let (dir, ks) = keystore();
        ks.initialize_or_unlock(b"pw").await.unwrap();
        let (address, _) = ks.generate("ed25519", BTreeMap::new()).await.unwrap();
        drop(ks);

        let ks2 = Keystore::new(dir.path(), "default");
        let count = ks2.initialize_or_unlock(b"pw").await.unwrap();
        assert_eq!(count, 1);
        let (keys, _) = ks2.list().await.unwrap();
        assert_eq!(keys[0].address, address);
    }
}
