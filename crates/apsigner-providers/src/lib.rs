//! Pluggable signing-provider registry, keyed by the `key_type` string
//! carried on every `KeyRecord`. Generalizes the teacher's
//! `wallet::WalletSigner` trait (one signer, one keypair) into a table of
//! signers, one per key family, dispatched by string at request time (spec
//! §9: "a runtime registry keyed by string ... model as a sealed set of
//! variants plus a provider table").

use apsigner_crypto::signatures::{ed25519, falcon};
use std::collections::HashMap;
use thiserror::Error;

/// The three address-producing families a `KeyRecord` can belong to (spec
/// §3's `category` field). Sealed: new families require a code change, not
/// just a new registry entry, because each implies different persistence
/// and signing-envelope rules elsewhere in the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCategory {
    Ed25519,
    DsaLsig,
    GenericLsig,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown signing provider for key type '{0}'")]
    UnknownKeyType(String),
    #[error(transparent)]
    Crypto(#[from] apsigner_crypto::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// A signing provider for one key-type family. `key_material` is whatever
/// `apsigner-keystore` decrypted from disk for that address (an ed25519
/// seed, a falcon secret key; absent entirely for `generic_lsig`, which
/// never reaches a provider's `sign`).
pub trait SigningProvider: Send + Sync {
    /// Category this provider produces signatures/proofs for.
    fn category(&self) -> KeyCategory;

    /// True if this provider handles the given `key_type` string.
    fn detect(&self, key_type: &str) -> bool;

    /// Produce a signature (or LogicSig authorization payload) over `msg`.
    fn sign(&self, key_material: &[u8], msg: &[u8]) -> Result<Vec<u8>>;
}

struct Ed25519Provider;

impl SigningProvider for Ed25519Provider {
    fn category(&self) -> KeyCategory {
        KeyCategory::Ed25519
    }

    fn detect(&self, key_type: &str) -> bool {
        key_type == "ed25519"
    }

    fn sign(&self, key_material: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        Ok(ed25519::sign(key_material, msg)?.to_vec())
    }
}

struct FalconProvider;

impl SigningProvider for FalconProvider {
    fn category(&self) -> KeyCategory {
        KeyCategory::DsaLsig
    }

    fn detect(&self, key_type: &str) -> bool {
        key_type.starts_with("falcon1024")
    }

    fn sign(&self, key_material: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        falcon::sign(key_material, msg).map_err(Into::into)
    }
}

/// String-keyed provider table. Built once at startup; cheap to clone the
/// `Arc` around it rather than the table itself.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn SigningProvider>>,
    by_key_type: HashMap<String, usize>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut registry = Self {
            providers: Vec::new(),
            by_key_type: HashMap::new(),
        };
        registry.register_default("ed25519", Box::new(Ed25519Provider));
        registry.register_default("falcon1024-v1", Box::new(FalconProvider));
        registry.register_default("falcon1024-timelock-v1", Box::new(FalconProvider));
        registry
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_default(&mut self, key_type: &str, provider: Box<dyn SigningProvider>) {
        let idx = self.providers.len();
        self.providers.push(provider);
        self.by_key_type.insert(key_type.to_string(), idx);
    }

    /// Register an additional provider for a key type not already bound to
    /// one of the built-ins. Used by `apsigner-lsig` to wire in future DSA
    /// families without this crate needing to know about them upfront.
    pub fn register(&mut self, key_type: &str, provider: Box<dyn SigningProvider>) {
        self.register_default(key_type, provider);
    }

    pub fn get(&self, key_type: &str) -> Result<&dyn SigningProvider> {
        if let Some(&idx) = self.by_key_type.get(key_type) {
            return Ok(self.providers[idx].as_ref());
        }
        // generic lsigs and any forward-compatible falcon variant fall back
        // to prefix-based detection so a new `falcon1024-*` template doesn't
        // require touching this table.
        self.providers
            .iter()
            .find(|p| p.detect(key_type))
            .map(|p| p.as_ref())
            .ok_or_else(|| ProviderError::UnknownKeyType(key_type.to_string()))
    }

    pub fn sign(&self, key_type: &str, key_material: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        self.get(key_type)?.sign(key_material, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_round_trip_through_registry() {
        let registry = ProviderRegistry::new();
        let (seed, public) = ed25519::generate();
        let msg = b"hello";
        let sig = registry.sign("ed25519", seed.expose(), msg).unwrap();
        let sig: [u8; 64] = sig.try_into().unwrap();
        assert!(ed25519::verify(&public, msg, &sig));
    }

    #[test]
    fn falcon_variant_resolves_by_prefix() {
        let registry = ProviderRegistry::new();
        assert_eq!(
            registry.get("falcon1024-timelock-v1").unwrap().category(),
            KeyCategory::DsaLsig
        );
        assert_eq!(
            registry.get("falcon1024-new-family-v2").unwrap().category(),
            KeyCategory::DsaLsig
        );
    }

    #[test]
    fn unknown_key_type_rejected() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.get("unknown-v9"),
            Err(ProviderError::UnknownKeyType(_))
        ));
    }
}
