//! Input entry types (spec §4.4) and the keystore lookup seam the planner
//! needs without depending on `apsigner-keystore` directly — `apsignerd`
//! wires a concrete `KeyLookup` over the real keystore + provider registry.

use apsigner_providers::KeyCategory;
use std::collections::BTreeMap;

/// One submitted batch entry, exactly as received over `/sign` or `/plan`
/// (spec §4.4, §6's `SignEntry`).
#[derive(Debug, Clone)]
pub enum Entry {
    Sign {
        txn_bytes: Vec<u8>,
        auth_address: String,
        lsig_args: BTreeMap<String, String>,
    },
    Passthrough {
        signed_txn_bytes: Vec<u8>,
    },
    Foreign {
        txn_bytes: Vec<u8>,
        lsig_size_hint: Option<usize>,
    },
}

/// What the planner needs to know about a signing address, supplied by
/// whatever owns the keystore (spec §9: sealed key-type variants plus a
/// provider table, generalized here to a lookup seam). Runtime-argument
/// schemas live in the LogicSig registry the planner already owns, keyed by
/// `key_type`, so they aren't duplicated here.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub key_type: String,
    pub category: KeyCategory,
    pub lsig_bytecode: Option<Vec<u8>>,
    pub private_bytes: Option<Vec<u8>>,
}

pub trait KeyLookup: Send + Sync {
    fn lookup(&self, address: &str) -> Option<KeyEntry>;
}

/// Test/embedding-friendly in-memory [`KeyLookup`].
#[derive(Default, Clone)]
pub struct StaticKeyLookup {
    entries: BTreeMap<String, KeyEntry>,
}

impl StaticKeyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: impl Into<String>, entry: KeyEntry) {
        self.entries.insert(address.into(), entry);
    }
}

impl KeyLookup for StaticKeyLookup {
    fn lookup(&self, address: &str) -> Option<KeyEntry> {
        self.entries.get(address).cloned()
    }
}
