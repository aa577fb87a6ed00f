//! The in-memory key cache populated on unlock and dropped (zeroizing) on
//! lock. Also owns the `list()` checksum (spec §4.1: "a stable hash over
//! addresses+types") that backs `GET /keys`' `X-Keys-Checksum` ETag.

use crate::model::{KeyInfo, KeyRecord};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Default)]
pub struct Cache {
    records: BTreeMap<String, KeyRecord>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: KeyRecord) {
        self.records.insert(record.address.clone(), record);
    }

    pub fn remove(&mut self, address: &str) -> Option<KeyRecord> {
        self.records.remove(address)
    }

    pub fn get(&self, address: &str) -> Option<&KeyRecord> {
        self.records.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.records.contains_key(address)
    }

    pub fn list_info(&self) -> Vec<KeyInfo> {
        self.records.values().map(KeyInfo::from).collect()
    }

    /// A stable hash over the *shape* of the cache — `(address, key_type)`
    /// pairs in address-sorted order — so it changes iff that multiset
    /// changes (spec §8: "`list` returns a checksum that changes iff the
    /// multiset of `(address, key_type)` pairs changes"), not on every
    /// unrelated field edit.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for record in self.records.values() {
            hasher.update(record.address.as_bytes());
            hasher.update(b"\0");
            hasher.update(record.key_type.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsigner_providers::KeyCategory;
    use time::OffsetDateTime;

    fn record(address: &str, key_type: &str) -> KeyRecord {
        KeyRecord {
            address: address.to_string(),
            key_type: key_type.to_string(),
            category: KeyCategory::Ed25519,
            public_bytes: vec![0; 32],
            private_bytes: None,
            lsig_bytecode: None,
            params: Default::default(),
            runtime_args_schema: Vec::new(),
            teal_source: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn checksum_changes_iff_membership_changes() {
        let mut cache = Cache::new();
        let empty_sum = cache.checksum();
        cache.insert(record("A", "ed25519"));
        let one_sum = cache.checksum();
        assert_ne!(empty_sum, one_sum);
        cache.remove("A");
        assert_eq!(cache.checksum(), empty_sum);
    }

    #[test]
    fn checksum_stable_across_equivalent_rebuilds() {
        let mut a = Cache::new();
        a.insert(record("A", "ed25519"));
        a.insert(record("B", "falcon1024-v1"));
        let mut b = Cache::new();
        b.insert(record("B", "falcon1024-v1"));
        b.insert(record("A", "ed25519"));
        assert_eq!(a.checksum(), b.checksum());
    }
}
