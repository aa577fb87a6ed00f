//! The wire/disk shape of a key record and its keystore-wide metadata (spec
//! §3). Kept free of any decrypted secret bytes except inside
//! [`KeyRecord::private_bytes`], which the cache zeroizes on drop.

use apsigner_lsig::schema::{ParamSpec, ParamType};
use apsigner_providers::KeyCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use zeroize::Zeroize;

/// One persisted key, keyed by `address` (spec §3's `KeyRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub address: String,
    pub key_type: String,
    pub category: KeyCategory,
    #[serde(with = "hex_bytes")]
    pub public_bytes: Vec<u8>,
    /// Absent for `generic_lsig` (spec §3 invariant: "no private material").
    #[serde(default, with = "hex_bytes_opt")]
    pub private_bytes: Option<Vec<u8>>,
    /// Present for `dsa_lsig` and `generic_lsig`.
    #[serde(default, with = "hex_bytes_opt")]
    pub lsig_bytecode: Option<Vec<u8>>,
    /// Creation parameters baked into the address, in insertion order.
    pub params: BTreeMap<String, String>,
    pub runtime_args_schema: Vec<RuntimeArgSpec>,
    pub teal_source: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        if let Some(private) = self.private_bytes.as_mut() {
            private.zeroize();
        }
    }
}

/// Wire-stable encoding of one runtime-argument schema entry (spec §3:
/// `(name, type, required, byte_length)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeArgSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub byte_length: Option<usize>,
}

impl From<&ParamSpec> for RuntimeArgSpec {
    fn from(spec: &ParamSpec) -> Self {
        Self {
            name: spec.name.clone(),
            ty: spec.ty,
            required: spec.required,
            byte_length: spec.byte_length,
        }
    }
}

/// Public view of a key, as returned by `list()` / `GET /keys` (no private
/// material ever appears here, regardless of category).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyInfo {
    pub address: String,
    pub key_type: String,
    pub category: KeyCategory,
    pub lsig_size: Option<usize>,
    pub generic: bool,
    pub runtime_args: Vec<String>,
}

impl From<&KeyRecord> for KeyInfo {
    fn from(record: &KeyRecord) -> Self {
        Self {
            address: record.address.clone(),
            key_type: record.key_type.clone(),
            category: record.category,
            lsig_size: record.lsig_bytecode.as_ref().map(Vec::len),
            generic: record.category == KeyCategory::GenericLsig,
            runtime_args: record
                .runtime_args_schema
                .iter()
                .map(|s| s.name.clone())
                .collect(),
        }
    }
}

/// Immutable-after-creation keystore-wide metadata (spec §3's
/// `KeystoreMetadata`), one per identity scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreMetadata {
    pub format_version: u32,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    /// Ciphertext of a fixed magic string under the master key, used to
    /// verify a passphrase without ever decrypting a real key file (spec
    /// §4.1's "constant-time compare against verification ciphertext").
    #[serde(with = "hex_bytes")]
    pub verification_ciphertext: Vec<u8>,
}

pub const CURRENT_FORMAT_VERSION: u32 = 1;
pub const VERIFICATION_PLAINTEXT: &[u8] = b"apsigner-keystore-verify-v1";

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&hex::encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt: Option<String> = Option::deserialize(d)?;
        opt.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
