//! Canonical Algorand transaction encoding. Field tags and the general
//! "short lowercase key" shape mirror the real protocol wire format (we
//! model the subset §4.4's planning stages actually touch: payment and
//! generic asset fields, group/rekey/close bookkeeping — not the full
//! transaction-type zoo, which is apshell's concern per spec §1).
//!
//! Struct fields are declared in the *alphabetical order of their wire
//! tags* (`aclose, amt, asnd, close, fee, fv, gen, gh, grp, lv, lx, note,
//! rcv, rekey, snd, type`) so that `rmp_serde::to_vec_named`, which writes
//! a msgpack map in struct-declaration order, already produces Algorand's
//! canonical sorted-key encoding without a second sorting pass.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

pub const MIN_FEE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Txn {
    #[serde(rename = "aclose", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub asset_close_to: Option<Vec<u8>>,

    #[serde(rename = "amt", default, skip_serializing_if = "is_zero")]
    pub amount: u64,

    #[serde(rename = "asnd", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub asset_sender: Option<Vec<u8>>,

    #[serde(rename = "close", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub close_remainder_to: Option<Vec<u8>>,

    #[serde(rename = "fee")]
    pub fee: u64,

    #[serde(rename = "fv")]
    pub first_valid: u64,

    #[serde(rename = "gen", default, skip_serializing_if = "String::is_empty")]
    pub genesis_id: String,

    #[serde(rename = "gh", with = "serde_bytes")]
    pub genesis_hash: Vec<u8>,

    #[serde(rename = "grp", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub group: Option<Vec<u8>>,

    #[serde(rename = "lv")]
    pub last_valid: u64,

    #[serde(rename = "lx", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub lease: Option<Vec<u8>>,

    #[serde(rename = "note", default, skip_serializing_if = "Vec::is_empty", with = "serde_bytes")]
    pub note: Vec<u8>,

    #[serde(rename = "rcv", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub receiver: Option<Vec<u8>>,

    #[serde(rename = "rekey", default, skip_serializing_if = "Option::is_none", with = "opt_bytes")]
    pub rekey_to: Option<Vec<u8>>,

    #[serde(rename = "snd", with = "serde_bytes")]
    pub sender: Vec<u8>,

    #[serde(rename = "type")]
    pub txn_type: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

mod opt_bytes {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serde_bytes::serialize(b, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let bytes: Option<serde_bytes::ByteBuf> = serde_bytes::deserialize(d)?;
        Ok(bytes.map(|b| b.into_vec()))
    }
}

impl Txn {
    /// Canonical msgpack encoding, map form with sorted keys (see module
    /// doc). This is the `canonical_encoding(txn)` spec §4.4 step 6 refers
    /// to, and what [`crate::grouphash`] and the domain-tagging signer both
    /// hash.
    pub fn canonical_encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    /// The transaction id hash: `sha512_256("TX" || canonical_encoding)`,
    /// computed *before* a group id is stamped so it can feed
    /// [`crate::grouphash::compute_group_id`].
    pub fn id_hash(&self) -> Result<[u8; 32], rmp_serde::encode::Error> {
        let tagged = apsigner_crypto::canonical::tag_transaction(&self.canonical_encode()?);
        let digest = Sha512_256::digest(tagged);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Ok(out)
    }
}

/// A signed transaction envelope, as returned by `/sign` (hex-encoded at
/// the transport boundary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTxn {
    #[serde(rename = "sig", default, skip_serializing_if = "Option::is_none", with = "serde_bytes_opt")]
    pub sig: Option<Vec<u8>>,

    #[serde(rename = "lsig", default, skip_serializing_if = "Option::is_none")]
    pub lsig: Option<LogicSig>,

    #[serde(rename = "txn")]
    pub txn: Txn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicSig {
    #[serde(rename = "l", with = "serde_bytes")]
    pub logic: Vec<u8>,
    #[serde(rename = "arg", default)]
    pub args: Vec<serde_bytes::ByteBuf>,
}

mod serde_bytes_opt {
    pub use super::opt_bytes::{deserialize, serialize};
}

impl SignedTxn {
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}
