use super::Template;
use crate::schema::{ParamSpec, ParamType, ParamValue};
use apsigner_providers::KeyCategory;
use std::collections::BTreeMap;

/// `hashlock-v3`: a generic LogicSig that releases funds to `recipient` only
/// to whoever can produce a 32-byte preimage of `hash_commitment`, and only
/// at or after `unlock_round`. No private key material exists for this
/// category (spec §3: "the latter absent for `generic_lsig`") — the TEAL
/// script itself *is* the authorization.
pub struct HashlockV3 {
    creation_params: Vec<ParamSpec>,
    runtime_args_schema: Vec<ParamSpec>,
}

impl Default for HashlockV3 {
    fn default() -> Self {
        Self {
            creation_params: vec![
                ParamSpec::new("recipient", ParamType::Address, true, None),
                ParamSpec::new("unlock_round", ParamType::Uint64, true, None),
                ParamSpec::new("hash_commitment", ParamType::Bytes, true, Some(32)),
            ],
            runtime_args_schema: vec![ParamSpec::new("preimage", ParamType::Bytes, true, None)],
        }
    }
}

const TEAL_TEMPLATE: &str = r#"#pragma version 8
// hashlock-v3: pay to {{recipient}} after round {{unlock_round}} given a
// preimage of {{hash_commitment}}
txn Fee
int 1000000
<=
assert
arg 0
sha256
byte {{hash_commitment}}
==
txn Receiver
addr {{recipient}}
==
&&
txn FirstValid
int {{unlock_round}}
>=
&&
"#;

impl Template for HashlockV3 {
    fn key_type(&self) -> &'static str {
        "hashlock-v3"
    }

    fn category(&self) -> KeyCategory {
        KeyCategory::GenericLsig
    }

    fn creation_params(&self) -> &[ParamSpec] {
        &self.creation_params
    }

    fn runtime_args_schema(&self) -> &[ParamSpec] {
        &self.runtime_args_schema
    }

    fn teal_source(&self, params: &BTreeMap<String, ParamValue>, _public_key: Option<&[u8]>) -> String {
        let recipient = match &params["recipient"] {
            ParamValue::Address(s) => s.clone(),
            _ => unreachable!("schema guarantees recipient is an address"),
        };
        let unlock_round = match &params["unlock_round"] {
            ParamValue::Uint64(n) => *n,
            _ => unreachable!("schema guarantees unlock_round is a uint64"),
        };
        let hash_commitment = match &params["hash_commitment"] {
            ParamValue::Bytes(b) => hex::encode(b),
            _ => unreachable!("schema guarantees hash_commitment is bytes"),
        };
        TEAL_TEMPLATE
            .replace("{{recipient}}", &recipient)
            .replace("{{unlock_round}}", &unlock_round.to_string())
            .replace("{{hash_commitment}}", &hash_commitment)
    }

    /// Deterministic byte encoding of the resolved params, standing in for
    /// TEAL assembly (see [`Template::assemble`]'s doc comment for why this
    /// crate does not vendor a general-purpose assembler). Two compiles of
    /// the same params always lay the same bytes out in the same order
    /// because `params` is a `BTreeMap` and this function reads three fixed
    /// keys rather than iterating it.
    fn assemble(&self, params: &BTreeMap<String, ParamValue>, _public_key: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"HLK3");
        out.extend_from_slice(&params["recipient"].as_bytes_for_bytecode());
        out.extend_from_slice(&params["unlock_round"].as_bytes_for_bytecode());
        out.extend_from_slice(&params["hash_commitment"].as_bytes_for_bytecode());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_params;

    fn raw_params() -> BTreeMap<String, String> {
        let mut raw = BTreeMap::new();
        raw.insert("recipient".to_string(), "A".repeat(58));
        raw.insert("unlock_round".to_string(), "5000".to_string());
        raw.insert("hash_commitment".to_string(), hex::encode([7u8; 32]));
        raw
    }

    #[test]
    fn assemble_is_deterministic() {
        let tmpl = HashlockV3::default();
        let raw = raw_params();
        let resolved = validate_params(tmpl.creation_params(), &raw).unwrap();
        let a = tmpl.assemble(&resolved, None);
        let b = tmpl.assemble(&resolved, None);
        assert_eq!(a, b);
    }

    #[test]
    fn teal_source_contains_resolved_values() {
        let tmpl = HashlockV3::default();
        let raw = raw_params();
        let resolved = validate_params(tmpl.creation_params(), &raw).unwrap();
        let source = tmpl.teal_source(&resolved, None);
        assert!(source.contains("5000"));
        assert!(!source.contains("{{"));
    }
}
