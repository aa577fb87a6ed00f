use super::Template;
use crate::schema::{ParamSpec, ParamType, ParamValue};
use apsigner_providers::KeyCategory;
use std::collections::BTreeMap;

/// One DSA LogicSig family: TEAL that verifies a Falcon-1024 signature over
/// the transaction's message hash, pushed onto the stack at signing time by
/// `apsigner-planner` as `lsig.args = [signature, ...schema-ordered runtime
/// args]` (spec §4.4 step 6). The compiled bytecode embeds the public key,
/// so unlike [`super::hashlock::HashlockV3`] this family *does* have private
/// key material (the Falcon secret key) living in the keystore.
pub struct FalconDsa {
    key_type: &'static str,
    /// Extra runtime args beyond the mandatory signature, e.g. a timelock
    /// variant might also require an unused placeholder arg for symmetry
    /// with its sibling templates. Empty for the plain `falcon1024-v1`.
    runtime_args_schema: Vec<ParamSpec>,
    /// Creation params baked into the address besides the embedded public
    /// key, e.g. an unlock round for the timelock variant.
    creation_params: Vec<ParamSpec>,
}

impl FalconDsa {
    pub fn plain() -> Self {
        Self {
            key_type: "falcon1024-v1",
            runtime_args_schema: Vec::new(),
            creation_params: Vec::new(),
        }
    }

    pub fn timelock() -> Self {
        Self {
            key_type: "falcon1024-timelock-v1",
            runtime_args_schema: Vec::new(),
            creation_params: vec![ParamSpec::new("unlock_round", ParamType::Uint64, true, None)],
        }
    }
}

const TEAL_TEMPLATE: &str = r#"#pragma version 8
// {{key_type}}: verify a Falcon-1024 signature over TxnGroup's message hash
// against the embedded public key {{public_key}}
txn TxID
arg 0
byte {{public_key}}
falcon1024_verify
assert
{{extra_checks}}
"#;

impl Template for FalconDsa {
    fn key_type(&self) -> &'static str {
        self.key_type
    }

    fn category(&self) -> KeyCategory {
        KeyCategory::DsaLsig
    }

    fn creation_params(&self) -> &[ParamSpec] {
        &self.creation_params
    }

    fn runtime_args_schema(&self) -> &[ParamSpec] {
        &self.runtime_args_schema
    }

    fn teal_source(&self, params: &BTreeMap<String, ParamValue>, public_key: Option<&[u8]>) -> String {
        let public_key = public_key.expect("DSA LogicSig compile always supplies a public key");
        let extra_checks = match params.get("unlock_round") {
            Some(ParamValue::Uint64(round)) => {
                format!("txn FirstValid\nint {round}\n>=\nassert\n")
            }
            _ => String::new(),
        };
        TEAL_TEMPLATE
            .replace("{{key_type}}", self.key_type)
            .replace("{{public_key}}", &hex::encode(public_key))
            .replace("{{extra_checks}}", &extra_checks)
    }

    /// Deterministic encoding: a family tag, the embedded public key, then
    /// any creation params in schema order. Address stability (spec §4.2:
    /// "two compiles of the same template+params must yield byte-identical
    /// output") follows directly from the public key and params being the
    /// only inputs.
    fn assemble(&self, params: &BTreeMap<String, ParamValue>, public_key: Option<&[u8]>) -> Vec<u8> {
        let public_key = public_key.expect("DSA LogicSig compile always supplies a public key");
        let mut out = Vec::new();
        out.extend_from_slice(b"FLC1");
        out.extend_from_slice(public_key);
        for spec in &self.creation_params {
            if let Some(value) = params.get(&spec.name) {
                out.extend_from_slice(&value.as_bytes_for_bytecode());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_timelock_diverge_for_same_key() {
        let pk = [9u8; 1793];
        let plain = FalconDsa::plain();
        let timelock = FalconDsa::timelock();
        let empty = BTreeMap::new();
        let mut tl_params = BTreeMap::new();
        tl_params.insert("unlock_round".to_string(), ParamValue::Uint64(100));
        let plain_bytecode = plain.assemble(&empty, Some(&pk));
        let timelock_bytecode = timelock.assemble(&tl_params, Some(&pk));
        assert_ne!(plain_bytecode, timelock_bytecode);
    }

    #[test]
    fn assemble_is_deterministic() {
        let pk = [3u8; 1793];
        let tmpl = FalconDsa::plain();
        let empty = BTreeMap::new();
        assert_eq!(
            tmpl.assemble(&empty, Some(&pk)),
            tmpl.assemble(&empty, Some(&pk))
        );
    }
}
