use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Type tag for a creation parameter or a runtime argument (spec §3/§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Address,
    Uint64,
    Bytes,
}

/// Describes one creation parameter baked into a LogicSig's address, or one
/// positional runtime argument supplied at signing time. Both share a shape
/// (spec §3's `runtime_args_schema` is literally `(name, type, required,
/// byte_length)`; creation params are the same shape plus they're consumed
/// at `compile` time instead of `sign` time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    /// For `Bytes`, the exact expected length after hex-decoding; `None`
    /// means any length is accepted.
    pub byte_length: Option<usize>,
}

impl ParamSpec {
    pub fn new(name: &str, ty: ParamType, required: bool, byte_length: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required,
            byte_length,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required parameter '{0}'")]
    MissingRequired(String),
    #[error("unknown parameter '{0}'")]
    UnknownParam(String),
    #[error("parameter '{0}' is not valid hex")]
    InvalidHex(String),
    #[error("parameter '{name}' expected {expected} bytes, got {got}")]
    WrongLength {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("parameter '{0}' is not a valid u64")]
    InvalidUint64(String),
    #[error("parameter '{0}' is not a valid Algorand address")]
    InvalidAddress(String),
}

/// A resolved value for one parameter, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Address(String),
    Uint64(u64),
    Bytes(Vec<u8>),
}

impl ParamValue {
    pub fn as_bytes_for_bytecode(&self) -> Vec<u8> {
        match self {
            ParamValue::Address(s) => s.as_bytes().to_vec(),
            ParamValue::Uint64(n) => n.to_be_bytes().to_vec(),
            ParamValue::Bytes(b) => b.clone(),
        }
    }
}

/// Validate a raw string-keyed parameter map (as received over the wire)
/// against a schema, rejecting unknown names and missing required fields
/// before any signing or compilation is attempted (spec §4.2).
pub fn validate_params(
    schema: &[ParamSpec],
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, ParamValue>, SchemaError> {
    let known: std::collections::HashSet<&str> = schema.iter().map(|p| p.name.as_str()).collect();
    for key in raw.keys() {
        if !known.contains(key.as_str()) {
            return Err(SchemaError::UnknownParam(key.clone()));
        }
    }
    let mut out = BTreeMap::new();
    for spec in schema {
        let raw_value = match raw.get(&spec.name) {
            Some(v) => v,
            None => {
                if spec.required {
                    return Err(SchemaError::MissingRequired(spec.name.clone()));
                }
                continue;
            }
        };
        let value = match spec.ty {
            ParamType::Address => {
                if !is_plausible_address(raw_value) {
                    return Err(SchemaError::InvalidAddress(spec.name.clone()));
                }
                ParamValue::Address(raw_value.clone())
            }
            ParamType::Uint64 => {
                let n: u64 = raw_value
                    .parse()
                    .map_err(|_| SchemaError::InvalidUint64(spec.name.clone()))?;
                ParamValue::Uint64(n)
            }
            ParamType::Bytes => {
                let bytes = hex::decode(raw_value)
                    .map_err(|_| SchemaError::InvalidHex(spec.name.clone()))?;
                if let Some(expected) = spec.byte_length {
                    if bytes.len() != expected {
                        return Err(SchemaError::WrongLength {
                            name: spec.name.clone(),
                            expected,
                            got: bytes.len(),
                        });
                    }
                }
                ParamValue::Bytes(bytes)
            }
        };
        out.insert(spec.name.clone(), value);
    }
    Ok(out)
}

fn is_plausible_address(s: &str) -> bool {
    s.len() == 58 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("recipient", ParamType::Address, true, None),
            ParamSpec::new("unlock_round", ParamType::Uint64, true, None),
            ParamSpec::new(
                "hash_commitment",
                ParamType::Bytes,
                true,
                Some(32),
            ),
        ]
    }

    #[test]
    fn rejects_unknown_param() {
        let mut raw = BTreeMap::new();
        raw.insert("bogus".to_string(), "x".to_string());
        assert_eq!(
            validate_params(&schema(), &raw),
            Err(SchemaError::UnknownParam("bogus".to_string()))
        );
    }

    #[test]
    fn rejects_missing_required() {
        let raw = BTreeMap::new();
        assert!(matches!(
            validate_params(&schema(), &raw),
            Err(SchemaError::MissingRequired(_))
        ));
    }

    #[test]
    fn rejects_wrong_byte_length() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "recipient".to_string(),
            "A".repeat(58),
        );
        raw.insert("unlock_round".to_string(), "100".to_string());
        raw.insert("hash_commitment".to_string(), hex::encode([0u8; 16]));
        assert!(matches!(
            validate_params(&schema(), &raw),
            Err(SchemaError::WrongLength { .. })
        ));
    }

    #[test]
    fn accepts_valid_params() {
        let mut raw = BTreeMap::new();
        raw.insert("recipient".to_string(), "A".repeat(58));
        raw.insert("unlock_round".to_string(), "100".to_string());
        raw.insert("hash_commitment".to_string(), hex::encode([0u8; 32]));
        let resolved = validate_params(&schema(), &raw).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved["unlock_round"], ParamValue::Uint64(100));
    }
}
