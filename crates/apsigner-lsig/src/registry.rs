use crate::schema::{validate_params, ParamSpec, ParamValue, SchemaError};
use crate::templates::falcon_dsa::FalconDsa;
use crate::templates::hashlock::HashlockV3;
use crate::templates::Template;
use apsigner_crypto::address::{encode_address, program_hash};
use apsigner_providers::KeyCategory;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LsigError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown LogicSig template '{0}'")]
    UnknownTemplate(String),
    #[error("template '{0}' requires an embedded public key")]
    MissingPublicKey(String),
}

pub type Result<T> = std::result::Result<T, LsigError>;

/// Outcome of a successful [`LsigRegistry::compile`]: the assembled bytecode
/// and its derived address, ready to be persisted as a `KeyRecord` (spec
/// §3's `lsig_bytecode`/`address` fields).
pub struct Compiled {
    pub bytecode: Vec<u8>,
    pub address: String,
    pub teal_source: String,
}

/// The LogicSig template registry (spec §4.2): maps a `key_type` string to
/// its [`Template`] implementation, and exposes schema validation ahead of
/// both `compile` (creation time) and signing (runtime args).
pub struct LsigRegistry {
    templates: Vec<Box<dyn Template>>,
    by_key_type: HashMap<String, usize>,
}

impl Default for LsigRegistry {
    fn default() -> Self {
        let mut registry = Self {
            templates: Vec::new(),
            by_key_type: HashMap::new(),
        };
        registry.register(Box::new(HashlockV3::default()));
        registry.register(Box::new(FalconDsa::plain()));
        registry.register(Box::new(FalconDsa::timelock()));
        registry
    }
}

impl LsigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: Box<dyn Template>) {
        let idx = self.templates.len();
        self.by_key_type.insert(template.key_type().to_string(), idx);
        self.templates.push(template);
    }

    fn get(&self, key_type: &str) -> Result<&dyn Template> {
        self.by_key_type
            .get(key_type)
            .map(|&idx| self.templates[idx].as_ref())
            .ok_or_else(|| LsigError::UnknownTemplate(key_type.to_string()))
    }

    pub fn creation_params(&self, key_type: &str) -> Result<&[ParamSpec]> {
        Ok(self.get(key_type)?.creation_params())
    }

    pub fn runtime_args_schema(&self, key_type: &str) -> Result<&[ParamSpec]> {
        Ok(self.get(key_type)?.runtime_args_schema())
    }

    pub fn category(&self, key_type: &str) -> Result<KeyCategory> {
        Ok(self.get(key_type)?.category())
    }

    /// Every registered template's `key_type` string, for `GET /keytypes`
    /// (spec §6). Ed25519 isn't a template and isn't included here —
    /// callers that need the full key-type catalog prepend it themselves.
    pub fn key_types(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.key_type())
    }

    /// Validate a raw runtime-args map against `key_type`'s schema and
    /// return the values in schema order, ready to append to `lsig.args`
    /// after the signature (spec §9: "positional args are the on-wire
    /// reality ... the broker must validate against the schema ... but emit
    /// signatures in schema order on the wire").
    pub fn validate_and_order_runtime_args(
        &self,
        key_type: &str,
        raw: &BTreeMap<String, String>,
    ) -> Result<Vec<Vec<u8>>> {
        let schema = self.runtime_args_schema(key_type)?;
        let resolved = validate_params(schema, raw)?;
        Ok(schema
            .iter()
            .filter_map(|spec| resolved.get(&spec.name))
            .map(ParamValue::as_bytes_for_bytecode)
            .collect())
    }

    /// Render and assemble a template's bytecode for a resolved (already
    /// validated) creation-parameter map, deriving its address. `public_key`
    /// is required for DSA families and ignored for generic ones.
    pub fn compile(
        &self,
        key_type: &str,
        raw_params: &BTreeMap<String, String>,
        public_key: Option<&[u8]>,
    ) -> Result<Compiled> {
        let template = self.get(key_type)?;
        if template.category() == KeyCategory::DsaLsig && public_key.is_none() {
            return Err(LsigError::MissingPublicKey(key_type.to_string()));
        }
        let resolved = validate_params(template.creation_params(), raw_params)?;
        let bytecode = template.assemble(&resolved, public_key);
        let address = encode_address(&program_hash(&bytecode));
        let teal_source = template.teal_source(&resolved, public_key);
        Ok(Compiled {
            bytecode,
            address,
            teal_source,
        })
    }
}
