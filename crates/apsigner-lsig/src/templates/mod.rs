pub mod falcon_dsa;
pub mod hashlock;

use crate::schema::{ParamSpec, ParamValue};
use apsigner_providers::KeyCategory;
use std::collections::BTreeMap;

/// One registered LogicSig template family. Implementors render their TEAL
/// source with resolved creation params substituted in and turn the result
/// into the program bytes that get hashed into an address (spec §4.2).
pub trait Template: Send + Sync {
    fn key_type(&self) -> &'static str;
    fn category(&self) -> KeyCategory;
    fn creation_params(&self) -> &[ParamSpec];
    fn runtime_args_schema(&self) -> &[ParamSpec];
    fn teal_source(&self, params: &BTreeMap<String, ParamValue>, public_key: Option<&[u8]>)
        -> String;

    /// Assemble the rendered TEAL source into deterministic bytecode. This
    /// is not a general TEAL assembler (out of scope, spec §1's "Algorand
    /// SDK primitives ... assumed available"): each template owns exactly
    /// one fixed program shape, so "assembly" here is a deterministic,
    /// template-specific byte encoding of the resolved parameters rather
    /// than compiling arbitrary TEAL text. It is still byte-stable across
    /// repeated compiles of the same template+params, which is the
    /// property spec §4.2 actually requires ("two compiles ... must yield
    /// byte-identical output").
    fn assemble(
        &self,
        params: &BTreeMap<String, ParamValue>,
        public_key: Option<&[u8]>,
    ) -> Vec<u8>;
}
