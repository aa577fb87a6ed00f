//! LogicSig template registry: renders parameterized TEAL templates to
//! deterministic bytecode plus the derived address, and validates both
//! creation-time parameters and signing-time runtime arguments against a
//! per-template schema (spec §4.2).

pub mod registry;
pub mod schema;
pub mod templates;

pub use registry::{Compiled, LsigError, LsigRegistry};
