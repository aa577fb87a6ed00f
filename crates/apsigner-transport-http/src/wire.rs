//! JSON wire shapes for the HTTP API (spec §6). Transactions cross the wire
//! as hex strings, the same convention the teacher's
//! `wallet_remote_signer` example uses for its request/response bodies.

use apsigner_lsig::schema::ParamSpec;
use apsigner_planner::MutationReport;
use apsigner_providers::KeyCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One batch entry as submitted to `/sign` or `/plan`. Exactly one of
/// `signed_txn_hex`, `auth_address`, or neither is populated to select
/// PASSTHROUGH, SIGN, or FOREIGN (spec §4.4) — there's no serde tag, since
/// that's how the wire format documents it.
#[derive(Debug, Clone, Deserialize)]
pub struct SignEntryWire {
    pub txn_bytes_hex: Option<String>,
    pub signed_txn_hex: Option<String>,
    pub auth_address: Option<String>,
    #[serde(default)]
    pub lsig_args: BTreeMap<String, String>,
    pub lsig_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<SignEntryWire>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub transactions: Vec<String>,
    pub mutations: MutationReport,
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<apsigner_keystore::KeyInfo>,
}

#[derive(Debug, Serialize)]
pub struct KeyTypeInfo {
    pub key_type: String,
    pub category: KeyCategory,
    pub creation_params: Vec<ParamSpec>,
    pub runtime_args_schema: Vec<ParamSpec>,
}

#[derive(Debug, Serialize)]
pub struct KeyTypesResponse {
    pub key_types: Vec<KeyTypeInfo>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub key_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub address: String,
    pub key_type: String,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub address: String,
}
