//! The admin IPC's newline-delimited JSON frame catalog (spec §6). Every
//! frame on the wire is `{"id": ..., "type": ..., ...fields}`; `id` is the
//! envelope correlation id described there ("every frame with a matching id
//! pairs request/response; server-initiated frames carry a fresh id") and
//! is modeled as a wrapper so the tagged payload enums stay undecorated.

use apsigner_broker::PolicyViolation;
use apsigner_keystore::KeyInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerState {
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    AuthRequired,
    AuthResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Status {
        state: SignerState,
        key_count: usize,
    },
    UnlockResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        key_count: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    SignRequest {
        id: Uuid,
        address: Option<String>,
        txn_sender: Option<String>,
        description: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
        first_valid: Option<u64>,
        last_valid: Option<u64>,
        violations: Vec<PolicyViolation>,
    },
    /// Never emitted by this daemon today (spec's Open Question: token
    /// issuance is file-based, not an interactive round trip) — accepted on
    /// the wire for forward compatibility only.
    TokenProvisioningRequest {
        id: Uuid,
        identity: String,
    },
    KeysList {
        keys: Vec<KeyInfo>,
    },
    KeysChanged,
    SignerLocked,
    GenerateResult {
        address: String,
        key_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mnemonic: Option<String>,
    },
    DeleteResult {
        success: bool,
    },
    ExportResult {
        address: String,
        mnemonic: String,
    },
    ImportResult {
        address: String,
    },
    KeyDetails {
        key: Option<KeyInfo>,
    },
    ClientExists,
    Displaced {
        reason: String,
    },
    Error {
        error: String,
    },
}

/// `SignResponse`/`TokenProvisioningResponse` carry their own `id` (the
/// request being answered), colliding on the wire with the generic
/// envelope `id` every other frame relies on for correlation — a
/// `#[serde(flatten)]` struct can't deserialize that, since the named
/// field would consume the key before the tagged enum ever saw it. Kept as
/// a plain struct and assembled by `conn::read_frame` from one parsed
/// `serde_json::Value` instead.
#[derive(Debug, Clone)]
pub struct ClientMessage {
    pub id: Option<Uuid>,
    pub frame: ClientFrame,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    Auth { passphrase: String },
    Unlock { passphrase: String },
    SignResponse {
        id: Uuid,
        approved: bool,
        #[serde(default)]
        reason: Option<String>,
    },
    TokenProvisioningResponse {
        id: Uuid,
        approved: bool,
        #[serde(default)]
        reason: Option<String>,
    },
    ListKeys,
    GenerateKey {
        key_type: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
    DeleteKey {
        address: String,
    },
    ExportKey {
        address: String,
        passphrase: String,
    },
    ImportKey {
        key_type: String,
        mnemonic: String,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
    GetKeyDetails {
        address: String,
    },
    DisplaceConfirm,
}
