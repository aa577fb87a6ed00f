//! Business-level events the broker pushes at whichever admin session is
//! currently connected. `apsigner-transport-ipc` owns the actual wire
//! framing (spec §6's frame catalog) and maps these onto it; the broker
//! itself knows nothing about newline-delimited JSON.

use crate::policy::PolicyViolation;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum AdminEvent {
    /// A batch is `AWAITING_DECISION` (spec §6's `SignRequest` frame).
    /// `address`/`txn_sender` summarize the first SIGN entry for display;
    /// the full per-entry detail lives in `description`.
    SignRequest {
        id: Uuid,
        address: Option<String>,
        txn_sender: Option<String>,
        description: String,
        timestamp: time::OffsetDateTime,
        first_valid: Option<u64>,
        last_valid: Option<u64>,
        violations: Vec<PolicyViolation>,
    },
    /// Inactivity auto-lock or lock-on-disconnect fired (spec §4.3).
    SignerLocked,
    /// This session has been replaced by a newer connection (spec §4.3:
    /// "Displacement").
    Displaced { reason: String },
    /// The keystore's key set changed (spec §4.1's change notification,
    /// forwarded so an IPC client can invalidate its own `KeysList` cache).
    KeysChanged,
}
