//! The shape of one batch entry as the broker sees it (spec §4.3, §4.3.b):
//! enough decoded transaction fields to lint and warn on, without the
//! broker needing to depend on `apsigner-planner`'s msgpack decode. The
//! transport layer, which already decodes the batch for the planner,
//! builds these alongside.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    Sign,
    Passthrough,
    Foreign,
}

#[derive(Debug, Clone, Default)]
pub struct EntrySummary {
    pub role: Option<EntryRole>,
    pub sender: Option<String>,
    pub auth_address: Option<String>,
    pub rekey_to: Option<String>,
    pub close_remainder_to: Option<String>,
    pub asset_close_to: Option<String>,
    pub asset_sender: Option<String>,
    pub fee: u64,
    /// Carried through to the admin IPC's `SignRequest` frame (spec §6); not
    /// used by any broker logic itself.
    pub first_valid: Option<u64>,
    pub last_valid: Option<u64>,
}

impl EntrySummary {
    pub fn new(role: EntryRole) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }
}

/// Why a request left `AWAITING_DECISION` without a signature (spec §4.3's
/// `RESOLVED{approve|reject|timeout|displaced}`, minus the approve case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    RejectedByUser,
    SignerLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Approved,
    Rejected(RejectReason),
}
