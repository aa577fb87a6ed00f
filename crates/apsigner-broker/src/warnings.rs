//! Soft warning generation (spec §4.3.b): inspects each transaction and
//! emits a `PolicyViolation` list for the operator's approval prompt.
//! Never rejects by itself.

use crate::policy::{PolicyViolation, Severity};
use crate::request::EntrySummary;

/// One whole Algorand, in microAlgos — the threshold above which a fee is
/// worth flagging to a human (spec §4.3.b: "`fee > 1 ALGO` -> warning").
pub const ONE_ALGO_MICROALGOS: u64 = 1_000_000;

pub fn generate_warnings(batch: &[EntrySummary]) -> Vec<PolicyViolation> {
    let mut out = Vec::new();
    for entry in batch {
        if let Some(rekey_to) = &entry.rekey_to {
            out.push(PolicyViolation {
                field: "RekeyTo".to_string(),
                value: rekey_to.clone(),
                severity: Severity::Critical,
                message: "permanently transfer signing authority".to_string(),
            });
        }
        if let Some(close_to) = &entry.close_remainder_to {
            out.push(PolicyViolation {
                field: "CloseRemainderTo".to_string(),
                value: close_to.clone(),
                severity: Severity::Critical,
                message: "close account, send all ALGO".to_string(),
            });
        }
        if let Some(asset_close_to) = &entry.asset_close_to {
            out.push(PolicyViolation {
                field: "AssetCloseTo".to_string(),
                value: asset_close_to.clone(),
                severity: Severity::Warning,
                message: "close out an asset holding".to_string(),
            });
        }
        if let Some(asset_sender) = &entry.asset_sender {
            if entry.sender.as_deref() != Some(asset_sender.as_str()) {
                out.push(PolicyViolation {
                    field: "AssetSender".to_string(),
                    value: asset_sender.clone(),
                    severity: Severity::Warning,
                    message: "asset clawback from another account".to_string(),
                });
            }
        }
        if entry.fee > ONE_ALGO_MICROALGOS {
            out.push(PolicyViolation {
                field: "Fee".to_string(),
                value: entry.fee.to_string(),
                severity: Severity::Warning,
                message: "fee exceeds 1 ALGO".to_string(),
            });
        }
    }
    out
}
