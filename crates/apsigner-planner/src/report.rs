//! `MutationReport` (spec §3): returned with every `/sign` or `/plan`
//! result, summarizing every server-side change to the submitted batch.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeDelta {
    pub index: usize,
    pub old_fee: u64,
    pub new_fee: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationReport {
    pub original_count: usize,
    pub final_count: usize,
    pub dummies_added: usize,
    pub group_id_changed: bool,
    pub fee_deltas: Vec<FeeDelta>,
    pub total_fees_delta: u64,
    pub passthrough_count: usize,
    pub foreign_count: usize,
    pub reason: String,
}

impl MutationReport {
    pub fn reason_string(dummies_added: usize, fee_deltas: usize, group_id_changed: bool) -> String {
        let mut parts = Vec::new();
        if dummies_added > 0 {
            parts.push(format!("{dummies_added} dummy transaction(s) added for LogicSig budget"));
        }
        if fee_deltas > 0 {
            parts.push(format!("{fee_deltas} fee(s) raised to the suggested minimum"));
        }
        if group_id_changed {
            parts.push("group id (re)computed".to_string());
        }
        if parts.is_empty() {
            "no mutations".to_string()
        } else {
            parts.join("; ")
        }
    }
}
