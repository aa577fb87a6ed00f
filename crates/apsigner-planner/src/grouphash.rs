//! Group-id computation (spec §4.4 step 4): `sha512_256("TG" ||
//! canonical_encoding({txlist: [txn_id_hash, ...]}))`, stamped onto every
//! member transaction (including dummies) before signing.

use crate::error::{PlannerError, Result};
use crate::txn::Txn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

#[derive(Serialize, Deserialize)]
struct TxGroup {
    #[serde(rename = "txlist")]
    txlist: Vec<serde_bytes::ByteBuf>,
}

/// Compute the group id over `txns` in order, then stamp it onto each
/// transaction's `group` field. `txns` must not already carry a group id —
/// callers check `allow_group_modification` before calling this (spec §4.4
/// step 4: "If any entry already had a group id and modification is
/// disallowed, reject").
pub fn stamp_group_id(txns: &mut [Txn]) -> Result<[u8; 32]> {
    if txns.len() < 2 {
        return Err(PlannerError::GroupTooSmall(txns.len()));
    }
    let txlist = txns
        .iter()
        .map(|t| t.id_hash().map(|h| serde_bytes::ByteBuf::from(h.to_vec())))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PlannerError::Encoding(e.to_string()))?;
    let group = TxGroup { txlist };
    let encoded = rmp_serde::to_vec_named(&group).map_err(|e| PlannerError::Encoding(e.to_string()))?;
    let tagged = apsigner_crypto::canonical::tag_group(&encoded);
    let digest = Sha512_256::digest(tagged);
    let mut group_id = [0u8; 32];
    group_id.copy_from_slice(&digest);
    for txn in txns.iter_mut() {
        txn.group = Some(group_id.to_vec());
    }
    Ok(group_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(sender: u8) -> Txn {
        Txn {
            asset_close_to: None,
            amount: 0,
            asset_sender: None,
            close_remainder_to: None,
            fee: 1000,
            first_valid: 1,
            genesis_id: String::new(),
            genesis_hash: vec![0u8; 32],
            group: None,
            last_valid: 1000,
            lease: None,
            note: Vec::new(),
            receiver: Some(vec![sender; 32]),
            rekey_to: None,
            sender: vec![sender; 32],
            txn_type: "pay".to_string(),
        }
    }

    #[test]
    fn stamps_same_group_id_on_every_member() {
        let mut txns = vec![txn(1), txn(2), txn(3)];
        let group_id = stamp_group_id(&mut txns).unwrap();
        for t in &txns {
            assert_eq!(t.group.as_deref(), Some(group_id.as_slice()));
        }
    }

    #[test]
    fn group_id_depends_on_membership_and_order() {
        let mut a = vec![txn(1), txn(2)];
        let mut b = vec![txn(2), txn(1)];
        let ga = stamp_group_id(&mut a).unwrap();
        let gb = stamp_group_id(&mut b).unwrap();
        assert_ne!(ga, gb);
    }

    #[test]
    fn single_entry_is_not_a_group() {
        let mut txns = vec![txn(1)];
        assert!(stamp_group_id(&mut txns).is_err());
    }
}
