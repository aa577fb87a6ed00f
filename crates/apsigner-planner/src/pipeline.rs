//! Group signing pipeline (spec §4.4): decode, plan LogicSig budget dummies,
//! pool fees, compute the group id, validate runtime arguments, and either
//! return the planned (unsigned) batch or sign it. `/plan` and `/sign`
//! share every stage except the last.

use crate::budget::dummies_for_lsig_size;
use crate::entries::{Entry, KeyLookup};
use crate::error::{PlannerError, Result};
use crate::fees::bump_to_min_fee;
use crate::grouphash::stamp_group_id;
use crate::report::{FeeDelta, MutationReport};
use crate::txn::{LogicSig, SignedTxn, Txn, MIN_FEE};
use apsigner_lsig::LsigRegistry;
use apsigner_providers::{KeyCategory, ProviderRegistry};
use std::collections::BTreeMap;

enum Decoded {
    Sign {
        txn: Txn,
        key_type: String,
        category: KeyCategory,
        lsig_bytecode: Option<Vec<u8>>,
        private_bytes: Option<Vec<u8>>,
        lsig_args: BTreeMap<String, String>,
        ordered_lsig_args: Vec<Vec<u8>>,
    },
    Passthrough {
        bytes: Vec<u8>,
    },
    Foreign {
        txn: Txn,
        lsig_size_hint: Option<usize>,
    },
    Dummy {
        txn: Txn,
        key_type: String,
        private_bytes: Vec<u8>,
    },
}

/// Orchestrates one `/plan` or `/sign` request over a fixed key lookup and
/// provider/template registries (spec §4.4). Cheap to construct per request
/// — the registries it borrows are shared, long-lived tables.
pub struct Pipeline<'a> {
    pub lookup: &'a dyn KeyLookup,
    pub providers: &'a ProviderRegistry,
    pub lsig: &'a LsigRegistry,
}

impl<'a> Pipeline<'a> {
    pub fn new(lookup: &'a dyn KeyLookup, providers: &'a ProviderRegistry, lsig: &'a LsigRegistry) -> Self {
        Self { lookup, providers, lsig }
    }

    /// Dry-run planning: every stage except signing (spec §6 `POST /plan`).
    /// Returns each entry's final (still unsigned, for SIGN/FOREIGN/dummy
    /// entries) canonical bytes in submission order, dummies appended last.
    pub fn plan(&self, entries: Vec<Entry>, allow_group_modification: bool) -> Result<(Vec<Vec<u8>>, MutationReport)> {
        let (decoded, mutations) = self.build(entries, allow_group_modification)?;
        let mut out = Vec::with_capacity(decoded.len());
        for d in &decoded {
            let bytes = match d {
                Decoded::Sign { txn, .. } | Decoded::Foreign { txn, .. } | Decoded::Dummy { txn, .. } => {
                    txn.canonical_encode().map_err(|e| PlannerError::Encoding(e.to_string()))?
                }
                Decoded::Passthrough { bytes } => bytes.clone(),
            };
            out.push(bytes);
        }
        Ok((out, mutations))
    }

    /// Full signing: every stage, producing wire bytes for `POST /sign`.
    /// SIGN and dummy entries carry a signature or LogicSig; FOREIGN entries
    /// are returned unsigned (we never hold their key); PASSTHROUGH entries
    /// pass through untouched.
    pub fn sign(&self, entries: Vec<Entry>, allow_group_modification: bool) -> Result<(Vec<Vec<u8>>, MutationReport)> {
        let (decoded, mutations) = self.build(entries, allow_group_modification)?;
        let mut out = Vec::with_capacity(decoded.len());
        for d in decoded {
            let bytes = match d {
                Decoded::Sign {
                    txn,
                    key_type,
                    category,
                    lsig_bytecode,
                    private_bytes,
                    ordered_lsig_args,
                } => self.encode_signed(txn, category, &key_type, lsig_bytecode, private_bytes, ordered_lsig_args)?,
                Decoded::Dummy { txn, key_type, private_bytes } => {
                    self.encode_signed(txn, KeyCategory::Ed25519, &key_type, None, Some(private_bytes), Vec::new())?
                }
                Decoded::Foreign { txn, .. } => txn.canonical_encode().map_err(|e| PlannerError::Encoding(e.to_string()))?,
                Decoded::Passthrough { bytes } => bytes,
            };
            out.push(bytes);
        }
        Ok((out, mutations))
    }

    fn encode_signed(
        &self,
        txn: Txn,
        category: KeyCategory,
        key_type: &str,
        lsig_bytecode: Option<Vec<u8>>,
        private_bytes: Option<Vec<u8>>,
        ordered_args: Vec<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let signed = match category {
            KeyCategory::Ed25519 => {
                let private_bytes = private_bytes.ok_or_else(|| PlannerError::UnknownSigningAddress(key_type.to_string()))?;
                let canonical = txn.canonical_encode().map_err(|e| PlannerError::Encoding(e.to_string()))?;
                let msg = apsigner_crypto::canonical::tag_transaction(&canonical);
                let sig = self.providers.sign(key_type, &private_bytes, &msg)?;
                SignedTxn { sig: Some(sig), lsig: None, txn }
            }
            KeyCategory::DsaLsig => {
                let private_bytes = private_bytes.ok_or_else(|| PlannerError::UnknownSigningAddress(key_type.to_string()))?;
                let bytecode = lsig_bytecode.ok_or_else(|| PlannerError::UnknownSigningAddress(key_type.to_string()))?;
                let id_hash = txn.id_hash().map_err(|e| PlannerError::Encoding(e.to_string()))?;
                let sig = self.providers.sign(key_type, &private_bytes, &id_hash)?;
                let mut args = vec![serde_bytes::ByteBuf::from(sig)];
                args.extend(ordered_args.into_iter().map(serde_bytes::ByteBuf::from));
                SignedTxn { sig: None, lsig: Some(LogicSig { logic: bytecode, args }), txn }
            }
            KeyCategory::GenericLsig => {
                let bytecode = lsig_bytecode.ok_or_else(|| PlannerError::UnknownSigningAddress(key_type.to_string()))?;
                let args = ordered_args.into_iter().map(serde_bytes::ByteBuf::from).collect();
                SignedTxn { sig: None, lsig: Some(LogicSig { logic: bytecode, args }), txn }
            }
        };
        signed.encode().map_err(|e| PlannerError::Encoding(e.to_string()))
    }

    fn build(&self, entries: Vec<Entry>, allow_group_modification: bool) -> Result<(Vec<Decoded>, MutationReport)> {
        let original_count = entries.len();
        let mut decoded = Vec::with_capacity(original_count);
        let mut passthrough_count = 0usize;
        let mut foreign_count = 0usize;

        for entry in entries {
            match entry {
                Entry::Sign { txn_bytes, auth_address, lsig_args } => {
                    let txn = Txn::decode(&txn_bytes).map_err(|e| PlannerError::MalformedTxn(e.to_string()))?;
                    let key = self
                        .lookup
                        .lookup(&auth_address)
                        .ok_or_else(|| PlannerError::UnknownSigningAddress(auth_address.clone()))?;
                    decoded.push(Decoded::Sign {
                        txn,
                        key_type: key.key_type,
                        category: key.category,
                        lsig_bytecode: key.lsig_bytecode,
                        private_bytes: key.private_bytes,
                        ordered_lsig_args: Vec::new(),
                        lsig_args,
                    });
                }
                Entry::Passthrough { signed_txn_bytes } => {
                    SignedTxn::decode(&signed_txn_bytes).map_err(|e| PlannerError::MalformedTxn(e.to_string()))?;
                    passthrough_count += 1;
                    decoded.push(Decoded::Passthrough { bytes: signed_txn_bytes });
                }
                Entry::Foreign { txn_bytes, lsig_size_hint } => {
                    let txn = Txn::decode(&txn_bytes).map_err(|e| PlannerError::MalformedTxn(e.to_string()))?;
                    foreign_count += 1;
                    decoded.push(Decoded::Foreign { txn, lsig_size_hint });
                }
            }
        }

        let pre_grouped = decoded.iter().any(|d| match d {
            Decoded::Sign { txn, .. } | Decoded::Foreign { txn, .. } => txn.group.is_some(),
            _ => false,
        });
        if pre_grouped && !allow_group_modification {
            return Err(PlannerError::GroupModificationForbidden);
        }

        // Stage 2: LogicSig budget planning. Each entry needing a bigger
        // pooled budget than its own transaction provides records the
        // shortfall; dummies are inserted in ascending shortfall order
        // after everything else (spec §4.4 step 2, open question decision
        // recorded in the design notes).
        let mut shortfalls: Vec<(usize, usize)> = Vec::new();
        for (i, d) in decoded.iter().enumerate() {
            let lsig_size = match d {
                Decoded::Sign { lsig_bytecode, .. } => lsig_bytecode.as_ref().map(Vec::len).unwrap_or(0),
                Decoded::Foreign { lsig_size_hint, .. } => lsig_size_hint.unwrap_or(0),
                _ => 0,
            };
            let n = dummies_for_lsig_size(lsig_size);
            if n > 0 {
                shortfalls.push((i, n));
            }
        }
        let dummies_added: usize = shortfalls.iter().map(|&(_, n)| n).sum();

        let mut dummy_decoded = Vec::new();
        if dummies_added > 0 {
            let (pooler_sender, pooler_key_type, pooler_private) = decoded
                .iter()
                .find_map(|d| match d {
                    Decoded::Sign {
                        txn,
                        category: KeyCategory::Ed25519,
                        key_type,
                        private_bytes: Some(pk),
                        ..
                    } => Some((txn.sender.clone(), key_type.clone(), pk.clone())),
                    _ => None,
                })
                .ok_or(PlannerError::NoFeePoolerAvailable)?;

            let template = match &decoded[shortfalls[0].0] {
                Decoded::Sign { txn, .. } | Decoded::Foreign { txn, .. } => txn.clone(),
                _ => unreachable!("shortfalls only ever record Sign/Foreign indices"),
            };

            let mut sorted_shortfalls = shortfalls.clone();
            sorted_shortfalls.sort_by_key(|&(idx, n)| (n, idx));

            for &(_, n) in &sorted_shortfalls {
                for _ in 0..n {
                    let dummy_txn = Txn {
                        asset_close_to: None,
                        amount: 0,
                        asset_sender: None,
                        close_remainder_to: None,
                        fee: 0,
                        first_valid: template.first_valid,
                        genesis_id: template.genesis_id.clone(),
                        genesis_hash: template.genesis_hash.clone(),
                        group: None,
                        last_valid: template.last_valid,
                        lease: None,
                        note: Vec::new(),
                        receiver: Some(pooler_sender.clone()),
                        rekey_to: None,
                        sender: pooler_sender.clone(),
                        txn_type: "pay".to_string(),
                    };
                    dummy_decoded.push(Decoded::Dummy {
                        txn: dummy_txn,
                        key_type: pooler_key_type.clone(),
                        private_bytes: pooler_private.clone(),
                    });
                }
            }
        }

        // Stage 4: group-hash computation over every SIGN/FOREIGN/dummy
        // transaction. Passthrough entries are assumed already grouped by
        // whoever signed them and are never restamped.
        let group_id_changed = self.stamp_group(&mut decoded, &mut dummy_decoded)?;
        decoded.extend(dummy_decoded);

        // Stage 3 (applied after dummies exist, so they're pooled too):
        // bump every server-controlled transaction's fee to the suggested
        // minimum. Passthrough/foreign fees are left exactly as submitted.
        let mut fee_deltas = Vec::new();
        let mut total_fees_delta = 0u64;
        for (i, d) in decoded.iter_mut().enumerate() {
            if let Decoded::Sign { txn, .. } | Decoded::Dummy { txn, .. } = d {
                let (new_fee, delta) = bump_to_min_fee(txn.fee, MIN_FEE);
                if delta > 0 {
                    fee_deltas.push(FeeDelta { index: i, old_fee: txn.fee, new_fee });
                    total_fees_delta += delta;
                    txn.fee = new_fee;
                }
            }
        }

        // Stage 5: validate runtime LogicSig arguments against the
        // template schema (ed25519 entries carry none).
        for d in decoded.iter_mut() {
            if let Decoded::Sign {
                key_type,
                category,
                lsig_args,
                ordered_lsig_args,
                ..
            } = d
            {
                if *category != KeyCategory::Ed25519 {
                    *ordered_lsig_args = self
                        .lsig
                        .validate_and_order_runtime_args(key_type, lsig_args)
                        .map_err(|e| PlannerError::InvalidLsigArgs(e.to_string()))?;
                }
            }
        }

        let final_count = decoded.len();
        let reason = MutationReport::reason_string(dummies_added, fee_deltas.len(), group_id_changed);
        let mutations = MutationReport {
            original_count,
            final_count,
            dummies_added,
            group_id_changed,
            fee_deltas,
            total_fees_delta,
            passthrough_count,
            foreign_count,
            reason,
        };
        Ok((decoded, mutations))
    }

    fn stamp_group(&self, decoded: &mut [Decoded], dummy_decoded: &mut [Decoded]) -> Result<bool> {
        let mut group_txns: Vec<Txn> = Vec::new();
        let mut main_indices: Vec<usize> = Vec::new();
        for (i, d) in decoded.iter().enumerate() {
            match d {
                Decoded::Sign { txn, .. } | Decoded::Foreign { txn, .. } => {
                    main_indices.push(i);
                    group_txns.push(txn.clone());
                }
                _ => {}
            }
        }
        let dummy_start = group_txns.len();
        for d in dummy_decoded.iter() {
            if let Decoded::Dummy { txn, .. } = d {
                group_txns.push(txn.clone());
            }
        }

        if group_txns.len() < 2 {
            return Ok(false);
        }

        stamp_group_id(&mut group_txns)?;

        for (slot, &idx) in main_indices.iter().enumerate() {
            match &mut decoded[idx] {
                Decoded::Sign { txn, .. } | Decoded::Foreign { txn, .. } => *txn = group_txns[slot].clone(),
                _ => unreachable!(),
            }
        }
        for (slot, d) in dummy_decoded.iter_mut().enumerate() {
            if let Decoded::Dummy { txn, .. } = d {
                *txn = group_txns[dummy_start + slot].clone();
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{KeyEntry, StaticKeyLookup};
    use apsigner_crypto::signatures::ed25519;
    use std::collections::BTreeMap as Map;

    fn base_txn(sender: [u8; 32], fee: u64) -> Txn {
        Txn {
            asset_close_to: None,
            amount: 0,
            asset_sender: None,
            close_remainder_to: None,
            fee,
            first_valid: 10,
            genesis_id: "testnet-v1.0".to_string(),
            genesis_hash: vec![5u8; 32],
            group: None,
            last_valid: 1010,
            lease: None,
            note: Vec::new(),
            receiver: Some(sender.to_vec()),
            rekey_to: None,
            sender: sender.to_vec(),
            txn_type: "pay".to_string(),
        }
    }

    #[test]
    fn single_sign_entry_needs_no_group_and_signs() {
        let (seed, public) = ed25519::generate();
        let addr = apsigner_crypto::address::encode_address(&public.0);
        let mut lookup = StaticKeyLookup::new();
        lookup.insert(
            &addr,
            KeyEntry {
                key_type: "ed25519".to_string(),
                category: KeyCategory::Ed25519,
                lsig_bytecode: None,
                private_bytes: Some(seed.expose().to_vec()),
            },
        );
        let providers = ProviderRegistry::new();
        let lsig = LsigRegistry::new();
        let pipeline = Pipeline::new(&lookup, &providers, &lsig);

        let txn = base_txn(public.0, MIN_FEE);
        let entries = vec![Entry::Sign {
            txn_bytes: txn.canonical_encode().unwrap(),
            auth_address: addr,
            lsig_args: Map::new(),
        }];
        let (signed, mutations) = pipeline.sign(entries, true).unwrap();
        assert_eq!(signed.len(), 1);
        assert_eq!(mutations.dummies_added, 0);
        assert!(!mutations.group_id_changed);
        let decoded = SignedTxn::decode(&signed[0]).unwrap();
        assert!(decoded.sig.is_some());
    }

    #[test]
    fn two_entries_get_a_shared_group_id() {
        let (seed_a, public_a) = ed25519::generate();
        let (seed_b, public_b) = ed25519::generate();
        let addr_a = apsigner_crypto::address::encode_address(&public_a.0);
        let addr_b = apsigner_crypto::address::encode_address(&public_b.0);
        let mut lookup = StaticKeyLookup::new();
        lookup.insert(
            &addr_a,
            KeyEntry {
                key_type: "ed25519".to_string(),
                category: KeyCategory::Ed25519,
                lsig_bytecode: None,
                private_bytes: Some(seed_a.expose().to_vec()),
            },
        );
        lookup.insert(
            &addr_b,
            KeyEntry {
                key_type: "ed25519".to_string(),
                category: KeyCategory::Ed25519,
                lsig_bytecode: None,
                private_bytes: Some(seed_b.expose().to_vec()),
            },
        );
        let providers = ProviderRegistry::new();
        let lsig = LsigRegistry::new();
        let pipeline = Pipeline::new(&lookup, &providers, &lsig);

        let txn_a = base_txn(public_a.0, MIN_FEE);
        let txn_b = base_txn(public_b.0, MIN_FEE);
        let entries = vec![
            Entry::Sign {
                txn_bytes: txn_a.canonical_encode().unwrap(),
                auth_address: addr_a,
                lsig_args: Map::new(),
            },
            Entry::Sign {
                txn_bytes: txn_b.canonical_encode().unwrap(),
                auth_address: addr_b,
                lsig_args: Map::new(),
            },
        ];
        let (signed, mutations) = pipeline.sign(entries, true).unwrap();
        assert!(mutations.group_id_changed);
        let a = SignedTxn::decode(&signed[0]).unwrap();
        let b = SignedTxn::decode(&signed[1]).unwrap();
        assert_eq!(a.txn.group, b.txn.group);
        assert!(a.txn.group.is_some());
    }

    #[test]
    fn oversized_lsig_triggers_minimal_dummy_insertion() {
        let (seed, public) = ed25519::generate();
        let addr = apsigner_crypto::address::encode_address(&public.0);
        let mut lookup = StaticKeyLookup::new();
        lookup.insert(
            &addr,
            KeyEntry {
                key_type: "ed25519".to_string(),
                category: KeyCategory::Ed25519,
                lsig_bytecode: None,
                private_bytes: Some(seed.expose().to_vec()),
            },
        );
        let providers = ProviderRegistry::new();
        let lsig = LsigRegistry::new();
        let pipeline = Pipeline::new(&lookup, &providers, &lsig);

        let txn = base_txn(public.0, MIN_FEE);
        let entries = vec![Entry::Foreign {
            txn_bytes: txn.canonical_encode().unwrap(),
            lsig_size_hint: Some(5000),
        }];
        let err = pipeline.sign(entries, true).unwrap_err();
        assert!(matches!(err, PlannerError::NoFeePoolerAvailable));
    }

    #[test]
    fn pre_grouped_batch_rejected_without_modification_permission() {
        let (seed, public) = ed25519::generate();
        let addr = apsigner_crypto::address::encode_address(&public.0);
        let mut lookup = StaticKeyLookup::new();
        lookup.insert(
            &addr,
            KeyEntry {
                key_type: "ed25519".to_string(),
                category: KeyCategory::Ed25519,
                lsig_bytecode: None,
                private_bytes: Some(seed.expose().to_vec()),
            },
        );
        let providers = ProviderRegistry::new();
        let lsig = LsigRegistry::new();
        let pipeline = Pipeline::new(&lookup, &providers, &lsig);

        let mut txn = base_txn(public.0, MIN_FEE);
        txn.group = Some(vec![1u8; 32]);
        let entries = vec![Entry::Sign {
            txn_bytes: txn.canonical_encode().unwrap(),
            auth_address: addr,
            lsig_args: Map::new(),
        }];
        let err = pipeline.sign(entries, false).unwrap_err();
        assert!(matches!(err, PlannerError::GroupModificationForbidden));
    }

    #[test]
    fn unknown_signing_address_rejected() {
        let lookup = StaticKeyLookup::new();
        let providers = ProviderRegistry::new();
        let lsig = LsigRegistry::new();
        let pipeline = Pipeline::new(&lookup, &providers, &lsig);

        let txn = base_txn([9u8; 32], MIN_FEE);
        let entries = vec![Entry::Sign {
            txn_bytes: txn.canonical_encode().unwrap(),
            auth_address: "nonexistent".to_string(),
            lsig_args: Map::new(),
        }];
        let err = pipeline.sign(entries, true).unwrap_err();
        assert!(matches!(err, PlannerError::UnknownSigningAddress(_)));
    }

    #[test]
    fn low_fee_is_bumped_and_reported() {
        let (seed, public) = ed25519::generate();
        let addr = apsigner_crypto::address::encode_address(&public.0);
        let mut lookup = StaticKeyLookup::new();
        lookup.insert(
            &addr,
            KeyEntry {
                key_type: "ed25519".to_string(),
                category: KeyCategory::Ed25519,
                lsig_bytecode: None,
                private_bytes: Some(seed.expose().to_vec()),
            },
        );
        let providers = ProviderRegistry::new();
        let lsig = LsigRegistry::new();
        let pipeline = Pipeline::new(&lookup, &providers, &lsig);

        let txn = base_txn(public.0, 0);
        let entries = vec![Entry::Sign {
            txn_bytes: txn.canonical_encode().unwrap(),
            auth_address: addr,
            lsig_args: Map::new(),
        }];
        let (_, mutations) = pipeline.sign(entries, true).unwrap();
        assert_eq!(mutations.fee_deltas.len(), 1);
        assert_eq!(mutations.total_fees_delta, MIN_FEE);
    }
}
