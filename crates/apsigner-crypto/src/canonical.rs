/// Domain-separation tag prepended to every message this daemon signs, so a
/// signature produced here can never be replayed as a signature over raw,
/// untagged bytes from an unrelated protocol.
///
/// Mirrors `ledger::crypto::remote_tag` from the teacher repo: a constant
/// tag, then the message bytes, concatenated and handed to the signer.
const SIGN_TAG: &[u8] = b"TX";

/// Domain tag for a `TxGroup` encoding, used to derive a group id from the
/// member transactions' id hashes (spec §4.4 step 4).
const GROUP_TAG: &[u8] = b"TG";

/// Prepend an arbitrary domain tag to `bytes`. [`tag_transaction`] and
/// `apsigner-planner::grouphash` are both thin callers of this.
pub fn domain_tag(tag: &[u8], bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + bytes.len());
    out.extend_from_slice(tag);
    out.extend_from_slice(bytes);
    out
}

/// Tag a transaction's canonical encoding before it reaches a signing
/// provider. Algorand itself domain-separates with the same "TX" prefix for
/// standard transactions; LogicSig DSA verification uses the untagged
/// message hash instead (see `apsigner-lsig`), so callers choose explicitly
/// rather than this being applied unconditionally everywhere.
pub fn tag_transaction(canonical_bytes: &[u8]) -> Vec<u8> {
    domain_tag(SIGN_TAG, canonical_bytes)
}

/// Tag a `TxGroup` encoding before hashing it into a group id.
pub fn tag_group(canonical_bytes: &[u8]) -> Vec<u8> {
    domain_tag(GROUP_TAG, canonical_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_prefixed() {
        let tagged = tag_transaction(b"abc");
        assert!(tagged.starts_with(SIGN_TAG));
        assert_eq!(&tagged[SIGN_TAG.len()..], b"abc");
    }

    #[test]
    fn group_tag_differs_from_transaction_tag() {
        assert_ne!(tag_transaction(b"abc"), tag_group(b"abc"));
    }
}
