//! Algorand address encoding: a 32-byte public key (or, for a LogicSig, the
//! "Program"-prefixed hash of its bytecode) plus a 4-byte checksum, base32
//! encoded without padding to a 58-character string.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha512_256};

const CHECKSUM_LEN: usize = 4;
pub const ADDRESS_LEN: usize = 58;

/// Encode a 32-byte public key (or LogicSig program hash) as a canonical
/// Algorand address string.
pub fn encode_address(public_bytes: &[u8; 32]) -> String {
    let checksum = checksum4(public_bytes);
    let mut full = Vec::with_capacity(32 + CHECKSUM_LEN);
    full.extend_from_slice(public_bytes);
    full.extend_from_slice(&checksum);
    BASE32_NOPAD.encode(&full)
}

/// Decode and checksum-verify a canonical Algorand address string back to
/// its 32-byte payload.
pub fn decode_address(address: &str) -> Option<[u8; 32]> {
    let decoded = BASE32_NOPAD.decode(address.as_bytes()).ok()?;
    if decoded.len() != 36 {
        return None;
    }
    let (payload, checksum) = decoded.split_at(32);
    let mut payload32 = [0u8; 32];
    payload32.copy_from_slice(payload);
    if checksum4(&payload32) != checksum {
        return None;
    }
    Some(payload32)
}

fn checksum4(payload: &[u8; 32]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha512_256::digest(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
    out
}

/// Hash a compiled LogicSig program into its 32-byte escrow-account
/// identity: `sha512_256(b"Program" || bytecode)`. The resulting address is
/// produced by [`encode_address`] on this hash, exactly as for an ordinary
/// public key — LogicSig accounts and Ed25519 accounts share one address
/// space.
pub fn program_hash(bytecode: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(b"Program");
    hasher.update(bytecode);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [42u8; 32];
        let addr = encode_address(&key);
        assert_eq!(addr.len(), ADDRESS_LEN);
        assert_eq!(decode_address(&addr).unwrap(), key);
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let key = [1u8; 32];
        let mut addr = encode_address(&key);
        addr.replace_range(0..1, if addr.starts_with('A') { "B" } else { "A" });
        assert!(decode_address(&addr).is_none());
    }

    #[test]
    fn program_hash_is_deterministic() {
        let bytecode = b"\x06\x81\x01";
        assert_eq!(program_hash(bytecode), program_hash(bytecode));
    }
}
