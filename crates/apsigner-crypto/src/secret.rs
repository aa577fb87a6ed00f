use zeroize::{Zeroize, ZeroizeOnDrop};

/// 32-byte symmetric key derived from the operator passphrase. Lives only in
/// process memory, never serialized, zeroized on drop (covers both explicit
/// `lock()` and ordinary process exit / panic unwind).
#[derive(ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Deliberately no `Clone`/`Copy`/`Debug` impl: the master key must have a
// single owner so that "zeroize on last reference drop" (spec §5) is
// actually the *only* reference.

/// Owning, zeroizing wrapper around decrypted private key material of
/// arbitrary length (ed25519 seeds, falcon secret keys, ...).
#[derive(ZeroizeOnDrop, Clone)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes({} bytes, redacted)", self.0.len())
    }
}

/// Constant-time equality, used for passphrase-verification-ciphertext
/// comparisons and export re-authentication.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_regular_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
