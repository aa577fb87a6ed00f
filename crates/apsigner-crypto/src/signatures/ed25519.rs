use crate::error::{Error, Result};
use crate::secret::SecretBytes;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

pub const SEED_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Generate a fresh random Ed25519 keypair. Returns the 32-byte seed (the
/// material that gets encrypted into the key file) and the public key.
pub fn generate() -> (SecretBytes, [u8; PUBLIC_KEY_LEN]) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let seed = signing_key.to_bytes();
    let public = signing_key.verifying_key().to_bytes();
    (SecretBytes::new(seed.to_vec()), public)
}

/// Rebuild the keypair from a stored seed, e.g. after keystore unlock or on
/// `import`.
pub fn public_key_from_seed(seed: &[u8]) -> Result<[u8; PUBLIC_KEY_LEN]> {
    let signing_key = signing_key_from_seed(seed)?;
    Ok(signing_key.verifying_key().to_bytes())
}

fn signing_key_from_seed(seed: &[u8]) -> Result<SigningKey> {
    let seed: [u8; SEED_LEN] = seed
        .try_into()
        .map_err(|_| Error::InvalidKeyMaterial("ed25519 seed must be 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Sign `msg` with the seed decrypted from a key file.
pub fn sign(seed: &[u8], msg: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let signing_key = signing_key_from_seed(seed)?;
    Ok(signing_key.sign(msg).to_bytes())
}

pub fn verify(public: &[u8; PUBLIC_KEY_LEN], msg: &[u8], sig: &[u8; SIGNATURE_LEN]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(public) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(sig);
    vk.verify(msg, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let (seed, public) = generate();
        let msg = b"approve this transaction";
        let sig = sign(seed.expose(), msg).unwrap();
        assert!(verify(&public, msg, &sig));
    }

    #[test]
    fn rejects_wrong_message() {
        let (seed, public) = generate();
        let sig = sign(seed.expose(), b"a").unwrap();
        assert!(!verify(&public, b"b", &sig));
    }

    #[test]
    fn deterministic_address_derivation() {
        let seed = [3u8; SEED_LEN];
        let a = public_key_from_seed(&seed).unwrap();
        let b = public_key_from_seed(&seed).unwrap();
        assert_eq!(a, b);
    }
}
