use crate::error::{Error, Result};
use crate::secret::SecretBytes;
use pqcrypto_falcon::falcon1024;
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _,
};

/// Generate a fresh Falcon-1024 keypair for a `falcon1024-*` DSA LogicSig.
/// Returns the secret key bytes (encrypted into the key file) and the
/// public key bytes (embedded in the compiled TEAL bytecode).
pub fn generate() -> (SecretBytes, Vec<u8>) {
    let (pk, sk) = falcon1024::keypair();
    (SecretBytes::new(sk.as_bytes().to_vec()), pk.as_bytes().to_vec())
}

pub fn sign(secret_key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let sk = falcon1024::SecretKey::from_bytes(secret_key)
        .map_err(|e| Error::InvalidKeyMaterial(format!("falcon1024 secret key: {e}")))?;
    let sig = falcon1024::detached_sign(msg, &sk);
    Ok(sig.as_bytes().to_vec())
}

pub fn verify(public_key: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    let Ok(pk) = falcon1024::PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = falcon1024::DetachedSignature::from_bytes(sig) else {
        return false;
    };
    falcon1024::verify_detached_signature(&sig, msg, &pk).is_ok()
}
