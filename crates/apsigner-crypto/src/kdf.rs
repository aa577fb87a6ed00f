use crate::secret::MasterKey;
use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

/// PBKDF2-HMAC-SHA256 iteration count for master-key derivation. Chosen as a
/// conservative default for an interactively-unlocked daemon; not exposed as
/// config since changing it would silently invalidate every existing
/// `.keystore` metadata file's verification ciphertext.
pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const SALT_LEN: usize = 16;

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive the 32-byte master key from a passphrase and its stored salt.
pub fn derive_master_key(passphrase: &[u8], salt: &[u8]) -> MasterKey {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ITERATIONS, &mut out);
    MasterKey::from_bytes(out)
}

/// Derive a subsidiary 32-byte key from the master key for a specific
/// purpose (e.g. per-template address-commitment binding), using HKDF so
/// that distinct purposes can never collide even if callers pass the same
/// `info` by accident across unrelated call sites — the shared `master`
/// root only ever leaves this function through an HKDF-separated output.
pub fn derive_key(master: &[u8], info: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, master);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .expect("32 is a valid Sha256 HKDF output length");
    okm
}
