use crate::error::{Error, Result};
use crate::secret::MasterKey;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

/// Current on-disk key-envelope format version (spec §4.1).
pub const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under the master key, producing the framed envelope:
/// `version_byte || nonce(12) || ciphertext_with_appended_tag(16)`.
///
/// `chacha20poly1305`'s `encrypt` already appends the 16-byte Poly1305 tag
/// to the ciphertext, so the on-disk layout is version || nonce || (ct ||
/// tag) — the tag is the trailing 16 bytes of that ciphertext blob, matching
/// spec §4.1's "12-byte nonce, 16-byte auth tag, ciphertext" framing without
/// a separate length-prefixed tag field.
pub fn encrypt(master: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(master.as_bytes()));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Encryption(e.to_string()))?;
    let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    out.push(ENVELOPE_VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt and verify a framed envelope produced by [`encrypt`].
pub fn decrypt(master: &MasterKey, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(Error::MalformedEnvelope("envelope too short".into()));
    }
    let version = envelope[0];
    if version != ENVELOPE_VERSION {
        return Err(Error::MalformedEnvelope(format!(
            "unsupported envelope version {version}"
        )));
    }
    let nonce = Nonce::from_slice(&envelope[1..1 + NONCE_LEN]);
    let ciphertext = &envelope[1 + NONCE_LEN..];
    let cipher = ChaCha20Poly1305::new(Key::from_slice(master.as_bytes()));
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::Decryption("authentication failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_master_key;

    #[test]
    fn round_trip() {
        let master = derive_master_key(b"pw", b"salt0000000000000");
        let plaintext = br#"{"address":"AAAA"}"#;
        let envelope = encrypt(&master, plaintext).unwrap();
        assert_eq!(envelope[0], ENVELOPE_VERSION);
        let decrypted = decrypt(&master, &envelope).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let master = derive_master_key(b"pw", b"salt0000000000000");
        let other = derive_master_key(b"pw2", b"salt0000000000000");
        let envelope = encrypt(&master, b"secret").unwrap();
        assert!(decrypt(&other, &envelope).is_err());
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let master = derive_master_key(b"pw", b"salt0000000000000");
        let mut envelope = encrypt(&master, b"secret").unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(decrypt(&master, &envelope).is_err());
    }
}
