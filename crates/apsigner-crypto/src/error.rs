use thiserror::Error;

/// Crate-wide error type. Every higher crate maps these onto its own
/// transport-facing error (HTTP status, IPC frame) at its own boundary
/// rather than leaking this type across the wire.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bad passphrase")]
    BadPassphrase,
    #[error("encryption failure: {0}")]
    Encryption(String),
    #[error("decryption failure: {0}")]
    Decryption(String),
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
    #[error("signing failure: {0}")]
    Signing(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

pub type Result<T> = std::result::Result<T, Error>;
