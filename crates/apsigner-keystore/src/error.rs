use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("bad passphrase")]
    BadPassphrase,
    #[error("signer is locked")]
    SignerLocked,
    #[error("signer is already initialized")]
    AlreadyInitialized,
    #[error("no address '{0}' in keystore")]
    UnknownAddress(String),
    #[error("an address already exists for this key material")]
    DuplicateAddress,
    #[error(transparent)]
    Lsig(#[from] apsigner_lsig::LsigError),
    #[error(transparent)]
    Provider(#[from] apsigner_providers::ProviderError),
    #[error(transparent)]
    Crypto(#[from] apsigner_crypto::Error),
    #[error("disk persistence failure: {0}")]
    DiskPersistence(String),
    #[error("malformed on-disk key file '{0}': {1}")]
    MalformedKeyFile(String, String),
    #[error("passphrase-command helper failed: {0}")]
    PassphraseCommand(String),
    #[error("key type '{0}' does not support mnemonic export/import")]
    NoMnemonic(String),
}

pub type Result<T> = std::result::Result<T, KeystoreError>;
