use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("malformed transaction encoding: {0}")]
    MalformedTxn(String),
    #[error("encoding failure: {0}")]
    Encoding(String),
    #[error("group modification is forbidden by policy")]
    GroupModificationForbidden,
    #[error("a group must contain at least 2 transactions, got {0}")]
    GroupTooSmall(usize),
    #[error("no signing address known for '{0}'")]
    UnknownSigningAddress(String),
    #[error("invalid LogicSig runtime arguments: {0}")]
    InvalidLsigArgs(String),
    #[error("dummy transactions are needed for LogicSig budget but no ed25519 fee pooler is present in the batch")]
    NoFeePoolerAvailable,
    #[error(transparent)]
    Lsig(#[from] apsigner_lsig::LsigError),
    #[error(transparent)]
    Provider(#[from] apsigner_providers::ProviderError),
    #[error(transparent)]
    Crypto(#[from] apsigner_crypto::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
