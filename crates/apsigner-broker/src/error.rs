use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("policy violation: {0}")]
    PolicyHard(String),
    #[error("approval request timed out")]
    ApprovalTimeout,
    #[error("rejected_by_user")]
    ApprovalRejected,
    #[error("signer is locked")]
    SignerLocked,
    #[error("an admin session is already connected")]
    ClientExists,
    #[error("no admin session is connected to approve this request")]
    NoAdminSession,
    #[error("request '{0}' is unknown or was already resolved")]
    UnknownRequest(Uuid),
    #[error("this admin session has been displaced by a newer connection")]
    Displaced,
    #[error("broker is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, BrokerError>;
