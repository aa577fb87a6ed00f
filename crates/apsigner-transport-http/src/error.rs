//! Maps every failure mode in spec §7's error taxonomy onto an HTTP status
//! and a machine-readable `error` code, the same one-place-to-map-errors
//! shape `WalletError -> HttpError::Handler` uses in the teacher's
//! `wallet_remote_signer` example, generalized to axum's `IntoResponse`.

use apsigner_broker::BrokerError;
use apsigner_keystore::KeystoreError;
use apsigner_planner::PlannerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    SignerLocked,
    UnknownSigningAddress(String),
    PolicyHard(String),
    ApprovalTimeout,
    RejectedByUser,
    GroupModificationForbidden,
    InvalidLsigArgs(String),
    UnknownAddress(String),
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid credentials".into()),
            ApiError::SignerLocked => (StatusCode::FORBIDDEN, "signer_locked", "signer is locked".into()),
            ApiError::UnknownSigningAddress(a) => (
                StatusCode::BAD_REQUEST,
                "unknown_signing_address",
                format!("no key for address '{a}'"),
            ),
            ApiError::PolicyHard(m) => (StatusCode::BAD_REQUEST, "policy_hard", m.clone()),
            ApiError::ApprovalTimeout => (StatusCode::REQUEST_TIMEOUT, "approval_timeout", "approval request timed out".into()),
            ApiError::RejectedByUser => (StatusCode::OK, "rejected_by_user", "rejected by operator".into()),
            ApiError::GroupModificationForbidden => (
                StatusCode::BAD_REQUEST,
                "group_modification_forbidden",
                "group modification is forbidden by policy".into(),
            ),
            ApiError::InvalidLsigArgs(m) => (StatusCode::BAD_REQUEST, "invalid_lsig_args", m.clone()),
            ApiError::UnknownAddress(a) => (StatusCode::NOT_FOUND, "unknown_address", format!("no key for address '{a}'")),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if !matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::warn!(%code, %message, "request rejected");
        } else {
            tracing::error!(%message, "internal error");
        }
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::PolicyHard(m) => ApiError::PolicyHard(m),
            BrokerError::ApprovalTimeout => ApiError::ApprovalTimeout,
            BrokerError::ApprovalRejected => ApiError::RejectedByUser,
            BrokerError::SignerLocked => ApiError::SignerLocked,
            BrokerError::NoAdminSession => {
                ApiError::BadRequest("no admin session is connected to approve this request".into())
            }
            other @ (BrokerError::ClientExists | BrokerError::UnknownRequest(_) | BrokerError::Displaced | BrokerError::ShuttingDown) => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<PlannerError> for ApiError {
    fn from(e: PlannerError) -> Self {
        match e {
            PlannerError::UnknownSigningAddress(a) => ApiError::UnknownSigningAddress(a),
            PlannerError::GroupModificationForbidden => ApiError::GroupModificationForbidden,
            PlannerError::InvalidLsigArgs(m) => ApiError::InvalidLsigArgs(m),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<KeystoreError> for ApiError {
    fn from(e: KeystoreError) -> Self {
        match e {
            KeystoreError::SignerLocked => ApiError::SignerLocked,
            KeystoreError::UnknownAddress(a) => ApiError::UnknownAddress(a),
            KeystoreError::DuplicateAddress => ApiError::BadRequest("an address already exists for this key material".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
