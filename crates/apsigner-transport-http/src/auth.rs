//! Bearer-token middleware (spec §6: `Authorization: aplane <token>`,
//! compared in constant time against the per-identity token file).

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

pub async fn require_bearer_token(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let Some(header_value) = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return ApiError::Unauthorized.into_response();
    };
    let Some((scheme, token)) = header_value.split_once(' ') else {
        return ApiError::Unauthorized.into_response();
    };
    if !scheme.eq_ignore_ascii_case("aplane") || !apsigner_crypto::constant_time_eq(token.as_bytes(), state.bearer_token.as_bytes()) {
        return ApiError::Unauthorized.into_response();
    }
    next.run(req).await
}
