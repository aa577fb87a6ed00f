//! HTTP client-facing transport (spec §6): `/sign`, `/plan`, `/keys`,
//! `/keytypes`, `/admin/generate`, `/admin/keys`, `/health`, behind a
//! static bearer token. Built on `axum`, the same crate the rest of the
//! pack's service-facing daemons reach for, generalizing the teacher's
//! hand-rolled `httpd::Router` used in `wallet_remote_signer` (spec's
//! AMBIENT STACK note on transports).

mod auth;
mod error;
mod routes;
mod state;
mod wire;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
