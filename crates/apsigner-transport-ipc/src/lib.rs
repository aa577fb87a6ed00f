//! Admin-facing transport (spec §6): a single exclusive control session
//! over a Unix domain socket, framed as newline-delimited JSON. Generalizes
//! the teacher's `wallet_remote_signer` admin console protocol to the full
//! frame catalog this daemon needs (unlock, approvals, key management).

mod conn;
mod error;
mod frame;
mod listener;

pub use error::{IpcError, Result};
pub use listener::serve;
