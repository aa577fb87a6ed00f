//! On-disk encrypted key files, master-key lifecycle, and the in-memory key
//! cache (spec §4.1). Everything that touches key material on disk or in
//! memory goes through [`Keystore`].

pub mod cache;
pub mod error;
pub mod keystore;
pub mod model;
pub mod passphrase_command;
pub mod store;

pub use error::{KeystoreError, Result};
pub use keystore::{ChangeEvent, KeyCount, Keystore};
pub use model::{KeyInfo, KeyRecord, KeystoreMetadata};
