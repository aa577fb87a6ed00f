//! Cryptographic primitives wrapper: Ed25519 and Falcon-1024 signing, AEAD
//! encryption of on-disk key envelopes, PBKDF2/HKDF key derivation, and
//! zeroizing secret buffers. Every other crate in this workspace goes
//! through this one for anything touching key material.

pub mod address;
pub mod aead;
pub mod canonical;
pub mod error;
pub mod kdf;
pub mod secret;
pub mod signatures;

pub use error::{Error, Result};
pub use secret::{constant_time_eq, MasterKey, SecretBytes};
