//! Group signing pipeline (spec §4.4): decode a heterogeneous batch,
//! plan LogicSig budget dummies, pool fees, stamp the group hash, validate
//! runtime LogicSig arguments, and either sign or return the dry-run plan.

pub mod budget;
pub mod entries;
pub mod error;
pub mod fees;
pub mod grouphash;
pub mod pipeline;
pub mod report;
pub mod txn;

pub use entries::{Entry, KeyEntry, KeyLookup, StaticKeyLookup};
pub use error::{PlannerError, Result};
pub use pipeline::Pipeline;
pub use report::{FeeDelta, MutationReport};
pub use txn::{LogicSig, SignedTxn, Txn, MIN_FEE};
