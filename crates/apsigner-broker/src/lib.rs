//! Approval broker (spec §4.3): multiplexes the single exclusive admin
//! control session against many concurrent signing clients, runs the hard
//! policy linter and soft warning generator ahead of every decision, and
//! owns the inactivity auto-lock timer. See [`actor::spawn`] for the
//! actor's entry point.

mod actor;
mod error;
mod events;
mod linter;
mod policy;
mod request;
mod warnings;

pub use actor::{spawn, AdminConnection, BrokerHandle};
pub use error::{BrokerError, Result};
pub use events::AdminEvent;
pub use linter::{HardLinter, LintRule, MAX_GROUP_SIZE};
pub use policy::{ApprovalPolicy, PolicyViolation, Severity};
pub use request::{EntryRole, EntrySummary, RejectReason, Resolution};
pub use warnings::{generate_warnings, ONE_ALGO_MICROALGOS};
