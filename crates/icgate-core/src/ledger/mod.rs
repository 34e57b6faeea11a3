//! # Ledgers
//!
//! Read views over the artifact and approval tables of a `LedgerStore`,
//! plus the staging helpers that turn a provided artifact or a vote into a
//! row of a `WriteBatch`.
//!
//! Ledgers never commit on their own. The workflow collects every staged
//! row of one operation into a single batch and commits it under the deal
//! lock.

mod approval;
mod artifact;

pub use approval::{ApprovalLedger, VoteTally};
pub use artifact::ArtifactLedger;
