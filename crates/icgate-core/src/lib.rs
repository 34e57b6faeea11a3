//! # icgate-core
//!
//! The Investment-Committee gate workflow - THE LOGIC.
//!
//! A deal moves through an ordered sequence of governance gates
//! (Screen → IOI → LOI → IC1 → IC2 → Close). Each transition is gated
//! behind artifact completeness and, where the gate requires it, a weighted
//! committee quorum. Every accepted state change is appended to an
//! immutable audit trail, from which governance metrics are derived.
//!
//! ## Architectural Constraints
//!
//! - Synchronous, no async, no network dependencies (pure Rust)
//! - Deterministic: `BTreeMap`/`BTreeSet` only, integer fixed-point math
//! - Atomic: one storage batch per accepted operation, per-deal locking
//! - Append-only audit: rejected operations write nothing

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod catalog;
pub mod clock;
pub mod committee;
pub mod config;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod primitives;
pub mod storage;
pub mod types;
pub mod workflow;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ApprovalRecord, ApprovalType, ArtifactRecord, DealGateState, DealId, GateError, GateName,
    MemberId, Ratio, Weight,
};

// =============================================================================
// RE-EXPORTS: Configuration
// =============================================================================

pub use catalog::{GateCatalog, GateDefinition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use committee::{CommitteeMember, CommitteeRegistry, CommitteeRole};
pub use config::GovernanceConfig;

// =============================================================================
// RE-EXPORTS: Workflow
// =============================================================================

pub use audit::{AuditAction, AuditDetails, AuditEntry};
pub use ledger::{ApprovalLedger, ArtifactLedger, VoteTally};
pub use locks::DealLocks;
pub use metrics::{GateMetrics, GovernanceMetrics, GovernanceReport, TimeWindow};
pub use storage::{LedgerStore, MemoryLedger, RedbLedger, StorageBackend, WriteBatch};
pub use workflow::{
    ArtifactProgress, CompletionReport, GateWorkflow, Governance, QuorumProgress,
};

#[cfg(feature = "crypto-hash")]
pub use audit::trail_digest;
