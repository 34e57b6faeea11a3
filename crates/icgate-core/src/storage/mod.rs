//! # Ledger Storage
//!
//! The storage seam of the workflow. A `LedgerStore` reads the deal,
//! artifact, approval and audit tables and applies a `WriteBatch`
//! atomically: either every row in the batch becomes visible or none does.
//!
//! ## Backends
//!
//! - `MemoryLedger`: mutex-guarded `BTreeMap` tables (fast, volatile)
//! - `RedbLedger`: redb database file (ACID, persistent)
//!
//! Per-deal serialization of read-validate-commit sequences is the
//! workflow's job (see `DealLocks`); a store only guarantees batch atomicity.

mod memory;
mod redb_ledger;

pub use memory::MemoryLedger;
pub use redb_ledger::RedbLedger;

use crate::audit::{AuditEntry, AuditEvent};
use crate::{ApprovalRecord, ArtifactRecord, DealGateState, DealId, GateError, GateName};
use std::path::Path;

// =============================================================================
// WRITE BATCH
// =============================================================================

/// All rows written by one accepted operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    /// Upsert of the deal row.
    pub deal: Option<DealGateState>,
    /// Upserts keyed by `(deal_id, gate, artifact_name)`.
    pub artifacts: Vec<ArtifactRecord>,
    /// Upserts keyed by `(deal_id, gate, member_id)`.
    pub approvals: Vec<ApprovalRecord>,
    /// Appends, sequenced in order at commit.
    pub audit: Vec<AuditEvent>,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deal.is_none()
            && self.artifacts.is_empty()
            && self.approvals.is_empty()
            && self.audit.is_empty()
    }

    /// Stage a deal row.
    pub fn put_deal(&mut self, deal: DealGateState) {
        self.deal = Some(deal);
    }

    /// Stage an artifact row.
    pub fn put_artifact(&mut self, record: ArtifactRecord) {
        self.artifacts.push(record);
    }

    /// Stage an approval row.
    pub fn put_approval(&mut self, record: ApprovalRecord) {
        self.approvals.push(record);
    }

    /// Stage an audit entry.
    pub fn append_audit(&mut self, event: AuditEvent) {
        self.audit.push(event);
    }
}

// =============================================================================
// LEDGERSTORE TRAIT
// =============================================================================

/// Transactional storage for the five workflow entities.
///
/// All reads return rows in deterministic key order.
pub trait LedgerStore: Send + Sync {
    /// Load one deal row.
    fn deal(&self, deal_id: &DealId) -> Result<Option<DealGateState>, GateError>;

    /// Every deal row, ordered by deal id.
    fn deals(&self) -> Result<Vec<DealGateState>, GateError>;

    /// Artifact rows of one deal and gate, ordered by artifact name.
    fn artifacts(&self, deal_id: &DealId, gate: &GateName)
    -> Result<Vec<ArtifactRecord>, GateError>;

    /// Approval rows of one deal and gate, ordered by member id.
    fn approvals(&self, deal_id: &DealId, gate: &GateName)
    -> Result<Vec<ApprovalRecord>, GateError>;

    /// The whole audit trail in sequence order.
    fn audit_trail(&self) -> Result<Vec<AuditEntry>, GateError>;

    /// Audit entries of one deal in sequence order.
    fn deal_history(&self, deal_id: &DealId) -> Result<Vec<AuditEntry>, GateError>;

    /// Apply a batch atomically and return the sealed audit entries.
    fn commit(&self, batch: WriteBatch) -> Result<Vec<AuditEntry>, GateError>;
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend selected at startup.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory tables (fast, volatile).
    InMemory(MemoryLedger),
    /// Disk-backed tables using redb (ACID, persistent).
    Persistent(RedbLedger),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryLedger::new())
    }
}

impl StorageBackend {
    /// Open or create a redb-backed store at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, GateError> {
        Ok(Self::Persistent(RedbLedger::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, StorageBackend::Persistent(_))
    }
}

impl LedgerStore for StorageBackend {
    fn deal(&self, deal_id: &DealId) -> Result<Option<DealGateState>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.deal(deal_id),
            StorageBackend::Persistent(store) => store.deal(deal_id),
        }
    }

    fn deals(&self) -> Result<Vec<DealGateState>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.deals(),
            StorageBackend::Persistent(store) => store.deals(),
        }
    }

    fn artifacts(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ArtifactRecord>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.artifacts(deal_id, gate),
            StorageBackend::Persistent(store) => store.artifacts(deal_id, gate),
        }
    }

    fn approvals(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ApprovalRecord>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.approvals(deal_id, gate),
            StorageBackend::Persistent(store) => store.approvals(deal_id, gate),
        }
    }

    fn audit_trail(&self) -> Result<Vec<AuditEntry>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.audit_trail(),
            StorageBackend::Persistent(store) => store.audit_trail(),
        }
    }

    fn deal_history(&self, deal_id: &DealId) -> Result<Vec<AuditEntry>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.deal_history(deal_id),
            StorageBackend::Persistent(store) => store.deal_history(deal_id),
        }
    }

    fn commit(&self, batch: WriteBatch) -> Result<Vec<AuditEntry>, GateError> {
        match self {
            StorageBackend::InMemory(store) => store.commit(batch),
            StorageBackend::Persistent(store) => store.commit(batch),
        }
    }
}
