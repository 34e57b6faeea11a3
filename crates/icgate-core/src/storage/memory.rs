//! # In-memory Ledger
//!
//! `BTreeMap` tables behind a single mutex. A commit holds the lock for the
//! whole batch, so readers never observe a partial batch.

use super::{LedgerStore, WriteBatch};
use crate::audit::AuditEntry;
use crate::{
    ApprovalRecord, ArtifactRecord, DealGateState, DealId, GateError, GateName, MemberId,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type ArtifactKey = (DealId, GateName, String);
type ApprovalKey = (DealId, GateName, MemberId);

#[derive(Debug, Default)]
struct Tables {
    deals: BTreeMap<DealId, DealGateState>,
    artifacts: BTreeMap<ArtifactKey, ArtifactRecord>,
    approvals: BTreeMap<ApprovalKey, ApprovalRecord>,
    audit: Vec<AuditEntry>,
}

/// Volatile ledger tables.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    tables: Mutex<Tables>,
}

impl MemoryLedger {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, GateError> {
        self.tables
            .lock()
            .map_err(|_| GateError::LockPoisoned("memory ledger tables"))
    }
}

impl LedgerStore for MemoryLedger {
    fn deal(&self, deal_id: &DealId) -> Result<Option<DealGateState>, GateError> {
        Ok(self.lock()?.deals.get(deal_id).cloned())
    }

    fn deals(&self) -> Result<Vec<DealGateState>, GateError> {
        Ok(self.lock()?.deals.values().cloned().collect())
    }

    fn artifacts(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ArtifactRecord>, GateError> {
        let tables = self.lock()?;
        let start = (deal_id.clone(), gate.clone(), String::new());
        Ok(tables
            .artifacts
            .range(start..)
            .take_while(|((d, g, _), _)| d == deal_id && g == gate)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn approvals(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ApprovalRecord>, GateError> {
        let tables = self.lock()?;
        let start = (deal_id.clone(), gate.clone(), MemberId::new(""));
        Ok(tables
            .approvals
            .range(start..)
            .take_while(|((d, g, _), _)| d == deal_id && g == gate)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn audit_trail(&self) -> Result<Vec<AuditEntry>, GateError> {
        Ok(self.lock()?.audit.clone())
    }

    fn deal_history(&self, deal_id: &DealId) -> Result<Vec<AuditEntry>, GateError> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .filter(|entry| entry.deal_id == *deal_id)
            .cloned()
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<Vec<AuditEntry>, GateError> {
        let mut tables = self.lock()?;

        if let Some(deal) = batch.deal {
            tables.deals.insert(deal.deal_id.clone(), deal);
        }
        for record in batch.artifacts {
            let key = (
                record.deal_id.clone(),
                record.gate.clone(),
                record.artifact_name.clone(),
            );
            tables.artifacts.insert(key, record);
        }
        for record in batch.approvals {
            let key = (
                record.deal_id.clone(),
                record.gate.clone(),
                record.member_id.clone(),
            );
            tables.approvals.insert(key, record);
        }

        let mut sealed = Vec::with_capacity(batch.audit.len());
        for event in batch.audit {
            let sequence = (tables.audit.len() as u64).saturating_add(1);
            let entry = AuditEntry::from_event(sequence, event);
            tables.audit.push(entry.clone());
            sealed.push(entry);
        }

        Ok(sealed)
    }
}
