//! # Approval Ledger
//!
//! Per-deal, per-gate record of each member's latest vote. A resubmitted
//! vote overwrites the previous one; the weight is snapshotted at vote time
//! and does not follow later registry changes.

use crate::catalog::GateCatalog;
use crate::committee::CommitteeRegistry;
use crate::storage::{LedgerStore, WriteBatch};
use crate::{ApprovalRecord, ApprovalType, DealId, GateError, GateName, MemberId, Ratio, Weight};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Weighted sums of the votes cast on one gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub approve: Weight,
    pub reject: Weight,
    pub abstain: Weight,
    /// Number of distinct voters.
    pub votes: usize,
}

impl VoteTally {
    fn add(&mut self, record: &ApprovalRecord) {
        let slot = match record.approval_type {
            ApprovalType::Approve => &mut self.approve,
            ApprovalType::Reject => &mut self.reject,
            ApprovalType::Abstain => &mut self.abstain,
        };
        *slot = slot.saturating_add(record.voting_weight);
        self.votes = self.votes.saturating_add(1);
    }
}

/// Approval view over a store, resolved against one configuration snapshot.
#[derive(Debug)]
pub struct ApprovalLedger<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    catalog: &'a GateCatalog,
    registry: &'a CommitteeRegistry,
}

impl<'a, S: LedgerStore + ?Sized> ApprovalLedger<'a, S> {
    /// Create a view.
    #[must_use]
    pub fn new(store: &'a S, catalog: &'a GateCatalog, registry: &'a CommitteeRegistry) -> Self {
        Self {
            store,
            catalog,
            registry,
        }
    }

    /// Stage the upsert of `(deal_id, gate, member_id)` into `batch`.
    pub fn record_vote(
        &self,
        batch: &mut WriteBatch,
        deal_id: &DealId,
        gate: &GateName,
        member_id: &MemberId,
        approval_type: ApprovalType,
        comment: Option<&str>,
        now: DateTime<Utc>,
    ) -> ApprovalRecord {
        let record = ApprovalRecord {
            deal_id: deal_id.clone(),
            gate: gate.clone(),
            member_id: member_id.clone(),
            approval_type,
            voting_weight: self.registry.weight(member_id),
            comment: comment.map(str::to_string),
            voted_at: now,
        };
        batch.put_approval(record.clone());
        record
    }

    /// Weighted sums per vote value.
    pub fn tally(&self, deal_id: &DealId, gate: &GateName) -> Result<VoteTally, GateError> {
        let mut tally = VoteTally::default();
        for record in self.store.approvals(deal_id, gate)? {
            tally.add(&record);
        }
        Ok(tally)
    }

    /// Sum of `voting_weight` over `approve` votes.
    pub fn approval_weight(&self, deal_id: &DealId, gate: &GateName) -> Result<Weight, GateError> {
        Ok(self.tally(deal_id, gate)?.approve)
    }

    /// Approval weight as a fraction of the active committee weight.
    pub fn approval_ratio(&self, deal_id: &DealId, gate: &GateName) -> Result<Ratio, GateError> {
        Ok(Ratio::of(
            self.approval_weight(deal_id, gate)?,
            self.registry.total_weight(),
        ))
    }

    /// `approval_weight / total_weight >= threshold(gate)`.
    ///
    /// Never met when the committee has no active weight.
    pub fn quorum_met(&self, deal_id: &DealId, gate: &GateName) -> Result<bool, GateError> {
        let threshold = self.catalog.require(gate)?.approval_threshold;
        let approved = self.approval_weight(deal_id, gate)?;
        Ok(threshold.is_met_by(approved, self.registry.total_weight()))
    }
}
