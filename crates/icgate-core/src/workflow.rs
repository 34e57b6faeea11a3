//! # Gate State Machine
//!
//! `GateWorkflow` holds each deal's current gate and orchestrates the
//! accepted state changes:
//!
//! - `advance`: move a deal to exactly the next gate, proving the target
//!   gate's required artifacts in the same step
//! - `submit_approval`: upsert a member's vote on the deal's current gate
//! - `check_completion`: recompute whether a gate is satisfied (read-only)
//!
//! ## Atomicity
//!
//! Every accepted operation stages its rows (deal, artifacts, approval,
//! audit) into one `WriteBatch` and commits it while holding the deal's
//! lock. A rejected operation commits nothing, so it leaves no audit entry
//! and no partial artifact rows behind.
//!
//! ## Configuration Snapshot
//!
//! The catalog and committee are injected at construction and replaced only
//! by `reload`. Operations hold a read guard on the snapshot for their whole
//! duration; `reload` waits for in-flight operations to finish.

use crate::audit::{AuditDetails, AuditEntry, AuditEvent};
use crate::catalog::GateCatalog;
use crate::clock::{Clock, SystemClock};
use crate::committee::CommitteeRegistry;
use crate::ledger::{ApprovalLedger, ArtifactLedger, VoteTally};
use crate::locks::DealLocks;
use crate::metrics::{GovernanceMetrics, GovernanceReport, TimeWindow};
use crate::primitives::{
    MAX_ARTIFACT_NAME_LENGTH, MAX_ASSERTED_ARTIFACTS, MAX_COMMENT_LENGTH, MAX_ID_LENGTH,
};
use crate::storage::{LedgerStore, StorageBackend, WriteBatch};
use crate::{
    ApprovalRecord, ApprovalType, ArtifactRecord, DealGateState, DealId, GateError, GateName,
    MemberId, Ratio, Weight,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard};

// =============================================================================
// INPUT VALIDATION
// =============================================================================

fn validate_id(field: &str, value: &str) -> Result<(), GateError> {
    if value.trim().is_empty() {
        return Err(GateError::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.len() > MAX_ID_LENGTH {
        return Err(GateError::InvalidInput(format!(
            "{} exceeds {} bytes",
            field, MAX_ID_LENGTH
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(GateError::InvalidInput(format!(
            "{} contains control characters",
            field
        )));
    }
    Ok(())
}

fn validate_comment(comment: Option<&str>) -> Result<(), GateError> {
    match comment {
        Some(text) if text.len() > MAX_COMMENT_LENGTH => Err(GateError::InvalidInput(format!(
            "comment exceeds {} bytes",
            MAX_COMMENT_LENGTH
        ))),
        _ => Ok(()),
    }
}

fn validate_artifacts(artifacts: &[String]) -> Result<BTreeSet<String>, GateError> {
    if artifacts.len() > MAX_ASSERTED_ARTIFACTS {
        return Err(GateError::InvalidInput(format!(
            "at most {} artifacts may be asserted at once",
            MAX_ASSERTED_ARTIFACTS
        )));
    }
    let mut names = BTreeSet::new();
    for name in artifacts {
        if name.trim().is_empty() {
            return Err(GateError::InvalidInput(
                "artifact name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_ARTIFACT_NAME_LENGTH {
            return Err(GateError::InvalidInput(format!(
                "artifact name exceeds {} bytes",
                MAX_ARTIFACT_NAME_LENGTH
            )));
        }
        names.insert(name.clone());
    }
    Ok(names)
}

// =============================================================================
// COMPLETION REPORT
// =============================================================================

/// Artifact progress of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactProgress {
    pub required: BTreeSet<String>,
    pub provided: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub satisfied: bool,
}

/// Voting progress of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuorumProgress {
    pub required: bool,
    pub threshold: Ratio,
    pub tally: VoteTally,
    /// Active committee weight (the denominator).
    pub total_weight: Weight,
    /// Approve weight over total weight.
    pub ratio: Ratio,
    pub met: bool,
}

/// Breakdown returned by `check_completion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub deal_id: DealId,
    pub gate: GateName,
    /// `None` when the deal has never been referenced.
    pub current_gate: Option<GateName>,
    pub is_current: bool,
    pub artifacts: ArtifactProgress,
    pub quorum: QuorumProgress,
    /// Current gate, artifacts satisfied, and quorum met when required.
    pub complete: bool,
}

// =============================================================================
// GATE WORKFLOW
// =============================================================================

/// The configuration snapshot a workflow runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Governance {
    pub catalog: GateCatalog,
    pub registry: CommitteeRegistry,
}

/// The gate state machine over a ledger store.
pub struct GateWorkflow<S: LedgerStore = StorageBackend> {
    store: S,
    governance: RwLock<Governance>,
    clock: Arc<dyn Clock>,
    locks: DealLocks,
}

impl<S: LedgerStore> std::fmt::Debug for GateWorkflow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateWorkflow")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl<S: LedgerStore> GateWorkflow<S> {
    /// Create a workflow on the system clock.
    pub fn new(store: S, catalog: GateCatalog, registry: CommitteeRegistry) -> Self {
        Self::with_clock(store, catalog, registry, Arc::new(SystemClock))
    }

    /// Create a workflow with an explicit clock.
    pub fn with_clock(
        store: S,
        catalog: GateCatalog,
        registry: CommitteeRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            governance: RwLock::new(Governance { catalog, registry }),
            clock,
            locks: DealLocks::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The per-deal lock registry.
    pub fn locks(&self) -> &DealLocks {
        &self.locks
    }

    fn snapshot(&self) -> Result<RwLockReadGuard<'_, Governance>, GateError> {
        self.governance
            .read()
            .map_err(|_| GateError::LockPoisoned("governance snapshot"))
    }

    /// A copy of the current configuration snapshot.
    pub fn governance(&self) -> Result<Governance, GateError> {
        Ok(self.snapshot()?.clone())
    }

    /// A copy of the current gate catalog.
    pub fn catalog(&self) -> Result<GateCatalog, GateError> {
        Ok(self.snapshot()?.catalog.clone())
    }

    /// A copy of the current committee registry.
    pub fn registry(&self) -> Result<CommitteeRegistry, GateError> {
        Ok(self.snapshot()?.registry.clone())
    }

    /// Replace the configuration snapshot.
    ///
    /// # Errors
    ///
    /// `GateError::Configuration` if a stored deal sits in a gate the new
    /// catalog does not define. The old snapshot stays in place.
    pub fn reload(&self, catalog: GateCatalog, registry: CommitteeRegistry) -> Result<(), GateError> {
        let mut governance = self
            .governance
            .write()
            .map_err(|_| GateError::LockPoisoned("governance snapshot"))?;

        let orphaned: BTreeSet<GateName> = self
            .store
            .deals()?
            .into_iter()
            .map(|deal| deal.current_gate)
            .filter(|gate| !catalog.contains(gate))
            .collect();
        if !orphaned.is_empty() {
            let names: Vec<_> = orphaned.iter().map(GateName::as_str).collect();
            return Err(GateError::Configuration(format!(
                "new catalog drops gates that hold deals: {}",
                names.join(", ")
            )));
        }

        tracing::info!(
            gates = catalog.len(),
            members = registry.active_count(),
            "governance configuration reloaded"
        );
        *governance = Governance { catalog, registry };
        Ok(())
    }

    /// Load a deal, or stage its creation at the first gate.
    fn load_or_create(
        &self,
        batch: &mut WriteBatch,
        catalog: &GateCatalog,
        deal_id: &DealId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<DealGateState, GateError> {
        if let Some(state) = self.store.deal(deal_id)? {
            return Ok(state);
        }

        let first = catalog.first_gate().name.clone();
        let state = DealGateState::new(deal_id.clone(), first.clone(), now);
        batch.put_deal(state.clone());
        batch.append_audit(AuditEvent {
            deal_id: deal_id.clone(),
            gate: first.clone(),
            actor: actor.to_string(),
            timestamp: now,
            details: AuditDetails::DealCreated {
                initial_gate: first,
            },
        });
        Ok(state)
    }

    /// Explicitly create a deal at the first gate.
    ///
    /// Idempotent: an existing deal is returned unchanged.
    pub fn initialize(&self, deal_id: &DealId, actor: &str) -> Result<DealGateState, GateError> {
        validate_id("deal_id", deal_id.as_str())?;
        validate_id("actor", actor)?;

        let governance = self.snapshot()?;
        let slot = self.locks.slot(deal_id)?;
        let _held = self.locks.hold(deal_id, &slot)?;

        let mut batch = WriteBatch::new();
        let state = self.load_or_create(&mut batch, &governance.catalog, deal_id, actor, self.clock.now())?;
        if !batch.is_empty() {
            self.store.commit(batch)?;
            tracing::info!(deal_id = %deal_id, gate = %state.current_gate, actor, "deal created");
        }
        Ok(state)
    }

    /// Move a deal to the next gate.
    ///
    /// The deal is created at the first gate if this is its first
    /// reference. `target` must be exactly the gate after the current one,
    /// and `artifacts` must cover every required artifact of `target`.
    ///
    /// # Errors
    ///
    /// - `UnknownGate` if `target` is not in the catalog
    /// - `InvalidTransition` if `target` is not the next gate
    /// - `MissingArtifacts` with the exact missing set
    /// - `InvalidInput` for empty or oversized ids, names, or comments
    pub fn advance(
        &self,
        deal_id: &DealId,
        target: &GateName,
        artifacts: &[String],
        actor: &str,
        comment: Option<&str>,
    ) -> Result<DealGateState, GateError> {
        validate_id("deal_id", deal_id.as_str())?;
        validate_id("actor", actor)?;
        validate_comment(comment)?;
        let asserted = validate_artifacts(artifacts)?;

        let governance = self.snapshot()?;
        let catalog = &governance.catalog;
        let definition = catalog.require(target)?;

        let slot = self.locks.slot(deal_id)?;
        let _held = self.locks.hold(deal_id, &slot)?;

        let now = self.clock.now();
        let mut batch = WriteBatch::new();
        let state = self.load_or_create(&mut batch, catalog, deal_id, actor, now)?;

        if !catalog.is_next(&state.current_gate, target) {
            tracing::warn!(
                deal_id = %deal_id,
                from = %state.current_gate,
                to = %target,
                "rejected transition: not the next gate"
            );
            return Err(GateError::InvalidTransition {
                from: state.current_gate,
                to: target.clone(),
            });
        }

        let missing: BTreeSet<String> = definition
            .required_artifacts
            .difference(&asserted)
            .cloned()
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                deal_id = %deal_id,
                gate = %target,
                missing = missing.len(),
                "rejected transition: missing artifacts"
            );
            return Err(GateError::MissingArtifacts {
                gate: target.clone(),
                missing,
            });
        }

        let ledger = ArtifactLedger::new(&self.store, catalog);
        for name in &asserted {
            ledger.record(&mut batch, deal_id, target, name, true, Some(actor), now);
        }

        let from = state.current_gate.clone();
        let mut next = state;
        next.current_gate = target.clone();
        next.last_updated = now;
        batch.put_deal(next.clone());
        batch.append_audit(AuditEvent {
            deal_id: deal_id.clone(),
            gate: target.clone(),
            actor: actor.to_string(),
            timestamp: now,
            details: AuditDetails::GateAdvance {
                from: from.clone(),
                to: target.clone(),
                artifacts: asserted.into_iter().collect(),
                comment: comment.map(str::to_string),
            },
        });

        self.store.commit(batch)?;
        tracing::info!(deal_id = %deal_id, from = %from, to = %target, actor, "gate advanced");
        Ok(next)
    }

    /// Record a member's vote on the deal's current gate.
    ///
    /// `actor` defaults to the member. Resubmission overwrites the member's
    /// previous vote on the same gate.
    ///
    /// # Errors
    ///
    /// `WrongGate` if `gate` is not the deal's current gate.
    pub fn submit_approval(
        &self,
        deal_id: &DealId,
        gate: &GateName,
        member_id: &MemberId,
        approval_type: ApprovalType,
        comment: Option<&str>,
        actor: Option<&str>,
    ) -> Result<ApprovalRecord, GateError> {
        validate_id("deal_id", deal_id.as_str())?;
        validate_id("member_id", member_id.as_str())?;
        validate_comment(comment)?;
        let actor = actor.unwrap_or(member_id.as_str());
        validate_id("actor", actor)?;

        let governance = self.snapshot()?;
        let slot = self.locks.slot(deal_id)?;
        let _held = self.locks.hold(deal_id, &slot)?;

        let now = self.clock.now();
        let mut batch = WriteBatch::new();
        let state = self.load_or_create(&mut batch, &governance.catalog, deal_id, actor, now)?;

        if state.current_gate != *gate {
            tracing::warn!(
                deal_id = %deal_id,
                current = %state.current_gate,
                requested = %gate,
                member_id = %member_id,
                "rejected vote: wrong gate"
            );
            return Err(GateError::WrongGate {
                deal_id: deal_id.clone(),
                current: state.current_gate,
                requested: gate.clone(),
            });
        }

        let ledger = ApprovalLedger::new(&self.store, &governance.catalog, &governance.registry);
        let record = ledger.record_vote(&mut batch, deal_id, gate, member_id, approval_type, comment, now);
        batch.append_audit(AuditEvent {
            deal_id: deal_id.clone(),
            gate: gate.clone(),
            actor: actor.to_string(),
            timestamp: now,
            details: AuditDetails::ApprovalSubmitted {
                member_id: member_id.clone(),
                approval_type,
                voting_weight: record.voting_weight,
                comment: record.comment.clone(),
            },
        });

        self.store.commit(batch)?;
        tracing::info!(
            deal_id = %deal_id,
            gate = %gate,
            member_id = %member_id,
            vote = %approval_type,
            weight = %record.voting_weight,
            "approval recorded"
        );
        Ok(record)
    }

    /// Recompute whether `gate` is satisfied for a deal. Never mutates.
    ///
    /// # Errors
    ///
    /// - `UnknownGate` if `gate` is not in the catalog
    /// - `InvalidInput` for an empty or oversized deal id
    pub fn check_completion(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<CompletionReport, GateError> {
        validate_id("deal_id", deal_id.as_str())?;
        let governance = self.snapshot()?;
        let definition = governance.catalog.require(gate)?;

        let slot = self.locks.slot(deal_id)?;
        let _held = self.locks.hold(deal_id, &slot)?;

        let current_gate = self.store.deal(deal_id)?.map(|s| s.current_gate);
        let is_current = current_gate.as_ref() == Some(gate);

        let artifact_ledger = ArtifactLedger::new(&self.store, &governance.catalog);
        let artifacts = ArtifactProgress {
            required: definition.required_artifacts.clone(),
            provided: artifact_ledger.provided_names(deal_id, gate)?,
            missing: artifact_ledger.missing(deal_id, gate)?,
            satisfied: artifact_ledger.is_satisfied(deal_id, gate)?,
        };

        let approval_ledger =
            ApprovalLedger::new(&self.store, &governance.catalog, &governance.registry);
        let quorum = QuorumProgress {
            required: definition.quorum_required,
            threshold: definition.approval_threshold,
            tally: approval_ledger.tally(deal_id, gate)?,
            total_weight: governance.registry.total_weight(),
            ratio: approval_ledger.approval_ratio(deal_id, gate)?,
            met: approval_ledger.quorum_met(deal_id, gate)?,
        };

        let complete = is_current && artifacts.satisfied && (!quorum.required || quorum.met);
        Ok(CompletionReport {
            deal_id: deal_id.clone(),
            gate: gate.clone(),
            current_gate,
            is_current,
            artifacts,
            quorum,
            complete,
        })
    }

    /// The stored state of a deal.
    pub fn deal_state(&self, deal_id: &DealId) -> Result<Option<DealGateState>, GateError> {
        self.store.deal(deal_id)
    }

    /// Every stored deal, ordered by id.
    pub fn deals(&self) -> Result<Vec<DealGateState>, GateError> {
        self.store.deals()
    }

    /// Votes recorded for a deal's gate, ordered by member id.
    pub fn approvals(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ApprovalRecord>, GateError> {
        self.store.approvals(deal_id, gate)
    }

    /// Artifact rows of a deal's gate, ordered by name.
    pub fn artifacts(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ArtifactRecord>, GateError> {
        self.store.artifacts(deal_id, gate)
    }

    /// Audit entries of one deal, in sequence order.
    pub fn history(&self, deal_id: &DealId) -> Result<Vec<AuditEntry>, GateError> {
        self.store.deal_history(deal_id)
    }

    /// The whole audit trail, in sequence order.
    pub fn audit_trail(&self) -> Result<Vec<AuditEntry>, GateError> {
        self.store.audit_trail()
    }

    /// Deals idle in their current gate for longer than `timeout`, or than
    /// the gate's own timeout when `None`.
    pub fn bottlenecked_deals(
        &self,
        timeout: Option<TimeDelta>,
    ) -> Result<Vec<DealGateState>, GateError> {
        let governance = self.snapshot()?;
        GovernanceMetrics::new(&self.store, &governance.catalog, self.clock.now())
            .bottlenecked_deals(timeout)
    }

    /// Aggregate governance report over `window`.
    pub fn governance_metrics(&self, window: TimeWindow) -> Result<GovernanceReport, GateError> {
        let governance = self.snapshot()?;
        GovernanceMetrics::new(&self.store, &governance.catalog, self.clock.now()).report(window)
    }
}
