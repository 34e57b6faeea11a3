//! # Governance Metrics
//!
//! Read-side derivations over the audit trail and the deal table:
//! - Bottlenecked deals (idle past a timeout)
//! - Average dwell time per gate
//! - Activity count per gate
//! - Approval velocity (gate entry to vote)
//!
//! Metrics never write and never force a transition; a bottleneck is
//! advisory only.
//!
//! ## Dwell Time
//!
//! For one deal, a dwell sample is the time between the entry that brings
//! the deal into a gate (`deal_created` or a `gate_advance` whose `to` is
//! the gate) and the following `gate_advance` whose `from` is the gate.
//! Both entries must fall inside the window. A gate with no such pair
//! reports no data rather than zero.

use crate::audit::{AuditDetails, AuditEntry};
use crate::catalog::GateCatalog;
use crate::storage::LedgerStore;
use crate::{DealGateState, DealId, GateError, GateName};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// TIME WINDOW
// =============================================================================

/// Half-open reporting interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// A window from `start` to `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, GateError> {
        if start > end {
            return Err(GateError::InvalidInput(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The `span` leading up to `end`.
    #[must_use]
    pub fn trailing(end: DateTime<Utc>, span: TimeDelta) -> Self {
        let start = end
            .checked_sub_signed(span)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    /// Every representable instant.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Whether `entry` falls inside the window.
    #[must_use]
    pub fn contains(&self, entry: &AuditEntry) -> bool {
        entry.within(self.start, self.end)
    }
}

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Per-gate slice of a governance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateMetrics {
    pub gate: GateName,
    /// Deals currently sitting in the gate.
    pub deals_in_gate: usize,
    /// Audit entries on the gate inside the window.
    pub activity_count: usize,
    /// Advances into the gate inside the window.
    pub advances: usize,
    /// Votes on the gate inside the window.
    pub approvals: usize,
    /// `None` when no complete dwell falls inside the window.
    pub average_dwell_secs: Option<i64>,
    /// Deals in the gate past its timeout.
    pub bottlenecked: usize,
}

/// Aggregate report over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceReport {
    pub window: TimeWindow,
    pub generated_at: DateTime<Utc>,
    pub total_deals: usize,
    pub total_activity: usize,
    /// Mean time from gate entry to a vote on that gate.
    pub approval_velocity_secs: Option<i64>,
    pub gates: Vec<GateMetrics>,
    pub bottlenecked_deals: Vec<DealGateState>,
}

// =============================================================================
// DERIVATIONS
// =============================================================================

fn by_deal(trail: &[AuditEntry]) -> BTreeMap<&DealId, Vec<&AuditEntry>> {
    let mut grouped: BTreeMap<&DealId, Vec<&AuditEntry>> = BTreeMap::new();
    for entry in trail {
        grouped.entry(&entry.deal_id).or_default().push(entry);
    }
    grouped
}

fn mean(samples: &[TimeDelta]) -> Option<TimeDelta> {
    if samples.is_empty() {
        return None;
    }
    let total = samples
        .iter()
        .fold(0i64, |acc, d| acc.saturating_add(d.num_milliseconds()));
    Some(TimeDelta::milliseconds(total / samples.len() as i64))
}

fn dwell_samples(trail: &[AuditEntry], gate: &GateName, window: &TimeWindow) -> Vec<TimeDelta> {
    let mut samples = Vec::new();
    for entries in by_deal(trail).values() {
        let mut entered: Option<&AuditEntry> = None;
        for &entry in entries {
            if entry.leaves(gate) {
                if let Some(start) = entered.take() {
                    if window.contains(start) && window.contains(entry) {
                        samples.push(entry.timestamp - start.timestamp);
                    }
                }
            }
            if entry.enters(gate) {
                entered = Some(entry);
            }
        }
    }
    samples
}

fn velocity_samples(trail: &[AuditEntry], window: &TimeWindow) -> Vec<TimeDelta> {
    let mut samples = Vec::new();
    for entries in by_deal(trail).values() {
        let mut entered_at: BTreeMap<&GateName, DateTime<Utc>> = BTreeMap::new();
        for &entry in entries {
            match &entry.details {
                AuditDetails::DealCreated { initial_gate } => {
                    entered_at.insert(initial_gate, entry.timestamp);
                }
                AuditDetails::GateAdvance { to, .. } => {
                    entered_at.insert(to, entry.timestamp);
                }
                AuditDetails::ApprovalSubmitted { .. } => {
                    if let Some(since) = entered_at.get(&entry.gate) {
                        if window.contains(entry) {
                            samples.push(entry.timestamp - *since);
                        }
                    }
                }
            }
        }
    }
    samples
}

// =============================================================================
// GOVERNANCE METRICS
// =============================================================================

/// Metrics view over a store, evaluated at a fixed `now`.
#[derive(Debug)]
pub struct GovernanceMetrics<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    catalog: &'a GateCatalog,
    now: DateTime<Utc>,
}

impl<'a, S: LedgerStore + ?Sized> GovernanceMetrics<'a, S> {
    /// Create a view.
    #[must_use]
    pub fn new(store: &'a S, catalog: &'a GateCatalog, now: DateTime<Utc>) -> Self {
        Self {
            store,
            catalog,
            now,
        }
    }

    fn is_bottlenecked(&self, deal: &DealGateState, timeout: Option<TimeDelta>) -> bool {
        if self.catalog.is_terminal(&deal.current_gate) {
            return false;
        }
        let limit = match timeout {
            Some(limit) => limit,
            None => match self.catalog.definition(&deal.current_gate) {
                Some(definition) => definition.timeout,
                None => return false,
            },
        };
        match self.now.checked_sub_signed(limit) {
            Some(cutoff) => deal.last_updated < cutoff,
            None => false,
        }
    }

    /// Deals whose `last_updated` is older than `now - timeout`.
    ///
    /// With `None`, each deal is measured against its current gate's own
    /// timeout. Deals in the terminal gate are never reported.
    pub fn bottlenecked_deals(
        &self,
        timeout: Option<TimeDelta>,
    ) -> Result<Vec<DealGateState>, GateError> {
        Ok(self
            .store
            .deals()?
            .into_iter()
            .filter(|deal| self.is_bottlenecked(deal, timeout))
            .collect())
    }

    /// Average dwell time in `gate`, or `None` without data.
    pub fn gate_dwell_times(
        &self,
        gate: &GateName,
        window: &TimeWindow,
    ) -> Result<Option<TimeDelta>, GateError> {
        let trail = self.store.audit_trail()?;
        Ok(mean(&dwell_samples(&trail, gate, window)))
    }

    /// Audit entries on `gate` inside the window, of any action.
    pub fn activity_count(&self, gate: &GateName, window: &TimeWindow) -> Result<usize, GateError> {
        Ok(self
            .store
            .audit_trail()?
            .iter()
            .filter(|entry| entry.gate == *gate && window.contains(entry))
            .count())
    }

    /// Mean time from a deal entering a gate to each vote on that gate.
    pub fn approval_velocity(&self, window: &TimeWindow) -> Result<Option<TimeDelta>, GateError> {
        let trail = self.store.audit_trail()?;
        Ok(mean(&velocity_samples(&trail, window)))
    }

    /// Full report over `window`. Reads the trail and deal table once.
    pub fn report(&self, window: TimeWindow) -> Result<GovernanceReport, GateError> {
        let trail = self.store.audit_trail()?;
        let deals = self.store.deals()?;
        let bottlenecked_deals: Vec<DealGateState> = deals
            .iter()
            .filter(|deal| self.is_bottlenecked(deal, None))
            .cloned()
            .collect();

        let in_window: Vec<&AuditEntry> = trail.iter().filter(|e| window.contains(e)).collect();

        let gates = self
            .catalog
            .iter()
            .map(|definition| {
                let gate = &definition.name;
                let on_gate = || in_window.iter().filter(move |e| e.gate == *gate);
                GateMetrics {
                    gate: gate.clone(),
                    deals_in_gate: deals.iter().filter(|d| d.current_gate == *gate).count(),
                    activity_count: on_gate().count(),
                    advances: on_gate()
                        .filter(|e| matches!(e.details, AuditDetails::GateAdvance { .. }))
                        .count(),
                    approvals: on_gate()
                        .filter(|e| matches!(e.details, AuditDetails::ApprovalSubmitted { .. }))
                        .count(),
                    average_dwell_secs: mean(&dwell_samples(&trail, gate, &window))
                        .map(|d| d.num_seconds()),
                    bottlenecked: bottlenecked_deals
                        .iter()
                        .filter(|d| d.current_gate == *gate)
                        .count(),
                }
            })
            .collect();

        Ok(GovernanceReport {
            window,
            generated_at: self.now,
            total_deals: deals.len(),
            total_activity: in_window.len(),
            approval_velocity_secs: mean(&velocity_samples(&trail, &window))
                .map(|d| d.num_seconds()),
            gates,
            bottlenecked_deals,
        })
    }
}
