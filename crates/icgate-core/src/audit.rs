//! # Audit Trail
//!
//! Append-only record of every accepted state change. Entries are never
//! mutated or deleted; the storage backend assigns each a sequence number
//! at commit time. Rejected operations write nothing.

use crate::{ApprovalType, DealId, GateName, MemberId, Weight};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of state change recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A deal was first referenced and placed at the first gate.
    DealCreated,
    /// A deal moved to the next gate.
    GateAdvance,
    /// A committee member voted on the deal's current gate.
    ApprovalSubmitted,
}

impl AuditAction {
    /// Wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DealCreated => "deal_created",
            AuditAction::GateAdvance => "gate_advance",
            AuditAction::ApprovalSubmitted => "approval_submitted",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action-specific payload of an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDetails {
    DealCreated {
        initial_gate: GateName,
    },
    GateAdvance {
        from: GateName,
        to: GateName,
        artifacts: Vec<String>,
        comment: Option<String>,
    },
    ApprovalSubmitted {
        member_id: MemberId,
        approval_type: ApprovalType,
        voting_weight: Weight,
        comment: Option<String>,
    },
}

impl AuditDetails {
    /// The action this payload belongs to.
    #[must_use]
    pub fn action(&self) -> AuditAction {
        match self {
            AuditDetails::DealCreated { .. } => AuditAction::DealCreated,
            AuditDetails::GateAdvance { .. } => AuditAction::GateAdvance,
            AuditDetails::ApprovalSubmitted { .. } => AuditAction::ApprovalSubmitted,
        }
    }
}

/// An audit record staged in a write batch, before sequencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub deal_id: DealId,
    pub gate: GateName,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub details: AuditDetails,
}

/// A committed audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Commit order across the whole trail, starting at 1.
    pub sequence: u64,
    pub deal_id: DealId,
    pub action: AuditAction,
    pub gate: GateName,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub details: AuditDetails,
}

impl AuditEntry {
    /// Seal a staged event with its sequence number.
    #[must_use]
    pub fn from_event(sequence: u64, event: AuditEvent) -> Self {
        Self {
            sequence,
            deal_id: event.deal_id,
            action: event.details.action(),
            gate: event.gate,
            actor: event.actor,
            timestamp: event.timestamp,
            details: event.details,
        }
    }

    /// Whether this entry marks the deal entering `gate`.
    #[must_use]
    pub fn enters(&self, gate: &GateName) -> bool {
        match &self.details {
            AuditDetails::DealCreated { initial_gate } => initial_gate == gate,
            AuditDetails::GateAdvance { to, .. } => to == gate,
            AuditDetails::ApprovalSubmitted { .. } => false,
        }
    }

    /// Whether this entry marks the deal leaving `gate`.
    #[must_use]
    pub fn leaves(&self, gate: &GateName) -> bool {
        matches!(&self.details, AuditDetails::GateAdvance { from, .. } if from == gate)
    }

    /// Whether the entry falls in the half-open interval `[start, end)`.
    #[must_use]
    pub fn within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.timestamp >= start && self.timestamp < end
    }
}

/// BLAKE3 digest over the postcard encoding of `entries`, in order.
///
/// Two trails have the same digest only if they hold the same entries in
/// the same order, so a stored digest detects later tampering.
#[cfg(feature = "crypto-hash")]
pub fn trail_digest(entries: &[AuditEntry]) -> Result<String, crate::GateError> {
    let mut hasher = blake3::Hasher::new();
    for entry in entries {
        let bytes = postcard::to_allocvec(entry)
            .map_err(|e| crate::GateError::Serialization(e.to_string()))?;
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
