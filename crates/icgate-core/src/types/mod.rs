//! # Core Type Definitions
//!
//! This module contains the shared types of the IC gate workflow:
//! - Identifiers (`DealId`, `MemberId`, `GateName`)
//! - Fixed-point quantities (`Weight`, `Ratio`)
//! - Ledger rows (`DealGateState`, `ArtifactRecord`, `ApprovalRecord`)
//! - Vote values (`ApprovalType`)
//! - Error types (`GateError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use checked or saturating arithmetic for sums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a deal moving through the gate sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

impl DealId {
    /// Create a new deal id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a committee member (voter).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl MemberId {
    /// Create a new member id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a gate in the catalog ("Screen", "IOI", ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GateName(pub String);

impl GateName {
    /// Create a new gate name.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GateName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// FIXED-POINT QUANTITIES
// =============================================================================

/// Parse a non-negative decimal string into a fixed-point integer with
/// `frac_digits` fractional digits. Trailing zeros past the precision are
/// accepted; any other excess precision is rejected.
pub(crate) fn parse_fixed(text: &str, frac_digits: usize) -> Option<u64> {
    let text = text.trim();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let frac_part = if frac_part.len() > frac_digits {
        let (kept, rest) = frac_part.split_at(frac_digits);
        if !rest.bytes().all(|b| b == b'0') {
            return None;
        }
        kept
    } else {
        frac_part
    };

    let scale = 10u64.checked_pow(frac_digits as u32)?;
    let int_value: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut frac_value: u64 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().ok()?
    };
    for _ in frac_part.len()..frac_digits {
        frac_value = frac_value.checked_mul(10)?;
    }

    int_value.checked_mul(scale)?.checked_add(frac_value)
}

/// Render a fixed-point integer as a decimal, keeping at least one
/// fractional digit ("1.0", "0.75").
fn format_fixed(value: u64, frac_digits: usize) -> String {
    let scale = 10u64.pow(frac_digits as u32);
    let frac = format!("{:0width$}", value % scale, width = frac_digits);
    let trimmed = frac.trim_end_matches('0');
    let frac = if trimmed.is_empty() { "0" } else { trimmed };
    format!("{}.{}", value / scale, frac)
}

/// A voting weight in thousandths (`Weight::ONE` == 1.0).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Weight(pub u64);

impl Weight {
    /// Number of fractional decimal digits carried.
    pub const FRACTION_DIGITS: usize = 3;
    /// Units per 1.0.
    pub const SCALE: u64 = 1000;
    /// Weight of exactly 1.0.
    pub const ONE: Weight = Weight(Self::SCALE);
    /// Zero weight.
    pub const ZERO: Weight = Weight(0);

    /// Create a weight from thousandths.
    #[must_use]
    pub const fn from_milli(milli: u64) -> Self {
        Self(milli)
    }

    /// Raw value in thousandths.
    #[must_use]
    pub const fn milli(self) -> u64 {
        self.0
    }

    /// Saturating sum of two weights.
    #[must_use]
    pub const fn saturating_add(self, other: Weight) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Whether the weight is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Weight {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s, Self::FRACTION_DIGITS)
            .map(Self)
            .ok_or_else(|| GateError::Configuration(format!("invalid voting weight '{}'", s)))
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0, Self::FRACTION_DIGITS))
    }
}

impl std::iter::Sum for Weight {
    fn sum<I: Iterator<Item = Weight>>(iter: I) -> Self {
        iter.fold(Weight::ZERO, Weight::saturating_add)
    }
}

/// A fraction in `[0, 1]` stored as basis points (`Ratio::ONE` == 10_000).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Ratio(pub u32);

impl Ratio {
    /// Number of fractional decimal digits carried.
    pub const FRACTION_DIGITS: usize = 4;
    /// Basis points per 1.0.
    pub const SCALE: u32 = 10_000;
    /// The ratio 1.0.
    pub const ONE: Ratio = Ratio(Self::SCALE);
    /// The ratio 0.0.
    pub const ZERO: Ratio = Ratio(0);

    /// Create a ratio from basis points, rejecting values above 1.0.
    pub fn from_basis_points(bp: u32) -> Result<Self, GateError> {
        if bp > Self::SCALE {
            return Err(GateError::Configuration(format!(
                "ratio {} basis points exceeds 1.0",
                bp
            )));
        }
        Ok(Self(bp))
    }

    /// Raw value in basis points.
    #[must_use]
    pub const fn basis_points(self) -> u32 {
        self.0
    }

    /// The ratio `part / whole`, rounded down and clamped to 1.0.
    /// A zero `whole` yields zero.
    #[must_use]
    pub fn of(part: Weight, whole: Weight) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        let bp = (part.milli() as u128).saturating_mul(Self::SCALE as u128) / whole.milli() as u128;
        Self(bp.min(Self::SCALE as u128) as u32)
    }

    /// Whether `part / whole >= self`, evaluated exactly in integers.
    /// A zero `whole` is never satisfied.
    #[must_use]
    pub fn is_met_by(self, part: Weight, whole: Weight) -> bool {
        if whole.is_zero() {
            return false;
        }
        let lhs = (part.milli() as u128).saturating_mul(Self::SCALE as u128);
        let rhs = (self.0 as u128).saturating_mul(whole.milli() as u128);
        lhs >= rhs
    }
}

impl FromStr for Ratio {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bp = parse_fixed(s, Self::FRACTION_DIGITS)
            .ok_or_else(|| GateError::Configuration(format!("invalid ratio '{}'", s)))?;
        let bp = u32::try_from(bp)
            .map_err(|_| GateError::Configuration(format!("ratio '{}' out of range", s)))?;
        Self::from_basis_points(bp)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0 as u64, Self::FRACTION_DIGITS))
    }
}

// =============================================================================
// VOTES
// =============================================================================

/// A committee member's vote on a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    Approve,
    Reject,
    Abstain,
}

impl ApprovalType {
    /// Wire name of the vote.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalType::Approve => "approve",
            ApprovalType::Reject => "reject",
            ApprovalType::Abstain => "abstain",
        }
    }
}

impl FromStr for ApprovalType {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ApprovalType::Approve),
            "reject" => Ok(ApprovalType::Reject),
            "abstain" => Ok(ApprovalType::Abstain),
            _ => Err(GateError::InvalidApprovalType(s.to_string())),
        }
    }
}

impl fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LEDGER ROWS
// =============================================================================

/// The gate position of one deal. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealGateState {
    pub deal_id: DealId,
    pub current_gate: GateName,
    /// When the deal entered the workflow.
    pub entered_at: DateTime<Utc>,
    /// When the deal last changed gate (or was created).
    pub last_updated: DateTime<Utc>,
}

impl DealGateState {
    /// A deal freshly placed at `first_gate`.
    #[must_use]
    pub fn new(deal_id: DealId, first_gate: GateName, now: DateTime<Utc>) -> Self {
        Self {
            deal_id,
            current_gate: first_gate,
            entered_at: now,
            last_updated: now,
        }
    }
}

/// Whether one artifact of one gate has been supplied.
/// Keyed by `(deal_id, gate, artifact_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub deal_id: DealId,
    pub gate: GateName,
    pub artifact_name: String,
    pub required: bool,
    pub provided: bool,
    pub provided_by: Option<String>,
    pub provided_at: Option<DateTime<Utc>>,
}

/// A member's latest vote on a gate. Keyed by `(deal_id, gate, member_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub deal_id: DealId,
    pub gate: GateName,
    pub member_id: MemberId,
    pub approval_type: ApprovalType,
    /// Weight snapshot at vote time.
    pub voting_weight: Weight,
    pub comment: Option<String>,
    pub voted_at: DateTime<Utc>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Errors that can occur in the gate workflow.
///
/// All workflow errors are deterministic and input-driven; the core never
/// retries. A rejected operation leaves every ledger untouched.
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed gate catalog or committee configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The target gate is not exactly the next gate after the current one.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: GateName, to: GateName },

    /// The advance did not assert every required artifact.
    #[error("Missing artifacts for gate {gate}: {}", join_names(.missing))]
    MissingArtifacts {
        gate: GateName,
        missing: BTreeSet<String>,
    },

    /// A vote targeted a gate the deal is not currently in.
    #[error("Wrong gate: deal {deal_id} is in {current}, not {requested}")]
    WrongGate {
        deal_id: DealId,
        current: GateName,
        requested: GateName,
    },

    /// A vote value outside approve/reject/abstain.
    #[error("Invalid approval type: {0}")]
    InvalidApprovalType(String),

    /// The gate name is not in the catalog.
    #[error("Unknown gate: {0}")]
    UnknownGate(GateName),

    /// An identifier, name, or comment failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A lock was poisoned by a panicking holder.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl GateError {
    /// Stable kind name, for machine-readable output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Configuration(_) => "configuration_error",
            GateError::InvalidTransition { .. } => "invalid_transition",
            GateError::MissingArtifacts { .. } => "missing_artifacts",
            GateError::WrongGate { .. } => "wrong_gate",
            GateError::InvalidApprovalType(_) => "invalid_approval_type",
            GateError::UnknownGate(_) => "unknown_gate",
            GateError::InvalidInput(_) => "invalid_input",
            GateError::Storage(_) => "storage_error",
            GateError::Serialization(_) => "serialization_error",
            GateError::LockPoisoned(_) => "lock_poisoned",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
