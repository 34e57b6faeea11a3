//! # Gate Catalog
//!
//! The ordered sequence of governance gates a deal moves through, with the
//! artifacts, quorum rule and advisory timeout of each gate.
//!
//! A catalog is validated once when built and is immutable afterwards.
//! The built-in investment-committee sequence is:
//!
//! | # | Gate   | Quorum | Threshold | Timeout |
//! |---|--------|--------|-----------|---------|
//! | 0 | Screen | no     | 0.0       | 7 days  |
//! | 1 | IOI    | no     | 0.5       | 14 days |
//! | 2 | LOI    | no     | 0.5       | 21 days |
//! | 3 | IC1    | yes    | 0.75      | 14 days |
//! | 4 | IC2    | yes    | 0.75      | 14 days |
//! | 5 | Close  | no     | 0.0       | 30 days |

use crate::{GateError, GateName, Ratio};
use chrono::TimeDelta;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GATE DEFINITION
// =============================================================================

/// Configuration of a single gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDefinition {
    pub name: GateName,
    /// Index in the catalog sequence. Assigned by the catalog.
    pub position: usize,
    pub required_artifacts: BTreeSet<String>,
    pub approval_threshold: Ratio,
    pub quorum_required: bool,
    /// Advisory dwell limit; exceeding it flags the deal as bottlenecked.
    pub timeout: TimeDelta,
}

impl GateDefinition {
    /// Create a gate definition. The position is assigned by the catalog.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        required_artifacts: impl IntoIterator<Item = impl Into<String>>,
        approval_threshold: Ratio,
        quorum_required: bool,
        timeout: TimeDelta,
    ) -> Self {
        Self {
            name: GateName::new(name),
            position: 0,
            required_artifacts: required_artifacts.into_iter().map(Into::into).collect(),
            approval_threshold,
            quorum_required,
            timeout,
        }
    }
}

// =============================================================================
// GATE CATALOG
// =============================================================================

/// The validated, ordered gate sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateCatalog {
    gates: Vec<GateDefinition>,
    index: BTreeMap<GateName, usize>,
}

impl GateCatalog {
    /// Build a catalog from definitions in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Configuration` if the list is empty, a name is
    /// empty or duplicated, a timeout is not positive, or an artifact name
    /// is empty. Thresholds are range-checked by `Ratio` itself.
    pub fn from_definitions(definitions: Vec<GateDefinition>) -> Result<Self, GateError> {
        if definitions.is_empty() {
            return Err(GateError::Configuration(
                "gate catalog must define at least one gate".to_string(),
            ));
        }

        let mut gates = Vec::with_capacity(definitions.len());
        let mut index = BTreeMap::new();

        for (position, mut gate) in definitions.into_iter().enumerate() {
            if gate.name.as_str().trim().is_empty() {
                return Err(GateError::Configuration(format!(
                    "gate at position {} has an empty name",
                    position
                )));
            }
            if index.contains_key(&gate.name) {
                return Err(GateError::Configuration(format!(
                    "duplicate gate name '{}'",
                    gate.name
                )));
            }
            if gate.timeout <= TimeDelta::zero() {
                return Err(GateError::Configuration(format!(
                    "gate '{}' must have a positive timeout",
                    gate.name
                )));
            }
            if gate.approval_threshold > Ratio::ONE {
                return Err(GateError::Configuration(format!(
                    "gate '{}' threshold {} is outside [0, 1]",
                    gate.name, gate.approval_threshold
                )));
            }
            if gate.required_artifacts.iter().any(|a| a.trim().is_empty()) {
                return Err(GateError::Configuration(format!(
                    "gate '{}' lists an empty artifact name",
                    gate.name
                )));
            }

            gate.position = position;
            index.insert(gate.name.clone(), position);
            gates.push(gate);
        }

        Ok(Self { gates, index })
    }

    /// The built-in Screen → IOI → LOI → IC1 → IC2 → Close sequence.
    pub fn default_ic() -> Result<Self, GateError> {
        let gates = vec![
            GateDefinition::new(
                "Screen",
                ["deal_teaser", "screening_memo"],
                Ratio::ZERO,
                false,
                TimeDelta::days(7),
            ),
            GateDefinition::new(
                "IOI",
                [
                    "market_analysis",
                    "preliminary_underwriting",
                    "sponsor_background",
                    "ioi_letter",
                ],
                Ratio::from_basis_points(5_000)?,
                false,
                TimeDelta::days(14),
            ),
            GateDefinition::new(
                "LOI",
                ["loi_draft", "detailed_underwriting", "site_visit_report"],
                Ratio::from_basis_points(5_000)?,
                false,
                TimeDelta::days(21),
            ),
            GateDefinition::new(
                "IC1",
                [
                    "ic1_memo",
                    "financial_model",
                    "market_study",
                    "environmental_phase1",
                ],
                Ratio::from_basis_points(7_500)?,
                true,
                TimeDelta::days(14),
            ),
            GateDefinition::new(
                "IC2",
                [
                    "ic2_memo",
                    "final_financial_model",
                    "legal_review",
                    "financing_term_sheet",
                    "third_party_reports",
                ],
                Ratio::from_basis_points(7_500)?,
                true,
                TimeDelta::days(14),
            ),
            GateDefinition::new(
                "Close",
                ["purchase_agreement", "closing_checklist", "funding_memo"],
                Ratio::ZERO,
                false,
                TimeDelta::days(30),
            ),
        ];
        Self::from_definitions(gates)
    }

    /// Look up a gate definition by name.
    #[must_use]
    pub fn definition(&self, name: &GateName) -> Option<&GateDefinition> {
        self.index.get(name).and_then(|&i| self.gates.get(i))
    }

    /// Look up a gate definition, failing with `UnknownGate`.
    pub fn require(&self, name: &GateName) -> Result<&GateDefinition, GateError> {
        self.definition(name)
            .ok_or_else(|| GateError::UnknownGate(name.clone()))
    }

    /// Gate names in sequence order.
    #[must_use]
    pub fn sequence(&self) -> Vec<GateName> {
        self.gates.iter().map(|g| g.name.clone()).collect()
    }

    /// Iterate definitions in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &GateDefinition> {
        self.gates.iter()
    }

    /// Number of gates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Always false for a validated catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Sequence index of a gate.
    #[must_use]
    pub fn index(&self, name: &GateName) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether the catalog defines `name`.
    #[must_use]
    pub fn contains(&self, name: &GateName) -> bool {
        self.index.contains_key(name)
    }

    /// True iff `index(target) == index(current) + 1`.
    #[must_use]
    pub fn is_next(&self, current: &GateName, target: &GateName) -> bool {
        match (self.index(current), self.index(target)) {
            (Some(c), Some(t)) => c.checked_add(1) == Some(t),
            _ => false,
        }
    }

    /// The gate following `name`, if any.
    #[must_use]
    pub fn next_after(&self, name: &GateName) -> Option<&GateDefinition> {
        let i = self.index(name)?;
        self.gates.get(i.checked_add(1)?)
    }

    /// The initial gate of every deal.
    #[must_use]
    pub fn first_gate(&self) -> &GateDefinition {
        // Non-empty by construction.
        &self.gates[0]
    }

    /// The terminal gate.
    #[must_use]
    pub fn last_gate(&self) -> &GateDefinition {
        &self.gates[self.gates.len() - 1]
    }

    /// Whether `name` is the terminal gate.
    #[must_use]
    pub fn is_terminal(&self, name: &GateName) -> bool {
        self.last_gate().name == *name
    }

    /// Required artifacts of a gate (empty for unknown gates).
    #[must_use]
    pub fn required_artifacts(&self, name: &GateName) -> BTreeSet<String> {
        self.definition(name)
            .map(|g| g.required_artifacts.clone())
            .unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================
