//! # Governance Configuration
//!
//! TOML source for the gate catalog and the committee registry.
//!
//! ```toml
//! [[gates]]
//! name = "Screen"
//! required_artifacts = ["deal_teaser", "screening_memo"]
//! approval_threshold = 0.0
//! quorum_required = false
//! timeout_hours = 168
//!
//! [[committee]]
//! member_id = "alice"
//! display_name = "Alice Chen"
//! role = "chair"
//! voting_weight = "1.5"   # optional, role default otherwise
//! ```
//!
//! Decimals may be written as TOML numbers or as strings. Numbers are read
//! through their shortest decimal rendering, so `0.75` and `"0.75"` load
//! the same fixed-point value. An absent `gates` table selects the built-in
//! catalog; an absent `committee` table yields an empty committee.

use crate::catalog::{GateCatalog, GateDefinition};
use crate::committee::{CommitteeMember, CommitteeRegistry, CommitteeRole};
use crate::{GateError, Ratio, Weight};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A decimal written either as text or as a TOML number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecimalValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl DecimalValue {
    fn to_decimal_string(&self) -> String {
        match self {
            DecimalValue::Text(text) => text.clone(),
            DecimalValue::Integer(value) => value.to_string(),
            DecimalValue::Float(value) => format!("{}", value),
        }
    }

    fn to_ratio(&self) -> Result<Ratio, GateError> {
        self.to_decimal_string().parse()
    }

    fn to_weight(&self) -> Result<Weight, GateError> {
        self.to_decimal_string().parse()
    }
}

/// One `[[gates]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub name: String,
    #[serde(default)]
    pub required_artifacts: Vec<String>,
    #[serde(default = "zero_threshold")]
    pub approval_threshold: DecimalValue,
    #[serde(default)]
    pub quorum_required: bool,
    pub timeout_hours: i64,
}

fn zero_threshold() -> DecimalValue {
    DecimalValue::Integer(0)
}

fn default_active() -> bool {
    true
}

/// One `[[committee]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub member_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: CommitteeRole,
    #[serde(default)]
    pub voting_weight: Option<DecimalValue>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_role() -> CommitteeRole {
    CommitteeRole::Member
}

/// The governance configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub gates: Option<Vec<GateConfig>>,
    #[serde(default)]
    pub committee: Vec<MemberConfig>,
}

impl GovernanceConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, GateError> {
        toml::from_str(text).map_err(|e| GateError::Configuration(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GateError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Build the validated gate catalog.
    pub fn catalog(&self) -> Result<GateCatalog, GateError> {
        let Some(gates) = &self.gates else {
            return GateCatalog::default_ic();
        };

        let mut definitions = Vec::with_capacity(gates.len());
        for gate in gates {
            let timeout = TimeDelta::try_hours(gate.timeout_hours).ok_or_else(|| {
                GateError::Configuration(format!(
                    "gate '{}' timeout of {} hours is out of range",
                    gate.name, gate.timeout_hours
                ))
            })?;
            let threshold = gate.approval_threshold.to_ratio().map_err(|e| {
                GateError::Configuration(format!("gate '{}': {}", gate.name, e))
            })?;
            let mut seen = std::collections::BTreeSet::new();
            for artifact in &gate.required_artifacts {
                if !seen.insert(artifact.as_str()) {
                    return Err(GateError::Configuration(format!(
                        "gate '{}' lists artifact '{}' twice",
                        gate.name, artifact
                    )));
                }
            }
            definitions.push(GateDefinition::new(
                gate.name.clone(),
                gate.required_artifacts.iter().cloned(),
                threshold,
                gate.quorum_required,
                timeout,
            ));
        }
        GateCatalog::from_definitions(definitions)
    }

    /// Build the validated committee registry.
    pub fn registry(&self) -> Result<CommitteeRegistry, GateError> {
        let mut members = Vec::with_capacity(self.committee.len());
        for entry in &self.committee {
            let display_name = entry
                .display_name
                .clone()
                .unwrap_or_else(|| entry.member_id.clone());
            let mut member = CommitteeMember::new(entry.member_id.clone(), display_name, entry.role);
            if let Some(weight) = &entry.voting_weight {
                member = member.with_weight(weight.to_weight()?);
            }
            if !entry.active {
                member = member.inactive();
            }
            members.push(member);
        }
        CommitteeRegistry::new(members)
    }

    /// Both snapshots, validated.
    pub fn into_parts(self) -> Result<(GateCatalog, CommitteeRegistry), GateError> {
        Ok((self.catalog()?, self.registry()?))
    }
}
