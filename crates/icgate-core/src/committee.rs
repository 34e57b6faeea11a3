//! # Committee Registry
//!
//! The voting members of the investment committee and their weights.
//!
//! Weighting convention: a member whose weight is not configured gets the
//! default of their role (chair 1.5, vice-chair 1.25, member 1.0). Only
//! active members count toward the quorum denominator.

use crate::primitives::{CHAIR_VOTING_WEIGHT, DEFAULT_VOTING_WEIGHT, VICE_CHAIR_VOTING_WEIGHT};
use crate::{GateError, MemberId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role of a committee member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitteeRole {
    Chair,
    ViceChair,
    Member,
}

impl CommitteeRole {
    /// Weight used when a member of this role has no configured weight.
    #[must_use]
    pub fn default_weight(&self) -> Weight {
        match self {
            CommitteeRole::Chair => CHAIR_VOTING_WEIGHT,
            CommitteeRole::ViceChair => VICE_CHAIR_VOTING_WEIGHT,
            CommitteeRole::Member => DEFAULT_VOTING_WEIGHT,
        }
    }
}

impl std::fmt::Display for CommitteeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CommitteeRole::Chair => "chair",
            CommitteeRole::ViceChair => "vice_chair",
            CommitteeRole::Member => "member",
        })
    }
}

/// A voting member of the committee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub member_id: MemberId,
    pub display_name: String,
    pub role: CommitteeRole,
    pub voting_weight: Weight,
    pub active: bool,
}

impl CommitteeMember {
    /// An active member carrying the default weight of `role`.
    #[must_use]
    pub fn new(member_id: impl Into<String>, display_name: impl Into<String>, role: CommitteeRole) -> Self {
        Self {
            member_id: MemberId::new(member_id),
            display_name: display_name.into(),
            role,
            voting_weight: role.default_weight(),
            active: true,
        }
    }

    /// Override the voting weight.
    #[must_use]
    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.voting_weight = weight;
        self
    }

    /// Mark the member inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Immutable snapshot of the committee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitteeRegistry {
    members: BTreeMap<MemberId, CommitteeMember>,
}

impl CommitteeRegistry {
    /// Build a registry, validating ids and weights.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Configuration` for empty or duplicate ids, zero
    /// weights, or more than one chair.
    pub fn new(members: Vec<CommitteeMember>) -> Result<Self, GateError> {
        let mut map = BTreeMap::new();
        let mut chairs = 0usize;

        for member in members {
            if member.member_id.as_str().trim().is_empty() {
                return Err(GateError::Configuration(
                    "committee member with empty id".to_string(),
                ));
            }
            if member.voting_weight.is_zero() {
                return Err(GateError::Configuration(format!(
                    "committee member '{}' must have a positive voting weight",
                    member.member_id
                )));
            }
            if member.role == CommitteeRole::Chair {
                chairs = chairs.saturating_add(1);
            }
            if map.contains_key(&member.member_id) {
                return Err(GateError::Configuration(format!(
                    "duplicate committee member '{}'",
                    member.member_id
                )));
            }
            map.insert(member.member_id.clone(), member);
        }

        if chairs > 1 {
            return Err(GateError::Configuration(format!(
                "committee has {} chairs; at most one is allowed",
                chairs
            )));
        }

        Ok(Self { members: map })
    }

    /// Active members keyed by id.
    #[must_use]
    pub fn members(&self) -> BTreeMap<MemberId, &CommitteeMember> {
        self.members
            .iter()
            .filter(|(_, m)| m.active)
            .map(|(id, m)| (id.clone(), m))
            .collect()
    }

    /// Every configured member, active or not.
    pub fn all_members(&self) -> impl Iterator<Item = &CommitteeMember> {
        self.members.values()
    }

    /// Look up a configured member.
    #[must_use]
    pub fn member(&self, member_id: &MemberId) -> Option<&CommitteeMember> {
        self.members.get(member_id)
    }

    /// Whether `member_id` is configured.
    #[must_use]
    pub fn is_registered(&self, member_id: &MemberId) -> bool {
        self.members.contains_key(member_id)
    }

    /// Voting weight of `member_id`.
    ///
    /// Unregistered voters fall back to `DEFAULT_VOTING_WEIGHT`.
    #[must_use]
    pub fn weight(&self, member_id: &MemberId) -> Weight {
        match self.members.get(member_id) {
            Some(member) => member.voting_weight,
            None => {
                tracing::debug!(
                    member_id = %member_id,
                    weight = %DEFAULT_VOTING_WEIGHT,
                    "unregistered voter, applying default weight"
                );
                DEFAULT_VOTING_WEIGHT
            }
        }
    }

    /// Sum of active members' weights: the quorum denominator.
    #[must_use]
    pub fn total_weight(&self) -> Weight {
        self.members
            .values()
            .filter(|m| m.active)
            .map(|m| m.voting_weight)
            .sum()
    }

    /// Number of active members.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.members.values().filter(|m| m.active).count()
    }

    /// The chair, if one is configured.
    #[must_use]
    pub fn chair(&self) -> Option<&CommitteeMember> {
        self.members
            .values()
            .find(|m| m.role == CommitteeRole::Chair)
    }
}
