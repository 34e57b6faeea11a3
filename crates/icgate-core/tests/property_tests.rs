//! # Property-Based Tests
//!
//! Invariants of the gate state machine checked with proptest.

use icgate_core::{
    ApprovalType, CommitteeMember, CommitteeRegistry, CommitteeRole, DealId, GateCatalog,
    GateError, GateName, GateWorkflow, MemberId, MemoryLedger, Ratio, Weight,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// HELPERS
// =============================================================================

const MEMBERS: [&str; 5] = ["m1", "m2", "m3", "m4", "m5"];
const VOTES: [ApprovalType; 3] = [
    ApprovalType::Approve,
    ApprovalType::Reject,
    ApprovalType::Abstain,
];

fn workflow() -> GateWorkflow<MemoryLedger> {
    let registry = CommitteeRegistry::new(
        MEMBERS
            .iter()
            .map(|id| CommitteeMember::new(*id, *id, CommitteeRole::Member))
            .collect(),
    )
    .expect("registry");
    GateWorkflow::new(
        MemoryLedger::new(),
        GateCatalog::default_ic().expect("catalog"),
        registry,
    )
}

fn required(wf: &GateWorkflow<MemoryLedger>, gate: &GateName) -> Vec<String> {
    wf.catalog()
        .expect("catalog")
        .required_artifacts(gate)
        .into_iter()
        .collect()
}

fn gate_at(wf: &GateWorkflow<MemoryLedger>, index: usize) -> GateName {
    wf.catalog().expect("catalog").sequence()[index].clone()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Successful advances move the gate index forward by exactly one.
    #[test]
    fn monotonic_gate_index(targets in vec(0usize..6, 1..30)) {
        let wf = workflow();
        let deal = DealId::new("deal");
        let mut index = 0usize;

        for target in targets {
            let gate = gate_at(&wf, target);
            let artifacts = required(&wf, &gate);
            let result = wf.advance(&deal, &gate, &artifacts, "analyst", None);

            if target == index + 1 {
                let state = result.expect("next gate with full artifacts must succeed");
                prop_assert_eq!(state.current_gate, gate);
                index = target;
            } else {
                let is_invalid_transition =
                    matches!(result, Err(GateError::InvalidTransition { .. }));
                prop_assert!(is_invalid_transition);
            }

            let stored = wf.deal_state(&deal).expect("read");
            let stored_index = stored
                .map(|s| wf.catalog().expect("catalog").index(&s.current_gate).expect("known"))
                .unwrap_or(0);
            prop_assert_eq!(stored_index, index);
        }
    }

    /// Advance succeeds iff every required artifact is asserted; otherwise
    /// the error names exactly the difference.
    #[test]
    fn artifact_precondition_is_exact(mask in prop::collection::vec(any::<bool>(), 4)) {
        let wf = workflow();
        let ioi = GateName::new("IOI");
        let all = required(&wf, &ioi);
        prop_assert_eq!(all.len(), 4);

        let asserted: Vec<String> = all
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(name, _)| name.clone())
            .collect();
        let expected_missing: BTreeSet<String> = all
            .iter()
            .filter(|name| !asserted.contains(name))
            .cloned()
            .collect();

        let result = wf.advance(&DealId::new("deal"), &ioi, &asserted, "analyst", None);
        if expected_missing.is_empty() {
            prop_assert!(result.is_ok());
        } else {
            match result {
                Err(GateError::MissingArtifacts { gate, missing }) => {
                    prop_assert_eq!(gate, ioi);
                    prop_assert_eq!(missing, expected_missing);
                }
                other => prop_assert!(false, "expected MissingArtifacts, got {:?}", other),
            }
            prop_assert!(wf.audit_trail().expect("trail").is_empty());
        }
    }

    /// A member has exactly one vote per gate, reflecting the latest call.
    #[test]
    fn vote_resubmission_keeps_latest(
        votes in vec((0usize..5, 0usize..3), 1..40)
    ) {
        let wf = workflow();
        let deal = DealId::new("deal");
        let screen = GateName::new("Screen");
        let mut latest: BTreeMap<MemberId, ApprovalType> = BTreeMap::new();

        for (member, vote) in &votes {
            let member_id = MemberId::new(MEMBERS[*member]);
            wf.submit_approval(&deal, &screen, &member_id, VOTES[*vote], None, None)
                .expect("vote");
            latest.insert(member_id, VOTES[*vote]);
        }

        let rows = wf.approvals(&deal, &screen).expect("rows");
        prop_assert_eq!(rows.len(), latest.len());
        for row in rows {
            prop_assert_eq!(Some(&row.approval_type), latest.get(&row.member_id));
        }
        // One creation entry plus one entry per accepted vote.
        prop_assert_eq!(wf.history(&deal).expect("history").len(), votes.len() + 1);
    }

    /// The quorum comparison is inclusive at the exact boundary.
    #[test]
    fn quorum_boundary_is_inclusive(total in 1u64..5_000_000, bp in 0u32..=10_000) {
        let threshold = Ratio::from_basis_points(bp).expect("ratio");
        let total = Weight::from_milli(total);

        // Smallest approve weight w with w * 10_000 >= bp * total.
        let product = u128::from(bp) * u128::from(total.milli());
        let needed = product.div_ceil(10_000) as u64;

        prop_assert!(threshold.is_met_by(Weight::from_milli(needed), total));
        if needed > 0 {
            prop_assert!(!threshold.is_met_by(Weight::from_milli(needed - 1), total));
        }
    }

    /// Jumping two or more gates ahead always fails, artifacts or not.
    #[test]
    fn no_skip(start in 0usize..4, jump in 2usize..6) {
        let wf = workflow();
        let deal = DealId::new("deal");
        for index in 1..=start {
            let gate = gate_at(&wf, index);
            let artifacts = required(&wf, &gate);
            wf.advance(&deal, &gate, &artifacts, "analyst", None).expect("walk");
        }

        let target_index = start + jump;
        prop_assume!(target_index < 6);
        let target = gate_at(&wf, target_index);
        let artifacts = required(&wf, &target);
        let result = wf.advance(&deal, &target, &artifacts, "analyst", None);
        let is_invalid_transition = matches!(result, Err(GateError::InvalidTransition { .. }));
        prop_assert!(is_invalid_transition);
    }
}
