//! # Workflow Tier Tests (T0-T4)
//!
//! If ANY tier fails, the workflow is INVALID.
//!
//! ## Tiers
//! - T0: Configuration Integrity
//! - T1: Gate Transitions
//! - T2: Weighted Voting
//! - T3: Atomicity and Concurrency
//! - T4: Audit and Metrics

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use icgate_core::{
    ApprovalLedger, ApprovalType, ArtifactLedger, AuditAction, AuditDetails, CommitteeMember,
    CommitteeRegistry, CommitteeRole, DealId, GateCatalog, GateError, GateName, GateWorkflow,
    GovernanceConfig, LedgerStore, ManualClock, MemberId, MemoryLedger, StorageBackend,
    TimeWindow,
};
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0)
        .single()
        .expect("date")
}

fn five_members() -> CommitteeRegistry {
    CommitteeRegistry::new(
        ["m1", "m2", "m3", "m4", "m5"]
            .into_iter()
            .map(|id| CommitteeMember::new(id, id, CommitteeRole::Member))
            .collect(),
    )
    .expect("registry")
}

fn workflow_on<S: LedgerStore>(store: S) -> (GateWorkflow<S>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let wf = GateWorkflow::with_clock(
        store,
        GateCatalog::default_ic().expect("catalog"),
        five_members(),
        clock.clone(),
    );
    (wf, clock)
}

fn workflow() -> (GateWorkflow<MemoryLedger>, Arc<ManualClock>) {
    workflow_on(MemoryLedger::new())
}

fn artifacts_for<S: LedgerStore>(wf: &GateWorkflow<S>, gate: &str) -> Vec<String> {
    wf.catalog()
        .expect("catalog")
        .required_artifacts(&GateName::new(gate))
        .into_iter()
        .collect()
}

/// Advance `deal` through every gate up to and including `last`.
fn walk_to<S: LedgerStore>(wf: &GateWorkflow<S>, deal: &DealId, last: &str) {
    for gate in wf.catalog().expect("catalog").sequence().iter().skip(1) {
        let artifacts = artifacts_for(wf, gate.as_str());
        wf.advance(deal, gate, &artifacts, "analyst", None)
            .expect("walk");
        if gate.as_str() == last {
            return;
        }
    }
}

// =============================================================================
// TIER T0: CONFIGURATION INTEGRITY
// =============================================================================

mod t0_configuration {
    use super::*;

    /// T0.1: The built-in sequence is Screen → IOI → LOI → IC1 → IC2 → Close.
    #[test]
    fn builtin_sequence() {
        let catalog = GateCatalog::default_ic().expect("catalog");
        let names: Vec<String> = catalog.sequence().into_iter().map(|g| g.0).collect();
        assert_eq!(names, ["Screen", "IOI", "LOI", "IC1", "IC2", "Close"]);
        assert_eq!(catalog.first_gate().name.as_str(), "Screen");
        assert!(catalog.is_terminal(&GateName::new("Close")));
    }

    /// T0.2: IOI needs four artifacts, IC1 needs a 0.75 quorum.
    #[test]
    fn builtin_gate_rules() {
        let catalog = GateCatalog::default_ic().expect("catalog");
        assert_eq!(catalog.required_artifacts(&GateName::new("IOI")).len(), 4);
        let ic1 = catalog.require(&GateName::new("IC1")).expect("IC1");
        assert!(ic1.quorum_required);
        assert_eq!(ic1.approval_threshold.basis_points(), 7500);
    }

    /// T0.3: A TOML configuration drives the workflow.
    #[test]
    fn toml_configuration() {
        let config = GovernanceConfig::from_toml_str(
            r#"
[[gates]]
name = "Intake"
timeout_hours = 24

[[gates]]
name = "Approval"
required_artifacts = ["memo"]
approval_threshold = "0.5"
quorum_required = true
timeout_hours = 72

[[committee]]
member_id = "chair"
role = "chair"
"#,
        )
        .expect("parse");
        let (catalog, registry) = config.into_parts().expect("parts");
        let wf = GateWorkflow::new(MemoryLedger::new(), catalog, registry);

        let deal = DealId::new("cfg-1");
        let state = wf
            .advance(&deal, &"Approval".into(), &["memo".to_string()], "a", None)
            .expect("advance");
        assert_eq!(state.current_gate.as_str(), "Approval");
        assert!(wf.check_completion(&deal, &"Approval".into()).expect("check").artifacts.satisfied);
    }
}

// =============================================================================
// TIER T1: GATE TRANSITIONS
// =============================================================================

mod t1_transitions {
    use super::*;

    /// T1.1: Fresh deal advances to IOI, then a skip to IC1 fails.
    #[test]
    fn advance_then_skip_fails() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");

        let state = wf
            .advance(&deal, &"IOI".into(), &artifacts_for(&wf, "IOI"), "analyst", None)
            .expect("advance");
        assert_eq!(state.current_gate.as_str(), "IOI");

        let result = wf.advance(&deal, &"IC1".into(), &artifacts_for(&wf, "IC1"), "analyst", None);
        assert!(matches!(
            result,
            Err(GateError::InvalidTransition { ref from, ref to })
                if from.as_str() == "IOI" && to.as_str() == "IC1"
        ));
        assert_eq!(
            wf.deal_state(&deal).expect("read").expect("deal").current_gate.as_str(),
            "IOI"
        );
    }

    /// T1.2: Moving backward or staying put is rejected.
    #[test]
    fn backward_rejected() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");
        walk_to(&wf, &deal, "LOI");

        for target in ["Screen", "IOI", "LOI"] {
            let result = wf.advance(&deal, &target.into(), &artifacts_for(&wf, target), "a", None);
            assert!(matches!(result, Err(GateError::InvalidTransition { .. })));
        }
    }

    /// T1.3: A deal walks the whole sequence and stops at Close.
    #[test]
    fn full_walk_to_terminal() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");
        walk_to(&wf, &deal, "Close");

        let state = wf.deal_state(&deal).expect("read").expect("deal");
        assert_eq!(state.current_gate.as_str(), "Close");

        let advances = wf
            .history(&deal)
            .expect("history")
            .iter()
            .filter(|e| e.action == AuditAction::GateAdvance)
            .count();
        assert_eq!(advances, 5);
    }

    /// T1.4: Extra asserted artifacts are recorded as not required.
    #[test]
    fn extra_artifacts_recorded() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");
        let mut artifacts = artifacts_for(&wf, "IOI");
        artifacts.push("broker_call_notes".to_string());
        wf.advance(&deal, &"IOI".into(), &artifacts, "analyst", None)
            .expect("advance");

        let rows = wf.artifacts(&deal, &"IOI".into()).expect("rows");
        assert_eq!(rows.len(), 5);
        let extra = rows
            .iter()
            .find(|r| r.artifact_name == "broker_call_notes")
            .expect("extra row");
        assert!(extra.provided && !extra.required);
        assert!(rows.iter().all(|r| r.provided_by.as_deref() == Some("analyst")));
    }
}

// =============================================================================
// TIER T2: WEIGHTED VOTING
// =============================================================================

mod t2_voting {
    use super::*;

    fn deal_at_ic1(wf: &GateWorkflow<MemoryLedger>) -> DealId {
        let deal = DealId::new("deal-ic1");
        walk_to(wf, &deal, "IC1");
        deal
    }

    /// T2.1: Four of five equal votes meet a 0.75 quorum.
    #[test]
    fn four_of_five_complete() {
        let (wf, _) = workflow();
        let deal = deal_at_ic1(&wf);
        let ic1 = GateName::new("IC1");

        for member in ["m1", "m2", "m3", "m4"] {
            wf.submit_approval(&deal, &ic1, &MemberId::new(member), ApprovalType::Approve, None, None)
                .expect("vote");
        }
        let report = wf.check_completion(&deal, &ic1).expect("check");
        assert!(report.quorum.met);
        assert_eq!(report.quorum.ratio.basis_points(), 8000);
        assert!(report.complete);
    }

    /// T2.1b: The completion report agrees with the ledger views.
    #[test]
    fn report_matches_ledger_views() {
        let (wf, _) = workflow();
        let deal = deal_at_ic1(&wf);
        let ic1 = GateName::new("IC1");
        for (member, vote) in [
            ("m1", ApprovalType::Approve),
            ("m2", ApprovalType::Approve),
            ("m3", ApprovalType::Abstain),
        ] {
            wf.submit_approval(&deal, &ic1, &MemberId::new(member), vote, None, None)
                .expect("vote");
        }

        let catalog = wf.catalog().expect("catalog");
        let registry = wf.registry().expect("registry");
        let approvals = ApprovalLedger::new(wf.store(), &catalog, &registry);
        let artifacts = ArtifactLedger::new(wf.store(), &catalog);
        let report = wf.check_completion(&deal, &ic1).expect("check");

        assert_eq!(report.quorum.tally, approvals.tally(&deal, &ic1).expect("tally"));
        assert_eq!(report.quorum.ratio, approvals.approval_ratio(&deal, &ic1).expect("ratio"));
        assert_eq!(report.quorum.ratio.basis_points(), 4000);
        assert_eq!(report.quorum.met, approvals.quorum_met(&deal, &ic1).expect("quorum"));
        assert!(!report.quorum.met);
        assert_eq!(report.artifacts.missing, artifacts.missing(&deal, &ic1).expect("missing"));
        assert_eq!(
            report.artifacts.satisfied,
            artifacts.is_satisfied(&deal, &ic1).expect("satisfied")
        );
        assert!(report.artifacts.satisfied);
    }

    /// T2.2: Three of five fall short.
    #[test]
    fn three_of_five_incomplete() {
        let (wf, _) = workflow();
        let deal = deal_at_ic1(&wf);
        let ic1 = GateName::new("IC1");

        for member in ["m1", "m2", "m3"] {
            wf.submit_approval(&deal, &ic1, &MemberId::new(member), ApprovalType::Approve, None, None)
                .expect("vote");
        }
        wf.submit_approval(&deal, &ic1, &MemberId::new("m4"), ApprovalType::Reject, Some("pricing"), None)
            .expect("vote");

        let report = wf.check_completion(&deal, &ic1).expect("check");
        assert!(report.artifacts.satisfied);
        assert!(!report.quorum.met);
        assert_eq!(report.quorum.tally.reject.milli(), 1000);
        assert!(!report.complete);
    }

    /// T2.3: A vote for LOI while the deal sits in IOI is WrongGate.
    #[test]
    fn vote_on_future_gate_is_wrong_gate() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");
        walk_to(&wf, &deal, "IOI");

        let result = wf.submit_approval(&deal, &"LOI".into(), &MemberId::new("m1"), ApprovalType::Approve, None, None);
        assert!(matches!(
            result,
            Err(GateError::WrongGate { ref current, ref requested, .. })
                if current.as_str() == "IOI" && requested.as_str() == "LOI"
        ));
    }

    /// T2.4: Votes for a gate the deal has left are WrongGate too.
    #[test]
    fn vote_on_past_gate_is_wrong_gate() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");
        walk_to(&wf, &deal, "LOI");

        let result = wf.submit_approval(&deal, &"IOI".into(), &MemberId::new("m1"), ApprovalType::Approve, None, None);
        assert!(matches!(result, Err(GateError::WrongGate { .. })));
    }

    /// T2.5: Unregistered voters count with weight 1.0 in the numerator only.
    #[test]
    fn unregistered_voter_default_weight() {
        let (wf, _) = workflow();
        let deal = deal_at_ic1(&wf);
        let ic1 = GateName::new("IC1");

        let record = wf
            .submit_approval(&deal, &ic1, &MemberId::new("guest"), ApprovalType::Approve, None, Some("ops"))
            .expect("vote");
        assert_eq!(record.voting_weight.milli(), 1000);

        let report = wf.check_completion(&deal, &ic1).expect("check");
        assert_eq!(report.quorum.total_weight.milli(), 5000);
        assert_eq!(report.quorum.tally.approve.milli(), 1000);

        let last = wf.history(&deal).expect("history").pop().expect("entry");
        assert_eq!(last.actor, "ops");
    }
}

// =============================================================================
// TIER T3: ATOMICITY AND CONCURRENCY
// =============================================================================

mod t3_atomicity {
    use super::*;

    /// T3.1: Rejected operations write no audit entry.
    #[test]
    fn rejections_leave_audit_untouched() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-1");
        walk_to(&wf, &deal, "IOI");
        let before = wf.audit_trail().expect("trail");

        let _ = wf.advance(&deal, &"IC1".into(), &[], "a", None);
        let _ = wf.advance(&deal, &"LOI".into(), &["loi_draft".to_string()], "a", None);
        let _ = wf.submit_approval(&deal, &"Close".into(), &MemberId::new("m1"), ApprovalType::Approve, None, None);

        assert_eq!(wf.audit_trail().expect("trail"), before);
        assert!(wf.artifacts(&deal, &"LOI".into()).expect("rows").is_empty());
    }

    /// T3.2: Concurrent advances of one deal: exactly one wins.
    #[test]
    fn concurrent_advance_single_winner() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-race");
        wf.initialize(&deal, "ops").expect("init");
        let artifacts = artifacts_for(&wf, "IOI");

        let wins = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (wf, deal, artifacts) = (&wf, &deal, &artifacts);
                    scope.spawn(move || {
                        wf.advance(deal, &"IOI".into(), artifacts, &format!("agent-{i}"), None)
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread"))
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(wins, 1);
        let advances = wf
            .history(&deal)
            .expect("history")
            .iter()
            .filter(|e| e.action == AuditAction::GateAdvance)
            .count();
        assert_eq!(advances, 1);
    }

    /// T3.2b: Concurrent advances to different gates never skip. The
    /// advance to LOI only succeeds when it observes the committed IOI
    /// state; otherwise it fails against the stale current gate.
    #[test]
    fn concurrent_advance_to_different_gates() {
        let (wf, _) = workflow();
        let ioi = artifacts_for(&wf, "IOI");
        let loi = artifacts_for(&wf, "LOI");

        for round in 0..16 {
            let deal = DealId::new(format!("deal-split-{round}"));
            wf.initialize(&deal, "ops").expect("init");

            let results = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|i| {
                        let (wf, deal) = (&wf, &deal);
                        let (target, artifacts) =
                            if i % 2 == 0 { ("IOI", &ioi) } else { ("LOI", &loi) };
                        scope.spawn(move || {
                            (target, wf.advance(deal, &target.into(), artifacts, "agent", None))
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().expect("thread"))
                    .collect::<Vec<_>>()
            });

            let ioi_wins = results.iter().filter(|(t, r)| *t == "IOI" && r.is_ok()).count();
            let loi_wins = results.iter().filter(|(t, r)| *t == "LOI" && r.is_ok()).count();
            assert_eq!(ioi_wins, 1);
            assert!(loi_wins <= 1);
            assert!(
                results
                    .iter()
                    .filter_map(|(_, r)| r.as_ref().err())
                    .all(|e| matches!(e, GateError::InvalidTransition { .. }))
            );

            let hops: Vec<(String, String)> = wf
                .history(&deal)
                .expect("history")
                .into_iter()
                .filter_map(|e| match e.details {
                    AuditDetails::GateAdvance { from, to, .. } => {
                        Some((from.as_str().to_string(), to.as_str().to_string()))
                    }
                    _ => None,
                })
                .collect();
            let mut expected = vec![("Screen".to_string(), "IOI".to_string())];
            if loi_wins == 1 {
                expected.push(("IOI".to_string(), "LOI".to_string()));
            }
            assert_eq!(hops, expected);

            let state = wf.deal_state(&deal).expect("read").expect("deal");
            let last = if loi_wins == 1 { "LOI" } else { "IOI" };
            assert_eq!(state.current_gate.as_str(), last);
        }
    }

    /// T3.2c: Lock slots are released once no operation holds them,
    /// including read-only checks and rejected operations on unknown deals.
    #[test]
    fn lock_slots_released_after_calls() {
        let (wf, _) = workflow();
        let screen = GateName::new("Screen");

        for i in 0..200 {
            let ghost = DealId::new(format!("ghost-{i}"));
            let report = wf.check_completion(&ghost, &screen).expect("check");
            assert!(report.current_gate.is_none());

            let rejected = wf.advance(&ghost, &"LOI".into(), &[], "agent", None);
            assert!(matches!(rejected, Err(GateError::InvalidTransition { .. })));

            let wrong = wf.submit_approval(
                &ghost,
                &"IC1".into(),
                &MemberId::new("m1"),
                ApprovalType::Approve,
                None,
                None,
            );
            assert!(matches!(wrong, Err(GateError::WrongGate { .. })));
        }

        let deal = DealId::new("deal-live");
        walk_to(&wf, &deal, "IOI");
        wf.submit_approval(&deal, &"IOI".into(), &MemberId::new("m1"), ApprovalType::Approve, None, None)
            .expect("vote");

        assert_eq!(wf.deals().expect("deals").len(), 1);
        assert_eq!(wf.locks().tracked().expect("tracked"), 0);
    }

    /// T3.2d: An oversized deal id is rejected before any lock is taken.
    #[test]
    fn check_completion_validates_deal_id() {
        let (wf, _) = workflow();
        let huge = DealId::new("x".repeat(icgate_core::primitives::MAX_ID_LENGTH + 1));
        let result = wf.check_completion(&huge, &"Screen".into());
        assert!(matches!(result, Err(GateError::InvalidInput(_))));
        let empty = wf.check_completion(&DealId::new(""), &"Screen".into());
        assert!(matches!(empty, Err(GateError::InvalidInput(_))));
        assert_eq!(wf.locks().tracked().expect("tracked"), 0);
    }

    /// T3.3: Concurrent votes from distinct members are all retained.
    #[test]
    fn concurrent_votes_all_retained() {
        let (wf, _) = workflow();
        let deal = DealId::new("deal-votes");
        wf.initialize(&deal, "ops").expect("init");
        let screen = GateName::new("Screen");

        std::thread::scope(|scope| {
            for member in ["m1", "m2", "m3", "m4", "m5"] {
                let (wf, deal, screen) = (&wf, &deal, &screen);
                scope.spawn(move || {
                    wf.submit_approval(deal, screen, &MemberId::new(member), ApprovalType::Approve, None, None)
                        .expect("vote");
                });
            }
        });

        assert_eq!(wf.approvals(&deal, &screen).expect("votes").len(), 5);
        let sequences: Vec<u64> = wf
            .audit_trail()
            .expect("trail")
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, (1..=6).collect::<Vec<u64>>());
    }

    /// T3.4: The redb backend persists accepted operations across reopen.
    #[test]
    fn redb_persists_across_reopen() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("icgate.redb");
        let deal = DealId::new("deal-disk");

        {
            let (wf, _) = workflow_on(StorageBackend::with_redb(&path).expect("open"));
            walk_to(&wf, &deal, "LOI");
            let rejected = wf.advance(&deal, &"IC2".into(), &[], "a", None);
            assert!(rejected.is_err());
        }

        let (wf, _) = workflow_on(StorageBackend::with_redb(&path).expect("reopen"));
        assert!(wf.store().is_persistent());
        let state = wf.deal_state(&deal).expect("read").expect("deal");
        assert_eq!(state.current_gate.as_str(), "LOI");
        // created + two advances
        assert_eq!(wf.history(&deal).expect("history").len(), 3);

        wf.advance(&deal, &"IC1".into(), &artifacts_for(&wf, "IC1"), "a", None)
            .expect("continue after reopen");
        let last = wf.audit_trail().expect("trail").pop().expect("entry");
        assert_eq!(last.sequence, 4);
    }
}

// =============================================================================
// TIER T4: AUDIT AND METRICS
// =============================================================================

mod t4_metrics {
    use super::*;

    /// T4.1: Idle deals are reported against their gate timeout.
    #[test]
    fn bottlenecks_follow_clock() {
        let (wf, clock) = workflow();
        let slow = DealId::new("slow");
        let fast = DealId::new("fast");
        walk_to(&wf, &slow, "IOI");

        clock.advance(TimeDelta::days(10));
        walk_to(&wf, &fast, "IOI");
        assert!(wf.bottlenecked_deals(None).expect("deals").is_empty());

        clock.advance(TimeDelta::days(5));
        let stuck = wf.bottlenecked_deals(None).expect("deals");
        let ids: Vec<&str> = stuck.iter().map(|d| d.deal_id.as_str()).collect();
        assert_eq!(ids, ["slow"]);

        let strict = wf
            .bottlenecked_deals(Some(TimeDelta::days(1)))
            .expect("deals");
        assert_eq!(strict.len(), 2);
    }

    /// T4.2: The governance report aggregates the audit trail.
    #[test]
    fn governance_report() {
        let (wf, clock) = workflow();
        let deal = DealId::new("deal-1");
        wf.initialize(&deal, "ops").expect("init");
        clock.advance(TimeDelta::hours(6));
        walk_to(&wf, &deal, "IOI");
        clock.advance(TimeDelta::hours(2));
        wf.submit_approval(&deal, &"IOI".into(), &MemberId::new("m1"), ApprovalType::Approve, None, None)
            .expect("vote");

        let report = wf
            .governance_metrics(TimeWindow::unbounded())
            .expect("report");
        assert_eq!(report.total_deals, 1);
        assert_eq!(report.total_activity, 3);
        assert_eq!(report.approval_velocity_secs, Some(2 * 3600));

        let screen = report
            .gates
            .iter()
            .find(|g| g.gate.as_str() == "Screen")
            .expect("screen");
        assert_eq!(screen.average_dwell_secs, Some(6 * 3600));
        let ioi = report
            .gates
            .iter()
            .find(|g| g.gate.as_str() == "IOI")
            .expect("ioi");
        assert_eq!(ioi.deals_in_gate, 1);
        assert_eq!(ioi.activity_count, 2);
        assert_eq!(ioi.average_dwell_secs, None);
    }
}
