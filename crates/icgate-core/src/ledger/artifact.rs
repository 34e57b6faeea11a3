//! # Artifact Ledger
//!
//! Per-deal, per-gate record of which artifacts have been supplied.

use crate::catalog::GateCatalog;
use crate::storage::{LedgerStore, WriteBatch};
use crate::{ArtifactRecord, DealId, GateError, GateName};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Artifact view over a store, resolved against one catalog snapshot.
#[derive(Debug)]
pub struct ArtifactLedger<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    catalog: &'a GateCatalog,
}

impl<'a, S: LedgerStore + ?Sized> ArtifactLedger<'a, S> {
    /// Create a view.
    #[must_use]
    pub fn new(store: &'a S, catalog: &'a GateCatalog) -> Self {
        Self { store, catalog }
    }

    /// Stage an upsert of `(deal_id, gate, artifact_name)` into `batch`.
    ///
    /// `required` is taken from the catalog. `provided_at` is set only when
    /// the artifact is marked provided.
    pub fn record(
        &self,
        batch: &mut WriteBatch,
        deal_id: &DealId,
        gate: &GateName,
        artifact_name: &str,
        provided: bool,
        provided_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> ArtifactRecord {
        let required = self
            .catalog
            .definition(gate)
            .is_some_and(|g| g.required_artifacts.contains(artifact_name));

        let record = ArtifactRecord {
            deal_id: deal_id.clone(),
            gate: gate.clone(),
            artifact_name: artifact_name.to_string(),
            required,
            provided,
            provided_by: provided_by.map(str::to_string),
            provided_at: provided.then_some(now),
        };
        batch.put_artifact(record.clone());
        record
    }

    /// Names currently marked `provided`.
    pub fn provided_names(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<BTreeSet<String>, GateError> {
        Ok(self
            .store
            .artifacts(deal_id, gate)?
            .into_iter()
            .filter(|r| r.provided)
            .map(|r| r.artifact_name)
            .collect())
    }

    /// Required artifacts of `gate` not yet provided.
    pub fn missing(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<BTreeSet<String>, GateError> {
        let definition = self.catalog.require(gate)?;
        let provided = self.provided_names(deal_id, gate)?;
        Ok(definition
            .required_artifacts
            .difference(&provided)
            .cloned()
            .collect())
    }

    /// `required_artifacts(gate) ⊆ provided_names(deal_id, gate)`.
    pub fn is_satisfied(&self, deal_id: &DealId, gate: &GateName) -> Result<bool, GateError> {
        Ok(self.missing(deal_id, gate)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLedger;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).single().expect("date")
    }

    #[test]
    fn record_marks_required_from_catalog() {
        let catalog = GateCatalog::default_ic().expect("catalog");
        let store = MemoryLedger::new();
        let ledger = ArtifactLedger::new(&store, &catalog);
        let mut batch = WriteBatch::new();

        let required = ledger.record(
            &mut batch,
            &DealId::new("d-1"),
            &GateName::new("IOI"),
            "ioi_letter",
            true,
            Some("analyst"),
            now(),
        );
        let extra = ledger.record(
            &mut batch,
            &DealId::new("d-1"),
            &GateName::new("IOI"),
            "broker_flyer",
            true,
            Some("analyst"),
            now(),
        );
        assert!(required.required);
        assert!(!extra.required);
        assert_eq!(required.provided_at, Some(now()));
        assert_eq!(batch.artifacts.len(), 2);
    }

    #[test]
    fn satisfaction_tracks_provided_rows() {
        let catalog = GateCatalog::default_ic().expect("catalog");
        let store = MemoryLedger::new();
        let ledger = ArtifactLedger::new(&store, &catalog);
        let deal = DealId::new("d-1");
        let gate = GateName::new("Screen");

        let mut batch = WriteBatch::new();
        ledger.record(&mut batch, &deal, &gate, "deal_teaser", true, Some("a"), now());
        ledger.record(&mut batch, &deal, &gate, "screening_memo", false, None, now());
        store.commit(batch).expect("commit");

        assert!(!ledger.is_satisfied(&deal, &gate).expect("check"));
        let missing = ledger.missing(&deal, &gate).expect("missing");
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["screening_memo"]);

        let mut batch = WriteBatch::new();
        ledger.record(&mut batch, &deal, &gate, "screening_memo", true, Some("a"), now());
        store.commit(batch).expect("commit");
        assert!(ledger.is_satisfied(&deal, &gate).expect("check"));
    }

    #[test]
    fn unknown_gate_is_an_error() {
        let catalog = GateCatalog::default_ic().expect("catalog");
        let store = MemoryLedger::new();
        let ledger = ArtifactLedger::new(&store, &catalog);
        assert!(matches!(
            ledger.is_satisfied(&DealId::new("d-1"), &GateName::new("Nope")),
            Err(GateError::UnknownGate(_))
        ));
    }
}
