//! # redb-backed Ledger Storage
//!
//! A disk-backed ledger using the redb embedded database:
//! - ACID transactions (one write transaction per `WriteBatch`)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Rows are postcard-encoded. Composite keys use redb tuple keys so that
//! the rows of one `(deal, gate)` pair are a contiguous range.

use super::{LedgerStore, WriteBatch};
use crate::audit::AuditEntry;
use crate::{ApprovalRecord, ArtifactRecord, DealGateState, DealId, GateError, GateName};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for deals: deal_id -> serialized DealGateState
const DEALS: TableDefinition<&str, &[u8]> = TableDefinition::new("deals");

/// Table for artifacts: (deal_id, gate, artifact_name) -> serialized ArtifactRecord
const ARTIFACTS: TableDefinition<(&str, &str, &str), &[u8]> = TableDefinition::new("artifacts");

/// Table for approvals: (deal_id, gate, member_id) -> serialized ApprovalRecord
const APPROVALS: TableDefinition<(&str, &str, &str), &[u8]> = TableDefinition::new("approvals");

/// Table for the audit trail: sequence -> serialized AuditEntry
const AUDIT: TableDefinition<u64, &[u8]> = TableDefinition::new("audit");

/// Index of audit entries per deal: (deal_id, sequence) -> ()
const DEAL_AUDIT: TableDefinition<(&str, u64), ()> = TableDefinition::new("deal_audit");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_AUDIT_SEQUENCE: &str = "next_audit_sequence";

fn storage_err(e: impl std::fmt::Display) -> GateError {
    GateError::Storage(e.to_string())
}

fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>, GateError> {
    postcard::to_allocvec(row).map_err(|e| GateError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GateError> {
    postcard::from_bytes(bytes).map_err(|e| GateError::Serialization(e.to_string()))
}

/// A disk-backed ledger store using redb.
pub struct RedbLedger {
    db: Database,
}

impl std::fmt::Debug for RedbLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLedger").finish_non_exhaustive()
    }
}

impl RedbLedger {
    /// Open or create a ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(DEALS).map_err(storage_err)?;
            let _ = write_txn.open_table(ARTIFACTS).map_err(storage_err)?;
            let _ = write_txn.open_table(APPROVALS).map_err(storage_err)?;
            let _ = write_txn.open_table(AUDIT).map_err(storage_err)?;
            let _ = write_txn.open_table(DEAL_AUDIT).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), GateError> {
        self.db.compact().map_err(storage_err)?;
        Ok(())
    }

    fn scoped_rows<T: DeserializeOwned>(
        &self,
        table: TableDefinition<(&str, &str, &str), &[u8]>,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<T>, GateError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(table).map_err(storage_err)?;

        let mut rows = Vec::new();
        for entry in table
            .range((deal_id.as_str(), gate.as_str(), "")..)
            .map_err(storage_err)?
        {
            let (key, value) = entry.map_err(storage_err)?;
            let (d, g, _) = key.value();
            if d != deal_id.as_str() || g != gate.as_str() {
                break;
            }
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }
}

impl LedgerStore for RedbLedger {
    fn deal(&self, deal_id: &DealId) -> Result<Option<DealGateState>, GateError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DEALS).map_err(storage_err)?;
        match table.get(deal_id.as_str()).map_err(storage_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn deals(&self) -> Result<Vec<DealGateState>, GateError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DEALS).map_err(storage_err)?;

        let mut deals = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            deals.push(decode(value.value())?);
        }
        Ok(deals)
    }

    fn artifacts(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ArtifactRecord>, GateError> {
        self.scoped_rows(ARTIFACTS, deal_id, gate)
    }

    fn approvals(
        &self,
        deal_id: &DealId,
        gate: &GateName,
    ) -> Result<Vec<ApprovalRecord>, GateError> {
        self.scoped_rows(APPROVALS, deal_id, gate)
    }

    fn audit_trail(&self) -> Result<Vec<AuditEntry>, GateError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(AUDIT).map_err(storage_err)?;

        let mut entries = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            entries.push(decode(value.value())?);
        }
        Ok(entries)
    }

    fn deal_history(&self, deal_id: &DealId) -> Result<Vec<AuditEntry>, GateError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let index = read_txn.open_table(DEAL_AUDIT).map_err(storage_err)?;
        let audit = read_txn.open_table(AUDIT).map_err(storage_err)?;

        let mut entries = Vec::new();
        for entry in index
            .range((deal_id.as_str(), 0u64)..=(deal_id.as_str(), u64::MAX))
            .map_err(storage_err)?
        {
            let (key, _) = entry.map_err(storage_err)?;
            let (_, sequence) = key.value();
            if let Some(data) = audit.get(sequence).map_err(storage_err)? {
                entries.push(decode(data.value())?);
            }
        }
        Ok(entries)
    }

    fn commit(&self, batch: WriteBatch) -> Result<Vec<AuditEntry>, GateError> {
        // Encode everything before the transaction opens.
        let deal = match &batch.deal {
            Some(deal) => Some((deal.deal_id.as_str(), encode(deal)?)),
            None => None,
        };
        let artifacts = batch
            .artifacts
            .iter()
            .map(|r| Ok((r, encode(r)?)))
            .collect::<Result<Vec<_>, GateError>>()?;
        let approvals = batch
            .approvals
            .iter()
            .map(|r| Ok((r, encode(r)?)))
            .collect::<Result<Vec<_>, GateError>>()?;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let sealed = {
            let mut deals_table = write_txn.open_table(DEALS).map_err(storage_err)?;
            let mut artifacts_table = write_txn.open_table(ARTIFACTS).map_err(storage_err)?;
            let mut approvals_table = write_txn.open_table(APPROVALS).map_err(storage_err)?;
            let mut audit_table = write_txn.open_table(AUDIT).map_err(storage_err)?;
            let mut index_table = write_txn.open_table(DEAL_AUDIT).map_err(storage_err)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(storage_err)?;

            if let Some((key, bytes)) = &deal {
                deals_table
                    .insert(*key, bytes.as_slice())
                    .map_err(storage_err)?;
            }
            for (record, bytes) in &artifacts {
                artifacts_table
                    .insert(
                        (
                            record.deal_id.as_str(),
                            record.gate.as_str(),
                            record.artifact_name.as_str(),
                        ),
                        bytes.as_slice(),
                    )
                    .map_err(storage_err)?;
            }
            for (record, bytes) in &approvals {
                approvals_table
                    .insert(
                        (
                            record.deal_id.as_str(),
                            record.gate.as_str(),
                            record.member_id.as_str(),
                        ),
                        bytes.as_slice(),
                    )
                    .map_err(storage_err)?;
            }

            let mut next_sequence = meta_table
                .get(NEXT_AUDIT_SEQUENCE)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(1);

            let mut sealed = Vec::with_capacity(batch.audit.len());
            for event in batch.audit {
                let entry = AuditEntry::from_event(next_sequence, event);
                let bytes = encode(&entry)?;
                audit_table
                    .insert(next_sequence, bytes.as_slice())
                    .map_err(storage_err)?;
                index_table
                    .insert((entry.deal_id.as_str(), next_sequence), ())
                    .map_err(storage_err)?;
                next_sequence = next_sequence.saturating_add(1);
                sealed.push(entry);
            }

            meta_table
                .insert(NEXT_AUDIT_SEQUENCE, next_sequence)
                .map_err(storage_err)?;
            sealed
        };
        write_txn.commit().map_err(storage_err)?;

        tracing::debug!(entries = sealed.len(), "ledger batch committed");
        Ok(sealed)
    }
}
