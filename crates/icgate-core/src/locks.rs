//! # Per-deal Locks
//!
//! One mutex per deal id, created on first use and dropped from the
//! registry when its last holder releases it. Holding a deal's slot
//! serializes the read-validate-commit sequence of every operation on that
//! deal. Operations on different deals never share a slot.

use crate::{DealId, GateError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A deal's lock slot.
pub type DealSlot = Arc<Mutex<()>>;

/// Registry of per-deal mutexes.
#[derive(Debug, Default)]
pub struct DealLocks {
    slots: Mutex<BTreeMap<DealId, DealSlot>>,
}

impl DealLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> Result<MutexGuard<'_, BTreeMap<DealId, DealSlot>>, GateError> {
        self.slots
            .lock()
            .map_err(|_| GateError::LockPoisoned("deal lock registry"))
    }

    /// The slot of `deal_id`, created if absent.
    pub fn slot(&self, deal_id: &DealId) -> Result<DealSlot, GateError> {
        let mut slots = self.registry()?;
        Ok(Arc::clone(slots.entry(deal_id.clone()).or_default()))
    }

    /// Acquire `slot` for `deal_id`. The registry entry is removed when the
    /// returned guard drops and nobody else holds or waits on the slot.
    pub fn hold<'a>(
        &'a self,
        deal_id: &'a DealId,
        slot: &'a DealSlot,
    ) -> Result<DealGuard<'a>, GateError> {
        match slot.lock() {
            Ok(guard) => Ok(DealGuard {
                locks: self,
                deal_id,
                slot,
                guard: Some(guard),
            }),
            Err(_) => {
                self.release(deal_id, slot);
                Err(GateError::LockPoisoned("deal lock"))
            }
        }
    }

    /// Forget `deal_id` if the only references left are the registry's
    /// and the caller's.
    fn release(&self, deal_id: &DealId, slot: &DealSlot) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let idle = slots
            .get(deal_id)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(slot) <= 2);
        if idle {
            slots.remove(deal_id);
        }
    }

    /// Number of tracked deals.
    pub fn tracked(&self) -> Result<usize, GateError> {
        Ok(self.registry()?.len())
    }
}

/// A held deal slot.
#[derive(Debug)]
pub struct DealGuard<'a> {
    locks: &'a DealLocks,
    deal_id: &'a DealId,
    slot: &'a DealSlot,
    guard: Option<MutexGuard<'a, ()>>,
}

impl Drop for DealGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.deal_id, self.slot);
    }
}
