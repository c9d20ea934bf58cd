//! Per-practitioner booking locks
//!
//! A booking is a check followed by a write. Holding the practitioner's lock
//! across both keeps two concurrent bookings from passing the same check.

use clinic_shared::StaffId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry of one mutex per practitioner
#[derive(Debug, Default)]
pub struct PractitionerLocks {
    locks: Mutex<HashMap<StaffId, Arc<Mutex<()>>>>,
}

impl PractitionerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock of `practitioner_id`
    pub fn with_practitioner<T>(&self, practitioner_id: StaffId, f: impl FnOnce() -> T) -> T {
        self.with_practitioners(&[practitioner_id], f)
    }

    /// Run `f` while holding the locks of every practitioner in `ids`.
    ///
    /// Locks are taken in ascending id order so two callers naming the same
    /// practitioners in a different order cannot deadlock.
    pub fn with_practitioners<T>(&self, ids: &[StaffId], f: impl FnOnce() -> T) -> T {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let handles: Vec<Arc<Mutex<()>>> = ids.iter().map(|id| self.handle(*id)).collect();
        let _guards: Vec<MutexGuard<'_, ()>> = handles
            .iter()
            .map(|handle| handle.lock().unwrap_or_else(|e| e.into_inner()))
            .collect();

        f()
    }

    fn handle(&self, practitioner_id: StaffId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(practitioner_id)
            .or_default()
            .clone()
    }
}
