//! Availability checks
//!
//! Decides whether a proposed window is free for a practitioner. The check
//! reads the store and the clock and nothing else; calling it twice without
//! an intervening write gives the same answer.

use crate::store::AppointmentStore;
use clinic_shared::{Clock, SchedulingRules};
use scheduling_integrity::{
    first_conflict, validate_window_request, ScheduleError, SlotQuery, WindowCheck, WindowRequest,
};
use std::sync::Arc;

/// Checks proposed windows against a practitioner's active appointments
#[derive(Clone)]
pub struct AvailabilityChecker {
    store: Arc<dyn AppointmentStore>,
    rules: SchedulingRules,
    clock: Arc<dyn Clock>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn AppointmentStore>, rules: SchedulingRules, clock: Arc<dyn Clock>) -> Self {
        Self { store, rules, clock }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    /// Validate a proposed window.
    ///
    /// A past start or an out-of-bounds duration is an error, reported in
    /// that order. Otherwise the result is [`WindowCheck::Available`] or the
    /// earliest-starting active appointment the window runs into.
    pub fn validate_appointment_window(
        &self,
        request: &WindowRequest,
    ) -> Result<WindowCheck, ScheduleError> {
        validate_window_request(request, &self.rules, self.clock.now())?;

        let window = request.window();
        let query = SlotQuery::active_before(request.practitioner_id, window.end, request.exclude_id);
        let mut candidates = self.store.find_appointments(&query)?;
        // Stores promise this order already; re-sorting keeps the reported conflict stable
        candidates.sort_by_key(|slot| (slot.start, slot.id));

        Ok(match first_conflict(&window, &candidates) {
            Some(conflict) => WindowCheck::Conflict(conflict),
            None => WindowCheck::Available,
        })
    }

    /// Like [`validate_appointment_window`](Self::validate_appointment_window)
    /// but a conflict is an error, for callers about to write
    pub fn require_available(&self, request: &WindowRequest) -> Result<(), ScheduleError> {
        match self.validate_appointment_window(request)? {
            WindowCheck::Available => Ok(()),
            WindowCheck::Conflict(conflict) => Err(ScheduleError::SchedulingConflict(conflict)),
        }
    }
}
