//! Scheduling service
//!
//! Every write re-validates the window while holding the lock of each
//! practitioner involved, then commits through the store.

use crate::locks::PractitionerLocks;
use crate::store::{AppointmentStore, StoreError};
use crate::validator::AvailabilityChecker;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use clinic_shared::{AppointmentId, Clock, SchedulingRules, StaffId};
use scheduling_integrity::{
    validate_new_appointment, validate_transition, Appointment, AppointmentStatus, NewAppointment,
    RescheduleInput, ScheduleError, WindowCheck, WindowRequest,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Agenda Views
// ============================================================================

/// Appointments of one day, grouped by start time (`HH:MM`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAgenda {
    pub date: NaiveDate,
    pub slots: BTreeMap<String, Vec<Appointment>>,
}

impl DayAgenda {
    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All appointments in start order
    pub fn appointments(&self) -> impl Iterator<Item = &Appointment> {
        self.slots.values().flatten()
    }

    pub fn previous_day(&self) -> Option<NaiveDate> {
        self.date.pred_opt()
    }

    pub fn next_day(&self) -> Option<NaiveDate> {
        self.date.succ_opt()
    }
}

/// Appointments of one month, grouped by day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCalendar {
    pub year: i32,
    pub month: u32,
    pub days: BTreeMap<NaiveDate, Vec<Appointment>>,
}

impl MonthCalendar {
    /// Appointments on `date`, empty when there are none
    pub fn on(&self, date: NaiveDate) -> &[Appointment] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn previous_month(&self) -> (i32, u32) {
        if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        }
    }

    pub fn next_month(&self) -> (i32, u32) {
        if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Booking, rescheduling, status updates and agenda queries
pub struct SchedulingService {
    store: Arc<dyn AppointmentStore>,
    checker: AvailabilityChecker,
    locks: PractitionerLocks,
}

impl SchedulingService {
    pub fn new(store: Arc<dyn AppointmentStore>, rules: SchedulingRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            checker: AvailabilityChecker::new(Arc::clone(&store), rules, clock),
            store,
            locks: PractitionerLocks::new(),
        }
    }

    pub fn checker(&self) -> &AvailabilityChecker {
        &self.checker
    }

    pub fn get(&self, id: AppointmentId) -> Result<Appointment, ScheduleError> {
        Ok(self.store.get(id)?)
    }

    /// Read-only availability check, no lock taken
    pub fn check_availability(&self, request: &WindowRequest) -> Result<WindowCheck, ScheduleError> {
        self.checker.validate_appointment_window(request)
    }

    /// Book a new appointment
    pub fn book(&self, appointment: NewAppointment) -> Result<Appointment, ScheduleError> {
        validate_new_appointment(&appointment)?;

        let request = WindowRequest {
            practitioner_id: appointment.practitioner_id,
            start: appointment.start,
            duration_minutes: appointment.duration_minutes,
            exclude_id: None,
        };

        self.locks.with_practitioner(
            appointment.practitioner_id,
            || -> Result<Appointment, ScheduleError> {
                self.ensure_available(&request)?;
                let booked = self.store.insert(appointment).map_err(commit_error)?;

                tracing::info!(
                    target: "scheduling",
                    appointment = %booked.id,
                    practitioner = %booked.practitioner_id,
                    start = %booked.start,
                    duration = booked.duration_minutes,
                    "appointment booked"
                );
                Ok(booked)
            },
        )
    }

    /// Move an appointment to a new window, optionally to another practitioner.
    ///
    /// The appointment never conflicts with its own current window.
    pub fn reschedule(
        &self,
        id: AppointmentId,
        input: RescheduleInput,
    ) -> Result<Appointment, ScheduleError> {
        self.locked_edit(id, input.practitioner_id, |current| {
            if current.status.is_terminal() {
                return Err(ScheduleError::InvalidField {
                    field: "status".to_string(),
                    message: format!(
                        "A {} appointment cannot be rescheduled.",
                        current.status.label().to_lowercase()
                    ),
                });
            }

            let practitioner_id = input.practitioner_id.unwrap_or(current.practitioner_id);
            self.ensure_available(&WindowRequest {
                practitioner_id,
                start: input.start,
                duration_minutes: input.duration_minutes,
                exclude_id: Some(id),
            })?;

            let moved = self
                .store
                .update(Appointment {
                    practitioner_id,
                    start: input.start,
                    duration_minutes: input.duration_minutes,
                    ..current
                })
                .map_err(commit_error)?;

            tracing::info!(
                target: "scheduling",
                appointment = %moved.id,
                practitioner = %moved.practitioner_id,
                start = %moved.start,
                duration = moved.duration_minutes,
                "appointment rescheduled"
            );
            Ok(moved)
        })
    }

    /// Apply a lifecycle transition; asking for the current status changes nothing
    pub fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, ScheduleError> {
        self.locked_edit(id, None, |current| {
            if current.status == status {
                return Ok(current);
            }
            validate_transition(current.status, status)?;

            let from = current.status;
            let updated = self
                .store
                .update(Appointment { status, ..current })
                .map_err(commit_error)?;

            tracing::info!(
                target: "scheduling",
                appointment = %updated.id,
                from = %from,
                to = %status,
                "appointment status changed"
            );
            Ok(updated)
        })
    }

    /// Appointments starting on `date`, grouped by `HH:MM`
    pub fn day_agenda(
        &self,
        date: NaiveDate,
        practitioner_id: Option<StaffId>,
    ) -> Result<DayAgenda, ScheduleError> {
        let next = date.succ_opt().ok_or_else(|| out_of_range("date", date))?;
        let appointments =
            self.store
                .list_between(start_of(date), start_of(next), practitioner_id)?;

        let mut slots: BTreeMap<String, Vec<Appointment>> = BTreeMap::new();
        for appointment in appointments {
            slots
                .entry(appointment.start.format("%H:%M").to_string())
                .or_default()
                .push(appointment);
        }

        Ok(DayAgenda { date, slots })
    }

    /// Appointments of a calendar month, grouped by day
    pub fn month_calendar(
        &self,
        year: i32,
        month: u32,
        practitioner_id: Option<StaffId>,
    ) -> Result<MonthCalendar, ScheduleError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| out_of_range("month", format!("{year}-{month}")))?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .ok_or_else(|| out_of_range("month", format!("{next_year}-{next_month}")))?;

        let appointments =
            self.store
                .list_between(start_of(first), start_of(next), practitioner_id)?;

        let mut days: BTreeMap<NaiveDate, Vec<Appointment>> = BTreeMap::new();
        for appointment in appointments {
            days.entry(appointment.start.date_naive())
                .or_default()
                .push(appointment);
        }

        Ok(MonthCalendar {
            year: first.year(),
            month: first.month(),
            days,
        })
    }

    /// Availability check that turns a conflict into an error and logs it
    fn ensure_available(&self, request: &WindowRequest) -> Result<(), ScheduleError> {
        self.checker.require_available(request).map_err(|err| {
            if let ScheduleError::SchedulingConflict(conflict) = &err {
                tracing::warn!(
                    target: "scheduling",
                    practitioner = %request.practitioner_id,
                    start = %request.start,
                    conflicting = %conflict.appointment_id,
                    "scheduling conflict"
                );
            }
            err
        })
    }

    /// Run `edit` on the current state of `id` while holding the lock of its
    /// practitioner and of `target`, if given
    fn locked_edit<F>(
        &self,
        id: AppointmentId,
        target: Option<StaffId>,
        edit: F,
    ) -> Result<Appointment, ScheduleError>
    where
        F: Fn(Appointment) -> Result<Appointment, ScheduleError>,
    {
        loop {
            let owner = self.store.get(id)?.practitioner_id;
            let involved = [owner, target.unwrap_or(owner)];

            let outcome = self.locks.with_practitioners(
                &involved,
                || -> Result<Option<Appointment>, ScheduleError> {
                    let current = self.store.get(id)?;
                    // Moved to another practitioner while we waited for the locks
                    if current.practitioner_id != owner {
                        return Ok(None);
                    }
                    edit(current).map(Some)
                },
            )?;

            if let Some(updated) = outcome {
                return Ok(updated);
            }
        }
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn out_of_range(field: &str, value: impl std::fmt::Display) -> ScheduleError {
    ScheduleError::InvalidField {
        field: field.to_string(),
        message: format!("{value} is not a valid {field}"),
    }
}

/// Map a failed write, logging overlaps caught by the store itself
fn commit_error(err: StoreError) -> ScheduleError {
    if let StoreError::OverlapRejected(conflict) = &err {
        tracing::warn!(
            target: "scheduling",
            conflicting = %conflict.appointment_id,
            "write rejected by the store overlap constraint"
        );
    }
    err.into()
}
