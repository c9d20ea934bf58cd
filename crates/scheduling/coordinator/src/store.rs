//! Appointment storage
//!
//! The scheduler only needs a narrow view of persistence: a filtered query
//! for conflict checks, point reads and writes, and a date-range listing for
//! the agenda views.

use chrono::{DateTime, Utc};
use clinic_shared::{AppointmentId, StaffId};
use scheduling_integrity::{
    Appointment, ConflictInfo, NewAppointment, ScheduleError, ScheduledSlot, SlotQuery,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Storage errors
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(AppointmentId),
    /// The write would overlap another active appointment of the same practitioner
    #[error("write rejected: overlaps {}", .0.appointment_id)]
    OverlapRejected(ConflictInfo),
    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ScheduleError::NotFound(id),
            StoreError::OverlapRejected(conflict) => ScheduleError::SchedulingConflict(conflict),
            StoreError::Backend(message) => ScheduleError::Storage(message),
        }
    }
}

/// Persistence used by the scheduler
pub trait AppointmentStore: Send + Sync {
    /// Appointments matching `query`, ascending by start then id
    fn find_appointments(&self, query: &SlotQuery) -> Result<Vec<ScheduledSlot>, StoreError>;

    fn get(&self, id: AppointmentId) -> Result<Appointment, StoreError>;

    /// Persist a new appointment, assigning its id
    fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    /// Replace a stored appointment
    fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Appointments starting in `[from, to)`, optionally for one practitioner,
    /// ascending by start then id
    fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        practitioner_id: Option<StaffId>,
    ) -> Result<Vec<Appointment>, StoreError>;
}

#[derive(Debug)]
struct Inner {
    next_id: u64,
    appointments: BTreeMap<AppointmentId, Appointment>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            next_id: 1,
            appointments: BTreeMap::new(),
        }
    }
}

/// In-memory store.
///
/// With the overlap constraint enabled (the default) a write that would make
/// two active appointments of one practitioner overlap is rejected, the same
/// way an exclusion constraint would reject it in a database.
#[derive(Debug)]
pub struct InMemoryAppointmentStore {
    inner: Mutex<Inner>,
    enforce_overlap: bool,
}

impl Default for InMemoryAppointmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            enforce_overlap: true,
        }
    }

    /// Store without the overlap constraint; only the booking lock protects it
    pub fn without_overlap_constraint() -> Self {
        Self {
            enforce_overlap: false,
            ..Self::new()
        }
    }

    /// Store preloaded with `appointments` exactly as given (fixtures, replays)
    pub fn with_appointments(appointments: impl IntoIterator<Item = Appointment>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for appointment in appointments {
                inner.next_id = inner.next_id.max(appointment.id.0 + 1);
                inner.appointments.insert(appointment.id, appointment);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.lock().appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_overlap(&self, inner: &Inner, candidate: &Appointment) -> Result<(), StoreError> {
        if !self.enforce_overlap || !candidate.status.is_active() {
            return Ok(());
        }

        let window = candidate.window();
        let mut rivals: Vec<&Appointment> = inner
            .appointments
            .values()
            .filter(|other| {
                other.id != candidate.id
                    && other.practitioner_id == candidate.practitioner_id
                    && other.status.is_active()
            })
            .collect();
        rivals.sort_by_key(|other| (other.start, other.id));

        match rivals.into_iter().find(|other| other.window().overlaps(&window)) {
            Some(other) => Err(StoreError::OverlapRejected(ConflictInfo::from(&other.slot()))),
            None => Ok(()),
        }
    }
}

impl AppointmentStore for InMemoryAppointmentStore {
    fn find_appointments(&self, query: &SlotQuery) -> Result<Vec<ScheduledSlot>, StoreError> {
        let inner = self.lock();
        let mut matches: Vec<&Appointment> = inner
            .appointments
            .values()
            .filter(|appointment| query.matches(appointment))
            .collect();
        matches.sort_by_key(|appointment| (appointment.start, appointment.id));
        Ok(matches.into_iter().map(Appointment::slot).collect())
    }

    fn get(&self, id: AppointmentId) -> Result<Appointment, StoreError> {
        self.lock()
            .appointments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut inner = self.lock();
        let appointment = appointment.into_appointment(AppointmentId(inner.next_id));
        self.check_overlap(&inner, &appointment)?;

        inner.next_id += 1;
        inner.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut inner = self.lock();
        if !inner.appointments.contains_key(&appointment.id) {
            return Err(StoreError::NotFound(appointment.id));
        }
        self.check_overlap(&inner, &appointment)?;

        inner.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        practitioner_id: Option<StaffId>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.lock();
        let mut listed: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|appointment| appointment.start >= from && appointment.start < to)
            .filter(|appointment| {
                practitioner_id.map_or(true, |id| appointment.practitioner_id == id)
            })
            .cloned()
            .collect();
        listed.sort_by_key(|appointment| (appointment.start, appointment.id));
        Ok(listed)
    }
}
