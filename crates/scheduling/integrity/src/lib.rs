//! Scheduling Integrity
//!
//! Defines the appointment types and the rules every stored appointment must
//! satisfy:
//! - Appointment status lifecycle
//! - Half-open time windows and overlap detection
//! - Duration bounds and the no-past-dates rule
//! - Conflict reporting against a practitioner's active appointments

use chrono::{DateTime, Duration, Utc};
use clinic_shared::{
    validate_required_text, AppointmentId, PatientId, SchedulingRules, StaffId, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of the reason for visit
pub const MAX_REASON_LEN: usize = 255;

// ============================================================================
// Appointment Types
// ============================================================================

/// Appointment lifecycle status
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Booked, not yet confirmed with the patient
    #[default]
    Planned,
    /// Confirmed with the patient
    Confirmed,
    /// Visit took place
    Done,
    /// Called off; the slot is free again
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that occupy the practitioner's time
    pub const ACTIVE: [AppointmentStatus; 2] =
        [AppointmentStatus::Planned, AppointmentStatus::Confirmed];

    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Planned,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Done,
        AppointmentStatus::Cancelled,
    ];

    /// Whether an appointment in this status takes part in overlap checks
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_statuses().is_empty()
    }

    /// Statuses reachable in one step
    pub fn next_statuses(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Planned => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => &[AppointmentStatus::Done, AppointmentStatus::Cancelled],
            AppointmentStatus::Done | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.next_statuses().contains(&next)
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppointmentStatus::Planned => "PLANNED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Done => "DONE",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Planned => "Planned",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Done => "Done",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| ScheduleError::InvalidField {
                field: "status".to_string(),
                message: format!("unknown status: {s}"),
            })
    }
}

/// A stored appointment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    /// Practitioner seeing the patient
    pub practitioner_id: StaffId,
    pub patient_id: PatientId,
    /// Display name of the patient, reported in conflict messages
    pub patient_name: String,
    /// Scheduled start
    pub start: DateTime<Utc>,
    /// Scheduled duration in minutes
    pub duration_minutes: u32,
    /// Reason for visit
    pub reason: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Appointment {
    pub fn end(&self) -> DateTime<Utc> {
        window_end(self.start, self.duration_minutes)
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.duration_minutes)
    }

    /// Projection used by conflict checks
    pub fn slot(&self) -> ScheduledSlot {
        ScheduledSlot {
            id: self.id,
            start: self.start,
            duration_minutes: self.duration_minutes,
            patient_name: self.patient_name.clone(),
        }
    }
}

/// Input for booking a new appointment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub practitioner_id: StaffId,
    pub patient_id: PatientId,
    pub patient_name: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAppointment {
    /// Materialize with the id assigned by the store; new bookings start as planned
    pub fn into_appointment(self, id: AppointmentId) -> Appointment {
        Appointment {
            id,
            practitioner_id: self.practitioner_id,
            patient_id: self.patient_id,
            patient_name: self.patient_name,
            start: self.start,
            duration_minutes: self.duration_minutes,
            reason: self.reason,
            status: AppointmentStatus::Planned,
            notes: self.notes,
        }
    }
}

/// Input for moving an existing appointment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleInput {
    /// New practitioner, or keep the current one
    #[serde(default)]
    pub practitioner_id: Option<StaffId>,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
}

// ============================================================================
// Time Windows
// ============================================================================

/// End of a window starting at `start` and lasting `minutes`, `None` past the
/// last representable instant
pub fn checked_window_end(start: DateTime<Utc>, minutes: u32) -> Option<DateTime<Utc>> {
    start.checked_add_signed(Duration::minutes(i64::from(minutes)))
}

/// Like [`checked_window_end`], clamped to the last representable instant
pub fn window_end(start: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    checked_window_end(start, minutes).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Half-open interval `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            start,
            end: window_end(start, duration_minutes),
        }
    }

    /// `[a, b) ∩ [c, d) ≠ ∅  ⇔  a < d ∧ c < b`; touching windows do not overlap
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ============================================================================
// Conflict Checking Types
// ============================================================================

/// Existing appointment as returned by the store for conflict checks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub id: AppointmentId,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub patient_name: String,
}

impl ScheduledSlot {
    pub fn end(&self) -> DateTime<Utc> {
        window_end(self.start, self.duration_minutes)
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.duration_minutes)
    }
}

/// Filter passed to the store's `find_appointments`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub practitioner_id: StaffId,
    pub statuses: Vec<AppointmentStatus>,
    /// Only appointments starting strictly before this instant
    pub start_before: DateTime<Utc>,
    /// Appointment being edited, left out of the results
    pub exclude_id: Option<AppointmentId>,
}

impl SlotQuery {
    /// Active appointments of `practitioner_id` that could overlap a window ending at `end`
    pub fn active_before(
        practitioner_id: StaffId,
        end: DateTime<Utc>,
        exclude_id: Option<AppointmentId>,
    ) -> Self {
        Self {
            practitioner_id,
            statuses: AppointmentStatus::ACTIVE.to_vec(),
            start_before: end,
            exclude_id,
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.practitioner_id == self.practitioner_id
            && self.statuses.contains(&appointment.status)
            && appointment.start < self.start_before
            && Some(appointment.id) != self.exclude_id
    }
}

/// A proposed window for a practitioner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    pub practitioner_id: StaffId,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    /// Set when validating an edit so the appointment does not clash with itself
    #[serde(default)]
    pub exclude_id: Option<AppointmentId>,
}

impl WindowRequest {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.duration_minutes)
    }
}

/// The existing appointment a proposed window runs into
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub appointment_id: AppointmentId,
    pub patient_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<&ScheduledSlot> for ConflictInfo {
    fn from(slot: &ScheduledSlot) -> Self {
        Self {
            appointment_id: slot.id,
            patient_name: slot.patient_name.clone(),
            start: slot.start,
            end: slot.end(),
        }
    }
}

/// Outcome of a window check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WindowCheck {
    Available,
    Conflict(ConflictInfo),
}

impl WindowCheck {
    pub fn is_available(&self) -> bool {
        matches!(self, WindowCheck::Available)
    }

    /// Message shown next to the booking form
    pub fn message(&self) -> String {
        match self {
            WindowCheck::Available => "Time slot available".to_string(),
            WindowCheck::Conflict(conflict) => format!(
                "The practitioner already has an appointment at this time with {}",
                conflict.patient_name
            ),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Scheduling errors, all recoverable at the request boundary
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("appointment start {start} is before the current time {now}")]
    PastDate {
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("duration of {minutes} minutes is outside {min}..={max}")]
    InvalidDuration { minutes: u32, min: u32, max: u32 },
    #[error("conflicts with {} ({})", .0.appointment_id, .0.patient_name)]
    SchedulingConflict(ConflictInfo),
    #[error("cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("{0} not found")]
    NotFound(AppointmentId),
    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl ScheduleError {
    /// Message shown to the user when the form is re-rendered
    pub fn user_message(&self) -> String {
        match self {
            ScheduleError::PastDate { .. } => {
                "The appointment date cannot be in the past.".to_string()
            }
            ScheduleError::InvalidDuration { min, max, .. } => {
                format!("The duration must be between {min} and {max} minutes.")
            }
            ScheduleError::SchedulingConflict(conflict) => {
                WindowCheck::Conflict(conflict.clone()).message()
            }
            ScheduleError::InvalidTransition { from, to } => format!(
                "An appointment that is {} cannot become {}.",
                from.label().to_lowercase(),
                to.label().to_lowercase()
            ),
            ScheduleError::NotFound(_) => "The appointment does not exist.".to_string(),
            ScheduleError::InvalidField { message, .. } => message.clone(),
            ScheduleError::Storage(_) => {
                "The appointment could not be saved. Please try again.".to_string()
            }
        }
    }
}

impl From<ValidationResult> for ScheduleError {
    fn from(result: ValidationResult) -> Self {
        let field = result
            .errors
            .first()
            .map(|e| e.field.clone())
            .unwrap_or_default();
        ScheduleError::InvalidField {
            field,
            message: result.summary(),
        }
    }
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Check `minutes` against the configured bounds
pub fn validate_duration(minutes: u32, rules: &SchedulingRules) -> Result<(), ScheduleError> {
    if !rules.accepts(minutes) {
        return Err(ScheduleError::InvalidDuration {
            minutes,
            min: rules.min_duration_minutes,
            max: rules.max_duration_minutes,
        });
    }
    Ok(())
}

/// A start strictly before `now` is rejected; starting exactly now is fine
pub fn validate_not_past(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ScheduleError> {
    if start < now {
        return Err(ScheduleError::PastDate { start, now });
    }
    Ok(())
}

/// Preconditions of a window check, in the order they are reported
pub fn validate_window_request(
    request: &WindowRequest,
    rules: &SchedulingRules,
    now: DateTime<Utc>,
) -> Result<(), ScheduleError> {
    validate_not_past(request.start, now)?;
    validate_duration(request.duration_minutes, rules)?;
    validate_window_fits(request.start, request.duration_minutes)
}

/// The window must end at a representable instant
pub fn validate_window_fits(start: DateTime<Utc>, minutes: u32) -> Result<(), ScheduleError> {
    match checked_window_end(start, minutes) {
        Some(_) => Ok(()),
        None => Err(ScheduleError::InvalidField {
            field: "start".to_string(),
            message: "The appointment would end beyond the supported calendar range.".to_string(),
        }),
    }
}

/// Form-level checks of a new booking that do not need the store
pub fn validate_new_appointment(appointment: &NewAppointment) -> Result<(), ScheduleError> {
    let mut result = validate_required_text(&appointment.reason, "reason", MAX_REASON_LEN);
    result.merge(validate_required_text(
        &appointment.patient_name,
        "patient_name",
        MAX_REASON_LEN,
    ));

    if result.is_valid() {
        Ok(())
    } else {
        Err(result.into())
    }
}

/// Check a status change against the lifecycle
pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), ScheduleError> {
    if !from.can_transition_to(to) {
        return Err(ScheduleError::InvalidTransition { from, to });
    }
    Ok(())
}

/// First candidate (in the given order) whose window overlaps `window`
pub fn first_conflict<'a, I>(window: &TimeWindow, candidates: I) -> Option<ConflictInfo>
where
    I: IntoIterator<Item = &'a ScheduledSlot>,
{
    candidates
        .into_iter()
        .find(|slot| slot.window().overlaps(window))
        .map(ConflictInfo::from)
}
