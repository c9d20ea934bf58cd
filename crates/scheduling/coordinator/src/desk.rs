//! Appointment desk
//!
//! The request-layer face of scheduling. Each call is authorized by the
//! access gate against the operation and its canonical path before the
//! scheduling service runs; writes additionally require the create or edit
//! capability.

use crate::service::{DayAgenda, MonthCalendar, SchedulingService};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clinic_shared::{
    AccessDecision, AccessError, AccessGate, Actor, AppointmentId, Operation, RedirectTarget, Role,
    StaffId,
};
use scheduling_integrity::{
    Appointment, AppointmentStatus, NewAppointment, RescheduleInput, ScheduleError, WindowRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Errors surfaced to the request layer
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClinicError {
    /// The gate or a capability check refused the request
    #[error("access denied: {reason}")]
    Denied { reason: AccessError, redirect: String },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl ClinicError {
    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ClinicError::Denied { reason, .. } => reason.user_message().to_string(),
            ClinicError::Schedule(err) => err.user_message(),
        }
    }

    /// Where to send the user, `None` when the form is re-rendered instead
    pub fn redirect(&self) -> Option<&str> {
        match self {
            ClinicError::Denied { redirect, .. } => Some(redirect),
            ClinicError::Schedule(_) => None,
        }
    }
}

/// Reply of the availability endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReply {
    pub available: bool,
    pub message: String,
}

/// Controls a view may show for the current actor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_create: bool,
    pub can_edit: bool,
}

/// Gate-checked entry point to the scheduling operations
pub struct AppointmentDesk {
    gate: Arc<AccessGate>,
    service: Arc<SchedulingService>,
}

impl AppointmentDesk {
    pub fn new(gate: Arc<AccessGate>, service: Arc<SchedulingService>) -> Self {
        Self { gate, service }
    }

    pub fn capabilities(&self, actor: &Actor) -> Capabilities {
        Capabilities {
            can_create: self.gate.can_create_appointments(actor),
            can_edit: self.gate.can_edit_appointments(actor),
        }
    }

    /// Check a proposed window for the booking form
    pub fn check_availability(
        &self,
        actor: Option<&Actor>,
        request: &WindowRequest,
    ) -> Result<AvailabilityReply, ClinicError> {
        self.admit(actor, Operation::CheckAvailability, "/appointments/availability/")?;

        let reply = match self.service.check_availability(request) {
            Ok(check) => AvailabilityReply {
                available: check.is_available(),
                message: check.message(),
            },
            Err(err @ ScheduleError::PastDate { .. })
            | Err(err @ ScheduleError::InvalidDuration { .. }) => AvailabilityReply {
                available: false,
                message: err.user_message(),
            },
            Err(err) => return Err(err.into()),
        };
        Ok(reply)
    }

    pub fn book(
        &self,
        actor: Option<&Actor>,
        appointment: NewAppointment,
    ) -> Result<Appointment, ClinicError> {
        let path = "/appointments/new/";
        let actor = self.admit(actor, Operation::CreateAppointment, path)?;
        if !self.gate.can_create_appointments(actor) {
            return Err(self.refuse(actor, Operation::CreateAppointment, path));
        }
        Ok(self.service.book(appointment)?)
    }

    pub fn reschedule(
        &self,
        actor: Option<&Actor>,
        id: AppointmentId,
        input: RescheduleInput,
    ) -> Result<Appointment, ClinicError> {
        let path = format!("/appointments/{}/edit/", id.0);
        let actor = self.admit(actor, Operation::UpdateAppointment, &path)?;
        if !self.gate.can_edit_appointments(actor) {
            return Err(self.refuse(actor, Operation::UpdateAppointment, &path));
        }
        Ok(self.service.reschedule(id, input)?)
    }

    pub fn update_status(
        &self,
        actor: Option<&Actor>,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, ClinicError> {
        let path = format!("/appointments/{}/status/", id.0);
        let actor = self.admit(actor, Operation::UpdateAppointmentStatus, &path)?;
        if !self.gate.can_edit_appointments(actor) {
            return Err(self.refuse(actor, Operation::UpdateAppointmentStatus, &path));
        }
        Ok(self.service.update_status(id, status)?)
    }

    /// Day agenda; practitioners only see their own appointments
    pub fn day_agenda(
        &self,
        actor: Option<&Actor>,
        date: NaiveDate,
        practitioner_id: Option<StaffId>,
    ) -> Result<DayAgenda, ClinicError> {
        let actor = self.admit(actor, Operation::ViewDailyAppointments, "/appointments/day/")?;
        let practitioner_id = self.visible_practitioner(actor, practitioner_id)?;
        Ok(self.service.day_agenda(date, practitioner_id)?)
    }

    /// Month calendar; practitioners only see their own appointments
    pub fn month_calendar(
        &self,
        actor: Option<&Actor>,
        year: i32,
        month: u32,
        practitioner_id: Option<StaffId>,
    ) -> Result<MonthCalendar, ClinicError> {
        let actor = self.admit(actor, Operation::ViewAppointmentCalendar, "/appointments/calendar/")?;
        let practitioner_id = self.visible_practitioner(actor, practitioner_id)?;
        Ok(self.service.month_calendar(year, month, practitioner_id)?)
    }

    /// Run the gate; every desk operation requires an identified actor
    fn admit<'a>(
        &self,
        actor: Option<&'a Actor>,
        operation: Operation,
        path: &str,
    ) -> Result<&'a Actor, ClinicError> {
        if let AccessDecision::Deny(denial) = self.gate.authorize(actor, operation, path) {
            return Err(ClinicError::Denied {
                reason: denial.to_error(),
                redirect: denial.redirect.path(self.gate.config()).to_string(),
            });
        }

        actor.ok_or_else(|| ClinicError::Denied {
            reason: AccessError::Unauthenticated,
            redirect: RedirectTarget::Login.path(self.gate.config()).to_string(),
        })
    }

    fn refuse(&self, actor: &Actor, operation: Operation, path: &str) -> ClinicError {
        let denial = self.gate.refuse_capability(actor, operation, path);
        ClinicError::Denied {
            reason: denial.to_error(),
            redirect: denial.redirect.path(self.gate.config()).to_string(),
        }
    }

    /// Narrow the practitioner filter to the actor's own profile for practitioners
    fn visible_practitioner(
        &self,
        actor: &Actor,
        requested: Option<StaffId>,
    ) -> Result<Option<StaffId>, ClinicError> {
        if actor.is_superuser || self.gate.role_of(actor) != Some(Role::Practitioner) {
            return Ok(requested);
        }
        match actor.staff_id {
            Some(own) => Ok(Some(own)),
            None => Err(ClinicError::Denied {
                reason: AccessError::Unauthorized("no staff profile linked".to_string()),
                redirect: RedirectTarget::Dashboard.path(self.gate.config()).to_string(),
            }),
        }
    }
}

/// Start of a requested window, for callers building a [`WindowRequest`] from form fields
pub fn parse_form_start(date: &str, time: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let raw = format!("{date} {time}");
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| ScheduleError::InvalidField {
            field: "start".to_string(),
            message: "Invalid date or time format".to_string(),
        })
}
