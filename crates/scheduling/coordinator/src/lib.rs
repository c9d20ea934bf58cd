//! Scheduling Coordinator
//!
//! Provides the operations behind the appointment views:
//! - Availability checks against a practitioner's active appointments
//! - Booking, rescheduling and status updates, serialized per practitioner
//! - Day agenda and month calendar views
//!
//! [`AppointmentDesk`] is the request-layer entry point: every call passes the
//! access gate before it reaches the [`SchedulingService`].

pub mod desk;
pub mod locks;
pub mod service;
pub mod store;
pub mod validator;

pub use desk::{AppointmentDesk, ClinicError};
pub use locks::PractitionerLocks;
pub use service::{DayAgenda, MonthCalendar, SchedulingService};
pub use store::{AppointmentStore, InMemoryAppointmentStore, StoreError};
pub use validator::AvailabilityChecker;
