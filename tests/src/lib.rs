//! Clinic Test Suite
//!
//! Scenario tests across the clinic crates:
//! - Access gate decisions, redirects and the audit trail
//! - Appointment window validation and the booking lifecycle
//! - Concurrent bookings against the same practitioner

pub mod access_control;
pub mod concurrency;
pub mod scheduling;

#[cfg(test)]
pub(crate) mod fixtures;
