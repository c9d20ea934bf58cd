//! Clinic Shared Utilities
//!
//! This crate provides common functionality for the clinic services:
//! - Role-based access control (the request gate)
//! - Audit logging of every access decision
//! - Configuration loading
//! - Common identifiers, actors and clocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export commonly used items
pub use access_control::*;
pub use audit::*;
pub use config::*;
pub use types::*;
pub use validation::*;

/// Role-based access control
///
/// Provides the closed role and operation enumerations, the static
/// permission tables and the gate that evaluates them for each request.
pub mod access_control;

/// Configuration for the gate and the scheduler
pub mod config;

/// Common types shared by every clinic crate
pub mod types {
    use super::*;
    use derive_more::{Display, From};
    use std::sync::Mutex;

    /// Identifier of an authenticated user account
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
    )]
    #[display(fmt = "actor#{}", _0)]
    pub struct ActorId(pub u64);

    /// Identifier of a staff member (the practitioner of an appointment)
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
    )]
    #[display(fmt = "staff#{}", _0)]
    pub struct StaffId(pub u64);

    /// Identifier of a patient record
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
    )]
    #[display(fmt = "patient#{}", _0)]
    pub struct PatientId(pub u64);

    /// Identifier of an appointment
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
    )]
    #[display(fmt = "appointment#{}", _0)]
    pub struct AppointmentId(pub u64);

    /// An authenticated user as seen by the request layer.
    ///
    /// The role is deliberately absent: it is resolved per request through a
    /// [`RoleResolver`](crate::access_control::RoleResolver) so that a user
    /// whose staff profile is missing is caught at the gate.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Actor {
        pub id: ActorId,
        pub username: String,
        /// Staff profile linked to this account, if any
        pub staff_id: Option<StaffId>,
        pub is_superuser: bool,
    }

    impl Actor {
        pub fn new(id: u64, username: impl Into<String>) -> Self {
            Self {
                id: ActorId(id),
                username: username.into(),
                staff_id: None,
                is_superuser: false,
            }
        }

        pub fn with_staff(mut self, staff_id: StaffId) -> Self {
            self.staff_id = Some(staff_id);
            self
        }

        pub fn superuser(id: u64, username: impl Into<String>) -> Self {
            Self {
                is_superuser: true,
                ..Self::new(id, username)
            }
        }
    }

    /// Errors raised by the access gate once a decision is turned into a result
    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
    pub enum AccessError {
        #[error("authentication required")]
        Unauthenticated,
        #[error("unauthorized: {0}")]
        Unauthorized(String),
        /// The account has no role assigned; treated as unauthorized
        #[error("no role assigned")]
        MissingRole,
    }

    impl AccessError {
        /// Message shown to the user after the redirect
        pub fn user_message(&self) -> &'static str {
            match self {
                AccessError::Unauthenticated => "Please log in to access this page.",
                AccessError::Unauthorized(_) => {
                    "You do not have the permissions required to access this page."
                }
                AccessError::MissingRole => {
                    "Your account has no role assigned. Contact the administrator."
                }
            }
        }
    }

    /// Source of the current time
    pub trait Clock: Send + Sync {
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Clock pinned to a settable instant, for tests and replay tooling
    #[derive(Debug)]
    pub struct FixedClock {
        instant: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        pub fn new(instant: DateTime<Utc>) -> Self {
            Self {
                instant: Mutex::new(instant),
            }
        }

        pub fn set(&self, instant: DateTime<Utc>) {
            *self.instant.lock().unwrap_or_else(|e| e.into_inner()) = instant;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.instant.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}

/// Field validation helpers for request payloads
pub mod validation {
    use super::*;
    use std::fmt;

    /// Validation error with detailed context
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ValidationError {
        pub field: String,
        pub message: String,
        pub code: ValidationErrorCode,
    }

    /// Specific validation error codes for programmatic handling
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ValidationErrorCode {
        Required,
        TooLong,
    }

    impl fmt::Display for ValidationError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: {} ({:?})", self.field, self.message, self.code)
        }
    }

    /// Validation result that can accumulate multiple errors
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub struct ValidationResult {
        pub errors: Vec<ValidationError>,
    }

    impl ValidationResult {
        pub fn new() -> Self {
            Self { errors: Vec::new() }
        }

        pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
            self.errors.push(ValidationError {
                field: field.to_string(),
                message: message.to_string(),
                code,
            });
        }

        pub fn is_valid(&self) -> bool {
            self.errors.is_empty()
        }

        pub fn merge(&mut self, other: ValidationResult) {
            self.errors.extend(other.errors);
        }

        /// All messages joined for display next to the form
        pub fn summary(&self) -> String {
            let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
            messages.join("; ")
        }
    }

    /// Validate a required free-text field with a maximum length
    pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> ValidationResult {
        let mut result = ValidationResult::new();

        if value.trim().is_empty() {
            result.add_error(field, &format!("{field} is required"), ValidationErrorCode::Required);
            return result;
        }

        if value.chars().count() > max_len {
            result.add_error(
                field,
                &format!("{field} cannot exceed {max_len} characters"),
                ValidationErrorCode::TooLong,
            );
        }

        result
    }
}

/// Audit logging module - records every access decision
///
/// Allowed and denied requests are recorded as distinct event kinds so a
/// reviewer can pull the denial trail without filtering allow noise.
pub mod audit {
    use super::*;
    use crate::access_control::{AllowReason, DenyReason, Operation, Role};
    use std::sync::Mutex;

    /// Access log entry for a request that was let through
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AccessLogEntry {
        pub actor_id: Option<ActorId>,
        pub username: Option<String>,
        pub role: Option<Role>,
        pub operation: Operation,
        pub path: String,
        pub grant: AllowReason,
        pub at: DateTime<Utc>,
    }

    /// Denied access log for security monitoring
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AccessDeniedLogEntry {
        pub actor_id: Option<ActorId>,
        pub username: Option<String>,
        pub role: Option<Role>,
        pub operation: Operation,
        pub path: String,
        pub reason: DenyReason,
        pub at: DateTime<Utc>,
    }

    /// One audit record
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum AuditEvent {
        Allowed(AccessLogEntry),
        Denied(AccessDeniedLogEntry),
    }

    impl AuditEvent {
        pub fn is_denial(&self) -> bool {
            matches!(self, AuditEvent::Denied(_))
        }
    }

    /// Destination for audit events
    pub trait AuditSink: Send + Sync {
        fn record(&self, event: AuditEvent);
    }

    /// Sink that only emits log lines; the gate already logs, so this drops the record
    #[derive(Clone, Copy, Debug, Default)]
    pub struct TracingAuditSink;

    impl AuditSink for TracingAuditSink {
        fn record(&self, event: AuditEvent) {
            if let AuditEvent::Denied(entry) = &event {
                tracing::trace!(
                    target: "audit",
                    actor = ?entry.actor_id,
                    path = %entry.path,
                    reason = %entry.reason,
                    "denial recorded"
                );
            }
        }
    }

    /// Audit trail kept in memory
    #[derive(Debug, Default)]
    pub struct InMemoryAuditLog {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl InMemoryAuditLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<AuditEvent> {
            self.events
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        pub fn denials(&self) -> Vec<AccessDeniedLogEntry> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    AuditEvent::Denied(entry) => Some(entry),
                    AuditEvent::Allowed(_) => None,
                })
                .collect()
        }

        pub fn allowances(&self) -> Vec<AccessLogEntry> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    AuditEvent::Allowed(entry) => Some(entry),
                    AuditEvent::Denied(_) => None,
                })
                .collect()
        }

        pub fn len(&self) -> usize {
            self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl AuditSink for InMemoryAuditLog {
        fn record(&self, event: AuditEvent) {
            self.events
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        }
    }
}
