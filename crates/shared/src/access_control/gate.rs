//! The access gate
//!
//! [`AccessGate::authorize`] is invoked uniformly by the request layer before
//! any handler runs. It never fails: a refusal is an
//! [`AccessDecision::Deny`] carrying the reason and where to redirect.

use super::{Operation, PermissionTable, Role, STANDARD_PERMISSIONS};
use crate::audit::{AccessDeniedLogEntry, AccessLogEntry, AuditEvent, AuditSink, TracingAuditSink};
use crate::config::GateConfig;
use crate::types::{AccessError, Actor, ActorId, Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

// ============================================================================
// Decisions
// ============================================================================

/// Why a request was let through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    PublicPath,
    Superuser,
    Admin,
    OperationGranted,
    PathPrefixGranted,
}

/// Why a request was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    MustAuthenticate,
    NoRoleAssigned,
    InsufficientPermissions,
    /// Let through by the gate, refused by a view-level capability check
    MissingCapability,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MustAuthenticate => write!(f, "must authenticate"),
            DenyReason::NoRoleAssigned => write!(f, "no role assigned"),
            DenyReason::InsufficientPermissions => write!(f, "insufficient permissions"),
            DenyReason::MissingCapability => write!(f, "missing capability"),
        }
    }
}

/// Where a refused request is sent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Login,
    Dashboard,
}

impl RedirectTarget {
    /// Resolve the target against the configured entry points
    pub fn path<'a>(&self, config: &'a GateConfig) -> &'a str {
        match self {
            RedirectTarget::Login => config.login_url.as_str(),
            RedirectTarget::Dashboard => config.dashboard_url.as_str(),
        }
    }
}

/// Refusal details
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub reason: DenyReason,
    pub redirect: RedirectTarget,
}

impl Denial {
    pub fn to_error(&self) -> AccessError {
        match self.reason {
            DenyReason::MustAuthenticate => AccessError::Unauthenticated,
            DenyReason::NoRoleAssigned => AccessError::MissingRole,
            DenyReason::InsufficientPermissions | DenyReason::MissingCapability => {
                AccessError::Unauthorized(self.reason.to_string())
            }
        }
    }
}

/// Outcome of [`AccessGate::authorize`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow { grant: AllowReason },
    Deny(Denial),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow { .. })
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            AccessDecision::Deny(denial) => Some(denial),
            AccessDecision::Allow { .. } => None,
        }
    }

    /// Convert into the error taxonomy used at the request boundary
    pub fn into_result(self) -> Result<AllowReason, AccessError> {
        match self {
            AccessDecision::Allow { grant } => Ok(grant),
            AccessDecision::Deny(denial) => Err(denial.to_error()),
        }
    }
}

// ============================================================================
// Role resolution
// ============================================================================

/// Looks up the role attached to an account's staff profile.
///
/// `None` covers both "no staff profile" and "profile without a role".
pub trait RoleResolver: Send + Sync {
    fn resolve_role(&self, actor_id: ActorId) -> Option<Role>;
}

/// In-memory staff directory
#[derive(Debug, Default)]
pub struct StaffDirectory {
    roles: RwLock<HashMap<ActorId, Role>>,
}

impl StaffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, actor_id: ActorId, role: Role) {
        self.roles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(actor_id, role);
    }

    pub fn revoke(&self, actor_id: ActorId) -> Option<Role> {
        self.roles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&actor_id)
    }
}

impl FromIterator<(ActorId, Role)> for StaffDirectory {
    fn from_iter<I: IntoIterator<Item = (ActorId, Role)>>(iter: I) -> Self {
        Self {
            roles: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl RoleResolver for StaffDirectory {
    fn resolve_role(&self, actor_id: ActorId) -> Option<Role> {
        self.roles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&actor_id)
            .copied()
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Request gate evaluating the permission tables
pub struct AccessGate {
    config: GateConfig,
    permissions: Arc<PermissionTable>,
    resolver: Arc<dyn RoleResolver>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AccessGate {
    /// Gate over the standard tables, or the override carried by `config`
    pub fn new(config: GateConfig, resolver: Arc<dyn RoleResolver>) -> Self {
        let permissions = match &config.permissions {
            Some(table) => Arc::new(table.clone()),
            None => Arc::new(PermissionTable::clone(&STANDARD_PERMISSIONS)),
        };
        Self {
            config,
            permissions,
            resolver,
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    /// Role of the actor as the gate sees it
    pub fn role_of(&self, actor: &Actor) -> Option<Role> {
        self.resolver.resolve_role(actor.id)
    }

    /// Decide whether `actor` may perform `operation` on `path`.
    ///
    /// `actor` is `None` for an anonymous request.
    pub fn authorize(&self, actor: Option<&Actor>, operation: Operation, path: &str) -> AccessDecision {
        // Public pages need no identity at all
        if self.is_public(path) {
            return self.allow(actor, None, operation, path, AllowReason::PublicPath);
        }

        let Some(actor) = actor else {
            return self.refuse(None, None, operation, path, DenyReason::MustAuthenticate, RedirectTarget::Login);
        };

        if actor.is_superuser {
            return self.allow(Some(actor), None, operation, path, AllowReason::Superuser);
        }

        let Some(role) = self.resolver.resolve_role(actor.id) else {
            tracing::warn!(
                target: "access_control",
                actor = %actor.id,
                username = %actor.username,
                "account has no role assigned"
            );
            return self.refuse(Some(actor), None, operation, path, DenyReason::NoRoleAssigned, RedirectTarget::Login);
        };

        if role.is_admin() {
            return self.allow(Some(actor), Some(role), operation, path, AllowReason::Admin);
        }

        if self.permissions.permits_operation(role, operation) {
            return self.allow(Some(actor), Some(role), operation, path, AllowReason::OperationGranted);
        }

        // Coarser fallback on the request path
        if self.permissions.permits_path(role, path) {
            return self.allow(Some(actor), Some(role), operation, path, AllowReason::PathPrefixGranted);
        }

        self.refuse(
            Some(actor),
            Some(role),
            operation,
            path,
            DenyReason::InsufficientPermissions,
            RedirectTarget::Dashboard,
        )
    }

    /// Whether `actor` holds one of `roles`, superusers and administrators always do.
    ///
    /// Used by views to toggle controls ("new appointment" buttons and the like).
    pub fn has_any_role(&self, actor: &Actor, roles: &[Role]) -> bool {
        if actor.is_superuser {
            return true;
        }
        match self.resolver.resolve_role(actor.id) {
            Some(role) => role.is_admin() || roles.contains(&role),
            None => false,
        }
    }

    /// Whether the actor may create appointments from list and agenda views
    pub fn can_create_appointments(&self, actor: &Actor) -> bool {
        self.has_any_role(actor, &[Role::FrontDesk, Role::Practitioner])
    }

    /// Whether the actor may edit appointments from list and agenda views
    pub fn can_edit_appointments(&self, actor: &Actor) -> bool {
        self.has_any_role(actor, &[Role::FrontDesk, Role::Practitioner])
    }

    /// Refuse a request the gate already let through because the actor lacks
    /// the capability `operation` needs. Logged and audited like any denial.
    pub fn refuse_capability(&self, actor: &Actor, operation: Operation, path: &str) -> Denial {
        let role = self.role_of(actor);
        self.record_denial(
            Some(actor),
            role,
            operation,
            path,
            DenyReason::MissingCapability,
            RedirectTarget::Dashboard,
        )
    }

    fn is_public(&self, path: &str) -> bool {
        self.config
            .public_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn allow(
        &self,
        actor: Option<&Actor>,
        role: Option<Role>,
        operation: Operation,
        path: &str,
        grant: AllowReason,
    ) -> AccessDecision {
        tracing::debug!(
            target: "access_control",
            actor = ?actor.map(|a| a.id),
            role = ?role,
            %operation,
            path,
            ?grant,
            "access granted"
        );
        self.audit.record(AuditEvent::Allowed(AccessLogEntry {
            actor_id: actor.map(|a| a.id),
            username: actor.map(|a| a.username.clone()),
            role,
            operation,
            path: path.to_string(),
            grant,
            at: self.clock.now(),
        }));
        AccessDecision::Allow { grant }
    }

    fn refuse(
        &self,
        actor: Option<&Actor>,
        role: Option<Role>,
        operation: Operation,
        path: &str,
        reason: DenyReason,
        redirect: RedirectTarget,
    ) -> AccessDecision {
        AccessDecision::Deny(self.record_denial(actor, role, operation, path, reason, redirect))
    }

    fn record_denial(
        &self,
        actor: Option<&Actor>,
        role: Option<Role>,
        operation: Operation,
        path: &str,
        reason: DenyReason,
        redirect: RedirectTarget,
    ) -> Denial {
        tracing::warn!(
            target: "access_control",
            actor = ?actor.map(|a| a.id),
            username = actor.map(|a| a.username.as_str()).unwrap_or("anonymous"),
            role = role.map(|r| r.code()).unwrap_or("none"),
            %operation,
            path,
            %reason,
            "access denied"
        );
        self.audit.record(AuditEvent::Denied(AccessDeniedLogEntry {
            actor_id: actor.map(|a| a.id),
            username: actor.map(|a| a.username.clone()),
            role,
            operation,
            path: path.to_string(),
            reason,
            at: self.clock.now(),
        }));
        Denial { reason, redirect }
    }
}
