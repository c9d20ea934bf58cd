//! Access Control Tests
//!
//! Tests for the role-based request gate:
//! - Public paths and unauthenticated requests
//! - Superuser and administrator bypass
//! - Accounts without a role
//! - Operation grants and the path prefix fallback
//! - Audit trail of allowed and denied requests

#[cfg(test)]
mod unit_tests {
    use crate::fixtures::*;
    use clinic_shared::{
        AccessDecision, AccessError, AccessGate, Actor, AllowReason, AuditEvent, ClinicConfig,
        DenyReason, InMemoryAuditLog, Operation, RedirectTarget, Role, StaffDirectory,
    };
    use std::sync::Arc;

    #[test]
    fn test_lab_tech_scenario() {
        let clinic = clinic();
        let lab = actor(LAB);

        let create: Operation = "create appointment".parse().unwrap();
        let decision = clinic.gate.authorize(Some(&lab), create, "/appointments/new/");
        assert_eq!(
            decision.denial().map(|d| d.reason),
            Some(DenyReason::InsufficientPermissions)
        );
        assert_eq!(
            decision.denial().map(|d| d.redirect),
            Some(RedirectTarget::Dashboard)
        );

        let exams: Operation = "view exam list".parse().unwrap();
        assert!(clinic.gate.authorize(Some(&lab), exams, "/exams/").is_allowed());
    }

    #[test]
    fn test_public_paths_need_no_login() {
        let clinic = clinic();
        for path in ["/login/", "/logout/", "/password_reset/done/", "/static/css/site.css"] {
            let decision = clinic.gate.authorize(None, Operation::Dashboard, path);
            assert_eq!(
                decision,
                AccessDecision::Allow { grant: AllowReason::PublicPath },
                "{path}"
            );
        }
    }

    #[test]
    fn test_anonymous_request_goes_to_login() {
        let clinic = clinic();
        let decision = clinic.gate.authorize(None, Operation::ListPatients, "/patients/");
        let denial = decision.denial().copied().unwrap();
        assert_eq!(denial.reason, DenyReason::MustAuthenticate);
        assert_eq!(denial.redirect.path(clinic.gate.config()), "/login/");
        assert_eq!(decision.into_result(), Err(AccessError::Unauthenticated));
    }

    #[test]
    fn test_admin_and_superuser_reach_everything() {
        let clinic = clinic();
        let admin = actor(ADMIN);
        let root = Actor::superuser(99, "root");

        for &operation in Operation::ALL {
            assert!(clinic.gate.authorize(Some(&admin), operation, "/anywhere/").is_allowed());
            assert!(clinic.gate.authorize(Some(&root), operation, "/anywhere/").is_allowed());
        }
    }

    #[test]
    fn test_missing_role_is_denied_and_audited() {
        let clinic = clinic();
        let orphan = actor(NO_ROLE);

        let decision = clinic.gate.authorize(Some(&orphan), Operation::Dashboard, "/dashboard/");
        assert_eq!(decision.into_result(), Err(AccessError::MissingRole));
        assert_eq!(
            decision.denial().map(|d| d.redirect),
            Some(RedirectTarget::Login)
        );

        let denials = clinic.audit.denials();
        assert_eq!(denials.len(), 1);
        assert_eq!(denials[0].reason, DenyReason::NoRoleAssigned);
        assert_eq!(denials[0].role, None);
        assert_eq!(denials[0].path, "/dashboard/");
    }

    #[test]
    fn test_superuser_without_role_is_still_allowed() {
        let clinic = clinic();
        let root = Actor::superuser(NO_ROLE, "root");
        assert!(clinic
            .gate
            .authorize(Some(&root), Operation::ListUsers, "/users/")
            .is_allowed());
    }

    #[test]
    fn test_prefix_fallback_grants_unlisted_operation() {
        let clinic = clinic();
        let pharmacist = actor(PHARMACY);

        // Invoice details are not in the pharmacist's operations, but /billing/list/ is a prefix
        let decision = clinic
            .gate
            .authorize(Some(&pharmacist), Operation::ViewInvoice, "/billing/list/42/");
        assert_eq!(
            decision,
            AccessDecision::Allow { grant: AllowReason::PathPrefixGranted }
        );

        let decision = clinic
            .gate
            .authorize(Some(&pharmacist), Operation::ViewInvoice, "/billing/42/");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_every_role_reaches_own_account_pages() {
        let clinic = clinic();
        for id in [RECEPTION, DR_HOUSE, NURSE, LAB, PHARMACY] {
            let user = actor(id);
            assert!(clinic
                .gate
                .authorize(Some(&user), Operation::ChangePassword, "/account/password/")
                .is_allowed());
        }
    }

    #[test]
    fn test_audit_separates_allowed_from_denied() {
        let clinic = clinic();
        let nurse = actor(NURSE);

        clinic.gate.authorize(Some(&nurse), Operation::ListPatients, "/patients/");
        clinic.gate.authorize(Some(&nurse), Operation::CreateInvoice, "/billing/new/");
        clinic.gate.authorize(Some(&nurse), Operation::ViewPatient, "/patients/3/");

        let events = clinic.audit.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().filter(|e| e.is_denial()).count(), 1);

        match &events[1] {
            AuditEvent::Denied(entry) => {
                assert_eq!(entry.role, Some(Role::Nurse));
                assert_eq!(entry.operation, Operation::CreateInvoice);
                assert_eq!(entry.at, at(8, 0));
            }
            other => panic!("expected a denial, got {other:?}"),
        }
    }

    #[test]
    fn test_configured_table_replaces_standard() {
        let config = ClinicConfig::from_json_str(
            r#"{
                "gate": {
                    "permissions": {
                        "operations": { "LAB_TECH": ["create_appointment"] },
                        "path_prefixes": {}
                    }
                }
            }"#,
        )
        .unwrap();

        let directory: StaffDirectory = [(clinic_shared::ActorId(LAB), Role::LabTech)]
            .into_iter()
            .collect();
        let gate = AccessGate::new(config.gate, Arc::new(directory))
            .with_audit(Arc::new(InMemoryAuditLog::new()));
        let lab = actor(LAB);

        assert!(gate
            .authorize(Some(&lab), Operation::CreateAppointment, "/appointments/new/")
            .is_allowed());
        assert!(!gate.authorize(Some(&lab), Operation::ListExams, "/labs/").is_allowed());
    }

    #[test]
    fn test_revoked_role_takes_effect_immediately() {
        let directory = Arc::new(directory());
        let gate = AccessGate::new(Default::default(), directory.clone());
        let nurse = actor(NURSE);

        assert!(gate.authorize(Some(&nurse), Operation::ListPatients, "/patients/").is_allowed());
        directory.revoke(nurse.id);
        assert_eq!(
            gate.authorize(Some(&nurse), Operation::ListPatients, "/patients/")
                .denial()
                .map(|d| d.reason),
            Some(DenyReason::NoRoleAssigned)
        );
    }
}

#[cfg(test)]
mod property_tests {
    use crate::fixtures::*;
    use clinic_shared::{AccessGate, DenyReason, GateConfig, Operation, Role, STANDARD_PERMISSIONS};
    use proptest::prelude::*;
    use std::sync::Arc;

    proptest! {
        /// Outside every role prefix, the decision is exactly the operation table
        #[test]
        fn decision_matches_table_off_prefix(role_index in 0usize..5, op_index in 0usize..Operation::ALL.len()) {
            let role = Role::ALL[role_index];
            prop_assume!(!role.is_admin());
            let operation = Operation::ALL[op_index];

            let directory: clinic_shared::StaffDirectory =
                [(clinic_shared::ActorId(1), role)].into_iter().collect();
            let gate = AccessGate::new(GateConfig::default(), Arc::new(directory));
            let user = clinic_shared::Actor::new(1, "prop");

            let decision = gate.authorize(Some(&user), operation, "/elsewhere/");
            let granted = STANDARD_PERMISSIONS.permits_operation(role, operation);
            prop_assert_eq!(decision.is_allowed(), granted);
            if !granted {
                prop_assert_eq!(
                    decision.denial().map(|d| d.reason),
                    Some(DenyReason::InsufficientPermissions)
                );
            }
        }

        /// A missing role is refused on every non-public path
        #[test]
        fn missing_role_always_denied(op_index in 0usize..Operation::ALL.len(), segment in "[a-z]{1,12}") {
            let clinic = clinic();
            let path = format!("/{segment}/");
            prop_assume!(!clinic.gate.config().public_prefixes.iter().any(|p| path.starts_with(p.as_str())));

            let orphan = actor(NO_ROLE);
            let decision = clinic.gate.authorize(Some(&orphan), Operation::ALL[op_index], &path);
            prop_assert_eq!(decision.denial().map(|d| d.reason), Some(DenyReason::NoRoleAssigned));
        }
    }
}
