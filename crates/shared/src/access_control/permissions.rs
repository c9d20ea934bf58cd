//! Static permission tables
//!
//! Two mappings drive every decision: role → permitted operations, and
//! role → permitted path prefixes (a coarser fallback). Administrators are
//! not listed because the gate lets them through before consulting either
//! table.

use super::{Operation, Role};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Process-wide standard table, built on first use and never mutated
pub static STANDARD_PERMISSIONS: Lazy<PermissionTable> = Lazy::new(PermissionTable::standard);

/// Role → operations and role → path prefixes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTable {
    #[serde(default)]
    pub operations: BTreeMap<Role, BTreeSet<Operation>>,
    #[serde(default)]
    pub path_prefixes: BTreeMap<Role, Vec<String>>,
}

impl PermissionTable {
    /// The clinic's standard allow-lists
    pub fn standard() -> Self {
        use Operation::*;

        let mut table = PermissionTable::default();

        table.grant(
            Role::Practitioner,
            &[
                ListPatients,
                ViewPatient,
                SearchPatients,
                ViewMedicalRecord,
                CreateConsultation,
                ViewConsultation,
                ListConsultations,
                ViewAppointmentCalendar,
                ListAppointments,
                CreateAppointment,
                UpdateAppointment,
                ViewDailyAppointments,
                UpdateAppointmentStatus,
                CheckAvailability,
                ListExams,
                CreateExam,
                ViewExam,
                ViewExamResult,
                ListPrescriptions,
                CreatePrescription,
                ViewPrescription,
                PrintPrescription,
            ],
        );
        table.grant(
            Role::Nurse,
            &[
                ListPatients,
                ViewPatient,
                SearchPatients,
                ViewMedicalRecord,
                ViewConsultation,
                ListConsultations,
                ViewAppointmentCalendar,
                ListAppointments,
                ViewDailyAppointments,
                CheckAvailability,
            ],
        );
        table.grant(
            Role::LabTech,
            &[ListExams, ViewExam, CreateExamResult, ViewExamResult],
        );
        table.grant(
            Role::Pharmacist,
            &[
                ListMedications,
                CreateMedication,
                ViewStock,
                CreateStockMovement,
                ListStockMovements,
                PointOfSale,
                ListPrescriptions,
                ViewPrescription,
                PrintPrescription,
                ListInvoices,
            ],
        );
        table.grant(
            Role::FrontDesk,
            &[
                ListPatients,
                ViewPatient,
                CreatePatient,
                UpdatePatient,
                SearchPatients,
                ViewAppointmentCalendar,
                ListAppointments,
                CreateAppointment,
                UpdateAppointment,
                ViewDailyAppointments,
                UpdateAppointmentStatus,
                CheckAvailability,
                ListInvoices,
                CreateInvoice,
                ViewInvoice,
                PrintInvoice,
                CreatePayment,
            ],
        );

        // Every staff role reaches its dashboard and its own account pages
        let self_service: Vec<Operation> = Operation::ALL
            .iter()
            .copied()
            .filter(Operation::is_self_service)
            .collect();
        for role in Role::ALL.into_iter().filter(|role| !role.is_admin()) {
            table.grant(role, &self_service);
        }

        table.allow_prefixes(
            Role::Practitioner,
            &["/patients/", "/records/", "/appointments/", "/exams/", "/prescriptions/"],
        );
        table.allow_prefixes(Role::Nurse, &["/patients/", "/records/", "/appointments/"]);
        table.allow_prefixes(Role::LabTech, &["/exams/"]);
        table.allow_prefixes(
            Role::Pharmacist,
            &["/pharmacy/", "/prescriptions/", "/billing/list/"],
        );
        table.allow_prefixes(Role::FrontDesk, &["/patients/", "/appointments/", "/billing/"]);

        table
    }

    pub fn grant(&mut self, role: Role, operations: &[Operation]) {
        self.operations
            .entry(role)
            .or_default()
            .extend(operations.iter().copied());
    }

    pub fn allow_prefixes(&mut self, role: Role, prefixes: &[&str]) {
        let entry = self.path_prefixes.entry(role).or_default();
        for prefix in prefixes {
            if !entry.iter().any(|existing| existing == prefix) {
                entry.push((*prefix).to_string());
            }
        }
    }

    /// Whether the role's operation allow-list contains `operation`
    pub fn permits_operation(&self, role: Role, operation: Operation) -> bool {
        self.operations
            .get(&role)
            .map_or(false, |ops| ops.contains(&operation))
    }

    /// Whether `path` falls under one of the role's path prefixes
    pub fn permits_path(&self, role: Role, path: &str) -> bool {
        self.path_prefixes
            .get(&role)
            .map_or(false, |prefixes| {
                prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
            })
    }

    /// Roles whose operation allow-list contains `operation`, administrators included
    pub fn roles_for(&self, operation: Operation) -> BTreeSet<Role> {
        let mut roles: BTreeSet<Role> = self
            .operations
            .iter()
            .filter(|(_, ops)| ops.contains(&operation))
            .map(|(role, _)| *role)
            .collect();
        roles.insert(Role::Admin);
        roles
    }

    pub fn operations_for(&self, role: Role) -> impl Iterator<Item = Operation> + '_ {
        self.operations
            .get(&role)
            .into_iter()
            .flat_map(|ops| ops.iter().copied())
    }

    pub fn prefixes_for(&self, role: Role) -> &[String] {
        self.path_prefixes
            .get(&role)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
