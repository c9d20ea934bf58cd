//! Operation identifiers
//!
//! Each request handler declares which [`Operation`] it performs. The gate
//! matches on these identifiers rather than on handler names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functional area an operation belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Dashboard,
    Patients,
    MedicalRecords,
    Appointments,
    Exams,
    Pharmacy,
    Prescriptions,
    Billing,
    Users,
    Account,
}

macro_rules! operations {
    ($( $variant:ident => ($id:literal, $label:literal, $area:ident) ),+ $(,)?) => {
        /// Every protected operation of the clinic application
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Operation {
            $( $variant, )+
        }

        impl Operation {
            pub const ALL: &'static [Operation] = &[ $( Operation::$variant, )+ ];

            /// Stable identifier, identical to the serialized form
            pub fn id(&self) -> &'static str {
                match self {
                    $( Operation::$variant => $id, )+
                }
            }

            /// Short human description ("list patients")
            pub fn label(&self) -> &'static str {
                match self {
                    $( Operation::$variant => $label, )+
                }
            }

            pub fn area(&self) -> Area {
                match self {
                    $( Operation::$variant => Area::$area, )+
                }
            }
        }
    };
}

operations! {
    Dashboard => ("dashboard", "view dashboard", Dashboard),

    // Patients
    ListPatients => ("list_patients", "list patients", Patients),
    ViewPatient => ("view_patient", "view patient", Patients),
    SearchPatients => ("search_patients", "search patients", Patients),
    CreatePatient => ("create_patient", "create patient", Patients),
    UpdatePatient => ("update_patient", "update patient", Patients),

    // Medical records
    ViewMedicalRecord => ("view_medical_record", "view medical record", MedicalRecords),
    CreateConsultation => ("create_consultation", "create consultation", MedicalRecords),
    ViewConsultation => ("view_consultation", "view consultation", MedicalRecords),
    ListConsultations => ("list_consultations", "list consultations", MedicalRecords),

    // Appointments
    ViewAppointmentCalendar => ("view_appointment_calendar", "view appointment calendar", Appointments),
    ListAppointments => ("list_appointments", "list appointments", Appointments),
    CreateAppointment => ("create_appointment", "create appointment", Appointments),
    UpdateAppointment => ("update_appointment", "update appointment", Appointments),
    ViewDailyAppointments => ("view_daily_appointments", "view daily appointments", Appointments),
    UpdateAppointmentStatus => ("update_appointment_status", "update appointment status", Appointments),
    CheckAvailability => ("check_availability", "check practitioner availability", Appointments),

    // Laboratory
    ListExams => ("list_exams", "view exam list", Exams),
    CreateExam => ("create_exam", "request exam", Exams),
    ViewExam => ("view_exam", "view exam", Exams),
    CreateExamResult => ("create_exam_result", "record exam result", Exams),
    ViewExamResult => ("view_exam_result", "view exam result", Exams),

    // Pharmacy
    ListMedications => ("list_medications", "list medications", Pharmacy),
    CreateMedication => ("create_medication", "create medication", Pharmacy),
    ViewStock => ("view_stock", "view stock", Pharmacy),
    CreateStockMovement => ("create_stock_movement", "record stock movement", Pharmacy),
    ListStockMovements => ("list_stock_movements", "list stock movements", Pharmacy),
    PointOfSale => ("point_of_sale", "point of sale", Pharmacy),

    // Prescriptions
    ListPrescriptions => ("list_prescriptions", "list prescriptions", Prescriptions),
    CreatePrescription => ("create_prescription", "create prescription", Prescriptions),
    ViewPrescription => ("view_prescription", "view prescription", Prescriptions),
    PrintPrescription => ("print_prescription", "print prescription", Prescriptions),

    // Billing
    ListInvoices => ("list_invoices", "list invoices", Billing),
    CreateInvoice => ("create_invoice", "create invoice", Billing),
    ViewInvoice => ("view_invoice", "view invoice", Billing),
    PrintInvoice => ("print_invoice", "print invoice", Billing),
    CreatePayment => ("create_payment", "record payment", Billing),

    // User administration
    ListUsers => ("list_users", "list users", Users),
    ViewUser => ("view_user", "view user", Users),
    RegisterUser => ("register_user", "register user", Users),
    UpdateUser => ("update_user", "update user", Users),
    ToggleUserActive => ("toggle_user_active", "toggle user activation", Users),

    // Own account
    ViewProfile => ("view_profile", "view profile", Account),
    ChangePassword => ("change_password", "change password", Account),
}

impl Operation {
    /// Operations that create or modify an appointment and therefore go
    /// through the scheduler validator before anything is persisted
    pub fn is_appointment_mutation(&self) -> bool {
        matches!(
            self,
            Operation::CreateAppointment
                | Operation::UpdateAppointment
                | Operation::UpdateAppointmentStatus
        )
    }

    /// Operations available to every account that holds any role
    pub fn is_self_service(&self) -> bool {
        matches!(
            self,
            Operation::Dashboard | Operation::ViewProfile | Operation::ChangePassword
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Unknown operation identifier
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.id() == needle || op.label() == needle)
            .ok_or_else(|| ParseOperationError(s.to_string()))
    }
}
