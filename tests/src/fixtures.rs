//! Shared builders for the scenario tests

use chrono::{DateTime, TimeZone, Utc};
use clinic_shared::{
    AccessGate, Actor, ActorId, FixedClock, GateConfig, InMemoryAuditLog, PatientId, Role,
    SchedulingRules, StaffDirectory, StaffId,
};
use scheduling_coordinator::{AppointmentDesk, AppointmentStore, InMemoryAppointmentStore, SchedulingService};
use scheduling_integrity::NewAppointment;
use std::sync::Arc;

/// A Monday in the future so nothing trips the past-date rule by accident
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2031, 3, 10, hour, minute, 0).unwrap()
}

pub const RECEPTION: u64 = 1;
pub const DR_HOUSE: u64 = 2;
pub const NURSE: u64 = 3;
pub const LAB: u64 = 4;
pub const PHARMACY: u64 = 5;
pub const ADMIN: u64 = 6;
pub const NO_ROLE: u64 = 7;

/// Staff id of `DR_HOUSE`
pub const HOUSE_STAFF: StaffId = StaffId(20);

pub fn directory() -> StaffDirectory {
    [
        (ActorId(RECEPTION), Role::FrontDesk),
        (ActorId(DR_HOUSE), Role::Practitioner),
        (ActorId(NURSE), Role::Nurse),
        (ActorId(LAB), Role::LabTech),
        (ActorId(PHARMACY), Role::Pharmacist),
        (ActorId(ADMIN), Role::Admin),
    ]
    .into_iter()
    .collect()
}

pub fn actor(id: u64) -> Actor {
    let actor = Actor::new(id, format!("user{id}"));
    if id == DR_HOUSE {
        actor.with_staff(HOUSE_STAFF)
    } else {
        actor
    }
}

pub struct Clinic {
    pub gate: Arc<AccessGate>,
    pub audit: Arc<InMemoryAuditLog>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub service: Arc<SchedulingService>,
    pub desk: AppointmentDesk,
}

/// Fully wired clinic with the clock at 08:00 on the test day
pub fn clinic() -> Clinic {
    clinic_with_store(InMemoryAppointmentStore::new())
}

pub fn clinic_with_store(store: InMemoryAppointmentStore) -> Clinic {
    let clock = Arc::new(FixedClock::new(at(8, 0)));
    let audit = Arc::new(InMemoryAuditLog::new());
    let gate = Arc::new(
        AccessGate::new(GateConfig::default(), Arc::new(directory()))
            .with_audit(audit.clone())
            .with_clock(clock.clone()),
    );
    let store = Arc::new(store);
    let service = Arc::new(SchedulingService::new(
        store.clone() as Arc<dyn AppointmentStore>,
        SchedulingRules::default(),
        clock.clone(),
    ));
    let desk = AppointmentDesk::new(gate.clone(), service.clone());

    Clinic {
        gate,
        audit,
        clock,
        store,
        service,
        desk,
    }
}

pub fn booking(practitioner: StaffId, hour: u32, minute: u32, duration: u32, patient: &str) -> NewAppointment {
    NewAppointment {
        practitioner_id: practitioner,
        patient_id: PatientId(100),
        patient_name: patient.to_string(),
        start: at(hour, minute),
        duration_minutes: duration,
        reason: "Follow-up visit".to_string(),
        notes: None,
    }
}
