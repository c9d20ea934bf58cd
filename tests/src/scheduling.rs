//! Scheduling Tests
//!
//! Tests for appointment window validation and the booking lifecycle:
//! - The confirmed-morning scenario (conflict, back-to-back, past date)
//! - Self-exclusion when editing
//! - Status transitions and their effect on availability
//! - Appointment fixtures in their JSON form

#[cfg(test)]
mod unit_tests {
    use crate::fixtures::*;
    use clinic_shared::AppointmentId;
    use scheduling_coordinator::{AppointmentStore, ClinicError};
    use scheduling_integrity::{
        Appointment, AppointmentStatus, RescheduleInput, ScheduleError, WindowCheck, WindowRequest,
    };

    fn window(hour: u32, minute: u32, duration: u32) -> WindowRequest {
        WindowRequest {
            practitioner_id: HOUSE_STAFF,
            start: at(hour, minute),
            duration_minutes: duration,
            exclude_id: None,
        }
    }

    /// Confirmed 10:00-10:30 for Dr House
    fn confirmed_morning() -> (Clinic, Appointment) {
        let clinic = clinic();
        let booked = clinic
            .service
            .book(booking(HOUSE_STAFF, 10, 0, 30, "Lisa Cuddy"))
            .unwrap();
        let confirmed = clinic
            .service
            .update_status(booked.id, AppointmentStatus::Confirmed)
            .unwrap();
        (clinic, confirmed)
    }

    #[test]
    fn test_overlapping_window_conflicts() {
        let (clinic, existing) = confirmed_morning();
        let check = clinic.service.check_availability(&window(10, 15, 30)).unwrap();
        match check {
            WindowCheck::Conflict(conflict) => {
                assert_eq!(conflict.appointment_id, existing.id);
                assert_eq!(conflict.patient_name, "Lisa Cuddy");
                assert_eq!(conflict.start, at(10, 0));
                assert_eq!(conflict.end, at(10, 30));
            }
            WindowCheck::Available => panic!("10:15 overlaps 10:00-10:30"),
        }
    }

    #[test]
    fn test_back_to_back_window_is_available() {
        let (clinic, _) = confirmed_morning();
        assert_eq!(
            clinic.service.check_availability(&window(10, 30, 30)).unwrap(),
            WindowCheck::Available
        );
        assert_eq!(
            clinic.service.check_availability(&window(9, 30, 30)).unwrap(),
            WindowCheck::Available
        );
    }

    #[test]
    fn test_past_window_once_clock_moves() {
        let (clinic, _) = confirmed_morning();
        clinic.clock.set(at(9, 30));
        assert!(matches!(
            clinic.service.check_availability(&window(9, 0, 30)),
            Err(ScheduleError::PastDate { .. })
        ));
    }

    #[test]
    fn test_window_at_calendar_end_is_rejected() {
        let (clinic, _) = confirmed_morning();
        let mut request = window(10, 0, 30);
        request.start = chrono::DateTime::<chrono::Utc>::MAX_UTC;

        let err = clinic.service.check_availability(&request).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidField { ref field, .. } if field == "start"));

        let mut late = booking(HOUSE_STAFF, 10, 0, 30, "Gregory House");
        late.start = request.start;
        assert!(clinic.service.book(late).is_err());
        assert_eq!(clinic.store.len(), 1);
    }

    #[test]
    fn test_check_is_idempotent_without_writes() {
        let (clinic, _) = confirmed_morning();
        for request in [window(10, 15, 30), window(10, 30, 30), window(9, 55, 5)] {
            let first = clinic.service.check_availability(&request);
            let second = clinic.service.check_availability(&request);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_edit_does_not_conflict_with_itself() {
        let (clinic, existing) = confirmed_morning();
        let mut request = window(10, 0, 45);
        assert!(!clinic.service.check_availability(&request).unwrap().is_available());

        request.exclude_id = Some(existing.id);
        assert!(clinic.service.check_availability(&request).unwrap().is_available());

        let moved = clinic
            .service
            .reschedule(
                existing.id,
                RescheduleInput {
                    practitioner_id: None,
                    start: at(10, 0),
                    duration_minutes: 45,
                },
            )
            .unwrap();
        assert_eq!(moved.duration_minutes, 45);
        assert_eq!(moved.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_exclusion_only_skips_the_named_appointment() {
        let (clinic, existing) = confirmed_morning();
        let other = clinic
            .service
            .book(booking(HOUSE_STAFF, 11, 0, 30, "James Wilson"))
            .unwrap();

        let mut request = window(10, 15, 60);
        request.exclude_id = Some(existing.id);
        match clinic.service.check_availability(&request).unwrap() {
            WindowCheck::Conflict(conflict) => assert_eq!(conflict.appointment_id, other.id),
            WindowCheck::Available => panic!("11:00 is still booked"),
        }
    }

    #[test]
    fn test_done_appointment_releases_time() {
        let (clinic, existing) = confirmed_morning();
        clinic
            .service
            .update_status(existing.id, AppointmentStatus::Done)
            .unwrap();
        assert!(clinic.service.check_availability(&window(10, 0, 30)).unwrap().is_available());

        let err = clinic
            .service
            .update_status(existing.id, AppointmentStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTransition { .. }));
    }

    #[test]
    fn test_desk_booking_by_practitioner() {
        let clinic = clinic();
        let house = actor(DR_HOUSE);

        let booked = clinic
            .desk
            .book(Some(&house), booking(HOUSE_STAFF, 14, 0, 20, "Eric Foreman"))
            .unwrap();
        assert_eq!(clinic.store.get(booked.id).unwrap(), booked);

        let err = clinic
            .desk
            .book(Some(&house), booking(HOUSE_STAFF, 14, 10, 20, "Robert Chase"))
            .unwrap_err();
        assert!(matches!(
            err,
            ClinicError::Schedule(ScheduleError::SchedulingConflict(_))
        ));
        assert!(err.user_message().contains("Eric Foreman"));
        assert_eq!(err.redirect(), None);
    }

    #[test]
    fn test_desk_denies_pharmacist_status_update() {
        let clinic = clinic();
        let booked = clinic
            .service
            .book(booking(HOUSE_STAFF, 10, 0, 30, "Lisa Cuddy"))
            .unwrap();

        let err = clinic
            .desk
            .update_status(Some(&actor(PHARMACY)), booked.id, AppointmentStatus::Confirmed)
            .unwrap_err();
        assert_eq!(err.redirect(), Some("/dashboard/"));
        assert_eq!(
            clinic.store.get(booked.id).unwrap().status,
            AppointmentStatus::Planned
        );
    }

    #[test]
    fn test_reception_capabilities() {
        let clinic = clinic();
        let caps = clinic.desk.capabilities(&actor(RECEPTION));
        assert!(caps.can_create && caps.can_edit);

        let caps = clinic.desk.capabilities(&actor(NURSE));
        assert!(!caps.can_create && !caps.can_edit);
    }

    #[test]
    fn test_appointment_fixture_json() {
        let raw = r#"{
            "id": 3,
            "practitioner_id": 20,
            "patient_id": 100,
            "patient_name": "Lisa Cuddy",
            "start": "2031-03-10T10:00:00Z",
            "duration_minutes": 30,
            "reason": "Follow-up visit",
            "status": "CONFIRMED"
        }"#;
        let appointment: Appointment = serde_json::from_str(raw).unwrap();
        assert_eq!(appointment.id, AppointmentId(3));
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(appointment.end(), at(10, 30));
        assert_eq!(appointment.notes, None);
    }
}
