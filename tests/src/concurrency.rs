//! Concurrency Tests
//!
//! Two requests that both see a free window must not both end up booked:
//! - Bookings through the service are serialized per practitioner
//! - A naive check-then-write without the lock is caught by the store
//! - Different practitioners do not block each other

#[cfg(test)]
mod race_tests {
    use crate::fixtures::*;
    use clinic_shared::{FixedClock, SchedulingRules, StaffId};
    use scheduling_coordinator::{
        AppointmentStore, AvailabilityChecker, InMemoryAppointmentStore, StoreError,
    };
    use scheduling_integrity::{ScheduleError, WindowRequest};
    use std::sync::{Arc, Barrier};
    use std::thread;

    const RACERS: usize = 8;

    #[test]
    fn test_service_lock_admits_one_overlapping_booking() {
        // No store constraint: the practitioner lock alone must hold the line
        let clinic = clinic_with_store(InMemoryAppointmentStore::without_overlap_constraint());
        let barrier = Arc::new(Barrier::new(RACERS));

        let handles: Vec<_> = (0..RACERS)
            .map(|i| {
                let service = Arc::clone(&clinic.service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    // Every racer asks for a window overlapping 10:00-10:30
                    let minute = (i as u32) * 2;
                    service.book(booking(HOUSE_STAFF, 10, minute, 30, &format!("Patient {i}")))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let booked = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(booked, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, ScheduleError::SchedulingConflict(_))));
        assert_eq!(clinic.store.len(), 1);
    }

    #[test]
    fn test_store_constraint_catches_unlocked_check_then_write() {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let checker = Arc::new(AvailabilityChecker::new(
            store.clone(),
            SchedulingRules::default(),
            Arc::new(FixedClock::new(at(8, 0))),
        ));
        let barrier = Arc::new(Barrier::new(RACERS));

        let handles: Vec<_> = (0..RACERS)
            .map(|i| {
                let store = Arc::clone(&store);
                let checker = Arc::clone(&checker);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let request = WindowRequest {
                        practitioner_id: HOUSE_STAFF,
                        start: at(10, 0),
                        duration_minutes: 30,
                        exclude_id: None,
                    };
                    let check = checker.validate_appointment_window(&request).unwrap();
                    // Everyone has seen a free window before anyone writes
                    barrier.wait();
                    assert!(check.is_available());
                    store.insert(booking(HOUSE_STAFF, 10, 0, 30, &format!("Patient {i}")))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, StoreError::OverlapRejected(_))));

        let conflict: ScheduleError = results
            .into_iter()
            .find_map(Result::err)
            .unwrap()
            .into();
        assert!(matches!(conflict, ScheduleError::SchedulingConflict(_)));
    }

    #[test]
    fn test_different_practitioners_book_in_parallel() {
        let clinic = clinic();
        let barrier = Arc::new(Barrier::new(RACERS));

        let handles: Vec<_> = (0..RACERS)
            .map(|i| {
                let service = Arc::clone(&clinic.service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service.book(booking(StaffId(100 + i as u64), 10, 0, 30, "Same time"))
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(clinic.store.len(), RACERS);
    }

    #[test]
    fn test_concurrent_reschedules_keep_schedule_consistent() {
        let clinic = clinic();
        let ids: Vec<_> = (0..RACERS as u32)
            .map(|i| {
                clinic
                    .service
                    .book(booking(HOUSE_STAFF, 9 + i, 0, 30, &format!("Patient {i}")))
                    .unwrap()
                    .id
            })
            .collect();
        let barrier = Arc::new(Barrier::new(RACERS));

        // Everyone tries to move into the same 18:00 slot
        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let service = Arc::clone(&clinic.service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service.reschedule(
                        id,
                        scheduling_integrity::RescheduleInput {
                            practitioner_id: None,
                            start: at(18, 0),
                            duration_minutes: 30,
                        },
                    )
                })
            })
            .collect();

        let moved = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(moved, 1);

        let at_six = clinic
            .store
            .list_between(at(18, 0), at(18, 30), Some(HOUSE_STAFF))
            .unwrap();
        assert_eq!(at_six.len(), 1);
    }
}
