//! Event log and emergency bookkeeping tests

use std::sync::Arc;
use std::thread;

use intersection_sim::simulation::{
    ApproachId, EmergencyEpisode, EmergencyManager, EpisodeId, EventLog, IncidentType, Records, VehicleId,
    EMERGENCY_FALLBACK_MS, MAX_LOG_SIZE,
};

#[test]
fn test_event_log_keeps_most_recent_entries() {
    let log = EventLog::new(MAX_LOG_SIZE);
    for n in 0..15u32 {
        log.push(n);
    }

    let entries = log.snapshot();
    assert_eq!(entries.len(), MAX_LOG_SIZE);
    assert_eq!(entries.first(), Some(&14));
    assert_eq!(entries.last(), Some(&5));
}

#[test]
fn test_event_log_updates_matching_entry_in_place() {
    let log = EventLog::new(3);
    log.push((1, "pending"));
    log.push((2, "pending"));

    assert!(log.update_first(|entry| entry.0 == 1, |entry| entry.1 = "cleared"));
    assert!(!log.update_first(|entry| entry.0 == 9, |entry| entry.1 = "cleared"));

    assert_eq!(log.snapshot(), vec![(2, "pending"), (1, "cleared")]);
}

#[test]
fn test_event_log_accepts_concurrent_writers() {
    let log = Arc::new(EventLog::new(MAX_LOG_SIZE));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for n in 0..100 {
                    log.push(t * 1_000 + n);
                    assert!(log.len() <= MAX_LOG_SIZE);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(log.len(), MAX_LOG_SIZE);
}

#[test]
fn test_ids_are_formatted_for_display() {
    let records = Records::new(MAX_LOG_SIZE);
    assert_eq!(records.next_violation_id().to_string(), "V-0");
    assert_eq!(records.next_violation_id().to_string(), "V-1");
    assert_eq!(records.next_episode_id().to_string(), "EV-0");
}

#[test]
fn test_clearance_time_is_recorded_on_exit() {
    let records = Arc::new(Records::new(MAX_LOG_SIZE));
    let mut manager = EmergencyManager::new(EMERGENCY_FALLBACK_MS, Arc::clone(&records));
    let tracked = VehicleId::next();

    let episode = manager
        .begin(ApproachId::East, IncidentType::FireTruck, Some(tracked), 1_000.0)
        .unwrap();
    assert_eq!(episode, EpisodeId(0));
    assert_eq!(manager.tracked_vehicle(), Some(tracked));
    assert_eq!(records.incident_count(), 1);

    // Other vehicles only count as processed
    assert_eq!(manager.on_vehicle_exit(VehicleId::next(), 3_000.0), None);
    assert_eq!(manager.tracked_vehicle(), Some(tracked));

    let clearance = manager.on_vehicle_exit(tracked, 7_200.0).unwrap();
    assert!((clearance.as_secs_f64() - 6.2).abs() < 1e-6);
    assert_eq!(manager.tracked_vehicle(), None);
    assert!(manager.is_active());
    assert_eq!(records.vehicles_processed(), 2);

    let logged = records.emergencies.snapshot();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].incident, IncidentType::FireTruck);
    assert_eq!(logged[0].clearance, Some(clearance));
    assert_eq!(records.response_times(), vec![clearance]);

    // A second exit of the same id records nothing new
    assert_eq!(manager.on_vehicle_exit(tracked, 8_000.0), None);
    assert_eq!(records.response_times().len(), 1);
}

#[test]
fn test_clearance_survives_evicted_log_entry() {
    let records = Arc::new(Records::new(2));
    let mut manager = EmergencyManager::new(EMERGENCY_FALLBACK_MS, Arc::clone(&records));
    let tracked = VehicleId::next();
    manager.begin(ApproachId::South, IncidentType::Police, Some(tracked), 0.0);

    // Push the episode out of the bounded log
    let template = records.emergencies.snapshot()[0].clone();
    for id in [99, 100] {
        records.emergencies.push(EmergencyEpisode {
            id: EpisodeId(id),
            tracked_vehicle: None,
            ..template.clone()
        });
    }
    assert!(records
        .emergencies
        .snapshot()
        .iter()
        .all(|episode| episode.id != EpisodeId(0)));

    let clearance = manager.on_vehicle_exit(tracked, 4_000.0).unwrap();
    assert!((clearance.as_secs_f64() - 4.0).abs() < 1e-6);
    assert_eq!(records.response_times(), vec![clearance]);
    assert!(records
        .emergencies
        .snapshot()
        .iter()
        .all(|episode| episode.clearance.is_none()));
}

#[test]
fn test_fallback_ends_episode() {
    let records = Arc::new(Records::new(MAX_LOG_SIZE));
    let mut manager = EmergencyManager::new(1_000.0, Arc::clone(&records));
    manager.begin(ApproachId::North, IncidentType::Ambulance, None, 0.0);

    assert!(manager
        .begin(ApproachId::West, IncidentType::Police, None, 10.0)
        .is_none());
    assert!(!manager.update(999.0));
    assert!(manager.update(1.0));
    assert!(!manager.is_active());
    assert!(!manager.update(50.0));
    assert_eq!(records.incident_count(), 1);
    assert!(records.response_times().is_empty());
}
