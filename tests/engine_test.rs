//! Tick worker lifecycle and concurrent access tests

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use intersection_sim::simulation::{
    ApproachId, SignalPhase, SimConfig, SimWorld, SimulationEngine, TurnIntent, Vehicle,
    VehicleClass, VehicleId, MAX_LOG_SIZE, MAX_VEHICLES_PER_APPROACH, SHUTDOWN_TIMEOUT,
    TICK_INTERVAL,
};

fn engine(seed: u64) -> SimulationEngine {
    SimulationEngine::new(SimConfig::with_seed(seed)).expect("valid config")
}

#[test]
fn test_start_and_stop_are_idempotent() {
    let engine = engine(1);
    assert!(!engine.is_running());
    assert!(!engine.stop());

    assert!(engine.start().unwrap());
    assert!(!engine.start().unwrap());
    assert!(engine.is_running());

    assert!(engine.stop());
    assert!(!engine.stop());
    assert!(!engine.is_running());

    // Restart after a stop
    assert!(engine.start().unwrap());
    assert!(engine.stop());
}

#[test]
fn test_worker_advances_simulation_time() {
    let engine = engine(2);
    engine.start().unwrap();
    thread::sleep(Duration::from_millis(400));
    engine.stop();

    let elapsed = engine.stats().sim_time_secs;
    assert!(elapsed > 0.0);
    // Capped ticks never run ahead of the wall clock
    assert!(elapsed < 2.0, "simulated {elapsed}s");

    let frozen = engine.stats().sim_time_secs;
    thread::sleep(Duration::from_millis(150));
    assert_eq!(engine.stats().sim_time_secs, frozen);
}

#[test]
fn test_stalled_tick_is_capped() {
    let engine = SimulationEngine::from_world(
        SimWorld::new_with_seed(3).unwrap(),
        TICK_INTERVAL,
        SHUTDOWN_TIMEOUT,
    );
    engine.start().unwrap();
    thread::sleep(Duration::from_millis(100));

    let before = engine.with_world(|world| {
        thread::sleep(Duration::from_millis(600));
        world.time_ms()
    });
    thread::sleep(Duration::from_millis(20));
    let after = engine.with_world(|world| world.time_ms());
    engine.stop();

    // The 600 ms stall counts as at most one nominal tick
    assert!(after - before < 400.0, "advanced {}ms", after - before);
}

#[test]
fn test_readers_see_consistent_snapshots() {
    let engine = Arc::new(engine(4));
    engine.start().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    let state = engine.state();
                    assert_eq!(state.signals.len(), 4);
                    for id in ApproachId::ALL {
                        let queued = state.vehicles.iter().filter(|v| v.approach == id).count();
                        assert!(queued <= MAX_VEHICLES_PER_APPROACH);
                    }
                    if state.is_auto_mode && !state.is_emergency {
                        let non_red = state
                            .signals
                            .iter()
                            .filter(|s| s.phase != SignalPhase::Red)
                            .count();
                        assert_eq!(non_red, 1);
                    }
                    assert!(engine.violations().len() <= MAX_LOG_SIZE);
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(engine.stop());
}

#[test]
fn test_controls_while_running() {
    let engine = Arc::new(engine(5));
    engine.start().unwrap();

    let triggers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.trigger_emergency())
        })
        .collect();
    let started = triggers
        .into_iter()
        .filter_map(|handle| handle.join().unwrap())
        .count();

    assert_eq!(started, 1);
    assert_eq!(engine.incident_count(), 1);
    assert_eq!(engine.emergency_log().len(), 1);
    assert!(engine.stats().is_emergency);
    assert!(!engine.stats().is_auto_mode);

    engine.set_all_signals(SignalPhase::Red);
    assert!(engine
        .signals()
        .iter()
        .all(|signal| signal.phase == SignalPhase::Red));

    assert!(engine.stop());
}

#[test]
fn test_stop_from_another_thread() {
    let engine = Arc::new(engine(6));
    engine.start().unwrap();

    let stopper = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.stop())
    };

    assert!(stopper.join().unwrap());
    assert!(!engine.is_running());
}

/// Engine whose approaches spawn every 100 ms
fn busy_engine(seed: u64) -> SimulationEngine {
    let config = SimConfig {
        base_spawn_time_ms: 100.0,
        random_spawn_time_ms: 0.0,
        ..SimConfig::with_seed(seed)
    };
    SimulationEngine::from_world(SimWorld::new(config).unwrap(), TICK_INTERVAL, SHUTDOWN_TIMEOUT)
}

#[test]
fn test_worker_keeps_ticking_after_vehicle_fault() {
    let engine = busy_engine(7);
    let broken = engine.with_world(|world| {
        let mut vehicle = Vehicle::new(
            VehicleId::next(),
            ApproachId::North,
            VehicleClass::Normal,
            0.06,
            TurnIntent::Straight,
        );
        vehicle.position.x = f64::NAN;
        let id = vehicle.id;
        world
            .approach_mut(ApproachId::North)
            .add_priority_vehicle_to_front(vehicle)
            .unwrap();
        id
    });

    engine.start().unwrap();
    thread::sleep(Duration::from_millis(200));
    let before = engine.with_world(|world| world.time_ms());
    thread::sleep(Duration::from_millis(400));
    engine.stop();

    let stats = engine.stats();
    assert!(stats.sim_time_secs * 1000.0 > before);
    assert!(engine.vehicles().iter().all(|v| v.id != broken));
    for id in ApproachId::ALL {
        assert!(stats.vehicles_by_approach[&id] > 0, "{id} never spawned");
    }
}

#[test]
fn test_poisoned_world_lock_is_recovered() {
    let engine = Arc::new(busy_engine(8));
    engine.start().unwrap();

    let panicker = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.with_world(|_| panic!("reader failed while holding the world")))
    };
    assert!(panicker.join().is_err());

    let before = engine.with_world(|world| world.time_ms());
    thread::sleep(Duration::from_millis(300));
    let state = engine.state();
    assert!(state.sim_time_ms > before);
    assert_eq!(state.signals.len(), 4);
    assert!(engine.trigger_emergency().is_some());
    assert!(engine.stop());
}

#[test]
fn test_running_flag_tracks_worker_under_contention() {
    let engine = Arc::new(engine(9));

    for _ in 0..50 {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    if n % 2 == 0 {
                        let _ = engine.start();
                    } else {
                        engine.stop();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // `stop` reports whether a worker existed, which must agree with the flag
        let running = engine.is_running();
        assert_eq!(engine.stop(), running);
        assert!(!engine.is_running());
    }
}
