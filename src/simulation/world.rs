//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the signals, approaches and emergency manager and
//! advances them one tick at a time. It is single-threaded; the
//! [`SimulationEngine`](super::engine::SimulationEngine) wraps it for
//! wall-clock driven, multi-reader use.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::services::{summarize_violations, ViolationSummary};

use super::approach::Approach;
use super::config::{SetAllSignalsPolicy, SimConfig};
use super::emergency::EmergencyManager;
use super::event_log::{
    EmergencyEpisode, EpisodeId, IncidentType, Records, ViolationKind, ViolationRecord,
};
use super::signal::{CycleState, Signal, SignalController};
use super::types::{ApproachId, SignalPhase, VehicleClass, VehicleId};
use super::vehicle::Vehicle;

/// Statistics derived from the current state and cumulative counters
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    /// Vehicles that have left the field plus those currently on it
    pub total_vehicles: u64,
    /// Mean wait of the vehicles that are currently blocked
    pub avg_wait_time_secs: f64,
    pub vehicles_by_approach: HashMap<ApproachId, usize>,
    pub avg_emergency_response_secs: f64,
    pub last_emergency_clearance_secs: Option<f64>,
    pub incident_count: u64,
    /// Red-light violations since startup, not just those still logged
    pub total_violations: u64,
    pub is_auto_mode: bool,
    pub is_emergency: bool,
    pub sim_time_secs: f64,
}

/// A consistent view of signals and vehicles taken in one read
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub signals: Vec<Signal>,
    pub vehicles: Vec<Vehicle>,
    pub cycle_state: CycleState,
    pub is_auto_mode: bool,
    pub is_emergency: bool,
    pub sim_time_ms: f64,
}

/// The main simulation world
pub struct SimWorld {
    config: SimConfig,
    controller: SignalController,
    /// Approaches indexed by `ApproachId::index`
    approaches: Vec<Approach>,
    emergency: EmergencyManager,
    records: Arc<Records>,
    /// Simulation time
    time_ms: f64,
    rng: StdRng,
}

impl SimWorld {
    /// Create a world from `config`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate().context("Rejected simulation configuration")?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let records = Arc::new(Records::new(config.max_log_size));
        let approaches = ApproachId::ALL
            .iter()
            .map(|&id| Approach::new(id, &config, &mut rng))
            .collect();

        Ok(Self {
            controller: SignalController::new(&config),
            approaches,
            emergency: EmergencyManager::new(config.emergency_fallback_ms, Arc::clone(&records)),
            records,
            time_ms: 0.0,
            rng,
            config,
        })
    }

    /// Create a world with default settings and a seeded RNG
    pub fn new_with_seed(seed: u64) -> Result<Self> {
        Self::new(SimConfig::with_seed(seed))
    }

    /// Main simulation tick
    ///
    /// Timers move first (emergency fallback or auto cycle), then every
    /// approach moves its vehicles under its signal's current phase.
    ///
    /// # Errors
    ///
    /// Returns the first vehicle fault of the tick. Faulting vehicles are
    /// removed and every approach is still updated, so the next tick runs
    /// normally.
    pub fn tick(&mut self, delta_ms: f64) -> Result<()> {
        self.time_ms += delta_ms;

        let preempted = self.emergency.is_active();
        self.controller.update(delta_ms, preempted);
        if preempted && self.emergency.update(delta_ms) {
            self.controller.resume_after_preemption();
            info!("Emergency over, resuming automatic cycle");
        }

        let mut first_fault = None;
        for approach in &mut self.approaches {
            let signal = self.controller.phase_of(approach.id);
            let outcome = approach.update(
                delta_ms,
                signal,
                self.config.violation_probability,
                &mut self.rng,
            );

            for vehicle in outcome.violators {
                let id = self.records.next_violation_id();
                info!("Red light violation {id} by vehicle {vehicle} on {} approach", approach.id);
                self.records.violations.push(ViolationRecord {
                    id,
                    timestamp: Local::now(),
                    sim_time_ms: self.time_ms,
                    approach: approach.id,
                    vehicle,
                    kind: ViolationKind::RedLight,
                    penalty: self.config.violation_penalty,
                });
            }

            for vehicle in outcome.exited {
                self.emergency.on_vehicle_exit(vehicle, self.time_ms);
            }

            for (vehicle, err) in outcome.faulted {
                self.emergency.on_vehicle_dropped(vehicle);
                if first_fault.is_none() {
                    first_fault = Some(
                        anyhow::Error::new(err)
                            .context(format!("Failed to update {} approach", approach.id)),
                    );
                }
            }
        }

        match first_fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Flip automatic cycling; returns the new setting
    pub fn toggle_auto_mode(&mut self) -> bool {
        let enabled = self.controller.toggle_auto_mode();
        info!("Auto mode {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    /// Show `phase` on every signal, applying the configured auto-mode policy
    pub fn set_all_signals(&mut self, phase: SignalPhase) {
        if self.config.set_all_signals_policy == SetAllSignalsPolicy::DisableAutoMode {
            self.controller.set_auto_mode(false);
        }
        self.controller.set_all(phase);
        info!("All signals set to {phase}");
    }

    /// Start an emergency episode.
    ///
    /// Returns `None` without side effects if one is already active.
    pub fn trigger_emergency(&mut self) -> Option<EpisodeId> {
        if self.emergency.is_active() {
            debug!("Emergency already in progress, ignoring trigger");
            return None;
        }

        let approach = *ApproachId::ALL.choose(&mut self.rng)?;
        let incident = *IncidentType::ALL.choose(&mut self.rng)?;

        self.controller.set_auto_mode(false);

        let vehicle = Vehicle::spawn(approach, VehicleClass::Emergency, &mut self.rng);
        let vehicle_id = vehicle.id;
        let tracked = match self.approaches[approach.index()].add_priority_vehicle_to_front(vehicle)
        {
            Ok(()) => Some(vehicle_id),
            Err(err) => {
                warn!("{err}; emergency proceeds without a tracked vehicle");
                None
            }
        };

        self.controller
            .apply_preemption(approach, self.config.emergency_fallback_ms);
        self.emergency
            .begin(approach, incident, tracked, self.time_ms)
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.controller.signals()
    }

    /// Copy of every vehicle on the field, flattened across approaches
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.approaches
            .iter()
            .flat_map(|approach| approach.vehicles().iter().cloned())
            .collect()
    }

    pub fn state(&self) -> SimulationState {
        SimulationState {
            signals: self.signals(),
            vehicles: self.vehicles(),
            cycle_state: self.controller.state(),
            is_auto_mode: self.controller.is_auto_mode(),
            is_emergency: self.emergency.is_active(),
            sim_time_ms: self.time_ms,
        }
    }

    /// Calculate statistics from live state and cumulative counters
    pub fn stats(&self) -> AggregateStats {
        let mut vehicles_by_approach = HashMap::new();
        let mut on_field = 0u64;
        let mut total_wait_ms = 0.0;
        let mut waiting = 0usize;

        for approach in &self.approaches {
            vehicles_by_approach.insert(approach.id, approach.len());
            on_field += approach.len() as u64;
            for vehicle in approach.vehicles().iter().filter(|v| !v.is_moving) {
                total_wait_ms += vehicle.wait_time_ms;
                waiting += 1;
            }
        }

        let avg_wait_time_secs = if waiting > 0 {
            total_wait_ms / waiting as f64 / 1000.0
        } else {
            0.0
        };

        let response_times = self.records.response_times();
        let avg_emergency_response_secs = if response_times.is_empty() {
            0.0
        } else {
            response_times.iter().map(|d| d.as_secs_f64()).sum::<f64>()
                / response_times.len() as f64
        };

        AggregateStats {
            total_vehicles: self.records.vehicles_processed() + on_field,
            avg_wait_time_secs,
            vehicles_by_approach,
            avg_emergency_response_secs,
            last_emergency_clearance_secs: response_times.last().map(|d| d.as_secs_f64()),
            incident_count: self.records.incident_count(),
            total_violations: self.records.violation_count(),
            is_auto_mode: self.controller.is_auto_mode(),
            is_emergency: self.emergency.is_active(),
            sim_time_secs: self.time_ms / 1000.0,
        }
    }

    /// Violation log, most recent first
    pub fn violations(&self) -> Vec<ViolationRecord> {
        self.records.violations.snapshot()
    }

    /// Logged violations grouped by kind, most frequent first
    pub fn violation_summary(&self) -> Vec<ViolationSummary> {
        summarize_violations(&self.violations())
    }

    /// Emergency log, most recent first
    pub fn emergency_log(&self) -> Vec<EmergencyEpisode> {
        self.records.emergencies.snapshot()
    }

    pub fn incident_count(&self) -> u64 {
        self.records.incident_count()
    }

    /// Shared logs and counters, readable without holding the world
    pub fn records(&self) -> Arc<Records> {
        Arc::clone(&self.records)
    }

    pub fn approach(&self, id: ApproachId) -> &Approach {
        &self.approaches[id.index()]
    }

    pub fn approach_mut(&mut self, id: ApproachId) -> &mut Approach {
        &mut self.approaches[id.index()]
    }

    pub fn cycle_state(&self) -> CycleState {
        self.controller.state()
    }

    pub fn is_auto_mode(&self) -> bool {
        self.controller.is_auto_mode()
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.is_active()
    }

    /// Episode currently holding the signals
    pub fn active_emergency(&self) -> Option<EpisodeId> {
        self.emergency.active_episode()
    }

    /// Time until the automatic cycle next changes phase
    pub fn time_to_transition_ms(&self) -> f64 {
        self.controller.time_to_transition_ms()
    }

    /// Vehicle the active emergency episode is waiting on
    pub fn tracked_emergency_vehicle(&self) -> Option<VehicleId> {
        self.emergency.tracked_vehicle()
    }

    pub fn time_ms(&self) -> f64 {
        self.time_ms
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let stats = self.stats();
        println!("=== Intersection Summary ===");
        println!("Time: {:.2}s", stats.sim_time_secs);
        match self.emergency.active_episode() {
            Some(episode) => println!(
                "Cycle: {:?} held by emergency {episode} (auto: {})",
                self.controller.state(),
                stats.is_auto_mode
            ),
            None => println!(
                "Cycle: {:?}, next change in {:.0}ms (auto: {})",
                self.controller.state(),
                self.controller.time_to_transition_ms(),
                stats.is_auto_mode
            ),
        }
        for signal in self.signals() {
            let approach = &self.approaches[signal.approach.index()];
            println!(
                "  {:<5} {:<6} {:>6.0}ms  vehicles={}/{}",
                signal.approach.name(),
                signal.phase,
                signal.remaining_ms,
                approach.len(),
                approach.capacity()
            );
        }
        println!(
            "Total vehicles: {}, avg wait: {:.2}s, incidents: {}, violations logged: {}",
            stats.total_vehicles,
            stats.avg_wait_time_secs,
            stats.incident_count,
            self.records.violations.len()
        );
        if let Some(clearance) = stats.last_emergency_clearance_secs {
            println!(
                "Last emergency clearance: {:.1}s (avg {:.1}s)",
                clearance, stats.avg_emergency_response_secs
            );
        }
    }
}
