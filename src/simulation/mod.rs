//! Signalized intersection simulation
//!
//! This module contains the simulation engine: signal phasing, vehicle
//! spawning and kinematics, red-light violations and emergency
//! preemption. [`SimWorld`] can be stepped by hand; [`SimulationEngine`]
//! drives it from a fixed-rate worker thread.

mod approach;
mod config;
mod emergency;
mod engine;
mod error;
mod event_log;
mod signal;
mod types;
mod vehicle;
mod world;

pub use approach::{Approach, ApproachUpdate};
pub use config::{
    SetAllSignalsPolicy, SimConfig, BASE_SPAWN_TIME_MS, DEFAULT_VIOLATION_PROBABILITY,
    EMERGENCY_FALLBACK_MS, GREEN_DURATION_MS, MAX_LOG_SIZE, MAX_VEHICLES_PER_APPROACH,
    RANDOM_SPAWN_TIME_MS, RED_LIGHT_PENALTY, SHUTDOWN_TIMEOUT, TICK_INTERVAL,
    YELLOW_DURATION_MS,
};
pub use emergency::EmergencyManager;
pub use engine::SimulationEngine;
pub use error::SimError;
pub use event_log::{
    EmergencyEpisode, EpisodeId, EventLog, IncidentType, Records, ViolationId, ViolationKind,
    ViolationRecord,
};
pub use signal::{CycleState, CycleStep, Signal, SignalController};
pub use types::{
    ApproachGeometry, ApproachId, Axis, Position, SignalPhase, TurnIntent, VehicleClass,
    VehicleId, EMERGENCY_SPEED, FIELD_MAX, FIELD_MIN, NORMAL_BASE_SPEED, NORMAL_SPEED_JITTER,
    SAFE_FOLLOWING_MULTIPLIER, VEHICLE_HEIGHT, VEHICLE_WIDTH,
};
pub use vehicle::{random_turn, Vehicle, VehicleStep};
pub use world::{AggregateStats, SimWorld, SimulationState};
