//! Approach (road) management
//!
//! An approach owns its vehicle queue and spawn timer. The queue is stored
//! spawn end first: index 0 is the newest vehicle, the last element is the
//! vehicle closest to (or furthest through) the intersection.

use log::{debug, warn};
use rand::Rng;

use super::config::SimConfig;
use super::error::SimError;
use super::types::{ApproachGeometry, ApproachId, SignalPhase, VehicleClass, VehicleId};
use super::vehicle::Vehicle;

/// What happened on an approach during one update
#[derive(Debug, Default)]
pub struct ApproachUpdate {
    /// Vehicle spawned this tick, if any
    pub spawned: Option<VehicleId>,
    /// Vehicles that ran the red light this tick
    pub violators: Vec<VehicleId>,
    /// Vehicles that left the field this tick
    pub exited: Vec<VehicleId>,
    /// Vehicles removed because their update failed, with the failure
    pub faulted: Vec<(VehicleId, SimError)>,
}

/// One of the four intersection entry roads with its vehicle queue
#[derive(Debug, Clone)]
pub struct Approach {
    pub id: ApproachId,
    pub geometry: ApproachGeometry,
    /// Time until the next spawn attempt
    pub spawn_timer_ms: f64,
    vehicles: Vec<Vehicle>,
    capacity: usize,
    base_spawn_time_ms: f64,
    random_spawn_time_ms: f64,
}

impl Approach {
    /// Create an empty approach with a spawn timer drawn from `[0, base_spawn_time)`
    pub fn new<R: Rng + ?Sized>(id: ApproachId, config: &SimConfig, rng: &mut R) -> Self {
        Self {
            id,
            geometry: id.geometry(),
            spawn_timer_ms: rng.random::<f64>() * config.base_spawn_time_ms,
            vehicles: Vec::with_capacity(config.max_vehicles_per_approach),
            capacity: config.max_vehicles_per_approach,
            base_spawn_time_ms: config.base_spawn_time_ms,
            random_spawn_time_ms: config.random_spawn_time_ms,
        }
    }

    /// Spawn, move and retire vehicles for one tick
    ///
    /// Vehicles are updated from the front of the queue backwards so every
    /// vehicle sees the already-moved positions of those ahead of it. A
    /// vehicle whose update fails is removed and reported in
    /// [`ApproachUpdate::faulted`]; the rest of the queue still moves.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        delta_ms: f64,
        signal: SignalPhase,
        violation_probability: f64,
        rng: &mut R,
    ) -> ApproachUpdate {
        let mut outcome = ApproachUpdate::default();

        self.spawn_timer_ms -= delta_ms;
        if self.spawn_timer_ms <= 0.0 {
            if self.vehicles.len() < self.capacity {
                let vehicle = Vehicle::spawn(self.id, VehicleClass::Normal, rng);
                debug!("Spawned vehicle {} on {} approach", vehicle.id, self.id);
                outcome.spawned = Some(vehicle.id);
                self.vehicles.insert(0, vehicle);
            } else {
                debug!("{} approach is full, skipping spawn", self.id);
            }
            self.spawn_timer_ms =
                self.base_spawn_time_ms + rng.random::<f64>() * self.random_spawn_time_ms;
        }

        for index in (0..self.vehicles.len()).rev() {
            let (behind, ahead) = self.vehicles.split_at_mut(index + 1);
            let vehicle = &mut behind[index];
            match vehicle.update(delta_ms, signal, ahead, violation_probability, rng) {
                Ok(step) if step.ran_red_light => outcome.violators.push(vehicle.id),
                Ok(_) => {}
                Err(err) => {
                    warn!("Removing vehicle {} from {} approach: {err}", vehicle.id, self.id);
                    outcome.faulted.push((vehicle.id, err));
                }
            }
        }

        let faulted = &outcome.faulted;
        let exited = &mut outcome.exited;
        self.vehicles.retain(|vehicle| {
            if faulted.iter().any(|(id, _)| *id == vehicle.id) {
                return false;
            }
            let inside = vehicle.position.in_field();
            if !inside {
                exited.push(vehicle.id);
            }
            inside
        });

        outcome
    }

    /// Insert a priority vehicle at the spawn end of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ApproachFull`] and leaves the queue untouched
    /// when the approach is at capacity.
    pub fn add_priority_vehicle_to_front(&mut self, vehicle: Vehicle) -> Result<(), SimError> {
        if self.vehicles.len() >= self.capacity {
            warn!(
                "Could not add vehicle {} to {} approach: queue is full",
                vehicle.id, self.id
            );
            return Err(SimError::ApproachFull {
                approach: self.id,
                capacity: self.capacity,
            });
        }
        self.vehicles.insert(0, vehicle);
        Ok(())
    }

    /// Vehicles in queue order, spawn end first
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Mutable access to a queued vehicle
    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|vehicle| vehicle.id == id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
