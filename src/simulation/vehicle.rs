//! Vehicle kinematics for the intersection simulation
//!
//! Vehicles move in straight lines along their heading, stop behind other
//! vehicles and at the stop line, and snap to a new heading once when they
//! reach their turn point inside the intersection.

use rand::Rng;

use super::error::SimError;
use super::types::{
    ApproachId, Position, SignalPhase, TurnIntent, VehicleClass, VehicleId, EMERGENCY_SPEED,
    NORMAL_BASE_SPEED, NORMAL_SPEED_JITTER, SAFE_FOLLOWING_MULTIPLIER, VEHICLE_HEIGHT,
};

/// Outcome of a single vehicle update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VehicleStep {
    /// The vehicle ran a red light this tick
    pub ran_red_light: bool,
}

/// A vehicle in the intersection simulation
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    /// The approach this vehicle entered from
    pub approach: ApproachId,
    pub position: Position,
    /// Heading in degrees, 0 = north, 90 = east
    pub heading: f64,
    /// Speed in units per millisecond
    pub speed: f64,
    pub class: VehicleClass,
    pub turn: TurnIntent,
    pub has_passed_stop_line: bool,
    pub has_turned: bool,
    pub is_moving: bool,
    /// Time spent blocked since the vehicle last moved
    pub wait_time_ms: f64,
}

impl Vehicle {
    /// Create a vehicle at the entry point of `approach`
    pub fn new(
        id: VehicleId,
        approach: ApproachId,
        class: VehicleClass,
        speed: f64,
        turn: TurnIntent,
    ) -> Self {
        let geometry = approach.geometry();
        Self {
            id,
            approach,
            position: geometry.entry,
            heading: geometry.heading,
            speed,
            class,
            turn,
            has_passed_stop_line: false,
            has_turned: false,
            is_moving: true,
            wait_time_ms: 0.0,
        }
    }

    /// Create a vehicle with a fresh ID, a class-appropriate speed and a random turn intent
    pub fn spawn<R: Rng + ?Sized>(approach: ApproachId, class: VehicleClass, rng: &mut R) -> Self {
        let speed = match class {
            VehicleClass::Normal => NORMAL_BASE_SPEED + rng.random::<f64>() * NORMAL_SPEED_JITTER,
            VehicleClass::Emergency => EMERGENCY_SPEED,
        };
        let turn = random_turn(rng);
        Self::new(VehicleId::next(), approach, class, speed, turn)
    }

    pub fn is_emergency(&self) -> bool {
        self.class == VehicleClass::Emergency
    }

    /// Advance the vehicle by `delta_ms`.
    ///
    /// `ahead` holds the vehicles in front of this one on the same approach,
    /// already updated for this tick.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NonFiniteKinematics`] if the next position is not
    /// finite; the vehicle is left untouched in that case.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        delta_ms: f64,
        signal: SignalPhase,
        ahead: &[Vehicle],
        violation_probability: f64,
        rng: &mut R,
    ) -> Result<VehicleStep, SimError> {
        let candidate = self.position.advanced(self.heading, self.speed * delta_ms);
        if !candidate.is_finite() {
            return Err(SimError::NonFiniteKinematics { vehicle: self.id });
        }

        let geometry = self.approach.geometry();
        let exempt = self.is_emergency();

        // Emergency vehicles ignore both following distance and the stop line
        let safe_distance = VEHICLE_HEIGHT * SAFE_FOLLOWING_MULTIPLIER;
        let blocked_by_vehicle = !exempt
            && ahead
                .iter()
                .any(|other| self.position.distance(&other.position) < safe_distance);

        let approaching_stop_line = geometry.crosses_stop_line(&self.position, &candidate);
        if !self.has_passed_stop_line {
            self.has_passed_stop_line = geometry.is_past_stop_line(&self.position);
        }
        let at_stop_line = !self.has_passed_stop_line && approaching_stop_line;

        let ran_red_light = at_stop_line
            && signal == SignalPhase::Red
            && !exempt
            && rng.random_bool(violation_probability);

        let blocked_by_signal =
            at_stop_line && signal != SignalPhase::Green && !exempt && !ran_red_light;

        self.is_moving = !blocked_by_vehicle && !blocked_by_signal;
        if self.is_moving {
            self.wait_time_ms = 0.0;
            self.position = candidate;
        } else {
            self.wait_time_ms += delta_ms;
        }

        self.apply_turn();

        Ok(VehicleStep { ran_red_light })
    }

    /// Snap the heading once the vehicle reaches its turn point
    fn apply_turn(&mut self) {
        if !self.has_passed_stop_line || self.has_turned || self.turn == TurnIntent::Straight {
            return;
        }
        if !self
            .approach
            .geometry()
            .reached_turn_point(&self.position, self.turn)
        {
            return;
        }
        let delta = match self.turn {
            TurnIntent::Left => -90.0,
            TurnIntent::Right => 90.0,
            TurnIntent::Straight => 0.0,
        };
        self.heading = (self.heading + delta).rem_euclid(360.0);
        self.has_turned = true;
    }
}

/// Draw a turn intent: 50% straight, 25% left, 25% right
pub fn random_turn<R: Rng + ?Sized>(rng: &mut R) -> TurnIntent {
    let roll: f64 = rng.random();
    if roll < 0.5 {
        TurnIntent::Straight
    } else if roll < 0.75 {
        TurnIntent::Left
    } else {
        TurnIntent::Right
    }
}
