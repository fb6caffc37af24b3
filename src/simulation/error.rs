//! Error types for the intersection simulation
//!
//! These cover the recoverable failures the engine reports. None of them
//! is fatal: callers log them and carry on with the next tick.

use super::types::{ApproachId, VehicleId};

/// Errors raised by simulation components.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The approach already holds its maximum number of vehicles.
    #[error("{approach} approach is full ({capacity} vehicles)")]
    ApproachFull {
        /// The full approach.
        approach: ApproachId,
        /// Maximum queue length.
        capacity: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid simulation configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// Kinematics produced a non-finite position for a vehicle.
    #[error("vehicle {vehicle} produced a non-finite position")]
    NonFiniteKinematics {
        /// The offending vehicle.
        vehicle: VehicleId,
    },

    /// The tick worker thread could not be spawned.
    #[error("failed to spawn tick worker")]
    WorkerSpawn(#[source] std::io::Error),
}
