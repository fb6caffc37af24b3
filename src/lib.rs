//! Intersection Simulation Library
//!
//! A four-approach signalized intersection simulation that can be stepped
//! by hand or run on a background tick worker.

pub mod services;
pub mod simulation;
