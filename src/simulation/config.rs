//! Tunable parameters for the intersection simulation

use std::time::Duration;

use super::error::SimError;

/// Length of a GREEN phase in the automatic cycle
pub const GREEN_DURATION_MS: f64 = 10_000.0;

/// Length of a YELLOW phase in the automatic cycle
pub const YELLOW_DURATION_MS: f64 = 2_000.0;

/// How long an emergency keeps control before handing back to the cycle
pub const EMERGENCY_FALLBACK_MS: f64 = 15_000.0;

/// Minimum delay between two spawns on one approach
pub const BASE_SPAWN_TIME_MS: f64 = 4_000.0;

/// Random delay added on top of BASE_SPAWN_TIME_MS
pub const RANDOM_SPAWN_TIME_MS: f64 = 4_000.0;

pub const MAX_VEHICLES_PER_APPROACH: usize = 10;

/// Number of entries kept in the violation and emergency logs
pub const MAX_LOG_SIZE: usize = 10;

/// Per-tick chance that a normal vehicle runs a red light
pub const DEFAULT_VIOLATION_PROBABILITY: f64 = 0.005;

/// Fine attached to a red-light violation, in dollars
pub const RED_LIGHT_PENALTY: u32 = 150;

/// Nominal interval of the tick worker (20 Hz)
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Bounded wait for the tick worker to drain on shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// What `set_all_signals` does to automatic cycling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetAllSignalsPolicy {
    /// Leave auto mode untouched; the next cycle transition overrides the manual setting
    #[default]
    KeepAutoMode,
    /// Switch auto mode off so the manual setting holds until re-enabled
    DisableAutoMode,
}

/// Configuration for a simulation instance
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tick_interval: Duration,
    pub shutdown_timeout: Duration,
    pub green_duration_ms: f64,
    pub yellow_duration_ms: f64,
    pub emergency_fallback_ms: f64,
    pub base_spawn_time_ms: f64,
    pub random_spawn_time_ms: f64,
    pub max_vehicles_per_approach: usize,
    pub max_log_size: usize,
    pub violation_probability: f64,
    pub violation_penalty: u32,
    pub set_all_signals_policy: SetAllSignalsPolicy,
    /// Seed for reproducible runs; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            green_duration_ms: GREEN_DURATION_MS,
            yellow_duration_ms: YELLOW_DURATION_MS,
            emergency_fallback_ms: EMERGENCY_FALLBACK_MS,
            base_spawn_time_ms: BASE_SPAWN_TIME_MS,
            random_spawn_time_ms: RANDOM_SPAWN_TIME_MS,
            max_vehicles_per_approach: MAX_VEHICLES_PER_APPROACH,
            max_log_size: MAX_LOG_SIZE,
            violation_probability: DEFAULT_VIOLATION_PROBABILITY,
            violation_penalty: RED_LIGHT_PENALTY,
            set_all_signals_policy: SetAllSignalsPolicy::default(),
            seed: None,
        }
    }
}

impl SimConfig {
    /// Default configuration with a fixed RNG seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Tick interval in milliseconds, the unit every timer in the engine uses
    pub fn tick_interval_ms(&self) -> f64 {
        self.tick_interval.as_secs_f64() * 1000.0
    }

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |reason: &str| {
            Err(SimError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };

        if self.tick_interval.is_zero() {
            return invalid("tick_interval must be non-zero");
        }
        for (name, value) in [
            ("green_duration_ms", self.green_duration_ms),
            ("yellow_duration_ms", self.yellow_duration_ms),
            ("emergency_fallback_ms", self.emergency_fallback_ms),
            ("base_spawn_time_ms", self.base_spawn_time_ms),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimError::InvalidConfig {
                    reason: format!("{name} must be a positive number, got {value}"),
                });
            }
        }
        if !self.random_spawn_time_ms.is_finite() || self.random_spawn_time_ms < 0.0 {
            return invalid("random_spawn_time_ms must be a non-negative number");
        }
        if self.max_vehicles_per_approach == 0 {
            return invalid("max_vehicles_per_approach must be at least 1");
        }
        if self.max_log_size == 0 {
            return invalid("max_log_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.violation_probability) {
            return Err(SimError::InvalidConfig {
                reason: format!(
                    "violation_probability must be within [0, 1], got {}",
                    self.violation_probability
                ),
            });
        }
        Ok(())
    }
}
