//! Wall-clock driven simulation engine
//!
//! A single worker thread owns every mutation: it wakes at a fixed rate,
//! measures elapsed time, caps it to the nominal interval and ticks the
//! world under a short-lived lock. All accessors hand out copies.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::services::{summarize_violations, ViolationSummary};

use super::config::SimConfig;
use super::error::SimError;
use super::event_log::{EmergencyEpisode, EpisodeId, Records, ViolationRecord};
use super::signal::Signal;
use super::types::SignalPhase;
use super::vehicle::Vehicle;
use super::world::{AggregateStats, SimWorld, SimulationState};

/// Elapsed times beyond this many intervals are reported as stalls
const STALL_FACTOR: u32 = 5;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running tick worker
struct Worker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Thread-safe owner of a [`SimWorld`] with start/stop lifecycle
pub struct SimulationEngine {
    world: Arc<Mutex<SimWorld>>,
    records: Arc<Records>,
    worker: Mutex<Option<Worker>>,
    running: Arc<AtomicBool>,
    tick_interval: Duration,
    shutdown_timeout: Duration,
}

impl SimulationEngine {
    /// Build an engine around a fresh world. The worker is not started.
    pub fn new(config: SimConfig) -> Result<Self> {
        let tick_interval = config.tick_interval;
        let shutdown_timeout = config.shutdown_timeout;
        Ok(Self::from_world(SimWorld::new(config)?, tick_interval, shutdown_timeout))
    }

    /// Wrap an existing world, e.g. one prepared by a test
    pub fn from_world(world: SimWorld, tick_interval: Duration, shutdown_timeout: Duration) -> Self {
        Self {
            records: world.records(),
            world: Arc::new(Mutex::new(world)),
            worker: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            tick_interval,
            shutdown_timeout,
        }
    }

    /// Start the tick worker. Returns `Ok(false)` if it was already running.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::WorkerSpawn`] if the OS refuses a new thread.
    pub fn start(&self) -> Result<bool, SimError> {
        let mut slot = lock(&self.worker);
        if slot.is_some() {
            debug!("Simulation loop already running");
            return Ok(false);
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let world = Arc::clone(&self.world);
        let worker_cancel = Arc::clone(&cancel);
        let interval = self.tick_interval;

        let thread = thread::Builder::new()
            .name("sim-tick".to_owned())
            .spawn(move || {
                run_tick_loop(
                    |delta_ms| lock(&world).tick(delta_ms),
                    interval,
                    &stop_rx,
                    &worker_cancel,
                );
                let _ = done_tx.send(());
            })
            .map_err(SimError::WorkerSpawn)?;

        *slot = Some(Worker {
            stop_tx,
            done_rx,
            cancel,
            thread,
        });
        self.running.store(true, Ordering::SeqCst);
        info!("Simulation loop started");
        Ok(true)
    }

    /// Stop the tick worker, waiting up to the shutdown timeout for it to
    /// finish its current tick. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let worker = {
            let mut slot = lock(&self.worker);
            let Some(worker) = slot.take() else {
                return false;
            };
            self.running.store(false, Ordering::SeqCst);
            worker
        };

        let _ = worker.stop_tx.send(());
        match worker.done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    error!("Tick worker panicked during shutdown");
                }
                info!("Simulation loop stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                // The worker checks this flag before touching the world again
                worker.cancel.store(true, Ordering::SeqCst);
                warn!(
                    "Tick worker did not stop within {:?}; cancelled and detached",
                    self.shutdown_timeout
                );
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn toggle_auto_mode(&self) -> bool {
        lock(&self.world).toggle_auto_mode()
    }

    pub fn set_all_signals(&self, phase: SignalPhase) {
        lock(&self.world).set_all_signals(phase);
    }

    pub fn trigger_emergency(&self) -> Option<EpisodeId> {
        lock(&self.world).trigger_emergency()
    }

    pub fn signals(&self) -> Vec<Signal> {
        lock(&self.world).signals()
    }

    pub fn vehicles(&self) -> Vec<Vehicle> {
        lock(&self.world).vehicles()
    }

    pub fn state(&self) -> SimulationState {
        lock(&self.world).state()
    }

    pub fn stats(&self) -> AggregateStats {
        lock(&self.world).stats()
    }

    pub fn violations(&self) -> Vec<ViolationRecord> {
        self.records.violations.snapshot()
    }

    pub fn violation_summary(&self) -> Vec<ViolationSummary> {
        summarize_violations(&self.violations())
    }

    pub fn emergency_log(&self) -> Vec<EmergencyEpisode> {
        self.records.emergencies.snapshot()
    }

    pub fn incident_count(&self) -> u64 {
        self.records.incident_count()
    }

    /// Run `f` against the world while holding the tick lock
    pub fn with_world<T>(&self, f: impl FnOnce(&mut SimWorld) -> T) -> T {
        f(&mut lock(&self.world))
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the tick worker; returns when told to stop or cancelled
///
/// A tick that fails or panics is logged and the loop carries on with the
/// next scheduled tick.
fn run_tick_loop<F>(
    mut tick: F,
    interval: Duration,
    stop_rx: &Receiver<()>,
    cancel: &AtomicBool,
) where
    F: FnMut(f64) -> Result<()>,
{
    let interval_ms = interval.as_secs_f64() * 1000.0;
    let mut last = Instant::now();
    let mut next = last + interval;

    loop {
        match stop_rx.recv_timeout(next.saturating_duration_since(Instant::now())) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last);
        last = now;
        next += interval;
        if next <= now {
            next = now + interval;
        }

        if elapsed > interval * STALL_FACTOR {
            warn!("Tick stalled for {elapsed:?}, capping to {interval:?}");
        }
        let delta_ms = (elapsed.as_secs_f64() * 1000.0).min(interval_ms);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| tick(delta_ms)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("Tick completed with faults: {err:#}"),
            Err(_) => error!("Tick panicked and was skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_loop_survives_errors_and_panics() {
        let (stop_tx, stop_rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let mut calls = 0u32;

        run_tick_loop(
            |_| {
                calls += 1;
                match calls {
                    3 => panic!("tick {calls} blew up"),
                    5 => Err(SimError::InvalidConfig {
                        reason: "bad tick".to_owned(),
                    }
                    .into()),
                    10 => {
                        let _ = stop_tx.send(());
                        Ok(())
                    }
                    _ => Ok(()),
                }
            },
            Duration::from_millis(5),
            &stop_rx,
            &cancel,
        );

        assert_eq!(calls, 10);
    }

    #[test]
    fn test_tick_loop_honours_cancel_flag() {
        let (_stop_tx, stop_rx) = mpsc::channel::<()>();
        let cancel = AtomicBool::new(false);
        let mut calls = 0u32;

        run_tick_loop(
            |_| {
                calls += 1;
                if calls == 2 {
                    cancel.store(true, Ordering::SeqCst);
                }
                Ok(())
            },
            Duration::from_millis(5),
            &stop_rx,
            &cancel,
        );

        assert_eq!(calls, 2);
    }
}
