//! Bounded event logs and shared counters
//!
//! The tick worker appends to these while readers on other threads take
//! snapshots, so every structure here is internally synchronized and never
//! hands out references into live data.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};

use super::types::{ApproachId, VehicleId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A bounded, most-recent-first log
///
/// Appending to a full log drops the oldest entry.
#[derive(Debug)]
pub struct EventLog<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> EventLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Add an entry as the most recent one
    pub fn push(&self, entry: T) {
        let mut entries = lock(&self.entries);
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Apply `update` to the most recent entry matching `matches`.
    /// Returns false when no entry matched.
    pub fn update_first<P, F>(&self, matches: P, update: F) -> bool
    where
        P: Fn(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut entries = lock(&self.entries);
        match entries.iter_mut().find(|entry| matches(entry)) {
            Some(entry) => {
                update(entry);
                true
            }
            None => false,
        }
    }

    /// Copy of the log, most recent first
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.entries).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A wrapper type for violation record IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViolationId(pub u64);

impl fmt::Display for ViolationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V-{}", self.0)
    }
}

/// Kinds of violation the simulation records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    RedLight,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::RedLight => f.write_str("Red Light"),
        }
    }
}

/// One recorded traffic violation
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationRecord {
    pub id: ViolationId,
    pub timestamp: DateTime<Local>,
    /// Simulation time at which the violation happened
    pub sim_time_ms: f64,
    pub approach: ApproachId,
    pub vehicle: VehicleId,
    pub kind: ViolationKind,
    /// Fine in dollars
    pub penalty: u32,
}

impl ViolationRecord {
    /// Display location, e.g. "Northbound"
    pub fn location(&self) -> String {
        format!("{}bound", self.approach)
    }

    pub fn fine(&self) -> String {
        format!("${}", self.penalty)
    }
}

/// A wrapper type for emergency episode IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeId(pub u64);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EV-{}", self.0)
    }
}

/// Kinds of incident that trigger an emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncidentType {
    Ambulance,
    FireTruck,
    Police,
}

impl IncidentType {
    pub const ALL: [IncidentType; 3] = [
        IncidentType::Ambulance,
        IncidentType::FireTruck,
        IncidentType::Police,
    ];
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncidentType::Ambulance => "Ambulance",
            IncidentType::FireTruck => "Fire Truck",
            IncidentType::Police => "Police",
        })
    }
}

/// One emergency preemption episode
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyEpisode {
    pub id: EpisodeId,
    pub incident: IncidentType,
    pub approach: ApproachId,
    pub started_at: DateTime<Local>,
    /// Simulation time at which the episode started
    pub start_sim_ms: f64,
    /// Priority vehicle being tracked; `None` if it could not be placed
    pub tracked_vehicle: Option<VehicleId>,
    /// Set once the tracked vehicle leaves the field
    pub clearance: Option<Duration>,
}

/// Logs and cumulative counters shared between the tick worker and readers
#[derive(Debug)]
pub struct Records {
    pub violations: EventLog<ViolationRecord>,
    pub emergencies: EventLog<EmergencyEpisode>,
    response_times: Mutex<Vec<Duration>>,
    vehicles_processed: AtomicU64,
    incidents: AtomicU64,
    next_violation_id: AtomicU64,
    next_episode_id: AtomicU64,
}

impl Records {
    pub fn new(max_log_size: usize) -> Self {
        Self {
            violations: EventLog::new(max_log_size),
            emergencies: EventLog::new(max_log_size),
            response_times: Mutex::new(Vec::new()),
            vehicles_processed: AtomicU64::new(0),
            incidents: AtomicU64::new(0),
            next_violation_id: AtomicU64::new(0),
            next_episode_id: AtomicU64::new(0),
        }
    }

    pub fn next_violation_id(&self) -> ViolationId {
        ViolationId(self.next_violation_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Violations recorded so far, including those evicted from the log
    pub fn violation_count(&self) -> u64 {
        self.next_violation_id.load(Ordering::Relaxed)
    }

    pub fn next_episode_id(&self) -> EpisodeId {
        EpisodeId(self.next_episode_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn record_vehicle_processed(&self) {
        self.vehicles_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn vehicles_processed(&self) -> u64 {
        self.vehicles_processed.load(Ordering::Relaxed)
    }

    pub fn record_incident(&self) {
        self.incidents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incident_count(&self) -> u64 {
        self.incidents.load(Ordering::Relaxed)
    }

    pub fn record_response_time(&self, clearance: Duration) {
        lock(&self.response_times).push(clearance);
    }

    /// Copy of every recorded clearance time, oldest first
    pub fn response_times(&self) -> Vec<Duration> {
        lock(&self.response_times).clone()
    }
}
