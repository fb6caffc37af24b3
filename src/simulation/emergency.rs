//! Emergency preemption
//!
//! Tracks the single active emergency episode: its fallback timer, the
//! priority vehicle it follows, and the clearance time recorded when that
//! vehicle leaves the field.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use log::{info, warn};

use super::event_log::{EmergencyEpisode, EpisodeId, IncidentType, Records};
use super::types::{ApproachId, VehicleId};

#[derive(Debug, Clone)]
struct ActiveEpisode {
    id: EpisodeId,
    start_sim_ms: f64,
    elapsed_ms: f64,
    tracked_vehicle: Option<VehicleId>,
}

/// Owns the emergency flag and at most one active episode
#[derive(Debug)]
pub struct EmergencyManager {
    active: Option<ActiveEpisode>,
    fallback_ms: f64,
    records: Arc<Records>,
}

impl EmergencyManager {
    pub fn new(fallback_ms: f64, records: Arc<Records>) -> Self {
        Self {
            active: None,
            fallback_ms,
            records,
        }
    }

    /// Whether an emergency currently holds the signals
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_episode(&self) -> Option<EpisodeId> {
        self.active.as_ref().map(|episode| episode.id)
    }

    /// Vehicle whose exit will close the active episode
    pub fn tracked_vehicle(&self) -> Option<VehicleId> {
        self.active
            .as_ref()
            .and_then(|episode| episode.tracked_vehicle)
    }

    /// Open a new episode and log it with no clearance time.
    /// Returns `None` if an episode is already active.
    pub fn begin(
        &mut self,
        approach: ApproachId,
        incident: IncidentType,
        tracked_vehicle: Option<VehicleId>,
        now_ms: f64,
    ) -> Option<EpisodeId> {
        if self.active.is_some() {
            return None;
        }

        let id = self.records.next_episode_id();
        self.records.emergencies.push(EmergencyEpisode {
            id,
            incident,
            approach,
            started_at: Local::now(),
            start_sim_ms: now_ms,
            tracked_vehicle,
            clearance: None,
        });
        self.records.record_incident();
        self.active = Some(ActiveEpisode {
            id,
            start_sim_ms: now_ms,
            elapsed_ms: 0.0,
            tracked_vehicle,
        });

        info!("Emergency {id} ({incident}) started on {approach} approach");
        Some(id)
    }

    /// Advance the fallback timer. Returns true when the episode ended this tick.
    pub fn update(&mut self, delta_ms: f64) -> bool {
        let Some(episode) = self.active.as_mut() else {
            return false;
        };

        episode.elapsed_ms += delta_ms;
        if episode.elapsed_ms < self.fallback_ms {
            return false;
        }

        if let Some(vehicle) = episode.tracked_vehicle {
            info!(
                "Emergency {} timed out before vehicle {vehicle} cleared; no clearance time recorded",
                episode.id
            );
        } else {
            info!("Emergency {} ended", episode.id);
        }
        self.active = None;
        true
    }

    /// Account for a vehicle leaving the field.
    ///
    /// Every exit counts towards the processed-vehicle total. If the vehicle
    /// is the one the active episode tracks, its clearance time is written
    /// to the log and the response-time history, and tracking stops; the
    /// emergency itself stays active until the fallback timer expires.
    pub fn on_vehicle_exit(&mut self, vehicle: VehicleId, now_ms: f64) -> Option<Duration> {
        self.records.record_vehicle_processed();

        let episode = self.active.as_mut()?;
        if episode.tracked_vehicle != Some(vehicle) {
            return None;
        }
        episode.tracked_vehicle = None;

        let clearance = Duration::from_secs_f64((now_ms - episode.start_sim_ms).max(0.0) / 1000.0);
        let episode_id = episode.id;
        let logged = self.records.emergencies.update_first(
            |entry| entry.id == episode_id,
            |entry| entry.clearance = Some(clearance),
        );
        if !logged {
            warn!("Emergency {episode_id} cleared but its log entry is gone; recording the response time only");
        }
        self.records.record_response_time(clearance);

        info!(
            "Emergency {episode_id} cleared by vehicle {vehicle} in {:.1}s",
            clearance.as_secs_f64()
        );
        Some(clearance)
    }

    /// Account for a vehicle removed without leaving the field.
    ///
    /// It does not count as processed. If it was the tracked vehicle the
    /// episode stops tracking it and no clearance time is recorded.
    pub fn on_vehicle_dropped(&mut self, vehicle: VehicleId) {
        let Some(episode) = self.active.as_mut() else {
            return;
        };
        if episode.tracked_vehicle == Some(vehicle) {
            episode.tracked_vehicle = None;
            warn!(
                "Emergency {} lost its tracked vehicle {vehicle}; no clearance time recorded",
                episode.id
            );
        }
    }
}
