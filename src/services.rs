//! Report generation and image-based violation detection
//!
//! These sit outside the simulation engine: callers feed them data taken
//! from snapshots, and the engine never calls them. The bundled
//! implementations are simulated stand-ins with fixed rules.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::simulation::ViolationRecord;

/// Violations of one type and how often they occurred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationSummary {
    pub kind: String,
    pub count: usize,
}

/// Input for a daily report
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReportInput {
    pub total_vehicles: u64,
    pub avg_wait_time_secs: f64,
    pub violations: Vec<ViolationSummary>,
}

/// Generated report: a summary line and up to three recommendations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub summary: String,
    pub recommendations: Vec<String>,
}

/// Result of analysing an intersection image
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub has_violation: bool,
    pub violation_type: Option<String>,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

pub trait ReportGenerator {
    fn generate(&self, input: &DailyReportInput) -> DailyReport;
}

pub trait ViolationDetector {
    /// Analyse an encoded image payload, e.g. a base64 data URI
    fn detect(&self, image: &str) -> DetectionResult;
}

/// Maximum number of recommendations in a report
pub const MAX_RECOMMENDATIONS: usize = 3;

/// Group violation records by kind, most frequent first
pub fn summarize_violations(records: &[ViolationRecord]) -> Vec<ViolationSummary> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.kind.to_string()).or_default() += 1;
    }
    let mut summaries: Vec<ViolationSummary> = counts
        .into_iter()
        .map(|(kind, count)| ViolationSummary { kind, count })
        .collect();
    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));
    summaries
}

/// Threshold-based report generator
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedReportGenerator;

impl ReportGenerator for SimulatedReportGenerator {
    fn generate(&self, input: &DailyReportInput) -> DailyReport {
        let wait = input.avg_wait_time_secs;
        let mut summary = format!("Daily Summary: {} vehicles processed. ", input.total_vehicles);
        if wait < 20.0 {
            summary.push_str(&format!("Average wait time was excellent at {wait:.1}s. "));
        } else if wait < 45.0 {
            summary.push_str(&format!("Average wait time was moderate at {wait:.1}s. "));
        } else {
            summary.push_str(&format!(
                "Average wait time was high at {wait:.1}s, suggesting congestion. "
            ));
        }

        let total_violations: usize = input.violations.iter().map(|v| v.count).sum();
        if total_violations == 0 {
            summary.push_str("No violations were recorded.");
        } else {
            summary.push_str(&format!(
                "{total_violations} total violations recorded across {} types.",
                input.violations.len()
            ));
        }

        let mut recommendations =
            vec!["Continue monitoring overall system performance.".to_owned()];
        if wait > 40.0 {
            recommendations.push(
                "Average wait time is high. Review signal timings during peak hours.".to_owned(),
            );
        }
        match input.violations.iter().max_by_key(|v| v.count) {
            Some(worst) if worst.count > 3 => recommendations.push(format!(
                "Focus enforcement or review signal phase for '{}' violations.",
                worst.kind
            )),
            Some(_) => {}
            None => recommendations
                .push("Violation rates are low, maintain current monitoring.".to_owned()),
        }
        recommendations.truncate(MAX_RECOMMENDATIONS);

        DailyReport {
            summary,
            recommendations,
        }
    }
}

/// Coin-flip detector standing in for real image analysis
#[derive(Debug)]
pub struct RandomViolationDetector {
    rng: Mutex<StdRng>,
}

impl Default for RandomViolationDetector {
    fn default() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }
}

impl RandomViolationDetector {
    pub fn new_with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl ViolationDetector for RandomViolationDetector {
    fn detect(&self, image: &str) -> DetectionResult {
        debug!("Analysing image payload of {} bytes", image.len());
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let has_violation = rng.random_bool(0.5);
        let (violation_type, confidence) = if has_violation {
            let kind = if rng.random_bool(0.5) {
                "Red Light"
            } else {
                "Illegal U-Turn"
            };
            (Some(kind.to_owned()), 0.7 + rng.random::<f64>() * 0.29)
        } else {
            (None, 0.1 + rng.random::<f64>() * 0.4)
        };

        DetectionResult {
            has_violation,
            violation_type,
            confidence: confidence.min(1.0),
        }
    }
}
