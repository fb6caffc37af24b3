use chrono::Local;
use intersection_sim::services::{
    summarize_violations, DailyReportInput, RandomViolationDetector, ReportGenerator,
    SimulatedReportGenerator, ViolationDetector, ViolationSummary, MAX_RECOMMENDATIONS,
};
use intersection_sim::simulation::{
    ApproachId, VehicleId, ViolationId, ViolationKind, ViolationRecord, RED_LIGHT_PENALTY,
};

fn input(avg_wait_time_secs: f64, violations: Vec<ViolationSummary>) -> DailyReportInput {
    DailyReportInput {
        total_vehicles: 120,
        avg_wait_time_secs,
        violations,
    }
}

fn summary(kind: &str, count: usize) -> ViolationSummary {
    ViolationSummary {
        kind: kind.to_owned(),
        count,
    }
}

#[test]
fn test_quiet_day_report() {
    let report = SimulatedReportGenerator.generate(&input(12.0, Vec::new()));

    assert!(report.summary.contains("120 vehicles processed"));
    assert!(report.summary.contains("excellent"));
    assert!(report.summary.contains("No violations"));
    assert_eq!(report.recommendations.len(), 2);
    assert!(report.recommendations[1].contains("low"));
}

#[test]
fn test_congested_day_report() {
    let report = SimulatedReportGenerator.generate(&input(
        50.0,
        vec![summary("Red Light", 7), summary("Illegal U-Turn", 2)],
    ));

    assert!(report.summary.contains("high"));
    assert!(report.summary.contains("9 total violations"));
    assert_eq!(report.recommendations.len(), MAX_RECOMMENDATIONS);
    assert!(report.recommendations[1].contains("signal timings"));
    assert!(report.recommendations[2].contains("'Red Light'"));
}

#[test]
fn test_moderate_wait_without_hotspot() {
    let report = SimulatedReportGenerator.generate(&input(30.0, vec![summary("Red Light", 2)]));

    assert!(report.summary.contains("moderate"));
    assert_eq!(report.recommendations.len(), 1);
}

#[test]
fn test_summarize_groups_by_kind() {
    let record = |n: u64| ViolationRecord {
        id: ViolationId(n),
        timestamp: Local::now(),
        sim_time_ms: n as f64 * 1_000.0,
        approach: ApproachId::West,
        vehicle: VehicleId(n),
        kind: ViolationKind::RedLight,
        penalty: RED_LIGHT_PENALTY,
    };
    let records: Vec<_> = (0..4).map(record).collect();

    assert_eq!(summarize_violations(&records), vec![summary("Red Light", 4)]);
    assert!(summarize_violations(&[]).is_empty());
}

#[test]
fn test_detector_confidence_ranges() {
    let detector = RandomViolationDetector::new_with_seed(7);
    let mut seen_violation = false;
    let mut seen_clear = false;

    for _ in 0..200 {
        let result = detector.detect("data:image/png;base64,AAAA");
        assert!((0.0..=1.0).contains(&result.confidence));
        if result.has_violation {
            seen_violation = true;
            assert!(result.violation_type.is_some());
            assert!(result.confidence >= 0.7);
        } else {
            seen_clear = true;
            assert!(result.violation_type.is_none());
            assert!(result.confidence < 0.5);
        }
    }

    assert!(seen_violation && seen_clear);
}
