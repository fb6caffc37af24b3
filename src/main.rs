use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use intersection_sim::services::{
    summarize_violations, DailyReportInput, ReportGenerator, SimulatedReportGenerator,
};
use intersection_sim::simulation::{
    AggregateStats, SetAllSignalsPolicy, SimConfig, SimWorld, SimulationEngine,
    ViolationRecord, DEFAULT_VIOLATION_PROBABILITY,
};

#[derive(Parser)]
#[command(name = "intersection_sim")]
#[command(about = "Four-approach signalized intersection simulation")]
struct Cli {
    /// Simulated seconds to run
    #[arg(long, default_value = "60")]
    seconds: u32,

    /// Drive the simulation from the wall-clock tick worker instead of stepping it
    #[arg(long)]
    realtime: bool,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Per-tick chance that a vehicle at a red light runs it
    #[arg(long, default_value_t = DEFAULT_VIOLATION_PROBABILITY)]
    violation_probability: f64,

    /// Setting all signals manually also switches auto mode off
    #[arg(long)]
    stop_disables_auto: bool,

    /// Trigger an emergency after this many seconds
    #[arg(long)]
    emergency_at: Option<u32>,

    /// Print a daily report at the end of the run
    #[arg(long)]
    report: bool,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            violation_probability: self.violation_probability,
            set_all_signals_policy: if self.stop_disables_auto {
                SetAllSignalsPolicy::DisableAutoMode
            } else {
                SetAllSignalsPolicy::KeepAutoMode
            },
            ..SimConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config();

    let (stats, violations) = if cli.realtime {
        run_realtime(&cli, config)?
    } else {
        run_headless(&cli, config)?
    };

    if cli.report {
        print_report(&stats, &violations);
    }
    Ok(())
}

type RunResult = (AggregateStats, Vec<ViolationRecord>);

/// Run the simulation by stepping the world with the nominal tick
fn run_headless(cli: &Cli, config: SimConfig) -> Result<RunResult> {
    let tick_ms = config.tick_interval_ms();
    let ticks_per_second = (1000.0 / tick_ms).ceil() as u32;
    let mut world = SimWorld::new(config).context("Failed to build simulation")?;

    info!(
        "Running headless for {}s ({} ticks per second)",
        cli.seconds, ticks_per_second
    );

    for second in 1..=cli.seconds {
        for _ in 0..ticks_per_second {
            if let Err(err) = world.tick(tick_ms) {
                error!("Tick completed with faults: {err:#}");
            }
        }
        if cli.emergency_at == Some(second) {
            world.trigger_emergency();
        }
        println!("--- After {second}s ---");
        world.print_summary();
        println!();
    }

    println!("=== Final State ===");
    world.print_summary();
    Ok((world.stats(), world.violations()))
}

/// Run the simulation on the tick worker, polling snapshots once a second
fn run_realtime(cli: &Cli, config: SimConfig) -> Result<RunResult> {
    let engine = SimulationEngine::new(config).context("Failed to build simulation")?;
    engine.start()?;

    for second in 1..=cli.seconds {
        thread::sleep(Duration::from_secs(1));
        if cli.emergency_at == Some(second) {
            engine.trigger_emergency();
        }
        let stats = engine.stats();
        info!(
            "t={:.1}s vehicles={} avg_wait={:.2}s emergency={} incidents={}",
            stats.sim_time_secs,
            stats.total_vehicles,
            stats.avg_wait_time_secs,
            stats.is_emergency,
            stats.incident_count
        );
    }

    engine.stop();
    engine.with_world(|world| world.print_summary());
    Ok((engine.stats(), engine.violations()))
}

fn print_report(stats: &AggregateStats, violations: &[ViolationRecord]) {
    let report = SimulatedReportGenerator.generate(&DailyReportInput {
        total_vehicles: stats.total_vehicles,
        avg_wait_time_secs: stats.avg_wait_time_secs,
        violations: summarize_violations(violations),
    });
    println!();
    println!("=== Daily Report ===");
    println!("{}", report.summary);
    for recommendation in &report.recommendations {
        println!("  - {recommendation}");
    }
}
