//! PortSim Headless Simulation Harness
//!
//! Drives the pure port simulation from the command line and validates its
//! invariants. Runs entirely in-process; no dashboard, no storage.
//!
//! Usage:
//!   cargo run -p portsim-simtest -- run --scenario peak --hours 168 --seed 42
//!   cargo run -p portsim-simtest -- compare --hours 336
//!   cargo run -p portsim-simtest -- sample --scenario low --metric wait_time --count 10
//!   cargo run -p portsim-simtest -- check --verbose

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use portsim_logic::berth::BerthManager;
use portsim_logic::config::PortConfig;
use portsim_logic::generator::ScenarioAwareValueGenerator;
use portsim_logic::metrics::{MetricsCollector, SummaryStatus};
use portsim_logic::scenario::{Metric, Scenario, ScenarioTable};
use portsim_logic::ship::{Ship, ShipManager, ShipState, ShipType};
use portsim_logic::simulation::{PortSimulation, SimState};

// ── Bundled port description (same JSON the library tests use) ────────
const PORT_JSON: &str = include_str!("../../../data/hong_kong_port.json");

#[derive(Parser)]
#[command(name = "portsim-simtest")]
#[command(about = "Headless harness for the PortSim port simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario and print its report
    Run {
        /// Peak, Normal or Low (full labels accepted)
        #[arg(short, long, default_value = "normal")]
        scenario: String,

        /// Simulated hours
        #[arg(long, default_value = "168")]
        hours: f64,

        #[arg(long)]
        seed: Option<u64>,

        /// Port description JSON; the bundled Hong Kong port when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scenario table JSON; the built-in bands when omitted
        #[arg(long)]
        scenarios: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run every scenario with the same seed and compare the KPIs
    Compare {
        #[arg(long, default_value = "168")]
        hours: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Draw values from a scenario band
    Sample {
        #[arg(short, long, default_value = "normal")]
        scenario: String,

        #[arg(short, long, default_value = "wait_time")]
        metric: String,

        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate invariants; exits non-zero on any failure
    Check {
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            hours,
            seed,
            config,
            scenarios,
            json,
        } => run_scenario(&scenario, hours, seed, config.as_deref(), scenarios.as_deref(), json)?,
        Commands::Compare {
            hours,
            seed,
            config,
        } => compare_scenarios(hours, seed, config.as_deref())?,
        Commands::Sample {
            scenario,
            metric,
            count,
            seed,
        } => sample_band(&scenario, &metric, count, seed)?,
        Commands::Check { verbose } => run_checks(verbose),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PortConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            info!("Loading port configuration from {:?}", path);
            PortConfig::from_json_str(&std::fs::read_to_string(path)?)?
        }
        None => PortConfig::from_json_str(PORT_JSON)?,
    };
    Ok(config)
}

fn load_table(path: Option<&Path>) -> Result<ScenarioTable, Box<dyn std::error::Error>> {
    let table = match path {
        Some(path) => {
            info!("Loading scenario table from {:?}", path);
            ScenarioTable::from_json_str(&std::fs::read_to_string(path)?)?
        }
        None => ScenarioTable::default(),
    };
    Ok(table)
}

// ── run ─────────────────────────────────────────────────────────────────

fn run_scenario(
    scenario: &str,
    hours: f64,
    seed: Option<u64>,
    config: Option<&Path>,
    scenarios: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sim = PortSimulation::new(load_config(config)?, load_table(scenarios)?, seed)?;
    sim.set_active_scenario_by_name(scenario)?;
    sim.run(hours)?;
    let report = sim.generate_report();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = &report.summary;
    println!("=== {} / {} / {:.0}h ===\n", report.port, report.scenario, report.elapsed_hours);
    println!("  status               {}", s.status);
    println!("  ships arrived        {}", s.ships_arrived);
    println!("  ships served         {}", s.ships_served);
    println!("  still waiting        {}", report.ships_waiting);
    println!("  avg / max wait       {:.2}h / {:.2}h", s.average_wait_hours, s.max_wait_hours);
    println!("  avg / max queue      {:.2} / {}", s.average_queue_length, s.max_queue_length);
    println!("  avg utilization      {:.1}%", s.average_utilization * 100.0);
    println!(
        "  throughput           {} TEU ({:.1} TEU/h)",
        s.total_throughput_teu, s.throughput_teu_per_hour
    );
    println!("\n  Berths:");
    for b in &report.berths {
        println!(
            "    {:>2} {:<26} {:>6} TEU {} cranes  {:>5.1}%  {} served",
            b.id,
            b.name,
            b.capacity_teu,
            b.crane_count,
            b.utilization * 100.0,
            b.ships_served
        );
    }
    Ok(())
}

// ── compare ─────────────────────────────────────────────────────────────

fn compare_scenarios(
    hours: f64,
    seed: u64,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sim = PortSimulation::new(load_config(config)?, ScenarioTable::default(), Some(seed))?;

    println!(
        "{:<18} {:>8} {:>8} {:>10} {:>10} {:>8} {:>10}",
        "scenario", "arrived", "served", "avg wait", "max queue", "util", "status"
    );
    for scenario in Scenario::ASCENDING {
        sim.set_active_scenario(scenario);
        let s = sim.run(hours)?;
        println!(
            "{:<18} {:>8} {:>8} {:>9.2}h {:>10} {:>7.1}% {:>10}",
            scenario.label(),
            s.ships_arrived,
            s.ships_served,
            s.average_wait_hours,
            s.max_queue_length,
            s.average_utilization * 100.0,
            s.status.as_str()
        );
    }
    Ok(())
}

// ── sample ──────────────────────────────────────────────────────────────

fn sample_band(
    scenario: &str,
    metric: &str,
    count: usize,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut gen = ScenarioAwareValueGenerator::new(ScenarioTable::default());
    let sample = gen.generate_by_name(scenario, metric, count, seed)?;
    println!("{}", serde_json::to_string(&sample)?);
    Ok(())
}

// ── check ───────────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn run_checks(verbose: bool) {
    println!("=== PortSim Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Bundled port description
    results.extend(validate_port_config());

    // 2. Scenario band ordering
    results.extend(validate_scenario_bands());

    // 3. Generator determinism and containment
    results.extend(validate_generator());

    // 4. Berth allocation sweep
    results.extend(validate_berth_allocation());

    // 5. Ship state machine
    results.extend(validate_state_machine());

    // 6. Metrics no-data handling
    results.extend(validate_metrics());

    // 7. End-to-end runs
    results.extend(validate_simulation());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

// ── 1. Port Config ──────────────────────────────────────────────────────

fn validate_port_config() -> Vec<TestResult> {
    println!("--- Port Config ---");
    let mut results = Vec::new();

    let config = match PortConfig::from_json_str(PORT_JSON) {
        Ok(c) => c,
        Err(e) => {
            results.push(check("config_parse", false, format!("{e}")));
            return results;
        }
    };

    results.push(check(
        "config_matches_builtin",
        config == PortConfig::hong_kong(),
        "bundled JSON equals PortConfig::hong_kong()",
    ));
    results.push(check(
        "config_berth_count",
        config.berths.len() == 11,
        format!("{} berths", config.berths.len()),
    ));
    let missing: Vec<_> = ShipType::ALL
        .iter()
        .filter(|t| config.ship_type_spec(**t).is_none())
        .collect();
    results.push(check(
        "config_all_ship_types",
        missing.is_empty(),
        format!("missing: {missing:?}"),
    ));
    results
}

// ── 2. Scenario Bands ───────────────────────────────────────────────────

fn validate_scenario_bands() -> Vec<TestResult> {
    println!("--- Scenario Bands ---");
    let table = ScenarioTable::default();
    let mut results = vec![check(
        "bands_ordered",
        table.validate_ordering().is_ok(),
        "Low < Normal < Peak for every metric",
    )];

    let wait_min = |s| table.band(s, Metric::WaitTime).map(|b| b.min).unwrap_or(-1.0);
    results.push(check(
        "wait_minimums",
        wait_min(Scenario::LowSeason) >= 0.0
            && wait_min(Scenario::NormalOperations) >= 1.5
            && wait_min(Scenario::PeakSeason) >= 3.0,
        format!(
            "low {} / normal {} / peak {}",
            wait_min(Scenario::LowSeason),
            wait_min(Scenario::NormalOperations),
            wait_min(Scenario::PeakSeason)
        ),
    ));
    results
}

// ── 3. Generator ────────────────────────────────────────────────────────

fn validate_generator() -> Vec<TestResult> {
    println!("--- Generator ---");
    let mut results = Vec::new();
    let mut gen = ScenarioAwareValueGenerator::new(ScenarioTable::default());

    let a = gen.generate(Scenario::PeakSeason, Metric::WaitTime, 50, Some(42));
    let b = gen.generate(Scenario::PeakSeason, Metric::WaitTime, 50, Some(42));
    let same = matches!((&a, &b), (Ok(a), Ok(b)) if a == b);
    results.push(check("seed_determinism", same, "seed 42, 50 draws"));

    let mut escaped = Vec::new();
    for scenario in Scenario::ALL {
        for metric in Metric::ALL {
            let Ok(band) = gen.table().band(scenario, metric).copied() else {
                escaped.push(format!("{scenario}/{metric}: no band"));
                continue;
            };
            match gen.generate(scenario, metric, 200, None) {
                Ok(sample) => {
                    if let Some(v) = sample.values().iter().find(|v| !band.contains(**v)) {
                        escaped.push(format!("{scenario}/{metric}: {v}"));
                    }
                }
                Err(e) => escaped.push(format!("{scenario}/{metric}: {e}")),
            }
        }
    }
    results.push(check(
        "values_in_band",
        escaped.is_empty(),
        if escaped.is_empty() {
            "3 scenarios × 6 metrics × 200 draws".to_string()
        } else {
            escaped.join(", ")
        },
    ));
    results
}

// ── 4. Berth Allocation ─────────────────────────────────────────────────

fn validate_berth_allocation() -> Vec<TestResult> {
    println!("--- Berth Allocation ---");
    let berths = BerthManager::new(&PortConfig::hong_kong().berths);

    let mut bad = Vec::new();
    let mut checked = 0;
    for ship_type in ShipType::ALL {
        for size in (500..=30_000u32).step_by(250) {
            checked += 1;
            let ok = match berths.find_available_berth(ship_type, size) {
                Some(b) => b.capacity_teu >= size && b.berth_type.accepts(ship_type),
                None => !berths.any_fits(ship_type, size),
            };
            if !ok {
                bad.push(format!("{ship_type}@{size}"));
            }
        }
    }
    vec![check(
        "allocation_sweep",
        bad.is_empty(),
        format!("{checked} lookups, {} wrong {:?}", bad.len(), bad),
    )]
}

// ── 5. State Machine ────────────────────────────────────────────────────

fn validate_state_machine() -> Vec<TestResult> {
    println!("--- Ship State Machine ---");
    let mut ships = ShipManager::new();
    let added = ships
        .add_ship(Ship::new(1, "Harness", ShipType::Container, 9_000, 0.0, 500, 500))
        .is_ok();

    let forward = added
        && [
            ShipState::Waiting,
            ShipState::Docking,
            ShipState::Processing,
            ShipState::Departing,
            ShipState::Departed,
        ]
        .into_iter()
        .all(|s| ships.update_state(1, s).is_ok());

    vec![
        check("lifecycle_forward", forward, "ARRIVING → DEPARTED"),
        check(
            "lifecycle_no_rewind",
            ships.update_state(1, ShipState::Waiting).is_err(),
            "DEPARTED → WAITING rejected",
        ),
    ]
}

// ── 6. Metrics ──────────────────────────────────────────────────────────

fn validate_metrics() -> Vec<TestResult> {
    println!("--- Metrics ---");
    let empty = MetricsCollector::new().summary();
    let mut healthy = MetricsCollector::new();
    healthy.record_wait(1.0, 0.3);
    healthy.finalize(1.0);

    // One ship served at once, two left at anchor for a day or more
    let mut backlog = MetricsCollector::new();
    backlog.record_wait(0.0, 0.0);
    backlog.record_outstanding_waits(48.0, [48.0, 24.0]);
    backlog.finalize(48.0);
    let backlog = backlog.summary();

    vec![
        check(
            "no_data_distinct",
            empty.status == SummaryStatus::NoData && healthy.summary().status != empty.status,
            format!("empty={} healthy={}", empty.status, healthy.summary().status),
        ),
        check(
            "queued_ships_count_as_waiting",
            backlog.status == SummaryStatus::Poor && backlog.max_wait_hours == 48.0,
            format!("status {} max wait {:.1}h", backlog.status, backlog.max_wait_hours),
        ),
    ]
}

// ── 7. Simulation ───────────────────────────────────────────────────────

fn validate_simulation() -> Vec<TestResult> {
    println!("--- Simulation ---");
    let mut results = Vec::new();

    let run = |seed: u64, scenario: Scenario| -> portsim_logic::Result<PortSimulation> {
        let mut sim = PortSimulation::hong_kong(Some(seed))?;
        sim.set_active_scenario(scenario);
        sim.run(168.0)?;
        Ok(sim)
    };

    match (run(42, Scenario::PeakSeason), run(42, Scenario::PeakSeason)) {
        (Ok(mut a), Ok(mut b)) => {
            results.push(check(
                "sim_deterministic",
                a.generate_report() == b.generate_report(),
                "two seeded peak weeks",
            ));
            let summary = a.metrics().summary();
            results.push(check(
                "sim_completed",
                a.state() == SimState::Completed && summary.ships_arrived > 0,
                format!(
                    "{} arrived, {} served, status {}",
                    summary.ships_arrived, summary.ships_served, summary.status
                ),
            ));
            let out_of_range: Vec<_> = summary
                .berth_utilization
                .iter()
                .filter(|(_, u)| !(0.0..=1.0).contains(*u))
                .collect();
            results.push(check(
                "sim_utilization_range",
                out_of_range.is_empty(),
                format!("avg {:.3}", summary.average_utilization),
            ));
        }
        (Err(e), _) | (_, Err(e)) => results.push(check("sim_run", false, format!("{e}"))),
    }

    match (run(7, Scenario::LowSeason), run(7, Scenario::PeakSeason)) {
        (Ok(low), Ok(peak)) => {
            let (l, p) = (low.metrics().summary(), peak.metrics().summary());
            results.push(check(
                "sim_peak_busier",
                p.ships_arrived > l.ships_arrived,
                format!("low {} vs peak {} arrivals", l.ships_arrived, p.ships_arrived),
            ));
        }
        (Err(e), _) | (_, Err(e)) => results.push(check("sim_compare", false, format!("{e}"))),
    }

    let invalid = PortSimulation::hong_kong(None).map(|mut s| s.run(0.0).is_err());
    results.push(check(
        "sim_invalid_duration",
        matches!(invalid, Ok(true)),
        "run(0) rejected",
    ));

    results
}
