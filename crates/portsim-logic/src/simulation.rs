//! Port simulation: the discrete-event loop and its control surface.
//!
//! One `PortSimulation` owns every manager, the generator, the metrics and
//! the event queue. Arrivals are drawn from the active scenario; waiting
//! ships are dispatched FIFO to the smallest free compatible berth whenever
//! a ship arrives or a berth frees up.
//!
//! Lifecycle: STOPPED → RUNNING ⇄ PAUSED → COMPLETED. `reset` returns to
//! STOPPED from any state and keeps the active scenario.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::berth::{BerthManager, BerthType};
use crate::config::PortConfig;
use crate::container::{ContainerHandler, ProcessingJob};
use crate::error::{PortError, Result};
use crate::events::{EventKind, EventQueue, ScheduledEvent};
use crate::generator::ScenarioAwareValueGenerator;
use crate::metrics::{MetricsCollector, ReportValue, Summary};
use crate::scenario::{Scenario, ScenarioTable};
use crate::ship::{Ship, ShipManager, ShipState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    #[default]
    Stopped,
    Running,
    Paused,
    Completed,
}

impl SimState {
    pub fn as_str(self) -> &'static str {
        match self {
            SimState::Stopped => "stopped",
            SimState::Running => "running",
            SimState::Paused => "paused",
            SimState::Completed => "completed",
        }
    }
}

/// Result of a single [`PortSimulation::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Processed(ScheduledEvent),
    Paused,
    Stopped,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    pub state: SimState,
    pub elapsed_hours: f64,
    pub horizon_hours: f64,
    pub scenario: Scenario,
    pub queue_length: usize,
    pub ships_in_port: usize,
    pub events_processed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BerthReport {
    pub id: u32,
    pub name: String,
    pub berth_type: BerthType,
    pub capacity_teu: u32,
    pub crane_count: u32,
    pub occupied: bool,
    pub utilization: f64,
    pub ships_served: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub port: String,
    pub scenario: Scenario,
    pub state: SimState,
    pub seed: Option<u64>,
    pub elapsed_hours: f64,
    pub horizon_hours: f64,
    pub ships_waiting: usize,
    pub ships_in_port: usize,
    pub summary: Summary,
    pub berths: Vec<BerthReport>,
}

impl Report {
    /// Summary figures plus run identification, as a flat map.
    pub fn to_report(&self) -> BTreeMap<String, ReportValue> {
        let mut map = self.summary.to_report();
        map.insert("port".into(), self.port.as_str().into());
        map.insert("scenario".into(), self.scenario.label().into());
        map.insert("state".into(), self.state.as_str().into());
        map.insert("ships_waiting".into(), (self.ships_waiting as u64).into());
        map
    }
}

pub struct PortSimulation {
    config: PortConfig,
    ships: ShipManager,
    berths: BerthManager,
    handler: ContainerHandler,
    generator: ScenarioAwareValueGenerator,
    metrics: MetricsCollector,
    events: EventQueue,
    scenario: Scenario,
    seed: Option<u64>,
    state: SimState,
    clock: f64,
    horizon: f64,
    next_ship_id: u32,
    events_processed: u64,
    cached_report: Option<Report>,
}

impl PortSimulation {
    /// Validate `config` and `table` and build an idle simulation.
    ///
    /// With a seed every run (and every run after `reset`) replays exactly.
    pub fn new(config: PortConfig, table: ScenarioTable, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        table.validate_ordering()?;

        let generator = match seed {
            Some(seed) => ScenarioAwareValueGenerator::seeded(table, seed),
            None => ScenarioAwareValueGenerator::new(table),
        };

        Ok(Self {
            ships: ShipManager::new(),
            berths: BerthManager::new(&config.berths),
            handler: ContainerHandler::new(&config),
            generator,
            metrics: MetricsCollector::new(),
            events: EventQueue::new(),
            scenario: Scenario::default(),
            seed,
            state: SimState::Stopped,
            clock: 0.0,
            horizon: 0.0,
            next_ship_id: 1,
            events_processed: 0,
            cached_report: None,
            config,
        })
    }

    /// Hong Kong port with the built-in scenario table.
    pub fn hong_kong(seed: Option<u64>) -> Result<Self> {
        Self::new(PortConfig::hong_kong(), ScenarioTable::default(), seed)
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn ships(&self) -> &ShipManager {
        &self.ships
    }

    pub fn berths(&self) -> &BerthManager {
        &self.berths
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    // ── Scenario surface ────────────────────────────────────────────────

    pub fn list_scenarios(&self) -> Vec<Scenario> {
        self.generator.table().scenarios().collect()
    }

    pub fn get_scenario_description(&self, name: &str) -> Result<&str> {
        self.generator.table().description(name.parse()?)
    }

    /// Switch scenario. Takes effect for every draw from now on.
    pub fn set_active_scenario(&mut self, scenario: Scenario) {
        if scenario != self.scenario {
            log::info!("Scenario changed: {} -> {}", self.scenario, scenario);
        }
        self.scenario = scenario;
        self.cached_report = None;
    }

    pub fn set_active_scenario_by_name(&mut self, name: &str) -> Result<()> {
        self.set_active_scenario(name.parse()?);
        Ok(())
    }

    // ── Control surface ─────────────────────────────────────────────────

    /// Begin a run of `duration` hours under `scenario`.
    pub fn start(&mut self, duration: f64, scenario: Scenario) -> Result<()> {
        if matches!(self.state, SimState::Running | SimState::Paused) {
            return Err(self.illegal("start"));
        }
        check_duration(duration)?;
        self.set_active_scenario(scenario);
        self.begin(duration);
        Ok(())
    }

    /// Fresh run of `duration` hours under the active scenario, to completion.
    /// Not allowed while a started run is running or paused.
    pub fn run(&mut self, duration: f64) -> Result<Summary> {
        if matches!(self.state, SimState::Running | SimState::Paused) {
            return Err(self.illegal("run"));
        }
        check_duration(duration)?;
        self.begin(duration);
        while let StepOutcome::Processed(_) = self.step() {}
        Ok(self.metrics.summary())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != SimState::Running {
            return Err(self.illegal("pause"));
        }
        self.state = SimState::Paused;
        log::info!("Simulation paused at t={:.2}h", self.clock);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != SimState::Paused {
            return Err(self.illegal("resume"));
        }
        self.state = SimState::Running;
        log::info!("Simulation resumed at t={:.2}h", self.clock);
        Ok(())
    }

    /// End the run early; metrics are finalized at the current clock.
    pub fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, SimState::Running | SimState::Paused) {
            return Err(self.illegal("stop"));
        }
        self.finish(self.clock);
        Ok(())
    }

    /// Back to STOPPED with no ships, no metrics and a zero clock.
    pub fn reset(&mut self) {
        self.clear_run();
        self.horizon = 0.0;
        self.state = SimState::Stopped;
        log::info!("Simulation reset (scenario {})", self.scenario);
    }

    pub fn get_status(&self) -> SimulationStatus {
        SimulationStatus {
            state: self.state,
            elapsed_hours: self.clock,
            horizon_hours: self.horizon,
            scenario: self.scenario,
            queue_length: self.ships.queue_length(),
            ships_in_port: self.ships.active_count(),
            events_processed: self.events_processed,
        }
    }

    /// Current report; cached until the next event, reset or scenario change.
    pub fn generate_report(&mut self) -> Report {
        if let Some(report) = &self.cached_report {
            return report.clone();
        }
        let report = self.build_report();
        self.cached_report = Some(report.clone());
        report
    }

    // ── Event loop ──────────────────────────────────────────────────────

    /// Process exactly one event.
    pub fn step(&mut self) -> StepOutcome {
        match self.state {
            SimState::Stopped => return StepOutcome::Stopped,
            SimState::Paused => return StepOutcome::Paused,
            SimState::Completed => return StepOutcome::Completed,
            SimState::Running => {}
        }

        match self.events.pop_until(self.horizon) {
            Some(event) => {
                self.process(event);
                StepOutcome::Processed(event)
            }
            None => {
                self.finish(self.horizon);
                StepOutcome::Completed
            }
        }
    }

    /// Process every event up to `clock + hours` (capped at the horizon).
    /// Returns the state afterwards.
    pub fn advance(&mut self, hours: f64) -> Result<SimState> {
        check_duration(hours)?;
        if self.state != SimState::Running {
            return Ok(self.state);
        }

        let target = (self.clock + hours).min(self.horizon);
        while let Some(event) = self.events.pop_until(target) {
            self.process(event);
        }
        self.clock = target;

        if target >= self.horizon {
            self.finish(self.horizon);
        }
        Ok(self.state)
    }

    fn begin(&mut self, duration: f64) {
        self.clear_run();
        self.horizon = duration;
        self.state = SimState::Running;

        self.events.schedule(0.0, EventKind::Arrival);
        self.events
            .schedule(self.config.sample_interval_hours, EventKind::Sample);

        log::info!(
            "Simulation started: port={} scenario={} horizon={:.1}h seed={:?}",
            self.config.name,
            self.scenario,
            duration,
            self.seed
        );
    }

    fn clear_run(&mut self) {
        self.ships.reset();
        self.berths.reset();
        self.metrics.reset();
        self.events.clear();
        self.clock = 0.0;
        self.next_ship_id = 1;
        self.events_processed = 0;
        self.cached_report = None;
        if self.seed.is_some() {
            self.generator.reseed(self.seed);
        }
    }

    fn finish(&mut self, now: f64) {
        self.clock = now;
        close_out(&mut self.metrics, &self.ships, &self.berths, now);
        self.state = SimState::Completed;
        self.cached_report = None;

        let summary = self.metrics.summary();
        log::info!(
            "Simulation complete at t={:.1}h: {} arrived, {} served, avg wait {:.2}h, status {}",
            now,
            summary.ships_arrived,
            summary.ships_served,
            summary.average_wait_hours,
            summary.status
        );
    }

    fn process(&mut self, event: ScheduledEvent) {
        self.clock = event.at;
        self.events_processed += 1;
        self.cached_report = None;
        log::debug!("t={:.2}h {}", event.at, event.kind.label());

        let now = event.at;
        match event.kind {
            EventKind::Arrival => self.on_arrival(now),
            EventKind::DockingComplete { ship_id, berth_id } => {
                self.on_docking_complete(ship_id, berth_id, now)
            }
            EventKind::ProcessingComplete { job } => self.on_processing_complete(&job, now),
            EventKind::Departure { ship_id } => self.on_departure(ship_id, now),
            EventKind::Sample => {
                self.sample(now);
                self.events
                    .schedule(now + self.config.sample_interval_hours, EventKind::Sample);
            }
        }
    }

    fn on_arrival(&mut self, now: f64) {
        match self.spawn_ship(now) {
            Ok(ship_id) => {
                self.metrics.record_arrival(now);
                log::debug!("Ship {} arrived, queue={}", ship_id, self.ships.queue_length());
            }
            Err(e) => log::warn!("Arrival at t={:.2}h dropped: {}", now, e),
        }

        match self.generator.inter_arrival_hours(self.scenario, now) {
            Ok(gap) => self.events.schedule(now + gap, EventKind::Arrival),
            Err(e) => log::warn!("No further arrivals scheduled: {}", e),
        }

        self.dispatch(now);
    }

    fn spawn_ship(&mut self, now: f64) -> Result<u32> {
        let ship_type = self.generator.ship_type(&self.config)?;
        let spec = self
            .config
            .ship_type_spec(ship_type)
            .ok_or_else(|| PortError::InvalidShipType {
                name: ship_type.to_string(),
            })?;
        let mut size = self.generator.ship_size(self.scenario, spec)?;

        // Never generate a ship no berth could ever take
        let largest = self
            .berths
            .iter()
            .filter(|b| b.berth_type.accepts(ship_type))
            .map(|b| b.capacity_teu)
            .max()
            .ok_or_else(|| PortError::InvalidShipType {
                name: ship_type.to_string(),
            })?;
        size = size.min(largest);

        let (unload, load) = self.generator.container_counts(self.scenario, size)?;

        let id = self.next_ship_id;
        self.next_ship_id += 1;
        let name = format!("{}-{:04}", ship_type.as_str().to_uppercase(), id);

        self.ships
            .add_ship(Ship::new(id, name, ship_type, size, now, unload, load))?;
        self.ships.update_state(id, ShipState::Waiting)?;
        Ok(id)
    }

    /// Berth as many waiting ships as possible, oldest first. A ship that
    /// doesn't fit anywhere free stays queued without blocking later ones.
    fn dispatch(&mut self, now: f64) {
        let waiting: Vec<_> = self
            .ships
            .waiting()
            .map(|s| (s.id, s.ship_type, s.size_teu, s.arrival_time))
            .collect();

        for (ship_id, ship_type, size, arrived) in waiting {
            let Some(berth_id) = self
                .berths
                .find_available_berth(ship_type, size)
                .map(|b| b.id)
            else {
                continue;
            };

            if let Err(e) = self.berths.allocate(berth_id, ship_id, ship_type, size, now) {
                log::warn!("Ship {} stays queued: {}", ship_id, e);
                continue;
            }
            if let Err(e) = self.ships.begin_docking(ship_id, berth_id, now) {
                log::warn!("Ship {} could not dock: {}", ship_id, e);
                if let Err(e) = self.berths.release(berth_id, now) {
                    log::warn!("Berth {} release failed: {}", berth_id, e);
                }
                continue;
            }

            self.metrics.record_wait(now, now - arrived);
            self.events.schedule(
                now + self.config.docking_hours,
                EventKind::DockingComplete { ship_id, berth_id },
            );
            log::debug!("Ship {} -> berth {} after {:.2}h", ship_id, berth_id, now - arrived);
        }
    }

    fn on_docking_complete(&mut self, ship_id: u32, berth_id: u32, now: f64) {
        let job = match self.berths.get(berth_id) {
            Some(berth) => self.handler.process_ship(&mut self.ships, ship_id, berth, now),
            None => Err(PortError::BerthNotFound { berth_id }),
        };

        match job {
            Ok(job) => self
                .events
                .schedule(job.completes_at, EventKind::ProcessingComplete { job }),
            Err(e) => {
                log::warn!("Ship {} processing failed: {}", ship_id, e);
                if let Err(e) = self.berths.release(berth_id, now) {
                    log::warn!("Berth {} release failed: {}", berth_id, e);
                }
                self.dispatch(now);
            }
        }
    }

    fn on_processing_complete(&mut self, job: &ProcessingJob, now: f64) {
        if let Err(e) = self.handler.complete(&mut self.ships, job) {
            log::warn!("Ship {} completion failed: {}", job.ship_id, e);
        }
        if let Err(e) = self.berths.release(job.berth_id, now) {
            log::warn!("Berth {} release failed: {}", job.berth_id, e);
        }
        self.metrics.record_throughput(now, job.containers);
        self.events.schedule(
            now + self.config.departure_hours,
            EventKind::Departure {
                ship_id: job.ship_id,
            },
        );
        self.dispatch(now);
    }

    fn on_departure(&mut self, ship_id: u32, now: f64) {
        match self.ships.update_state(ship_id, ShipState::Departed) {
            Ok(()) => self.metrics.record_departure(now),
            Err(e) => log::warn!("Ship {} departure failed: {}", ship_id, e),
        }
    }

    fn sample(&mut self, now: f64) {
        record_sample(&mut self.metrics, &self.ships, &self.berths, now);
    }

    fn build_report(&self) -> Report {
        let mut metrics = self.metrics.clone();
        if self.state != SimState::Completed {
            close_out(&mut metrics, &self.ships, &self.berths, self.clock);
        }

        Report {
            port: self.config.name.clone(),
            scenario: self.scenario,
            state: self.state,
            seed: self.seed,
            elapsed_hours: self.clock,
            horizon_hours: self.horizon,
            ships_waiting: self.ships.queue_length(),
            ships_in_port: self.ships.active_count(),
            summary: metrics.summary(),
            berths: self
                .berths
                .iter()
                .map(|b| BerthReport {
                    id: b.id,
                    name: b.name.clone(),
                    berth_type: b.berth_type,
                    capacity_teu: b.capacity_teu,
                    crane_count: b.crane_count,
                    occupied: b.occupied,
                    utilization: b.utilization(self.clock),
                    ships_served: b.ships_served(),
                })
                .collect(),
        }
    }

    fn illegal(&self, action: &'static str) -> PortError {
        PortError::InvalidControl {
            action,
            state: self.state.as_str(),
        }
    }
}

fn record_sample(metrics: &mut MetricsCollector, ships: &ShipManager, berths: &BerthManager, now: f64) {
    metrics.record_queue_length(now, ships.queue_length());
    let snapshot = berths.utilization_snapshot(now);
    metrics.record_utilization(now, berths.aggregate_utilization(now), &snapshot);
}

/// Bring `metrics` up to `now`: one final sample unless a periodic one
/// already landed there, plus the ages of ships still waiting for a berth.
fn close_out(metrics: &mut MetricsCollector, ships: &ShipManager, berths: &BerthManager, now: f64) {
    let sampled_now = metrics
        .queue_length_samples()
        .last()
        .is_some_and(|o| o.at == now);
    if !sampled_now {
        record_sample(metrics, ships, berths, now);
    }
    metrics.record_outstanding_waits(now, ships.waiting().map(|s| now - s.arrival_time));
    metrics.finalize(now);
}

fn check_duration(duration: f64) -> Result<()> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(PortError::InvalidDuration { duration })
    }
}
