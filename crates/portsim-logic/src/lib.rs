//! Pure port simulation logic for PortSim.
//!
//! This crate models a container port as a discrete-event simulation: ships
//! arrive under a named scenario (Peak Season, Normal Operations, Low
//! Season), queue for berths, are worked by cranes and depart. Everything is
//! plain data in and results out, with no dashboard, storage or network
//! layer, so the same core drives the headless harness and the tests.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`berth`] | Berth compatibility, allocation and utilization counters |
//! | [`config`] | Static port description (berths, ship types, handling) |
//! | [`constants`] | Tunable defaults: crane threshold, timing, status cut-offs |
//! | [`container`] | Crane productivity and timed processing jobs |
//! | [`error`] | `PortError` and the crate `Result` alias |
//! | [`events`] | Time-ordered event queue |
//! | [`generator`] | Scenario-aware random values, seedable |
//! | [`metrics`] | KPI collection, summary and flat report |
//! | [`scenario`] | Scenarios, metrics and their ordered threshold bands |
//! | [`ship`] | Ship lifecycle state machine and the FIFO queue |
//! | [`simulation`] | Event loop orchestration and control surface |

pub mod berth;
pub mod config;
pub mod constants;
pub mod container;
pub mod error;
pub mod events;
pub mod generator;
pub mod metrics;
pub mod scenario;
pub mod ship;
pub mod simulation;

pub use error::{PortError, Result};
