//! Container handling: crane productivity and the timed processing step.
//!
//! Each ship type has a base rate per crane. Cranes beyond the efficiency
//! threshold add less than a full crane's worth (they share quay space and
//! yard trucks), and no processing step is shorter than the configured floor.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::berth::Berth;
use crate::config::{HandlingConfig, PortConfig};
use crate::error::{PortError, Result};
use crate::ship::{ShipManager, ShipState, ShipType};

/// A ship's scheduled occupation of a berth for loading and unloading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessingJob {
    pub ship_id: u32,
    pub berth_id: u32,
    /// TEU moved (unloaded + loaded).
    pub containers: u32,
    pub started_at: f64,
    /// Hours of crane work.
    pub duration: f64,
    pub completes_at: f64,
}

#[derive(Debug, Clone)]
pub struct ContainerHandler {
    rates: BTreeMap<ShipType, f64>,
    handling: HandlingConfig,
}

impl ContainerHandler {
    pub fn new(config: &PortConfig) -> Self {
        Self {
            rates: config
                .ship_types
                .iter()
                .map(|s| (s.ship_type, s.base_rate_teu_per_hour))
                .collect(),
            handling: config.handling.clone(),
        }
    }

    /// Crane count after the diminishing-returns adjustment.
    pub fn effective_cranes(&self, crane_count: u32) -> f64 {
        let threshold = self.handling.crane_efficiency_threshold;
        let full = crane_count.min(threshold) as f64;
        let extra = crane_count.saturating_sub(threshold) as f64;
        full + extra * self.handling.extra_crane_efficiency
    }

    /// Hours needed to move `total_containers` TEU with `crane_count` cranes.
    pub fn calculate_processing_time(
        &self,
        ship_type: ShipType,
        total_containers: u32,
        crane_count: u32,
    ) -> Result<f64> {
        let base_rate = *self
            .rates
            .get(&ship_type)
            .ok_or_else(|| PortError::InvalidShipType {
                name: ship_type.to_string(),
            })?;
        if crane_count == 0 {
            return Err(PortError::InvalidInput {
                field: "crane_count",
                reason: "at least one crane is required".to_string(),
            });
        }

        let rate = base_rate * self.effective_cranes(crane_count);
        let hours = total_containers as f64 / rate;
        Ok(hours.max(self.handling.min_processing_hours))
    }

    pub fn calculate_processing_time_by_name(
        &self,
        ship_type: &str,
        total_containers: u32,
        crane_count: u32,
    ) -> Result<f64> {
        self.calculate_processing_time(ship_type.parse()?, total_containers, crane_count)
    }

    /// Start crane work: DOCKING → PROCESSING, returning the timed job.
    pub fn process_ship(
        &self,
        ships: &mut ShipManager,
        ship_id: u32,
        berth: &Berth,
        now: f64,
    ) -> Result<ProcessingJob> {
        let ship = ships.get(ship_id).ok_or(PortError::InvalidTransition {
            ship_id,
            from: None,
            to: ShipState::Processing,
        })?;
        if ship.berth_id != Some(berth.id) {
            return Err(PortError::BerthUnavailable {
                berth_id: berth.id,
                ship_id,
                reason: match ship.berth_id {
                    Some(other) => format!("ship is assigned to berth {other}"),
                    None => "ship has no berth assignment".to_string(),
                },
            });
        }

        let containers = ship.total_containers();
        let duration =
            self.calculate_processing_time(ship.ship_type, containers, berth.crane_count)?;
        ships.update_state(ship_id, ShipState::Processing)?;

        Ok(ProcessingJob {
            ship_id,
            berth_id: berth.id,
            containers,
            started_at: now,
            duration,
            completes_at: now + duration,
        })
    }

    /// Crane work finished: PROCESSING → DEPARTING.
    pub fn complete(&self, ships: &mut ShipManager, job: &ProcessingJob) -> Result<()> {
        ships.update_state(job.ship_id, ShipState::Departing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::berth::{BerthManager, BerthType};
    use crate::config::BerthSpec;
    use crate::ship::Ship;

    fn handler() -> ContainerHandler {
        ContainerHandler::new(&PortConfig::hong_kong())
    }

    #[test]
    fn test_linear_up_to_threshold() {
        let h = handler();
        // 45 TEU/h per crane, 3 full cranes
        let t = h
            .calculate_processing_time(ShipType::Container, 1350, 3)
            .unwrap();
        assert!((t - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_diminishing_returns_beyond_threshold() {
        let h = handler();
        assert!((h.effective_cranes(5) - 4.2).abs() < 1e-9);

        let t3 = h.calculate_processing_time(ShipType::Container, 1350, 3).unwrap();
        let t4 = h.calculate_processing_time(ShipType::Container, 1350, 4).unwrap();
        let t5 = h.calculate_processing_time(ShipType::Container, 1350, 5).unwrap();
        assert!(t4 < t3 && t5 < t4);
        // The fourth crane saves less than a full crane would
        assert!(t3 / t4 < 4.0 / 3.0);
    }

    #[test]
    fn test_minimum_processing_floor() {
        let h = handler();
        let t = h.calculate_processing_time(ShipType::Passenger, 0, 2).unwrap();
        assert_eq!(t, 0.1);
    }

    #[test]
    fn test_unknown_type_and_zero_cranes() {
        let mut config = PortConfig::hong_kong();
        config.ship_types.retain(|s| s.ship_type != ShipType::Tanker);
        let h = ContainerHandler::new(&config);
        assert!(matches!(
            h.calculate_processing_time(ShipType::Tanker, 100, 2),
            Err(PortError::InvalidShipType { .. })
        ));
        assert!(matches!(
            h.calculate_processing_time_by_name("dinghy", 100, 2),
            Err(PortError::InvalidShipType { .. })
        ));
        assert!(matches!(
            h.calculate_processing_time(ShipType::Container, 100, 0),
            Err(PortError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_process_and_complete() {
        let h = handler();
        let mut berths = BerthManager::new(&[BerthSpec {
            id: 1,
            name: "A".into(),
            capacity_teu: 10_000,
            crane_count: 3,
            berth_type: BerthType::Container,
        }]);
        let mut ships = ShipManager::new();
        ships
            .add_ship(Ship::new(7, "Ever Test", ShipType::Container, 8000, 0.0, 675, 675))
            .unwrap();
        ships.update_state(7, ShipState::Waiting).unwrap();
        berths.allocate(1, 7, ShipType::Container, 8000, 1.0).unwrap();
        ships.begin_docking(7, 1, 1.0).unwrap();

        let job = h
            .process_ship(&mut ships, 7, berths.get(1).unwrap(), 1.5)
            .unwrap();
        assert_eq!(ships.get(7).unwrap().state, ShipState::Processing);
        assert_eq!(job.containers, 1350);
        assert!((job.completes_at - 11.5).abs() < 1e-9);

        h.complete(&mut ships, &job).unwrap();
        assert_eq!(ships.get(7).unwrap().state, ShipState::Departing);
    }

    #[test]
    fn test_process_requires_matching_berth() {
        let h = handler();
        let berths = BerthManager::new(&[BerthSpec {
            id: 1,
            name: "A".into(),
            capacity_teu: 10_000,
            crane_count: 3,
            berth_type: BerthType::Container,
        }]);
        let mut ships = ShipManager::new();
        ships
            .add_ship(Ship::new(7, "Ever Test", ShipType::Container, 8000, 0.0, 10, 10))
            .unwrap();
        assert!(h
            .process_ship(&mut ships, 7, berths.get(1).unwrap(), 0.0)
            .is_err());
        assert_eq!(ships.get(7).unwrap().state, ShipState::Arriving);
    }
}
