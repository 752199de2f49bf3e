//! Static port configuration: berths, ship types, handling settings.
//!
//! Supplied as plain data (or parsed from JSON) and validated once before a
//! simulation is built. Nothing here changes while a run is in progress.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::berth::BerthType;
use crate::constants::{handling, timing};
use crate::error::{PortError, Result};
use crate::ship::ShipType;

/// One berth of the port description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BerthSpec {
    pub id: u32,
    pub name: String,
    pub capacity_teu: u32,
    pub crane_count: u32,
    pub berth_type: BerthType,
}

/// Per-ship-type size limits, handling rate, and share of arrivals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipTypeSpec {
    pub ship_type: ShipType,
    pub min_size_teu: u32,
    pub max_size_teu: u32,
    /// TEU moved per hour by a single crane.
    pub base_rate_teu_per_hour: f64,
    /// Relative weight in the arrival mix. Zero disables arrivals of this type.
    #[serde(default = "default_weight")]
    pub arrival_weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Crane productivity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlingConfig {
    pub crane_efficiency_threshold: u32,
    pub extra_crane_efficiency: f64,
    pub min_processing_hours: f64,
}

impl Default for HandlingConfig {
    fn default() -> Self {
        Self {
            crane_efficiency_threshold: handling::CRANE_EFFICIENCY_THRESHOLD,
            extra_crane_efficiency: handling::EXTRA_CRANE_EFFICIENCY,
            min_processing_hours: handling::MIN_PROCESSING_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub name: String,
    pub berths: Vec<BerthSpec>,
    pub ship_types: Vec<ShipTypeSpec>,
    #[serde(default)]
    pub handling: HandlingConfig,
    #[serde(default = "default_docking_hours")]
    pub docking_hours: f64,
    #[serde(default = "default_departure_hours")]
    pub departure_hours: f64,
    #[serde(default = "default_sample_interval")]
    pub sample_interval_hours: f64,
}

fn default_docking_hours() -> f64 {
    timing::DOCKING_HOURS
}

fn default_departure_hours() -> f64 {
    timing::DEPARTURE_HOURS
}

fn default_sample_interval() -> f64 {
    timing::SAMPLE_INTERVAL_HOURS
}

impl PortConfig {
    /// Parse a JSON port description and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PortConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ship_type_spec(&self, ship_type: ShipType) -> Option<&ShipTypeSpec> {
        self.ship_types.iter().find(|s| s.ship_type == ship_type)
    }

    /// Reject configurations the simulation cannot run on.
    pub fn validate(&self) -> Result<()> {
        if self.berths.is_empty() {
            return Err(invalid("port has no berths"));
        }

        let mut ids = BTreeSet::new();
        for berth in &self.berths {
            if !ids.insert(berth.id) {
                return Err(invalid(format!("duplicate berth id {}", berth.id)));
            }
            if berth.capacity_teu == 0 {
                return Err(invalid(format!("berth {} has zero capacity", berth.id)));
            }
            if berth.crane_count == 0 {
                return Err(invalid(format!("berth {} has no cranes", berth.id)));
            }
        }

        if self.ship_types.is_empty() {
            return Err(invalid("ship-type table is empty"));
        }
        let mut seen = BTreeSet::new();
        for spec in &self.ship_types {
            if !seen.insert(spec.ship_type) {
                return Err(invalid(format!("ship type {} listed twice", spec.ship_type)));
            }
            if spec.min_size_teu == 0 || spec.min_size_teu > spec.max_size_teu {
                return Err(invalid(format!(
                    "ship type {} has size range {}..{}",
                    spec.ship_type, spec.min_size_teu, spec.max_size_teu
                )));
            }
            if !(spec.base_rate_teu_per_hour.is_finite() && spec.base_rate_teu_per_hour > 0.0) {
                return Err(invalid(format!(
                    "ship type {} has non-positive handling rate",
                    spec.ship_type
                )));
            }
            if !(spec.arrival_weight.is_finite() && spec.arrival_weight >= 0.0) {
                return Err(invalid(format!(
                    "ship type {} has invalid arrival weight",
                    spec.ship_type
                )));
            }
            // A type that can arrive must be able to berth somewhere
            if spec.arrival_weight > 0.0
                && !self.berths.iter().any(|b| {
                    b.berth_type.accepts(spec.ship_type) && b.capacity_teu >= spec.min_size_teu
                })
            {
                return Err(invalid(format!(
                    "no berth can take {} ships",
                    spec.ship_type
                )));
            }
        }
        if self.ship_types.iter().all(|s| s.arrival_weight == 0.0) {
            return Err(invalid("every ship type has zero arrival weight"));
        }

        let h = &self.handling;
        if !(h.extra_crane_efficiency > 0.0 && h.extra_crane_efficiency <= 1.0) {
            return Err(invalid("extra crane efficiency must be in (0, 1]"));
        }
        if !(h.min_processing_hours.is_finite() && h.min_processing_hours > 0.0) {
            return Err(invalid("minimum processing time must be positive"));
        }

        for (name, value) in [
            ("docking_hours", self.docking_hours),
            ("departure_hours", self.departure_hours),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{name} must be non-negative")));
            }
        }
        if !(self.sample_interval_hours.is_finite() && self.sample_interval_hours > 0.0) {
            return Err(invalid("sample interval must be positive"));
        }
        Ok(())
    }

    /// Kwai Tsing container terminals plus the Tsing Yi / Tuen Mun
    /// multi-purpose and bulk berths.
    pub fn hong_kong() -> Self {
        let berth = |id, name: &str, capacity_teu, crane_count, berth_type| BerthSpec {
            id,
            name: name.to_string(),
            capacity_teu,
            crane_count,
            berth_type,
        };
        let ship = |ship_type, min, max, rate, weight| ShipTypeSpec {
            ship_type,
            min_size_teu: min,
            max_size_teu: max,
            base_rate_teu_per_hour: rate,
            arrival_weight: weight,
        };

        Self {
            name: "Hong Kong (Kwai Tsing)".to_string(),
            berths: vec![
                berth(1, "Kwai Tsing CT1", 14_000, 4, BerthType::Container),
                berth(2, "Kwai Tsing CT2", 14_000, 4, BerthType::Container),
                berth(3, "Kwai Tsing CT4", 18_000, 5, BerthType::Container),
                berth(4, "Kwai Tsing CT6", 20_000, 6, BerthType::Container),
                berth(5, "Kwai Tsing CT7", 24_000, 6, BerthType::Container),
                berth(6, "Kwai Tsing CT8 East", 24_000, 7, BerthType::Container),
                berth(7, "Kwai Tsing CT9 North", 22_000, 6, BerthType::Container),
                berth(8, "Tsing Yi Multi-Purpose 1", 12_000, 3, BerthType::Mixed),
                berth(9, "Tsing Yi Multi-Purpose 2", 8_000, 2, BerthType::Mixed),
                berth(10, "Tuen Mun Bulk", 16_000, 3, BerthType::Bulk),
                berth(11, "River Trade Terminal", 6_000, 2, BerthType::Mixed),
            ],
            ship_types: vec![
                ship(ShipType::Container, 1_000, 21_000, 45.0, 6.0),
                ship(ShipType::Bulk, 1_000, 16_000, 30.0, 1.5),
                ship(ShipType::Tanker, 1_000, 12_000, 40.0, 1.0),
                ship(ShipType::General, 500, 8_000, 20.0, 1.0),
                ship(ShipType::Passenger, 500, 6_000, 60.0, 0.5),
            ],
            handling: HandlingConfig::default(),
            docking_hours: timing::DOCKING_HOURS,
            departure_hours: timing::DEPARTURE_HOURS,
            sample_interval_hours: timing::SAMPLE_INTERVAL_HOURS,
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::hong_kong()
    }
}

fn invalid(reason: impl Into<String>) -> PortError {
    PortError::InvalidPortConfig {
        reason: reason.into(),
    }
}
