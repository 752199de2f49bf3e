//! Scenario parameter bundles and their threshold bands.
//!
//! Every tracked metric has a `[min, max]` band per scenario. Bands are
//! strictly separated and ordered Low < Normal < Peak for every metric; a
//! table that breaks this can't be constructed, so generators and the
//! simulation never see overlapping or inverted ranges.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PortError, Result};

/// Named operating regime. Closed set, looked up exhaustively.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Scenario {
    #[serde(rename = "Peak Season")]
    PeakSeason,
    #[default]
    #[serde(rename = "Normal Operations")]
    NormalOperations,
    #[serde(rename = "Low Season")]
    LowSeason,
}

impl Scenario {
    /// Presentation order.
    pub const ALL: [Scenario; 3] = [
        Scenario::PeakSeason,
        Scenario::NormalOperations,
        Scenario::LowSeason,
    ];

    /// Demand order, lowest first.
    pub const ASCENDING: [Scenario; 3] = [
        Scenario::LowSeason,
        Scenario::NormalOperations,
        Scenario::PeakSeason,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::PeakSeason => "Peak Season",
            Scenario::NormalOperations => "Normal Operations",
            Scenario::LowSeason => "Low Season",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Scenario {
    type Err = PortError;

    /// Accepts the full label or its first word, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(|c: char| c == '_' || c == '-', " ");
        match normalized.as_str() {
            "peak season" | "peak" => Ok(Scenario::PeakSeason),
            "normal operations" | "normal" => Ok(Scenario::NormalOperations),
            "low season" | "low" => Ok(Scenario::LowSeason),
            _ => Err(PortError::UnknownScenario {
                name: s.to_string(),
            }),
        }
    }
}

/// A quantity whose range depends on the scenario. All rise with demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Hours a ship waits for a berth.
    WaitTime,
    /// TEU handled per hour, port-wide.
    Throughput,
    /// Berth occupancy fraction.
    Utilization,
    /// Vessel size in TEU.
    ShipSize,
    /// Ships arriving per hour.
    ArrivalRate,
    /// Fraction of a ship's TEU capacity moved across the quay.
    LoadFactor,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::WaitTime,
        Metric::Throughput,
        Metric::Utilization,
        Metric::ShipSize,
        Metric::ArrivalRate,
        Metric::LoadFactor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::WaitTime => "wait_time",
            Metric::Throughput => "throughput",
            Metric::Utilization => "utilization",
            Metric::ShipSize => "ship_size",
            Metric::ArrivalRate => "arrival_rate",
            Metric::LoadFactor => "load_factor",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::WaitTime => "hours",
            Metric::Throughput => "TEU/hour",
            Metric::Utilization | Metric::LoadFactor => "fraction",
            Metric::ShipSize => "TEU",
            Metric::ArrivalRate => "ships/hour",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(|c: char| c == ' ' || c == '-', "_");
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| PortError::UnknownMetric {
                name: s.to_string(),
            })
    }
}

/// Closed interval `[min, max]` with an optional target value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            target: None,
        }
    }

    pub const fn with_target(self, target: f64) -> Self {
        Self {
            target: Some(target),
            ..self
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        self.min + self.width() / 2.0
    }

    /// Overlap with `[lo, hi]`, if any.
    pub fn intersect(&self, lo: f64, hi: f64) -> Option<Band> {
        let min = self.min.max(lo);
        let max = self.max.min(hi);
        (min <= max).then_some(Band::new(min, max))
    }

    /// Finite, not inverted, and any target lies inside.
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min <= self.max
            && self.target.map_or(true, |t| self.contains(t))
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Ranges for every tracked metric under one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    pub scenario: Scenario,
    pub description: String,
    pub bands: BTreeMap<Metric, Band>,
}

impl ScenarioParameters {
    pub fn band(&self, metric: Metric) -> Result<&Band> {
        self.bands
            .get(&metric)
            .ok_or_else(|| PortError::UnknownMetric {
                name: format!("{} (not defined for {})", metric, self.scenario),
            })
    }
}

/// Validated set of scenario bundles.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioTable {
    params: BTreeMap<Scenario, ScenarioParameters>,
}

impl ScenarioTable {
    /// Build and validate. Fails with every ordering violation at once.
    pub fn new(bundles: Vec<ScenarioParameters>) -> Result<Self> {
        let mut params = BTreeMap::new();
        let mut duplicates = Vec::new();
        for bundle in bundles {
            let scenario = bundle.scenario;
            if params.insert(scenario, bundle).is_some() {
                duplicates.push(format!("{scenario}: defined more than once"));
            }
        }
        if !duplicates.is_empty() {
            return Err(PortError::InvalidScenarioConfig {
                violations: duplicates,
            });
        }

        let table = Self { params };
        table.validate_ordering()?;
        Ok(table)
    }

    /// Parse a JSON array of scenario bundles and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let bundles: Vec<ScenarioParameters> = serde_json::from_str(json)?;
        Self::new(bundles)
    }

    /// Check Low < Normal < Peak with strict separation for every metric.
    pub fn validate_ordering(&self) -> Result<()> {
        let mut violations = Vec::new();

        for scenario in Scenario::ALL {
            if !self.params.contains_key(&scenario) {
                violations.push(format!("{scenario}: scenario missing"));
            }
        }

        for metric in Metric::ALL {
            let bands: Vec<Option<&Band>> = Scenario::ASCENDING
                .iter()
                .map(|s| self.params.get(s).and_then(|p| p.bands.get(&metric)))
                .collect();

            for (scenario, band) in Scenario::ASCENDING.iter().zip(&bands) {
                match band {
                    None if self.params.contains_key(scenario) => {
                        violations.push(format!("{metric}: {scenario} band missing"));
                    }
                    Some(band) if !band.is_well_formed() => {
                        violations.push(format!("{metric}: {scenario} band {band} is malformed"));
                    }
                    _ => {}
                }
            }

            for pair in Scenario::ASCENDING.windows(2).zip(bands.windows(2)) {
                let ([lower_s, upper_s], [Some(lower), Some(upper)]) = pair else {
                    continue;
                };
                if upper.min <= lower.max {
                    violations.push(format!(
                        "{metric}: {upper_s} {upper} overlaps or falls below {lower_s} {lower}"
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PortError::InvalidScenarioConfig { violations })
        }
    }

    pub fn get_params(&self, scenario: Scenario) -> Result<&ScenarioParameters> {
        self.params
            .get(&scenario)
            .ok_or_else(|| PortError::UnknownScenario {
                name: scenario.to_string(),
            })
    }

    pub fn get_params_by_name(&self, name: &str) -> Result<&ScenarioParameters> {
        self.get_params(name.parse()?)
    }

    pub fn band(&self, scenario: Scenario, metric: Metric) -> Result<&Band> {
        self.get_params(scenario)?.band(metric)
    }

    pub fn description(&self, scenario: Scenario) -> Result<&str> {
        Ok(self.get_params(scenario)?.description.as_str())
    }

    pub fn scenarios(&self) -> impl Iterator<Item = Scenario> + '_ {
        Scenario::ALL
            .into_iter()
            .filter(|s| self.params.contains_key(s))
    }

    pub fn bundles(&self) -> impl Iterator<Item = &ScenarioParameters> + '_ {
        self.params.values()
    }
}

impl Default for ScenarioTable {
    /// Hong Kong seasonal bands from [`default_bundles`].
    fn default() -> Self {
        Self {
            params: default_bundles()
                .into_iter()
                .map(|p| (p.scenario, p))
                .collect(),
        }
    }
}

/// Built-in Hong Kong bands. Hour values are tunable, not contractual.
pub fn default_bundles() -> Vec<ScenarioParameters> {
    let bundle = |scenario, description: &str, bands: [(Metric, Band); 6]| ScenarioParameters {
        scenario,
        description: description.to_string(),
        bands: bands.into_iter().collect(),
    };

    vec![
        bundle(
            Scenario::LowSeason,
            "Post-holiday lull (Q1): fewer, smaller calls and short queues; berths often idle.",
            [
                (Metric::WaitTime, Band::new(0.0, 1.4).with_target(0.5)),
                (Metric::Throughput, Band::new(40.0, 84.0)),
                (Metric::Utilization, Band::new(0.30, 0.55)),
                (Metric::ShipSize, Band::new(1_000.0, 5_999.0)),
                (Metric::ArrivalRate, Band::new(0.05, 0.11)),
                (Metric::LoadFactor, Band::new(0.10, 0.19)),
            ],
        ),
        bundle(
            Scenario::NormalOperations,
            "Typical trading weeks: steady arrivals with moderate berth occupancy.",
            [
                (Metric::WaitTime, Band::new(1.5, 2.9).with_target(2.2)),
                (Metric::Throughput, Band::new(85.0, 124.0)),
                (Metric::Utilization, Band::new(0.56, 0.78)),
                (Metric::ShipSize, Band::new(6_000.0, 11_999.0)),
                (Metric::ArrivalRate, Band::new(0.12, 0.19)),
                (Metric::LoadFactor, Band::new(0.20, 0.29)),
            ],
        ),
        bundle(
            Scenario::PeakSeason,
            "Pre-holiday export surge (Q3-Q4): mega-vessels, full berths, and long anchorage queues.",
            [
                (Metric::WaitTime, Band::new(3.0, 8.0).with_target(5.0)),
                (Metric::Throughput, Band::new(125.0, 170.0)),
                (Metric::Utilization, Band::new(0.79, 0.98)),
                (Metric::ShipSize, Band::new(12_000.0, 21_000.0)),
                (Metric::ArrivalRate, Band::new(0.20, 0.30)),
                (Metric::LoadFactor, Band::new(0.30, 0.40)),
            ],
        ),
    ]
}
