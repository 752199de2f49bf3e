//! Scenario-aware random values, always inside the scenario's band.
//!
//! Draws are uniform over `[min, max]`. Optional variation (time of day,
//! ship-size correlation) scales a draw and is then clamped back into the
//! band, so a Peak value can never fall below a Normal one.
//!
//! Randomness lives here and nowhere else. Pass a seed for reproducible
//! output; omit it to continue the generator's own stream.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::{PortConfig, ShipTypeSpec};
use crate::constants::{timing, variation};
use crate::error::{PortError, Result};
use crate::scenario::{Band, Metric, Scenario, ScenarioTable};
use crate::ship::ShipType;

/// One draw, or several.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Sample {
    Single(f64),
    Many(Vec<f64>),
}

impl Sample {
    pub fn values(&self) -> &[f64] {
        match self {
            Sample::Single(v) => std::slice::from_ref(v),
            Sample::Many(vs) => vs,
        }
    }

    pub fn into_vec(self) -> Vec<f64> {
        match self {
            Sample::Single(v) => vec![v],
            Sample::Many(vs) => vs,
        }
    }

    pub fn as_single(&self) -> Option<f64> {
        match self {
            Sample::Single(v) => Some(*v),
            Sample::Many(_) => None,
        }
    }
}

/// Secondary factors applied on top of a band draw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Variation {
    /// Simulated hour, any value; reduced modulo 24.
    pub hour_of_day: Option<f64>,
    pub ship_size_teu: Option<u32>,
}

impl Variation {
    pub fn multiplier(&self) -> f64 {
        let time = self.hour_of_day.map(time_of_day_multiplier).unwrap_or(1.0);
        let size = self.ship_size_teu.map(ship_size_factor).unwrap_or(1.0);
        time * size
    }
}

/// Busier during the working day, quieter overnight.
pub fn time_of_day_multiplier(hour: f64) -> f64 {
    let hour = hour.rem_euclid(24.0);
    if (timing::DAY_PEAK_START..timing::DAY_PEAK_END).contains(&hour) {
        variation::DAY_PEAK_MULTIPLIER
    } else if (timing::NIGHT_START..timing::NIGHT_END).contains(&hour) {
        variation::NIGHT_MULTIPLIER
    } else {
        1.0
    }
}

/// Larger ships push values up, smaller ones down, within ±20%.
pub fn ship_size_factor(size_teu: u32) -> f64 {
    let deviation = (size_teu as f64 - variation::REFERENCE_SHIP_TEU) / variation::REFERENCE_SHIP_TEU;
    (1.0 + deviation * variation::SHIP_SIZE_SENSITIVITY).clamp(0.8, 1.2)
}

fn uniform(band: &Band, rng: &mut impl Rng) -> f64 {
    if band.width() <= 0.0 {
        band.min
    } else {
        rng.gen_range(band.min..=band.max)
    }
}

pub struct ScenarioAwareValueGenerator {
    table: ScenarioTable,
    rng: StdRng,
}

impl ScenarioAwareValueGenerator {
    /// Generator with an entropy-seeded stream.
    pub fn new(table: ScenarioTable) -> Self {
        Self {
            table,
            rng: StdRng::from_entropy(),
        }
    }

    /// Generator whose own stream is reproducible.
    pub fn seeded(table: ScenarioTable, seed: u64) -> Self {
        Self {
            table,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Restart the internal stream, from `seed` or from entropy.
    pub fn reseed(&mut self, seed: Option<u64>) {
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
    }

    pub fn table(&self) -> &ScenarioTable {
        &self.table
    }

    /// `count` uniform draws from the scenario's band for `metric`.
    ///
    /// With `seed`, a fresh stream is used and the internal one is left
    /// untouched, so equal seeds always give equal sequences.
    pub fn generate(
        &mut self,
        scenario: Scenario,
        metric: Metric,
        count: usize,
        seed: Option<u64>,
    ) -> Result<Sample> {
        if count == 0 {
            return Err(PortError::InvalidInput {
                field: "count",
                reason: "at least one sample must be requested".to_string(),
            });
        }
        let band = *self.table.band(scenario, metric)?;

        let mut values = match seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..count).map(|_| uniform(&band, &mut rng)).collect::<Vec<_>>()
            }
            None => (0..count)
                .map(|_| uniform(&band, &mut self.rng))
                .collect::<Vec<_>>(),
        };

        Ok(if count == 1 {
            Sample::Single(values.remove(0))
        } else {
            Sample::Many(values)
        })
    }

    /// [`generate`](Self::generate) with scenario and metric given by name.
    pub fn generate_by_name(
        &mut self,
        scenario: &str,
        metric: &str,
        count: usize,
        seed: Option<u64>,
    ) -> Result<Sample> {
        self.generate(scenario.parse()?, metric.parse()?, count, seed)
    }

    /// One draw from the internal stream.
    pub fn draw(&mut self, scenario: Scenario, metric: Metric) -> Result<f64> {
        let band = *self.table.band(scenario, metric)?;
        Ok(uniform(&band, &mut self.rng))
    }

    /// One draw scaled by `variation`, clamped back into the band.
    pub fn generate_with_variation(
        &mut self,
        scenario: Scenario,
        metric: Metric,
        variation: Variation,
    ) -> Result<f64> {
        let band = *self.table.band(scenario, metric)?;
        let value = uniform(&band, &mut self.rng) * variation.multiplier();
        Ok(band.clamp(value))
    }

    // ── Ship arrival helpers ────────────────────────────────────────────

    /// Pick a ship type by the configured arrival weights.
    pub fn ship_type(&mut self, config: &PortConfig) -> Result<ShipType> {
        let index = WeightedIndex::new(config.ship_types.iter().map(|s| s.arrival_weight))
            .map_err(|e| PortError::InvalidPortConfig {
                reason: format!("arrival weights: {e}"),
            })?;
        Ok(config.ship_types[index.sample(&mut self.rng)].ship_type)
    }

    /// Vessel size from the scenario's ship-size band, kept within the
    /// type's own size limits.
    ///
    /// Type limits win over the band: when the two don't overlap (general
    /// cargo or passenger ships in Peak Season) the size is clamped to the
    /// nearest type limit and lies outside the band.
    pub fn ship_size(&mut self, scenario: Scenario, spec: &ShipTypeSpec) -> Result<u32> {
        let band = *self.table.band(scenario, Metric::ShipSize)?;
        let (lo, hi) = (spec.min_size_teu as f64, spec.max_size_teu as f64);

        let size = match band.intersect(lo, hi) {
            Some(overlap) => uniform(&overlap, &mut self.rng),
            // Type can't reach the band; take the nearest size it can
            None => uniform(&band, &mut self.rng).clamp(lo, hi),
        };
        Ok((size.round() as u32).clamp(spec.min_size_teu, spec.max_size_teu))
    }

    /// `(unload, load)` TEU for a ship of `size_teu`, from the load-factor band.
    pub fn container_counts(&mut self, scenario: Scenario, size_teu: u32) -> Result<(u32, u32)> {
        let load_factor = self.draw(scenario, Metric::LoadFactor)?;
        let total = (size_teu as f64 * load_factor).round() as u32;
        let unload_share = self.rng.gen_range(0.4..=0.6);
        let unload = ((total as f64) * unload_share).round() as u32;
        Ok((unload, total - unload.min(total)))
    }

    /// Hours until the next arrival, from the arrival-rate band and the
    /// time of day.
    pub fn inter_arrival_hours(&mut self, scenario: Scenario, now: f64) -> Result<f64> {
        let rate = self.generate_with_variation(
            scenario,
            Metric::ArrivalRate,
            Variation {
                hour_of_day: Some(now),
                ship_size_teu: None,
            },
        )?;
        if rate <= 0.0 {
            return Err(PortError::InvalidInput {
                field: "arrival_rate",
                reason: format!("{scenario} arrival rate must be positive, got {rate}"),
            });
        }
        Ok(1.0 / rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> ScenarioAwareValueGenerator {
        ScenarioAwareValueGenerator::seeded(ScenarioTable::default(), 7)
    }

    #[test]
    fn test_peak_wait_time_seeded() {
        let mut gen = generator();
        let first = gen
            .generate_by_name("Peak Season", "wait_time", 5, Some(1))
            .unwrap();
        assert_eq!(first.values().len(), 5);
        assert!(first.values().iter().all(|v| (3.0..=8.0).contains(v)));

        let again = gen
            .generate_by_name("Peak Season", "wait_time", 5, Some(1))
            .unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_seed_determinism_across_generators() {
        let mut a = ScenarioAwareValueGenerator::new(ScenarioTable::default());
        let mut b = generator();
        let sa = a
            .generate(Scenario::NormalOperations, Metric::Throughput, 50, Some(42))
            .unwrap();
        let sb = b
            .generate(Scenario::NormalOperations, Metric::Throughput, 50, Some(42))
            .unwrap();
        assert_eq!(sa, sb);
        assert_eq!(sa.values().len(), 50);
    }

    #[test]
    fn test_ordering_holds_for_every_draw() {
        let mut gen = generator();
        for metric in Metric::ALL {
            let low = gen.generate(Scenario::LowSeason, metric, 200, None).unwrap();
            let normal = gen
                .generate(Scenario::NormalOperations, metric, 200, None)
                .unwrap();
            let peak = gen.generate(Scenario::PeakSeason, metric, 200, None).unwrap();

            let max = |s: &Sample| s.values().iter().cloned().fold(f64::MIN, f64::max);
            let min = |s: &Sample| s.values().iter().cloned().fold(f64::MAX, f64::min);
            assert!(min(&peak) > max(&normal), "{metric}");
            assert!(min(&normal) > max(&low), "{metric}");
        }
    }

    #[test]
    fn test_wait_time_never_below_band_minimum() {
        let mut gen = generator();
        for scenario in Scenario::ALL {
            let band = *gen.table().band(scenario, Metric::WaitTime).unwrap();
            let sample = gen.generate(scenario, Metric::WaitTime, 500, None).unwrap();
            assert!(sample.values().iter().all(|v| *v >= band.min));
        }
        let low = gen.table().band(Scenario::LowSeason, Metric::WaitTime).unwrap();
        assert_eq!(low.min, 0.0);
    }

    #[test]
    fn test_single_vs_many() {
        let mut gen = generator();
        let one = gen
            .generate(Scenario::LowSeason, Metric::Utilization, 1, None)
            .unwrap();
        assert!(one.as_single().is_some());
        let two = gen
            .generate(Scenario::LowSeason, Metric::Utilization, 2, None)
            .unwrap();
        assert!(two.as_single().is_none());
        assert!(gen
            .generate(Scenario::LowSeason, Metric::Utilization, 0, None)
            .is_err());
    }

    #[test]
    fn test_unknown_names() {
        let mut gen = generator();
        assert!(matches!(
            gen.generate_by_name("Typhoon Season", "wait_time", 1, None),
            Err(PortError::UnknownScenario { .. })
        ));
        assert!(matches!(
            gen.generate_by_name("Low Season", "profit", 1, None),
            Err(PortError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn test_variation_is_clamped() {
        let mut gen = generator();
        let band = *gen
            .table()
            .band(Scenario::PeakSeason, Metric::Throughput)
            .unwrap();
        let heavy = Variation {
            hour_of_day: Some(10.0),
            ship_size_teu: Some(24_000),
        };
        let light = Variation {
            hour_of_day: Some(3.0),
            ship_size_teu: Some(500),
        };
        for _ in 0..200 {
            let v = gen
                .generate_with_variation(Scenario::PeakSeason, Metric::Throughput, heavy)
                .unwrap();
            assert!(band.contains(v));
            let v = gen
                .generate_with_variation(Scenario::PeakSeason, Metric::Throughput, light)
                .unwrap();
            assert!(band.contains(v));
        }
    }

    #[test]
    fn test_multipliers() {
        assert_eq!(time_of_day_multiplier(9.0), variation::DAY_PEAK_MULTIPLIER);
        assert_eq!(time_of_day_multiplier(24.0 + 2.0), variation::NIGHT_MULTIPLIER);
        assert_eq!(time_of_day_multiplier(20.0), 1.0);
        assert_eq!(ship_size_factor(10_000), 1.0);
        assert!(ship_size_factor(30_000) <= 1.2);
    }

    #[test]
    fn test_ship_size_respects_type_limits() {
        let mut gen = generator();
        let config = PortConfig::hong_kong();
        let general = config.ship_type_spec(ShipType::General).unwrap();
        let container = config.ship_type_spec(ShipType::Container).unwrap();

        for _ in 0..100 {
            // Peak band starts above the general-cargo maximum
            let size = gen.ship_size(Scenario::PeakSeason, general).unwrap();
            assert_eq!(size, general.max_size_teu);

            let size = gen.ship_size(Scenario::PeakSeason, container).unwrap();
            assert!((12_000..=21_000).contains(&size));
        }
    }

    #[test]
    fn test_container_counts_follow_load_factor() {
        let mut gen = generator();
        for _ in 0..100 {
            let (unload, load) = gen.container_counts(Scenario::NormalOperations, 10_000).unwrap();
            let total = unload + load;
            assert!((2_000..=2_900).contains(&total), "total {total}");
        }
    }

    #[test]
    fn test_ship_type_follows_weights() {
        let mut gen = generator();
        let mut config = PortConfig::hong_kong();
        for spec in &mut config.ship_types {
            spec.arrival_weight = if spec.ship_type == ShipType::Bulk { 1.0 } else { 0.0 };
        }
        for _ in 0..20 {
            assert_eq!(gen.ship_type(&config).unwrap(), ShipType::Bulk);
        }
    }

    #[test]
    fn test_inter_arrival_within_rate_band() {
        let mut gen = generator();
        for hour in 0..48 {
            let gap = gen
                .inter_arrival_hours(Scenario::PeakSeason, hour as f64)
                .unwrap();
            assert!((1.0 / 0.30 - 1e-9..=1.0 / 0.20 + 1e-9).contains(&gap));
        }
    }
}
