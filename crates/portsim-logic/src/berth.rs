//! Berths, type compatibility, and the allocation policy.
//!
//! A berth holds at most one ship. Allocation picks the smallest free berth
//! that is type-compatible and large enough, so big berths stay available
//! for big ships. Each berth keeps a running total of occupied hours for
//! utilization reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BerthSpec;
use crate::error::{PortError, Result};
use crate::ship::ShipType;

/// What a berth is equipped to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BerthType {
    Container,
    Bulk,
    /// Multi-purpose berth, accepts every ship type.
    Mixed,
}

impl BerthType {
    /// Exact match, or any ship at a mixed berth.
    pub fn accepts(self, ship_type: ShipType) -> bool {
        match self {
            BerthType::Mixed => true,
            BerthType::Container => ship_type == ShipType::Container,
            BerthType::Bulk => ship_type == ShipType::Bulk,
        }
    }
}

impl fmt::Display for BerthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BerthType::Container => "container",
            BerthType::Bulk => "bulk",
            BerthType::Mixed => "mixed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Berth {
    pub id: u32,
    pub name: String,
    /// Largest vessel the berth can take (TEU).
    pub capacity_teu: u32,
    pub crane_count: u32,
    pub berth_type: BerthType,
    pub occupied: bool,
    pub current_ship: Option<u32>,
    occupied_since: Option<f64>,
    occupied_hours: f64,
    ships_served: u32,
}

impl Berth {
    pub fn from_spec(spec: &BerthSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            capacity_teu: spec.capacity_teu,
            crane_count: spec.crane_count,
            berth_type: spec.berth_type,
            occupied: false,
            current_ship: None,
            occupied_since: None,
            occupied_hours: 0.0,
            ships_served: 0,
        }
    }

    /// Type-compatible and large enough, ignoring occupancy.
    pub fn fits(&self, ship_type: ShipType, ship_size: u32) -> bool {
        self.berth_type.accepts(ship_type) && self.capacity_teu >= ship_size
    }

    pub fn can_accept(&self, ship_type: ShipType, ship_size: u32) -> bool {
        !self.occupied && self.fits(ship_type, ship_size)
    }

    /// Total occupied hours up to `now`, including any ship still alongside.
    pub fn occupied_hours(&self, now: f64) -> f64 {
        let current = self
            .occupied_since
            .map(|since| (now - since).max(0.0))
            .unwrap_or(0.0);
        self.occupied_hours + current
    }

    /// Fraction of `[0, now]` the berth was occupied, in `[0, 1]`.
    pub fn utilization(&self, now: f64) -> f64 {
        if now <= 0.0 {
            return 0.0;
        }
        (self.occupied_hours(now) / now).clamp(0.0, 1.0)
    }

    pub fn ships_served(&self) -> u32 {
        self.ships_served
    }

    fn clear(&mut self) {
        self.occupied = false;
        self.current_ship = None;
        self.occupied_since = None;
        self.occupied_hours = 0.0;
        self.ships_served = 0;
    }
}

/// Owns every berth and the allocation records.
#[derive(Debug, Clone, Default)]
pub struct BerthManager {
    /// Sorted by id.
    berths: Vec<Berth>,
}

impl BerthManager {
    pub fn new(specs: &[BerthSpec]) -> Self {
        let mut berths: Vec<Berth> = specs.iter().map(Berth::from_spec).collect();
        berths.sort_by_key(|b| b.id);
        Self { berths }
    }

    /// Smallest free compatible berth with enough capacity; ties go to the lowest id.
    pub fn find_available_berth(&self, ship_type: ShipType, ship_size: u32) -> Option<&Berth> {
        self.berths
            .iter()
            .filter(|b| b.can_accept(ship_type, ship_size))
            .min_by_key(|b| (b.capacity_teu, b.id))
    }

    /// Same as [`find_available_berth`](Self::find_available_berth) with the
    /// ship type given by name.
    pub fn find_available_berth_by_name(
        &self,
        ship_type: &str,
        ship_size: u32,
    ) -> Result<Option<&Berth>> {
        let ship_type: ShipType = ship_type.parse()?;
        Ok(self.find_available_berth(ship_type, ship_size))
    }

    /// Whether any berth, free or not, could ever take this ship.
    pub fn any_fits(&self, ship_type: ShipType, ship_size: u32) -> bool {
        self.berths.iter().any(|b| b.fits(ship_type, ship_size))
    }

    pub fn allocate(
        &mut self,
        berth_id: u32,
        ship_id: u32,
        ship_type: ShipType,
        ship_size: u32,
        now: f64,
    ) -> Result<()> {
        let berth = self.get_mut(berth_id)?;

        let reason = if berth.occupied {
            Some(format!(
                "occupied by ship {}",
                berth.current_ship.unwrap_or_default()
            ))
        } else if !berth.berth_type.accepts(ship_type) {
            Some(format!(
                "{} berth cannot take a {} ship",
                berth.berth_type, ship_type
            ))
        } else if berth.capacity_teu < ship_size {
            Some(format!(
                "ship size {} TEU exceeds capacity {} TEU",
                ship_size, berth.capacity_teu
            ))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(PortError::BerthUnavailable {
                berth_id,
                ship_id,
                reason,
            });
        }

        berth.occupied = true;
        berth.current_ship = Some(ship_id);
        berth.occupied_since = Some(now);
        berth.ships_served += 1;
        Ok(())
    }

    /// Free a berth and bank its occupied time. Returns the ship that left, if any.
    pub fn release(&mut self, berth_id: u32, now: f64) -> Result<Option<u32>> {
        let berth = self.get_mut(berth_id)?;
        if let Some(since) = berth.occupied_since.take() {
            berth.occupied_hours += (now - since).max(0.0);
        }
        berth.occupied = false;
        Ok(berth.current_ship.take())
    }

    pub fn get(&self, berth_id: u32) -> Option<&Berth> {
        self.berths
            .binary_search_by_key(&berth_id, |b| b.id)
            .ok()
            .map(|idx| &self.berths[idx])
    }

    fn get_mut(&mut self, berth_id: u32) -> Result<&mut Berth> {
        match self.berths.binary_search_by_key(&berth_id, |b| b.id) {
            Ok(idx) => Ok(&mut self.berths[idx]),
            Err(_) => Err(PortError::BerthNotFound { berth_id }),
        }
    }

    pub fn utilization(&self, berth_id: u32, now: f64) -> Result<f64> {
        self.get(berth_id)
            .map(|b| b.utilization(now))
            .ok_or(PortError::BerthNotFound { berth_id })
    }

    /// `(berth_id, utilization)` for every berth, by id.
    pub fn utilization_snapshot(&self, now: f64) -> Vec<(u32, f64)> {
        self.berths
            .iter()
            .map(|b| (b.id, b.utilization(now)))
            .collect()
    }

    /// Mean utilization across all berths.
    pub fn aggregate_utilization(&self, now: f64) -> f64 {
        if self.berths.is_empty() {
            return 0.0;
        }
        let total: f64 = self.berths.iter().map(|b| b.utilization(now)).sum();
        total / self.berths.len() as f64
    }

    pub fn occupied_count(&self) -> usize {
        self.berths.iter().filter(|b| b.occupied).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Berth> + '_ {
        self.berths.iter()
    }

    pub fn len(&self) -> usize {
        self.berths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.berths.is_empty()
    }

    /// Clear occupancy and counters; the berths themselves stay.
    pub fn reset(&mut self) {
        for berth in &mut self.berths {
            berth.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: u32, capacity: u32, cranes: u32, berth_type: BerthType) -> BerthSpec {
        BerthSpec {
            id,
            name: format!("B{id}"),
            capacity_teu: capacity,
            crane_count: cranes,
            berth_type,
        }
    }

    #[test]
    fn test_compatibility() {
        assert!(BerthType::Mixed.accepts(ShipType::Tanker));
        assert!(BerthType::Container.accepts(ShipType::Container));
        assert!(!BerthType::Container.accepts(ShipType::Bulk));
        assert!(!BerthType::Bulk.accepts(ShipType::Passenger));
    }

    #[test]
    fn test_bulk_ship_finds_large_bulk_berth() {
        let mgr = BerthManager::new(&[
            spec(1, 20_000, 4, BerthType::Container),
            spec(2, 30_000, 3, BerthType::Bulk),
        ]);

        let berth = mgr.find_available_berth(ShipType::Bulk, 25_000).unwrap();
        assert_eq!(berth.capacity_teu, 30_000);
        assert!(mgr
            .find_available_berth(ShipType::Container, 25_000)
            .is_none());
    }

    #[test]
    fn test_smallest_suitable_berth_then_lowest_id() {
        let mgr = BerthManager::new(&[
            spec(5, 18_000, 4, BerthType::Container),
            spec(3, 12_000, 3, BerthType::Mixed),
            spec(4, 12_000, 3, BerthType::Container),
            spec(1, 8_000, 2, BerthType::Container),
        ]);

        let berth = mgr.find_available_berth(ShipType::Container, 9_000).unwrap();
        assert_eq!(berth.id, 3);
        let berth = mgr.find_available_berth(ShipType::Container, 12_001).unwrap();
        assert_eq!(berth.id, 5);
    }

    #[test]
    fn test_oversized_ship_gets_none() {
        let mgr = BerthManager::new(&[spec(1, 10_000, 3, BerthType::Mixed)]);
        assert!(mgr.find_available_berth(ShipType::General, 10_001).is_none());
        assert!(!mgr.any_fits(ShipType::General, 10_001));
    }

    #[test]
    fn test_occupied_berth_skipped_and_rejected() {
        let mut mgr = BerthManager::new(&[
            spec(1, 10_000, 3, BerthType::Container),
            spec(2, 15_000, 3, BerthType::Container),
        ]);
        mgr.allocate(1, 100, ShipType::Container, 9_000, 0.0).unwrap();

        assert_eq!(
            mgr.find_available_berth(ShipType::Container, 9_000)
                .unwrap()
                .id,
            2
        );
        assert!(matches!(
            mgr.allocate(1, 101, ShipType::Container, 5_000, 1.0),
            Err(PortError::BerthUnavailable { berth_id: 1, .. })
        ));
    }

    #[test]
    fn test_allocate_rejects_incompatible_or_oversized() {
        let mut mgr = BerthManager::new(&[spec(1, 10_000, 3, BerthType::Bulk)]);
        assert!(mgr.allocate(1, 1, ShipType::Container, 5_000, 0.0).is_err());
        assert!(mgr.allocate(1, 1, ShipType::Bulk, 12_000, 0.0).is_err());
        assert_eq!(mgr.occupied_count(), 0);
    }

    #[test]
    fn test_unknown_berth() {
        let mut mgr = BerthManager::new(&[spec(1, 10_000, 3, BerthType::Bulk)]);
        assert!(matches!(
            mgr.release(9, 1.0),
            Err(PortError::BerthNotFound { berth_id: 9 })
        ));
        assert!(mgr.utilization(9, 1.0).is_err());
    }

    #[test]
    fn test_utilization_accumulates() {
        let mut mgr = BerthManager::new(&[
            spec(1, 10_000, 3, BerthType::Container),
            spec(2, 10_000, 3, BerthType::Container),
        ]);
        mgr.allocate(1, 1, ShipType::Container, 5_000, 0.0).unwrap();
        assert_eq!(mgr.release(1, 4.0).unwrap(), Some(1));
        mgr.allocate(1, 2, ShipType::Container, 5_000, 6.0).unwrap();

        // 4h banked + 2h in progress over 8h
        assert!((mgr.utilization(1, 8.0).unwrap() - 0.75).abs() < 1e-9);
        assert_eq!(mgr.utilization(2, 8.0).unwrap(), 0.0);
        assert!((mgr.aggregate_utilization(8.0) - 0.375).abs() < 1e-9);
        assert_eq!(mgr.get(1).unwrap().ships_served(), 2);
    }

    #[test]
    fn test_reset_keeps_berths() {
        let mut mgr = BerthManager::new(&[spec(1, 10_000, 3, BerthType::Container)]);
        mgr.allocate(1, 1, ShipType::Container, 5_000, 0.0).unwrap();
        mgr.reset();
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.occupied_count(), 0);
        assert_eq!(mgr.utilization(1, 5.0).unwrap(), 0.0);
    }

    #[test]
    fn test_find_by_name() {
        let mgr = BerthManager::new(&[spec(1, 10_000, 3, BerthType::Mixed)]);
        assert!(mgr.find_available_berth_by_name("tanker", 5_000).unwrap().is_some());
        assert!(mgr.find_available_berth_by_name("submarine", 5_000).is_err());
    }
}
