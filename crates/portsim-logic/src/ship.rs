//! Ship entities, their lifecycle state machine, and the arrival queue.
//!
//! Ships advance strictly one step at a time along
//! ARRIVING → WAITING → DOCKING → PROCESSING → DEPARTING → DEPARTED.
//! The only way back is `ShipManager::reset`, which clears every ship.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PortError, Result};

/// Cargo class of a vessel. Determines berth compatibility and handling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipType {
    Container,
    Bulk,
    Tanker,
    General,
    Passenger,
}

impl ShipType {
    pub const ALL: [ShipType; 5] = [
        ShipType::Container,
        ShipType::Bulk,
        ShipType::Tanker,
        ShipType::General,
        ShipType::Passenger,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShipType::Container => "container",
            ShipType::Bulk => "bulk",
            ShipType::Tanker => "tanker",
            ShipType::General => "general",
            ShipType::Passenger => "passenger",
        }
    }
}

impl fmt::Display for ShipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        ShipType::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| PortError::InvalidShipType {
                name: s.to_string(),
            })
    }
}

/// Lifecycle state of a ship in port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipState {
    Arriving,
    Waiting,
    Docking,
    Processing,
    Departing,
    Departed,
}

impl ShipState {
    /// The only legal successor, or `None` for the terminal state.
    pub fn next(self) -> Option<ShipState> {
        match self {
            ShipState::Arriving => Some(ShipState::Waiting),
            ShipState::Waiting => Some(ShipState::Docking),
            ShipState::Docking => Some(ShipState::Processing),
            ShipState::Processing => Some(ShipState::Departing),
            ShipState::Departing => Some(ShipState::Departed),
            ShipState::Departed => None,
        }
    }

    pub fn can_transition_to(self, to: ShipState) -> bool {
        self.next() == Some(to)
    }

    pub fn is_terminal(self) -> bool {
        self == ShipState::Departed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipState::Arriving => "arriving",
            ShipState::Waiting => "waiting",
            ShipState::Docking => "docking",
            ShipState::Processing => "processing",
            ShipState::Departing => "departing",
            ShipState::Departed => "departed",
        }
    }
}

impl fmt::Display for ShipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vessel calling at the port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: u32,
    pub name: String,
    pub ship_type: ShipType,
    /// Vessel size in TEU.
    pub size_teu: u32,
    /// Simulated clock value (hours) when the arrival event fired.
    pub arrival_time: f64,
    pub containers_to_unload: u32,
    pub containers_to_load: u32,
    pub state: ShipState,
    /// Berth the ship is assigned to. The berth holds the authoritative record.
    pub berth_id: Option<u32>,
    /// Clock value when a berth was allocated.
    pub berthed_at: Option<f64>,
}

impl Ship {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        ship_type: ShipType,
        size_teu: u32,
        arrival_time: f64,
        containers_to_unload: u32,
        containers_to_load: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            ship_type,
            size_teu,
            arrival_time,
            containers_to_unload,
            containers_to_load,
            state: ShipState::Arriving,
            berth_id: None,
            berthed_at: None,
        }
    }

    /// Containers moved across the quay for this call.
    pub fn total_containers(&self) -> u32 {
        self.containers_to_unload + self.containers_to_load
    }

    /// Hours between arrival and berth allocation, once berthed.
    pub fn waiting_hours(&self) -> Option<f64> {
        self.berthed_at
            .map(|berthed| (berthed - self.arrival_time).max(0.0))
    }
}

/// Owns every ship in port, their states, and the FIFO arrival queue.
#[derive(Debug, Clone, Default)]
pub struct ShipManager {
    active: BTreeMap<u32, Ship>,
    /// Arrival order of ships that have not yet left WAITING.
    queue: VecDeque<u32>,
    departed: Vec<Ship>,
}

impl ShipManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly arrived ship in ARRIVING and append it to the queue.
    pub fn add_ship(&mut self, mut ship: Ship) -> Result<()> {
        if ship.size_teu == 0 {
            return Err(PortError::InvalidInput {
                field: "size_teu",
                reason: format!("ship {} has zero size", ship.id),
            });
        }
        if !ship.arrival_time.is_finite() || ship.arrival_time < 0.0 {
            return Err(PortError::InvalidInput {
                field: "arrival_time",
                reason: format!("ship {} arrival time {}", ship.id, ship.arrival_time),
            });
        }
        if self.contains(ship.id) {
            return Err(PortError::DuplicateId { id: ship.id });
        }

        ship.state = ShipState::Arriving;
        ship.berth_id = None;
        ship.berthed_at = None;
        self.queue.push_back(ship.id);
        self.active.insert(ship.id, ship);
        Ok(())
    }

    /// Advance a ship to `new_state`. Only the immediate successor is legal.
    pub fn update_state(&mut self, ship_id: u32, new_state: ShipState) -> Result<()> {
        let Some(ship) = self.active.get_mut(&ship_id) else {
            let from = self
                .departed
                .iter()
                .find(|s| s.id == ship_id)
                .map(|s| s.state);
            return Err(PortError::InvalidTransition {
                ship_id,
                from,
                to: new_state,
            });
        };

        if !ship.state.can_transition_to(new_state) {
            return Err(PortError::InvalidTransition {
                ship_id,
                from: Some(ship.state),
                to: new_state,
            });
        }

        let left_queue = ship.state == ShipState::Waiting;
        ship.state = new_state;

        if left_queue {
            self.queue.retain(|&id| id != ship_id);
        }
        if new_state.is_terminal() {
            if let Some(ship) = self.active.remove(&ship_id) {
                self.departed.push(ship);
            }
        }
        Ok(())
    }

    /// WAITING → DOCKING together with the berth assignment.
    pub fn begin_docking(&mut self, ship_id: u32, berth_id: u32, now: f64) -> Result<()> {
        self.update_state(ship_id, ShipState::Docking)?;
        if let Some(ship) = self.active.get_mut(&ship_id) {
            ship.berth_id = Some(berth_id);
            ship.berthed_at = Some(now);
        }
        Ok(())
    }

    /// Longest-waiting ship in WAITING, if any.
    pub fn next_waiting(&self) -> Option<&Ship> {
        self.waiting().next()
    }

    /// Ships in WAITING, oldest arrival first.
    pub fn waiting(&self) -> impl Iterator<Item = &Ship> + '_ {
        self.queue
            .iter()
            .filter_map(|id| self.active.get(id))
            .filter(|s| s.state == ShipState::Waiting)
    }

    pub fn queue_length(&self) -> usize {
        self.waiting().count()
    }

    /// Active or departed ship by id.
    pub fn get(&self, ship_id: u32) -> Option<&Ship> {
        self.active
            .get(&ship_id)
            .or_else(|| self.departed.iter().find(|s| s.id == ship_id))
    }

    pub fn contains(&self, ship_id: u32) -> bool {
        self.get(ship_id).is_some()
    }

    pub fn active(&self) -> impl Iterator<Item = &Ship> + '_ {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Ships that reached DEPARTED, in departure order.
    pub fn departed(&self) -> &[Ship] {
        &self.departed
    }

    /// Count of active ships in the given state.
    pub fn count_in(&self, state: ShipState) -> usize {
        self.active.values().filter(|s| s.state == state).count()
    }

    /// Drop every ship, active and departed.
    pub fn reset(&mut self) {
        self.active.clear();
        self.queue.clear();
        self.departed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship(id: u32) -> Ship {
        Ship::new(id, format!("Test {id}"), ShipType::Container, 8000, 0.0, 500, 400)
    }

    #[test]
    fn test_full_lifecycle() {
        let mut mgr = ShipManager::new();
        mgr.add_ship(ship(1)).unwrap();
        assert_eq!(mgr.get(1).unwrap().state, ShipState::Arriving);

        for state in [
            ShipState::Waiting,
            ShipState::Docking,
            ShipState::Processing,
            ShipState::Departing,
            ShipState::Departed,
        ] {
            mgr.update_state(1, state).unwrap();
        }

        assert_eq!(mgr.active_count(), 0);
        assert_eq!(mgr.departed().len(), 1);
        assert_eq!(mgr.departed()[0].state, ShipState::Departed);
    }

    #[test]
    fn test_departed_cannot_go_back() {
        let mut mgr = ShipManager::new();
        mgr.add_ship(ship(1)).unwrap();
        for state in [
            ShipState::Waiting,
            ShipState::Docking,
            ShipState::Processing,
            ShipState::Departing,
            ShipState::Departed,
        ] {
            mgr.update_state(1, state).unwrap();
        }

        let err = mgr.update_state(1, ShipState::Waiting).unwrap_err();
        assert!(matches!(
            err,
            PortError::InvalidTransition {
                from: Some(ShipState::Departed),
                to: ShipState::Waiting,
                ..
            }
        ));
        assert!(mgr.update_state(1, ShipState::Arriving).is_err());
    }

    #[test]
    fn test_skipping_states_rejected() {
        let mut mgr = ShipManager::new();
        mgr.add_ship(ship(1)).unwrap();
        assert!(mgr.update_state(1, ShipState::Docking).is_err());
        assert!(mgr.update_state(1, ShipState::Arriving).is_err());
        assert_eq!(mgr.get(1).unwrap().state, ShipState::Arriving);
    }

    #[test]
    fn test_unknown_ship_transition() {
        let mut mgr = ShipManager::new();
        let err = mgr.update_state(99, ShipState::Waiting).unwrap_err();
        assert!(matches!(err, PortError::InvalidTransition { from: None, .. }));
    }

    #[test]
    fn test_duplicate_id() {
        let mut mgr = ShipManager::new();
        mgr.add_ship(ship(1)).unwrap();
        assert!(matches!(
            mgr.add_ship(ship(1)),
            Err(PortError::DuplicateId { id: 1 })
        ));
    }

    #[test]
    fn test_zero_size_rejected_before_mutation() {
        let mut mgr = ShipManager::new();
        let mut s = ship(1);
        s.size_teu = 0;
        assert!(mgr.add_ship(s).is_err());
        assert!(!mgr.contains(1));
    }

    #[test]
    fn test_next_waiting_is_fifo() {
        let mut mgr = ShipManager::new();
        for id in [3, 1, 2] {
            mgr.add_ship(ship(id)).unwrap();
        }
        assert!(mgr.next_waiting().is_none(), "ARRIVING ships are not waiting yet");

        mgr.update_state(1, ShipState::Waiting).unwrap();
        mgr.update_state(3, ShipState::Waiting).unwrap();
        mgr.update_state(2, ShipState::Waiting).unwrap();

        // Queue order follows arrival, not id or transition order
        assert_eq!(mgr.next_waiting().unwrap().id, 3);
        mgr.begin_docking(3, 10, 2.0).unwrap();
        assert_eq!(mgr.next_waiting().unwrap().id, 1);
        assert_eq!(mgr.queue_length(), 2);
    }

    #[test]
    fn test_begin_docking_records_berth_and_wait() {
        let mut mgr = ShipManager::new();
        let mut s = ship(1);
        s.arrival_time = 1.5;
        mgr.add_ship(s).unwrap();
        mgr.update_state(1, ShipState::Waiting).unwrap();
        mgr.begin_docking(1, 4, 4.0).unwrap();

        let s = mgr.get(1).unwrap();
        assert_eq!(s.berth_id, Some(4));
        assert_eq!(s.waiting_hours(), Some(2.5));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut mgr = ShipManager::new();
        mgr.add_ship(ship(1)).unwrap();
        mgr.update_state(1, ShipState::Waiting).unwrap();
        mgr.reset();
        assert_eq!(mgr.active_count(), 0);
        assert_eq!(mgr.queue_length(), 0);
        // Id is free again after reset
        mgr.add_ship(ship(1)).unwrap();
    }

    #[test]
    fn test_ship_type_parse() {
        assert_eq!("Bulk".parse::<ShipType>().unwrap(), ShipType::Bulk);
        assert!(matches!(
            "hovercraft".parse::<ShipType>(),
            Err(PortError::InvalidShipType { .. })
        ));
    }
}
