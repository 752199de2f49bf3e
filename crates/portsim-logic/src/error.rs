//! Error taxonomy for the simulation core.
//!
//! Configuration errors are fatal at setup time. State-transition and
//! allocation errors are returned for the specific call and never halt a
//! running simulation. Backpressure (no free berth, empty queue) is not an
//! error at all and never appears here.

use thiserror::Error;

use crate::ship::ShipState;

/// Convenient result alias for the simulation core.
pub type Result<T> = std::result::Result<T, PortError>;

#[derive(Debug, Error)]
pub enum PortError {
    /// One or more metrics break the Low < Normal < Peak band ordering.
    #[error("invalid scenario configuration: {}", .violations.join("; "))]
    InvalidScenarioConfig { violations: Vec<String> },

    #[error("unknown scenario: {name}")]
    UnknownScenario { name: String },

    #[error("unknown metric: {name}")]
    UnknownMetric { name: String },

    /// Ship type name could not be parsed, or the ship-type table has no entry for it.
    #[error("invalid ship type: {name}")]
    InvalidShipType { name: String },

    #[error("invalid port configuration: {reason}")]
    InvalidPortConfig { reason: String },

    /// Illegal lifecycle step. `from` is `None` when the ship id is unknown.
    #[error("invalid transition for ship {ship_id}: {} -> {to}", display_from(.from))]
    InvalidTransition {
        ship_id: u32,
        from: Option<ShipState>,
        to: ShipState,
    },

    #[error("duplicate ship id {id}")]
    DuplicateId { id: u32 },

    #[error("berth {berth_id} unavailable for ship {ship_id}: {reason}")]
    BerthUnavailable {
        berth_id: u32,
        ship_id: u32,
        reason: String,
    },

    #[error("berth {berth_id} not found")]
    BerthNotFound { berth_id: u32 },

    #[error("invalid duration {duration}: must be a positive number of hours")]
    InvalidDuration { duration: f64 },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Control call not allowed in the current simulation state.
    #[error("cannot {action} while simulation is {state}")]
    InvalidControl {
        action: &'static str,
        state: &'static str,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

fn display_from(from: &Option<ShipState>) -> String {
    match from {
        Some(state) => state.to_string(),
        None => "<unknown ship>".to_string(),
    }
}

impl PortError {
    /// Whether this error belongs to the setup-time configuration class.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PortError::InvalidScenarioConfig { .. }
                | PortError::UnknownScenario { .. }
                | PortError::UnknownMetric { .. }
                | PortError::InvalidShipType { .. }
                | PortError::InvalidPortConfig { .. }
                | PortError::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_config_lists_every_violation() {
        let err = PortError::InvalidScenarioConfig {
            violations: vec!["throughput overlaps".into(), "wait_time overlaps".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("throughput"));
        assert!(msg.contains("wait_time"));
    }

    #[test]
    fn test_unknown_ship_transition_message() {
        let err = PortError::InvalidTransition {
            ship_id: 7,
            from: None,
            to: ShipState::Waiting,
        };
        assert!(err.to_string().contains("<unknown ship>"));
    }

    #[test]
    fn test_configuration_class() {
        assert!(PortError::UnknownMetric { name: "x".into() }.is_configuration());
        assert!(!PortError::BerthNotFound { berth_id: 1 }.is_configuration());
    }
}
