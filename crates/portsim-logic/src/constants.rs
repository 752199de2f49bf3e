//! Tunable numeric defaults for crane handling, timing, and status thresholds.
//!
//! Plain constants with no configuration dependency. `config` uses these as
//! defaults; tests and the harness reference them directly.

pub mod handling {
    /// Cranes up to this count work at full efficiency.
    pub const CRANE_EFFICIENCY_THRESHOLD: u32 = 3;
    /// Efficiency of each crane beyond the threshold (coordination overhead).
    pub const EXTRA_CRANE_EFFICIENCY: f64 = 0.6;
    /// No processing event is shorter than this (hours).
    pub const MIN_PROCESSING_HOURS: f64 = 0.1;
}

pub mod timing {
    /// Pilotage and mooring time between berth allocation and first crane move.
    pub const DOCKING_HOURS: f64 = 0.5;
    /// Unmooring time between last crane move and leaving port waters.
    pub const DEPARTURE_HOURS: f64 = 0.5;
    /// Interval between queue-length / utilization snapshots.
    pub const SAMPLE_INTERVAL_HOURS: f64 = 1.0;
    /// Local hours considered the daytime demand peak.
    pub const DAY_PEAK_START: f64 = 8.0;
    pub const DAY_PEAK_END: f64 = 18.0;
    /// Local hours considered the overnight lull.
    pub const NIGHT_START: f64 = 0.0;
    pub const NIGHT_END: f64 = 6.0;
}

pub mod variation {
    pub const DAY_PEAK_MULTIPLIER: f64 = 1.1;
    pub const NIGHT_MULTIPLIER: f64 = 0.85;
    /// Ship size at which the size correlation factor is neutral (TEU).
    pub const REFERENCE_SHIP_TEU: f64 = 10_000.0;
    /// Fractional change per reference-size of deviation.
    pub const SHIP_SIZE_SENSITIVITY: f64 = 0.1;
}

pub mod status {
    /// Average waiting time (hours) at or below which operations are excellent.
    pub const EXCELLENT_MAX_WAIT: f64 = 1.0;
    pub const GOOD_MAX_WAIT: f64 = 3.0;
    pub const FAIR_MAX_WAIT: f64 = 6.0;
}
