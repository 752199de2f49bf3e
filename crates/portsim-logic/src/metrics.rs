//! KPI collection and summary.
//!
//! The collector only appends timestamped observations; every derived figure
//! is computed in [`MetricsCollector::summary`]. Ships still queued when the
//! run ends count toward waiting time with their age so far. A collector
//! with no waiting samples at all reports [`SummaryStatus::NoData`], never a
//! health grade; every other figure is still computed from what was recorded.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::constants::status;

/// One timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub at: f64,
    pub value: f64,
}

/// Overall health derived from average waiting time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    #[default]
    NoData,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SummaryStatus {
    pub fn from_average_wait(hours: f64) -> Self {
        if hours <= status::EXCELLENT_MAX_WAIT {
            SummaryStatus::Excellent
        } else if hours <= status::GOOD_MAX_WAIT {
            SummaryStatus::Good
        } else if hours <= status::FAIR_MAX_WAIT {
            SummaryStatus::Fair
        } else {
            SummaryStatus::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryStatus::NoData => "no_data",
            SummaryStatus::Excellent => "excellent",
            SummaryStatus::Good => "good",
            SummaryStatus::Fair => "fair",
            SummaryStatus::Poor => "poor",
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub status: SummaryStatus,
    pub elapsed_hours: f64,
    pub ships_arrived: u64,
    pub ships_served: u64,
    pub average_wait_hours: f64,
    pub max_wait_hours: f64,
    /// Time-weighted occupancy over the whole run, averaged across berths.
    pub average_utilization: f64,
    /// Latest per-berth utilization, keyed by berth id.
    pub berth_utilization: BTreeMap<u32, f64>,
    pub total_throughput_teu: u64,
    pub throughput_teu_per_hour: f64,
    pub arrival_rate_per_hour: f64,
    pub departure_rate_per_hour: f64,
    pub average_queue_length: f64,
    pub max_queue_length: u64,
}

/// A flat report entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    Text(String),
    Count(u64),
    Number(f64),
}

impl From<&str> for ReportValue {
    fn from(s: &str) -> Self {
        ReportValue::Text(s.to_string())
    }
}

impl From<u64> for ReportValue {
    fn from(n: u64) -> Self {
        ReportValue::Count(n)
    }
}

impl From<f64> for ReportValue {
    fn from(x: f64) -> Self {
        ReportValue::Number(x)
    }
}

impl Summary {
    /// Flat key/value view, suitable for JSON output.
    pub fn to_report(&self) -> BTreeMap<String, ReportValue> {
        let mut report = BTreeMap::new();
        let mut put = |key: &str, value: ReportValue| {
            report.insert(key.to_string(), value);
        };
        put("status", self.status.as_str().into());
        put("elapsed_hours", self.elapsed_hours.into());
        put("ships_arrived", self.ships_arrived.into());
        put("ships_served", self.ships_served.into());
        put("average_wait_hours", self.average_wait_hours.into());
        put("max_wait_hours", self.max_wait_hours.into());
        put("average_utilization", self.average_utilization.into());
        put("total_throughput_teu", self.total_throughput_teu.into());
        put("throughput_teu_per_hour", self.throughput_teu_per_hour.into());
        put("arrival_rate_per_hour", self.arrival_rate_per_hour.into());
        put("departure_rate_per_hour", self.departure_rate_per_hour.into());
        put("average_queue_length", self.average_queue_length.into());
        put("max_queue_length", self.max_queue_length.into());
        for (id, utilization) in &self.berth_utilization {
            put(&format!("berth_{id}_utilization"), (*utilization).into());
        }
        report
    }
}

fn mean(samples: &[Observation]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|o| o.value).sum::<f64>() / samples.len() as f64
}

fn max(samples: &[Observation]) -> f64 {
    samples.iter().map(|o| o.value).fold(0.0, f64::max)
}

fn per_hour(total: f64, hours: f64) -> f64 {
    if hours > 0.0 {
        total / hours
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    arrivals: Vec<f64>,
    departures: Vec<f64>,
    waits: Vec<Observation>,
    /// Ages of ships still queued at the latest close-out.
    outstanding_waits: Vec<Observation>,
    queue_lengths: Vec<Observation>,
    utilization: Vec<Observation>,
    berth_utilization: BTreeMap<u32, f64>,
    throughput: Vec<Observation>,
    elapsed_hours: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_arrival(&mut self, at: f64) {
        self.arrivals.push(at);
    }

    pub fn record_departure(&mut self, at: f64) {
        self.departures.push(at);
    }

    /// Hours a ship spent between arrival and berthing. Negative spans are
    /// recorded as zero.
    pub fn record_wait(&mut self, at: f64, hours: f64) {
        self.waits.push(Observation {
            at,
            value: hours.max(0.0),
        });
    }

    /// Replace the set of in-progress waits: hours each still-queued ship
    /// has waited as of `at`.
    pub fn record_outstanding_waits(&mut self, at: f64, ages: impl IntoIterator<Item = f64>) {
        self.outstanding_waits = ages
            .into_iter()
            .map(|hours| Observation {
                at,
                value: hours.max(0.0),
            })
            .collect();
    }

    pub fn record_queue_length(&mut self, at: f64, length: usize) {
        self.queue_lengths.push(Observation {
            at,
            value: length as f64,
        });
    }

    /// Aggregate utilization plus the per-berth snapshot it was computed from.
    /// Both are cumulative over `[0, at]`, so the latest sample stands for the run.
    pub fn record_utilization(&mut self, at: f64, aggregate: f64, per_berth: &[(u32, f64)]) {
        self.utilization.push(Observation {
            at,
            value: aggregate.clamp(0.0, 1.0),
        });
        for &(id, value) in per_berth {
            self.berth_utilization.insert(id, value.clamp(0.0, 1.0));
        }
    }

    /// TEU worked for one completed ship.
    pub fn record_throughput(&mut self, at: f64, teu: u32) {
        self.throughput.push(Observation {
            at,
            value: teu as f64,
        });
    }

    /// Set the span over which rates are computed.
    pub fn finalize(&mut self, now: f64) {
        self.elapsed_hours = now.max(0.0);
    }

    pub fn elapsed_hours(&self) -> f64 {
        self.elapsed_hours
    }

    pub fn wait_samples(&self) -> &[Observation] {
        &self.waits
    }

    pub fn outstanding_wait_samples(&self) -> &[Observation] {
        &self.outstanding_waits
    }

    pub fn queue_length_samples(&self) -> &[Observation] {
        &self.queue_lengths
    }

    pub fn utilization_samples(&self) -> &[Observation] {
        &self.utilization
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn summary(&self) -> Summary {
        let waits: Vec<Observation> = self
            .waits
            .iter()
            .chain(&self.outstanding_waits)
            .copied()
            .collect();
        let status = if waits.is_empty() {
            SummaryStatus::NoData
        } else {
            SummaryStatus::from_average_wait(mean(&waits))
        };

        let hours = self.elapsed_hours;
        let total_teu: f64 = self.throughput.iter().map(|o| o.value).sum();

        Summary {
            status,
            elapsed_hours: hours,
            ships_arrived: self.arrivals.len() as u64,
            ships_served: self.departures.len() as u64,
            average_wait_hours: mean(&waits),
            max_wait_hours: max(&waits),
            average_utilization: self.utilization.last().map_or(0.0, |o| o.value),
            berth_utilization: self.berth_utilization.clone(),
            total_throughput_teu: total_teu as u64,
            throughput_teu_per_hour: per_hour(total_teu, hours),
            arrival_rate_per_hour: per_hour(self.arrivals.len() as f64, hours),
            departure_rate_per_hour: per_hour(self.departures.len() as f64, hours),
            average_queue_length: mean(&self.queue_lengths),
            max_queue_length: max(&self.queue_lengths) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> MetricsCollector {
        let mut m = MetricsCollector::new();
        for i in 0..4 {
            let t = i as f64;
            m.record_arrival(t);
            m.record_wait(t + 0.2, 0.5);
            m.record_throughput(t + 2.0, 1000);
            m.record_departure(t + 2.5);
        }
        m.record_queue_length(1.0, 0);
        m.record_queue_length(2.0, 2);
        m.record_utilization(2.0, 0.5, &[(1, 0.4), (2, 0.6)]);
        m.finalize(10.0);
        m
    }

    #[test]
    fn test_empty_is_no_data() {
        let summary = MetricsCollector::new().summary();
        assert_eq!(summary.status, SummaryStatus::NoData);
        assert_eq!(summary.average_wait_hours, 0.0);
        assert_eq!(summary.ships_served, 0);

        let report = summary.to_report();
        assert_eq!(report["status"], ReportValue::Text("no_data".into()));
    }

    #[test]
    fn test_no_data_distinct_from_healthy() {
        let empty = MetricsCollector::new().summary();
        let healthy = healthy().summary();
        assert_eq!(healthy.status, SummaryStatus::Excellent);
        assert_ne!(empty.status, healthy.status);
    }

    #[test]
    fn test_summary_figures() {
        let s = healthy().summary();
        assert_eq!(s.ships_arrived, 4);
        assert_eq!(s.ships_served, 4);
        assert_eq!(s.total_throughput_teu, 4000);
        assert!((s.throughput_teu_per_hour - 400.0).abs() < 1e-9);
        assert!((s.arrival_rate_per_hour - 0.4).abs() < 1e-9);
        assert_eq!(s.max_queue_length, 2);
        assert!((s.average_queue_length - 1.0).abs() < 1e-9);
        assert_eq!(s.berth_utilization.get(&2), Some(&0.6));
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(SummaryStatus::from_average_wait(1.0), SummaryStatus::Excellent);
        assert_eq!(SummaryStatus::from_average_wait(2.5), SummaryStatus::Good);
        assert_eq!(SummaryStatus::from_average_wait(6.0), SummaryStatus::Fair);
        assert_eq!(SummaryStatus::from_average_wait(6.5), SummaryStatus::Poor);
    }

    #[test]
    fn test_report_flattens_berths() {
        let report = healthy().summary().to_report();
        assert_eq!(report["status"], ReportValue::Text("excellent".into()));
        assert_eq!(report["berth_1_utilization"], ReportValue::Number(0.4));
        assert_eq!(report["ships_served"], ReportValue::Count(4));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "excellent");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut m = healthy();
        m.reset();
        assert!(m.wait_samples().is_empty());
        assert_eq!(m.elapsed_hours(), 0.0);
        assert_eq!(m.summary().status, SummaryStatus::NoData);
    }

    #[test]
    fn test_figures_kept_without_wait_samples() {
        let mut m = MetricsCollector::new();
        for i in 0..5 {
            m.record_arrival(i as f64);
            m.record_queue_length(i as f64, i + 1);
        }
        m.record_utilization(4.0, 0.25, &[(1, 0.25)]);
        m.finalize(5.0);

        let s = m.summary();
        assert_eq!(s.status, SummaryStatus::NoData);
        assert_eq!(s.ships_arrived, 5);
        assert_eq!(s.max_queue_length, 5);
        assert!((s.average_queue_length - 3.0).abs() < 1e-9);
        assert!((s.arrival_rate_per_hour - 1.0).abs() < 1e-9);
        assert_eq!(s.average_utilization, 0.25);
    }

    #[test]
    fn test_outstanding_waits_count_toward_status() {
        let mut m = MetricsCollector::new();
        m.record_wait(1.0, 0.0);
        m.record_outstanding_waits(50.0, [48.0, 30.0, 12.0]);
        m.finalize(50.0);

        let s = m.summary();
        assert_eq!(s.max_wait_hours, 48.0);
        assert!((s.average_wait_hours - 22.5).abs() < 1e-9);
        assert_eq!(s.status, SummaryStatus::Poor);

        // A later close-out replaces the earlier ages
        m.record_outstanding_waits(60.0, std::iter::empty());
        assert_eq!(m.summary().status, SummaryStatus::Excellent);
    }

    #[test]
    fn test_utilization_is_latest_cumulative_sample() {
        let mut m = MetricsCollector::new();
        m.record_utilization(1.0, 0.0, &[(1, 0.0)]);
        m.record_utilization(2.0, 0.5, &[(1, 0.5)]);
        m.record_utilization(10.0, 0.9, &[(1, 0.9)]);
        let s = m.summary();
        assert_eq!(s.average_utilization, 0.9);
        assert_eq!(s.berth_utilization[&1], s.average_utilization);
    }

    #[test]
    fn test_negative_wait_clamped() {
        let mut m = MetricsCollector::new();
        m.record_wait(0.0, -1.0);
        assert_eq!(m.wait_samples()[0].value, 0.0);
    }
}
