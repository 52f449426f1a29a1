//! Collection of run statistics.
//!
//! Two kinds of observations are recorded: plain samples (one value per
//! occurrence, e.g. sojourn times) and time-weighted samples (a value that
//! holds until the next observation, e.g. server power). Sinks are pluggable
//! so experiments can stream observations elsewhere; [`RunStats`] is the
//! default in-memory implementation.

use std::collections::HashMap;

use serde::Serialize;

/// Per-occurrence metrics. The server metrics are observed at every
/// monitoring tick, so with a fixed tick interval their sample mean equals
/// the time average.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    /// Job finish time minus arrival time.
    SojournTime,
    /// Interarrival times drawn by the workload generators.
    GeneratedInterarrivalTime,
    /// Service times drawn by the workload generators.
    GeneratedServiceTime,
    /// Power draw of a single server at a monitoring tick, watts.
    ServerPower,
    /// Instantaneous utilization of a single server at a monitoring tick.
    ServerUtilization,
    /// 1 if a server was idle at a monitoring tick, 0 otherwise.
    ServerIdleFraction,
}

/// Metrics weighted by how long each observed value was in effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TimeWeightedMetric {
    /// Total power draw of the cluster, watts.
    ClusterPower,
}

/// Receiver of statistics observations.
pub trait StatsSink {
    fn add_sample(&mut self, metric: Metric, value: f64);
    fn add_time_weighted(&mut self, metric: TimeWeightedMetric, value: f64, time: f64);
}

#[derive(Clone, Debug, Default)]
struct TimeWeightedAccumulator {
    weighted_sum: f64,
    last_value: f64,
    last_time: f64,
    start_time: f64,
    started: bool,
}

impl TimeWeightedAccumulator {
    fn observe(&mut self, value: f64, time: f64) {
        if self.started {
            self.weighted_sum += self.last_value * (time - self.last_time);
        } else {
            self.start_time = time;
            self.started = true;
        }
        self.last_value = value;
        self.last_time = time;
    }

    fn mean(&self) -> Option<f64> {
        if !self.started || self.last_time <= self.start_time {
            return None;
        }
        Some(self.weighted_sum / (self.last_time - self.start_time))
    }
}

/// In-memory statistics store.
#[derive(Default)]
pub struct RunStats {
    samples: HashMap<Metric, Vec<f64>>,
    time_weighted: HashMap<TimeWeightedMetric, TimeWeightedAccumulator>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded samples of a metric, in recording order.
    pub fn samples(&self, metric: Metric) -> &[f64] {
        self.samples.get(&metric).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn sample_count(&self, metric: Metric) -> usize {
        self.samples(metric).len()
    }

    /// Arithmetic mean of a sampled metric, `None` if nothing was recorded.
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        let samples = self.samples(metric);
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Time-weighted mean over the observation window, `None` if the window is empty.
    pub fn time_weighted_mean(&self, metric: TimeWeightedMetric) -> Option<f64> {
        self.time_weighted.get(&metric).and_then(|acc| acc.mean())
    }
}

impl StatsSink for RunStats {
    fn add_sample(&mut self, metric: Metric, value: f64) {
        self.samples.entry(metric).or_default().push(value);
    }

    fn add_time_weighted(&mut self, metric: TimeWeightedMetric, value: f64, time: f64) {
        self.time_weighted.entry(metric).or_default().observe(value, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_mean() {
        let mut stats = RunStats::new();
        stats.add_sample(Metric::SojournTime, 1.);
        stats.add_sample(Metric::SojournTime, 3.);
        assert_eq!(stats.mean(Metric::SojournTime), Some(2.));
        assert_eq!(stats.mean(Metric::GeneratedServiceTime), None);
    }

    #[test]
    fn time_weighted_mean_weights_by_duration() {
        let mut stats = RunStats::new();
        // 100 W for 1 s, then 200 W for 3 s.
        stats.add_time_weighted(TimeWeightedMetric::ClusterPower, 100., 0.);
        stats.add_time_weighted(TimeWeightedMetric::ClusterPower, 200., 1.);
        stats.add_time_weighted(TimeWeightedMetric::ClusterPower, 0., 4.);
        let mean = stats.time_weighted_mean(TimeWeightedMetric::ClusterPower).unwrap();
        assert!((mean - 175.).abs() < 1e-9);
    }

    #[test]
    fn time_weighted_single_observation_has_no_mean() {
        let mut stats = RunStats::new();
        stats.add_time_weighted(TimeWeightedMetric::ClusterPower, 50., 10.);
        assert_eq!(stats.time_weighted_mean(TimeWeightedMetric::ClusterPower), None);
    }
}
