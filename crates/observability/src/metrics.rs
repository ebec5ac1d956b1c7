//! Flight graph metrics
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator for run summaries.

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// Per-tick measurements handed to [`record_tick_metrics`] and [`TickMetricsAggregator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TickSample {
    /// Tick sequence number, starting at 1
    pub tick: u64,
    /// Wall time spent in the tick (µs)
    pub duration_us: f64,
    /// Nodes whose `process` ran
    pub nodes_processed: usize,
    /// Declared inputs whose path is wired but not resolved
    pub unresolved_inputs: usize,
}

/// Record one graph tick
///
/// # Example
///
/// ```ignore
/// use observability::metrics::{record_tick_metrics, TickSample};
///
/// let report = graph.tick()?;
/// record_tick_metrics(&report.as_sample());
/// ```
pub fn record_tick_metrics(sample: &TickSample) {
    counter!("flightgraph_ticks_total").increment(1);
    gauge!("flightgraph_last_tick").set(sample.tick as f64);
    histogram!("flightgraph_tick_duration_us").record(sample.duration_us);
    gauge!("flightgraph_unresolved_inputs").set(sample.unresolved_inputs as f64);
}

/// Record one `process` call on a node
pub fn record_node_processed(node: &str) {
    counter!("flightgraph_node_process_total", "node" => node.to_string()).increment(1);
}

/// Record a driver sample accepted into a source stream
pub fn record_sample_delivered(stream: &str) {
    counter!("flightgraph_samples_delivered_total", "stream" => stream.to_string()).increment(1);
}

/// Record samples discarded before a consumer saw them
pub fn record_samples_dropped(stream: &str, count: u64) {
    counter!("flightgraph_samples_dropped_total", "stream" => stream.to_string()).increment(count);
}

/// Record a path resolution state change
pub fn record_path_transition(path: &str, resolved: bool) {
    let state = if resolved { "resolved" } else { "unresolved" };
    counter!(
        "flightgraph_path_transitions_total",
        "path" => path.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Tick metrics aggregator
///
/// Aggregates in memory so the CLI can print a summary at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct TickMetricsAggregator {
    /// Ticks observed
    pub total_ticks: u64,

    /// Ticks that ran with at least one unresolved input
    pub degraded_ticks: u64,

    /// Tick duration statistics (µs)
    pub duration_stats: RunningStats,

    /// Nodes processed per tick
    pub nodes_stats: RunningStats,

    /// Samples delivered by drivers, per stream
    pub delivered: HashMap<String, u64>,

    /// Samples dropped at the driver boundary, per stream
    pub dropped: HashMap<String, u64>,
}

impl TickMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick into the aggregate
    pub fn update(&mut self, sample: &TickSample) {
        self.total_ticks += 1;
        if sample.unresolved_inputs > 0 {
            self.degraded_ticks += 1;
        }
        self.duration_stats.push(sample.duration_us);
        self.nodes_stats.push(sample.nodes_processed as f64);
    }

    pub fn add_delivered(&mut self, stream: &str, count: u64) {
        *self.delivered.entry(stream.to_string()).or_insert(0) += count;
    }

    pub fn add_dropped(&mut self, stream: &str, count: u64) {
        *self.dropped.entry(stream.to_string()).or_insert(0) += count;
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_ticks: self.total_ticks,
            degraded_ticks: self.degraded_ticks,
            degraded_rate: if self.total_ticks > 0 {
                self.degraded_ticks as f64 / self.total_ticks as f64 * 100.0
            } else {
                0.0
            },
            tick_duration_us: StatsSummary::from(&self.duration_stats),
            nodes_per_tick: StatsSummary::from(&self.nodes_stats),
            total_delivered: self.delivered.values().sum(),
            total_dropped: self.dropped.values().sum(),
            dropped_per_stream: self.dropped.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub degraded_ticks: u64,
    pub degraded_rate: f64,
    pub tick_duration_us: StatsSummary,
    pub nodes_per_tick: StatsSummary,
    pub total_delivered: u64,
    pub total_dropped: u64,
    pub dropped_per_stream: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Flight Graph Metrics Summary ===")?;
        writeln!(f, "Total ticks: {}", self.total_ticks)?;
        writeln!(
            f,
            "Degraded ticks: {} ({:.2}%)",
            self.degraded_ticks, self.degraded_rate
        )?;
        writeln!(f, "Tick duration (us): {}", self.tick_duration_us)?;
        writeln!(f, "Nodes per tick: {}", self.nodes_per_tick)?;
        writeln!(f, "Samples delivered: {}", self.total_delivered)?;
        writeln!(f, "Samples dropped: {}", self.total_dropped)?;

        if !self.dropped_per_stream.is_empty() {
            writeln!(f, "Dropped per stream:")?;
            let mut streams: Vec<_> = self.dropped_per_stream.iter().collect();
            streams.sort();
            for (stream, count) in streams {
                writeln!(f, "  {}: {}", stream, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = TickMetricsAggregator::new();
        aggregator.update(&TickSample {
            tick: 1,
            duration_us: 120.0,
            nodes_processed: 4,
            unresolved_inputs: 0,
        });
        aggregator.update(&TickSample {
            tick: 2,
            duration_us: 80.0,
            nodes_processed: 4,
            unresolved_inputs: 1,
        });
        aggregator.add_delivered("imu/acceleration", 8);
        aggregator.add_dropped("imu/acceleration", 2);

        let summary = aggregator.summary();
        assert_eq!(summary.total_ticks, 2);
        assert_eq!(summary.degraded_ticks, 1);
        assert!((summary.degraded_rate - 50.0).abs() < 1e-10);
        assert!((summary.tick_duration_us.mean - 100.0).abs() < 1e-10);
        assert_eq!(summary.total_delivered, 8);
        assert_eq!(summary.total_dropped, 2);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = TickMetricsAggregator::new();
        aggregator.add_dropped("gps/position", 3);
        let text = aggregator.summary().to_string();
        assert!(text.contains("Total ticks: 0"));
        assert!(text.contains("gps/position: 3"));
        assert!(text.contains("Tick duration (us): N/A"));
    }

    #[test]
    fn test_reset() {
        let mut aggregator = TickMetricsAggregator::new();
        aggregator.update(&TickSample::default());
        aggregator.reset();
        assert_eq!(aggregator.total_ticks, 0);
    }
}
