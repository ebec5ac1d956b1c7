//! Run statistics.

use std::time::Duration;

use ingestion::MetricsSnapshot;
use observability::TickMetricsAggregator;

/// Statistics from a graph run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Ticks completed
    pub ticks: u64,

    /// Node `process` calls that failed without aborting the tick
    pub nodes_failed: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Source streams fed by a driver
    pub active_sources: usize,

    /// `process` calls per node, in execution order
    pub processed: Vec<(String, u64)>,

    /// Driver boundary counters
    pub ingestion: MetricsSnapshot,

    /// Tick metrics aggregator
    pub tick_metrics: TickMetricsAggregator,
}

impl PipelineStats {
    /// Achieved ticks per second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Flight Graph Run ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Ticks: {} ({:.2}/s)", self.ticks, self.tick_rate());
        println!("   Failed node calls: {}", self.nodes_failed);
        println!("   Active sources: {}", self.active_sources);

        println!("\nDriver boundary");
        println!("   Received: {}", self.ingestion.samples_received);
        println!("   Dropped: {}", self.ingestion.samples_dropped);
        println!("   Rejected: {}", self.ingestion.rejected);

        if !self.processed.is_empty() {
            println!("\nNodes (execution order)");
            for (name, count) in &self.processed {
                println!("   {name}: {count} process calls");
            }
        }

        println!("\n{}", self.tick_metrics.summary());
    }
}
