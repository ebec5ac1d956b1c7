//! Graph orchestrator - builds the graph, attaches drivers and runs the tick loop.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{GraphBlueprint, NodeType};
use ingestion::{DriverBridge, MockDriver, MockDriverConfig};
use processors::NodeFactory;
use sync_engine::{Graph, PathResolution};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Noise amplitude of simulated sensors
const SIMULATED_NOISE: f64 = 0.01;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: GraphBlueprint,

    /// Attach a mock driver to every source stream
    pub simulate: bool,

    /// Base seed for mock drivers; each stream gets its own offset
    pub seed: u64,

    /// Stop after this many ticks (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Instantiate, configure and wire every node of `blueprint`.
///
/// Nodes are added in declaration order and wired afterwards, so inputs may name
/// producers declared later in the file.
pub fn build_graph(blueprint: &GraphBlueprint, factory: &NodeFactory) -> Result<Graph> {
    let mut graph = Graph::new(blueprint.graph.name.as_str())
        .with_tick_rate(blueprint.graph.tick_rate_hz);

    for node in &blueprint.nodes {
        let instance = factory
            .create(&node.name, node.node_type, &node.descriptor)
            .with_context(|| format!("Failed to create node '{}'", node.name))?;
        graph
            .add_node(&node.name, instance, &node.descriptor)
            .with_context(|| format!("Failed to add node '{}'", node.name))?;

        if let Some(config) = &node.config {
            graph
                .set_config(&node.name, config)
                .with_context(|| format!("Failed to configure node '{}'", node.name))?;
        }
    }

    for node in &blueprint.nodes {
        for (index, path) in node.wired_inputs() {
            let resolution = graph
                .set_input_stream_path(&node.name, index, path)
                .with_context(|| format!("Failed to wire {}[{index}] to '{path}'", node.name))?;
            if resolution == PathResolution::Deferred {
                warn!(node = %node.name, index, path, "Input deferred until its producer exists");
            }
        }
    }

    info!(
        graph = %blueprint.graph.name,
        nodes = graph.len(),
        unresolved = graph.unresolved_inputs(),
        order = ?graph.execution_order(),
        "Graph built"
    );
    Ok(graph)
}

/// Main graph orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until a tick/time limit is reached or `shutdown` completes
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let factory = NodeFactory::new(DriverBridge::new());
        let mut graph = build_graph(blueprint, &factory).context("Failed to build graph")?;

        let epoch = Instant::now();
        let drivers = if self.config.simulate {
            simulated_drivers(&graph, blueprint, self.config.seed)
        } else {
            warn!("No drivers attached - source nodes stay silent and their consumers unhealthy");
            Vec::new()
        };
        let handles: Vec<(String, JoinHandle<u64>)> = drivers
            .iter()
            .map(|driver| {
                (
                    driver.config().stream_id.clone(),
                    driver.start(factory.bridge().clone(), epoch),
                )
            })
            .collect();
        info!(drivers = handles.len(), "Drivers started");

        let mut stats = PipelineStats {
            active_sources: handles.len(),
            ..Default::default()
        };

        let result = self.tick_loop(&mut graph, epoch, &mut stats, shutdown).await;

        // Shutdown
        info!("Shutting down graph...");
        for driver in &drivers {
            driver.stop();
        }
        for (stream_id, handle) in handles {
            match tokio::time::timeout(Duration::from_secs(1), handle).await {
                Ok(Ok(delivered)) => stats.tick_metrics.add_delivered(&stream_id, delivered),
                Ok(Err(e)) => warn!(stream_id = %stream_id, error = %e, "Driver task failed"),
                Err(_) => warn!(stream_id = %stream_id, "Driver did not stop in time"),
            }
        }

        stats.ingestion = factory.bridge().metrics().snapshot();
        if stats.ingestion.samples_dropped > 0 {
            stats
                .tick_metrics
                .add_dropped("driver_bridge", stats.ingestion.samples_dropped);
        }
        stats.processed = graph
            .execution_order()
            .into_iter()
            .filter_map(|name| graph.node_info(name))
            .map(|info| (info.name, info.processed))
            .collect();
        graph.stop();

        result?;
        stats.duration = start_time.elapsed();
        info!(
            ticks = stats.ticks,
            duration_secs = stats.duration.as_secs_f64(),
            tick_rate = format!("{:.2}", stats.tick_rate()),
            "Graph shutdown complete"
        );
        Ok(stats)
    }

    async fn tick_loop(
        &self,
        graph: &mut Graph,
        epoch: Instant,
        stats: &mut PipelineStats,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let blueprint = &self.config.blueprint;
        graph
            .start(epoch.elapsed())
            .context("Failed to start graph")?;

        let mut interval = tokio::time::interval(blueprint.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = self
            .config
            .timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        tokio::pin!(shutdown);

        info!(
            tick_rate_hz = blueprint.graph.tick_rate_hz,
            max_ticks = ?self.config.max_ticks,
            "Graph running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping graph...");
                    break;
                }
                _ = deadline_reached(deadline) => {
                    warn!(timeout = ?self.config.timeout, "Run timed out");
                    break;
                }
                _ = interval.tick() => {
                    let report = graph.tick().context("Graph tick aborted")?;
                    stats.ticks = report.tick;
                    stats.nodes_failed += report.nodes_failed as u64;
                    stats.tick_metrics.update(&report.as_sample());

                    if report.tick % u64::from(blueprint.graph.tick_rate_hz.max(1)) == 0 {
                        debug!(
                            tick = report.tick,
                            unresolved = report.unresolved_inputs,
                            duration_us = report.duration.as_micros() as u64,
                            "Graph heartbeat"
                        );
                    }

                    if let Some(max) = self.config.max_ticks {
                        if report.tick >= max {
                            info!(ticks = report.tick, "Reached max ticks limit");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

async fn deadline_reached(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// One mock driver per source output that the bridge accepts deliveries for
fn simulated_drivers(graph: &Graph, blueprint: &GraphBlueprint, seed: u64) -> Vec<MockDriver> {
    blueprint
        .nodes_of_type(NodeType::Source)
        .filter_map(|node| graph.node_info(&node.name))
        .flat_map(|info| info.outputs)
        .enumerate()
        .map(|(idx, output)| {
            debug!(stream = %output.path, rate = output.rate, "Simulating source");
            MockDriver::new(MockDriverConfig {
                stream_id: output.path.to_string(),
                stream_type: output.stream_type,
                rate_hz: f64::from(output.rate),
                noise: SIMULATED_NOISE,
                unhealthy_every: None,
                seed: seed.wrapping_add(idx as u64),
            })
        })
        .collect()
}
