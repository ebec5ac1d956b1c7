//! Graph lifecycle manager.
//!
//! Owns the nodes, the stream registry and the execution order. Every wiring change
//! (node added or removed, input path set) recomputes the order and triggers a rewire so
//! deferred paths are retried.

use std::fmt;
use std::time::{Duration, Instant};

use contracts::{GraphError, StreamPath, StreamType, StreamValue};
use observability::TickSample;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::lifecycle::{NodeHost, NodeState, PathResolution};
use crate::node::{InputInfo, Node};
use crate::registry::StreamRegistry;
use crate::stream::StreamReader;
use crate::topology::execution_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    Building,
    Running,
    Stopped,
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Tick sequence number, starting at 1
    pub tick: u64,
    pub nodes_processed: usize,
    /// Nodes whose `process` returned a non-fatal error; their outputs hold
    pub nodes_failed: usize,
    pub unresolved_inputs: usize,
    pub duration: Duration,
}

impl TickReport {
    pub fn as_sample(&self) -> TickSample {
        TickSample {
            tick: self.tick,
            duration_us: self.duration.as_secs_f64() * 1e6,
            nodes_processed: self.nodes_processed,
            unresolved_inputs: self.unresolved_inputs,
        }
    }
}

/// Published output as seen from the graph
#[derive(Debug, Clone, Serialize)]
pub struct OutputDescription {
    pub name: String,
    pub path: StreamPath,
    pub stream_type: StreamType,
    pub rate: u32,
}

/// Introspection snapshot of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub node_type: &'static str,
    pub state: NodeState,
    pub descriptor: Value,
    pub config: Value,
    pub inputs: Vec<InputInfo>,
    pub outputs: Vec<OutputDescription>,
    pub processed: u64,
}

/// Dataflow graph driven one tick at a time
pub struct Graph {
    name: String,
    registry: StreamRegistry,
    hosts: Vec<NodeHost>,
    order: Vec<usize>,
    state: GraphState,
    started_at: Duration,
    tick_period: Option<Duration>,
    tick_count: u64,
    unresolved: usize,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: StreamRegistry::new(),
            hosts: Vec::new(),
            order: Vec::new(),
            state: GraphState::Building,
            started_at: Duration::ZERO,
            tick_period: None,
            tick_count: 0,
            unresolved: 0,
        }
    }

    /// Nominal tick rate, used to start nodes added while running at the current instant
    pub fn with_tick_rate(mut self, tick_rate_hz: u32) -> Self {
        if tick_rate_hz > 0 {
            self.tick_period = Some(Duration::from_nanos(
                1_000_000_000 / u64::from(tick_rate_hz),
            ));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_running(&self) -> bool {
        self.state == GraphState::Running
    }

    /// Wired inputs without a stream, as of the last wiring change
    pub fn unresolved_inputs(&self) -> usize {
        self.unresolved
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(NodeHost::name)
    }

    /// Node names in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.hosts[i].name()).collect()
    }

    fn current_time(&self) -> Duration {
        let elapsed = self
            .tick_period
            .map(|period| ticks_elapsed(period, self.tick_count))
            .unwrap_or_default();
        self.started_at.saturating_add(elapsed)
    }

    fn violation(&self, operation: &'static str) -> GraphError {
        GraphError::fatal_sequence(&self.name, operation, self.state)
    }

    fn ensure_not_stopped(&self, operation: &'static str) -> Result<(), GraphError> {
        if self.state == GraphState::Stopped {
            return Err(self.violation(operation));
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize, GraphError> {
        self.hosts
            .iter()
            .position(|h| h.name() == name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Producer node per input index, for every node
    fn wiring(&self) -> Vec<(String, Vec<Option<String>>)> {
        self.hosts
            .iter()
            .map(|host| {
                let producers = host
                    .get_inputs()
                    .into_iter()
                    .map(|input| input.path.map(|p| p.node().to_string()))
                    .collect();
                (host.name().to_string(), producers)
            })
            .collect()
    }

    fn order_for(wiring: &[(String, Vec<Option<String>>)]) -> Result<Vec<usize>, GraphError> {
        let nodes: Vec<(&str, Vec<&str>)> = wiring
            .iter()
            .map(|(name, producers)| {
                (
                    name.as_str(),
                    producers.iter().flatten().map(String::as_str).collect(),
                )
            })
            .collect();
        execution_order(&nodes)
    }

    fn reorder(&mut self) -> Result<(), GraphError> {
        self.order = Self::order_for(&self.wiring())?;
        Ok(())
    }

    /// Retry every recorded input path; returns the unresolved count
    #[instrument(name = "graph_rewire", skip(self), fields(graph = %self.name))]
    pub fn rewire(&mut self) -> usize {
        let mut unresolved = 0;
        for host in &mut self.hosts {
            unresolved += host.rewire(&self.registry);
        }
        self.unresolved = unresolved;
        unresolved
    }

    /// Construct-time entry: initialize `node`, publish its outputs and rewire.
    ///
    /// Nodes added while the graph runs are started at the current graph instant.
    #[instrument(name = "graph_add_node", skip(self, node, descriptor), fields(graph = %self.name))]
    pub fn add_node(
        &mut self,
        name: &str,
        node: Box<dyn Node>,
        descriptor: &Value,
    ) -> Result<(), GraphError> {
        self.ensure_not_stopped("add_node")?;
        if name.is_empty() || name.contains('/') {
            return Err(GraphError::invalid_descriptor(
                name,
                "node names must be non-empty and must not contain '/'",
            ));
        }
        if self.hosts.iter().any(|h| h.name() == name) {
            return Err(GraphError::DuplicateNode(name.to_string()));
        }

        let mut host = NodeHost::new(name, node);
        host.init(descriptor)?;

        let outputs = host.get_outputs();
        let mut published = Vec::with_capacity(outputs.len());
        for output in &outputs {
            published.push((StreamPath::new(name, &output.name)?, output.stream.clone()));
        }

        if self.state == GraphState::Running {
            host.start(self.current_time())?;
        }

        for (path, stream) in published {
            if self.registry.register(path.clone(), stream).is_some() {
                warn!(path = %path, "Replaced an existing stream");
            }
        }
        info!(
            node = name,
            node_type = host.type_name(),
            outputs = outputs.len(),
            "Node added"
        );
        self.hosts.push(host);

        if let Err(err) = self.reorder() {
            self.hosts.pop();
            self.registry.unregister_node(name);
            return Err(err);
        }
        self.rewire();
        Ok(())
    }

    /// Wire `node`'s input `index` to `path`.
    ///
    /// A path whose producer does not exist yet is recorded and reported as
    /// [`PathResolution::Deferred`]; a wiring cycle is rejected before anything changes.
    #[instrument(name = "graph_set_input", skip(self), fields(graph = %self.name))]
    pub fn set_input_stream_path(
        &mut self,
        node: &str,
        index: usize,
        path: &str,
    ) -> Result<PathResolution, GraphError> {
        self.ensure_not_stopped("set_input_stream_path")?;
        let path = StreamPath::parse(path)?;
        let idx = self.position(node)?;

        let mut wiring = self.wiring();
        if let Some(slot) = wiring[idx].1.get_mut(index) {
            *slot = Some(path.node().to_string());
        }
        Self::order_for(&wiring)?;

        let resolution = self.hosts[idx].set_input_stream_path(index, &path, &self.registry)?;
        self.reorder()?;
        self.rewire();

        info!(node, index, path = %path, ?resolution, "Input wired");
        Ok(resolution)
    }

    /// Swap a node's runtime config; no rewiring happens
    pub fn set_config(&mut self, node: &str, config: &Value) -> Result<(), GraphError> {
        self.ensure_not_stopped("set_config")?;
        let idx = self.position(node)?;
        self.hosts[idx].set_config(config)
    }

    /// Stop and drop a node; its consumers fall back to held samples
    #[instrument(name = "graph_remove_node", skip(self), fields(graph = %self.name))]
    pub fn remove_node(&mut self, name: &str) -> Result<(), GraphError> {
        self.ensure_not_stopped("remove_node")?;
        let idx = self.position(name)?;
        let mut host = self.hosts.remove(idx);
        host.stop();
        let removed = self.registry.unregister_node(name);
        self.reorder()?;
        let unresolved = self.rewire();
        info!(node = name, streams = removed, unresolved, "Node removed");
        Ok(())
    }

    /// Start every node in execution order at `time_point`
    #[instrument(name = "graph_start", skip(self), fields(graph = %self.name))]
    pub fn start(&mut self, time_point: Duration) -> Result<(), GraphError> {
        if self.state != GraphState::Building {
            return Err(self.violation("start"));
        }
        for &i in &self.order {
            self.hosts[i].start(time_point)?;
        }
        self.started_at = time_point;
        self.state = GraphState::Running;
        info!(
            nodes = self.hosts.len(),
            unresolved = self.unresolved,
            order = ?self.execution_order(),
            "Graph started"
        );
        Ok(())
    }

    /// Run every node's `process` once, in dependency order.
    ///
    /// A lifecycle violation aborts the tick and is returned. Any other node failure is
    /// logged and the node's outputs keep their last samples.
    #[instrument(
        level = "trace",
        name = "graph_tick",
        skip(self),
        fields(graph = %self.name, tick = self.tick_count + 1)
    )]
    pub fn tick(&mut self) -> Result<TickReport, GraphError> {
        if self.state != GraphState::Running {
            return Err(self.violation("tick"));
        }

        let started = Instant::now();
        let mut nodes_processed = 0;
        let mut nodes_failed = 0;
        for &i in &self.order {
            let host = &mut self.hosts[i];
            match host.process() {
                Ok(()) => {
                    nodes_processed += 1;
                    observability::record_node_processed(host.name());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    nodes_failed += 1;
                    error!(node = host.name(), error = %err, "Node process failed, holding outputs");
                }
            }
        }

        self.tick_count += 1;
        let report = TickReport {
            tick: self.tick_count,
            nodes_processed,
            nodes_failed,
            unresolved_inputs: self.unresolved,
            duration: started.elapsed(),
        };
        observability::record_tick_metrics(&report.as_sample());
        Ok(report)
    }

    /// Stop every node; the graph cannot be reused afterwards
    pub fn stop(&mut self) {
        if self.state == GraphState::Stopped {
            return;
        }
        for host in &mut self.hosts {
            host.stop();
        }
        self.state = GraphState::Stopped;
        info!(graph = %self.name, ticks = self.tick_count, "Graph stopped");
    }

    pub fn node_info(&self, name: &str) -> Option<NodeInfo> {
        let host = self.hosts.iter().find(|h| h.name() == name)?;
        let outputs = host
            .get_outputs()
            .into_iter()
            .filter_map(|output| {
                let path = StreamPath::new(name, &output.name).ok()?;
                Some(OutputDescription {
                    name: output.name,
                    path,
                    stream_type: output.stream_type,
                    rate: output.rate,
                })
            })
            .collect();

        Some(NodeInfo {
            name: name.to_string(),
            node_type: host.type_name(),
            state: host.state(),
            descriptor: host.get_descriptor(),
            config: host.get_config(),
            inputs: host.get_inputs(),
            outputs,
            processed: host.process_count(),
        })
    }

    /// Typed read handle on a published stream
    pub fn reader<T: StreamValue>(
        &self,
        path: &str,
        stream_type: StreamType,
    ) -> Result<StreamReader<T>, GraphError> {
        self.registry
            .resolve(&StreamPath::parse(path)?, stream_type)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("nodes", &self.hosts.len())
            .field("ticks", &self.tick_count)
            .field("unresolved", &self.unresolved)
            .finish()
    }
}

/// Offset of tick `ticks` from the start instant, without truncating the tick count
fn ticks_elapsed(period: Duration, ticks: u64) -> Duration {
    let nanos = period.as_nanos().saturating_mul(u128::from(ticks));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
