//! Node lifecycle state machine.
//!
//! `Constructed → Initialized → Started → Running ↔ Reconfigured → Stopped`

use std::fmt;
use std::time::Duration;

use contracts::{GraphError, StreamPath};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::node::{InputInfo, Node, OutputInfo};
use crate::registry::StreamRegistry;

/// Lifecycle state of a hosted node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Constructed,
    Initialized,
    Started,
    Running,
    /// Config replaced while running; next `process` returns to `Running`
    Reconfigured,
    Stopped,
}

impl NodeState {
    fn is_live(self) -> bool {
        matches!(self, Self::Started | Self::Running | Self::Reconfigured)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of wiring one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathResolution {
    Resolved,
    /// Producer not present yet; retried on every rewire
    Deferred,
}

/// Owns a node and enforces its lifecycle contract
pub struct NodeHost {
    name: String,
    node: Box<dyn Node>,
    state: NodeState,
    descriptor: Value,
    process_count: u64,
}

impl NodeHost {
    pub fn new(name: impl Into<String>, node: Box<dyn Node>) -> Self {
        Self {
            name: name.into(),
            node,
            state: NodeState::Constructed,
            descriptor: Value::Null,
            process_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.node.type_name()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn process_count(&self) -> u64 {
        self.process_count
    }

    fn violation(&self, operation: &'static str) -> GraphError {
        GraphError::fatal_sequence(&self.name, operation, self.state)
    }

    /// Replace the node type name in node-reported errors with the instance name
    fn attribute(&self, err: GraphError) -> GraphError {
        match err {
            GraphError::InvalidDescriptor { message, .. } => {
                GraphError::invalid_descriptor(&self.name, message)
            }
            GraphError::InvalidConfig { message, .. } => {
                GraphError::invalid_config(&self.name, message)
            }
            GraphError::InputIndexOutOfRange { index, count, .. } => {
                GraphError::InputIndexOutOfRange {
                    node: self.name.clone(),
                    index,
                    count,
                }
            }
            other => other,
        }
    }

    /// Accepted before `start` only
    pub fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        if !matches!(self.state, NodeState::Constructed | NodeState::Initialized) {
            return Err(self.violation("init"));
        }
        self.node
            .init(descriptor)
            .map_err(|e| self.attribute(e))?;
        self.descriptor = descriptor.clone();
        self.state = NodeState::Initialized;
        debug!(node = %self.name, node_type = self.type_name(), "Node initialized");
        Ok(())
    }

    pub fn set_config(&mut self, config: &Value) -> Result<(), GraphError> {
        match self.state {
            NodeState::Constructed | NodeState::Stopped => return Err(self.violation("set_config")),
            _ => {}
        }
        self.node
            .set_config(config)
            .map_err(|e| self.attribute(e))?;
        if self.state == NodeState::Running {
            self.state = NodeState::Reconfigured;
        }
        info!(node = %self.name, "Node reconfigured");
        Ok(())
    }

    pub fn start(&mut self, time_point: Duration) -> Result<(), GraphError> {
        if self.state != NodeState::Initialized {
            return Err(self.violation("start"));
        }
        self.node.start(time_point)?;
        self.state = NodeState::Started;
        debug!(node = %self.name, ?time_point, "Node started");
        Ok(())
    }

    pub fn process(&mut self) -> Result<(), GraphError> {
        if !self.state.is_live() {
            return Err(self.violation("process"));
        }
        self.node.process()?;
        self.state = NodeState::Running;
        self.process_count += 1;
        Ok(())
    }

    /// Idempotent; every other operation fails afterwards
    pub fn stop(&mut self) {
        if self.state != NodeState::Stopped {
            debug!(node = %self.name, processed = self.process_count, "Node stopped");
            self.state = NodeState::Stopped;
        }
    }

    pub fn set_input_stream_path(
        &mut self,
        index: usize,
        path: &StreamPath,
        registry: &StreamRegistry,
    ) -> Result<PathResolution, GraphError> {
        if matches!(self.state, NodeState::Constructed | NodeState::Stopped) {
            return Err(self.violation("set_input_stream_path"));
        }
        match self.node.set_input_stream_path(index, path, registry) {
            Ok(()) => Ok(PathResolution::Resolved),
            Err(err) if err.is_deferrable() => Ok(PathResolution::Deferred),
            Err(err) => Err(self.attribute(err)),
        }
    }

    /// Re-resolve inputs; returns the unresolved count
    pub fn rewire(&mut self, registry: &StreamRegistry) -> usize {
        if self.state == NodeState::Stopped {
            return 0;
        }
        let unresolved = self.node.rewire(registry);
        if unresolved > 0 && self.state.is_live() {
            warn!(node = %self.name, unresolved, "Node running with unresolved inputs");
        }
        unresolved
    }

    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    pub fn get_descriptor(&self) -> Value {
        self.node.get_descriptor()
    }

    pub fn get_config(&self) -> Value {
        self.node.get_config()
    }

    pub fn get_inputs(&self) -> Vec<InputInfo> {
        self.node.get_inputs()
    }

    pub fn get_outputs(&self) -> Vec<OutputInfo> {
        self.node.get_outputs()
    }
}

impl fmt::Debug for NodeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHost")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("state", &self.state)
            .field("processed", &self.process_count)
            .finish()
    }
}
