//! GraphBlueprint - Config Loader output
//!
//! Describes the complete flight graph: tick rate, nodes, and the wiring between them.
//! Node descriptors and configs stay opaque here; each node type parses its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete graph blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Graph-wide settings
    pub graph: GraphSettings,

    /// Node definitions, in declaration order
    #[serde(default)]
    pub nodes: Vec<NodeBlueprint>,
}

/// Graph-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Human readable graph name
    pub name: String,

    /// Control tick rate (Hz), must be > 0
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,
}

fn default_tick_rate() -> u32 {
    100
}

/// One node of the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBlueprint {
    /// Unique node name, first component of its output paths
    pub name: String,

    /// Node implementation to instantiate
    pub node_type: NodeType,

    /// Input paths (`node/output`) by input index; empty string leaves an input unwired
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Static declaration handed to `init`
    #[serde(default = "empty_object")]
    pub descriptor: Value,

    /// Optional runtime configuration handed to `set_config` after `init`
    #[serde(default)]
    pub config: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Node implementations known to the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Publishes samples handed over by a hardware driver
    Source,
    /// ECEF position/velocity estimator
    PositionEstimator,
    /// Removes gravity from body acceleration
    GravityFilter,
    /// Attitude error to angular rate
    StabilityProcessor,
    /// Gimbal attitude to servo PWM
    ServoGimbal,
    /// Aggregates distance sensors
    Proximity,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::PositionEstimator => "position_estimator",
            Self::GravityFilter => "gravity_filter",
            Self::StabilityProcessor => "stability_processor",
            Self::ServoGimbal => "servo_gimbal",
            Self::Proximity => "proximity",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GraphBlueprint {
    /// Tick period derived from the configured rate
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.graph.tick_rate_hz.max(1) as f64)
    }

    /// Look up a node by name
    pub fn node(&self, name: &str) -> Option<&NodeBlueprint> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Nodes of the given type
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &NodeBlueprint> {
        self.nodes
            .iter()
            .filter(move |node| node.node_type == node_type)
    }
}

impl NodeBlueprint {
    /// Wired inputs as `(index, path)`, skipping empty entries
    pub fn wired_inputs(&self) -> impl Iterator<Item = (usize, &str)> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(idx, path)| (idx, path.trim()))
            .filter(|(_, path)| !path.is_empty())
    }
}
