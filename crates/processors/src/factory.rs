//! Node factory

use contracts::{
    Frame, GraphError, MultirotorCommands, NodeType, ProximityReading, StreamType, ValueKind,
};
use ingestion::{DriverBridge, SourceNode};
use nalgebra::Vector3;
use serde_json::Value;
use sync_engine::Node;
use tracing::debug;

use crate::{GravityFilter, PositionEstimator, Proximity, ServoGimbal, StabilityProcessor};

/// Builds nodes by type; source nodes are attached to the shared driver bridge
#[derive(Debug, Clone, Default)]
pub struct NodeFactory {
    bridge: DriverBridge,
}

impl NodeFactory {
    pub fn new(bridge: DriverBridge) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &DriverBridge {
        &self.bridge
    }

    /// Instantiate an uninitialized node.
    ///
    /// `descriptor` is only inspected for source nodes, whose value type follows the
    /// declared `stream_type`; validation proper happens in `init`.
    pub fn create(
        &self,
        name: &str,
        node_type: NodeType,
        descriptor: &Value,
    ) -> Result<Box<dyn Node>, GraphError> {
        debug!(node = name, %node_type, "Creating node");
        let node: Box<dyn Node> = match node_type {
            NodeType::Source => self.create_source(name, descriptor)?,
            NodeType::PositionEstimator => Box::new(PositionEstimator::new()),
            NodeType::GravityFilter => Box::new(GravityFilter::new()),
            NodeType::StabilityProcessor => Box::new(StabilityProcessor::new()),
            NodeType::ServoGimbal => Box::new(ServoGimbal::new()),
            NodeType::Proximity => Box::new(Proximity::new()),
        };
        Ok(node)
    }

    fn create_source(&self, name: &str, descriptor: &Value) -> Result<Box<dyn Node>, GraphError> {
        let stream_type: StreamType = descriptor
            .get("stream_type")
            .cloned()
            .ok_or_else(|| GraphError::invalid_descriptor(name, "missing field `stream_type`"))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| GraphError::invalid_descriptor(name, e.to_string()))
            })?;

        let bridge = self.bridge.clone();
        let node: Box<dyn Node> = match stream_type.value_kind() {
            ValueKind::Vector => Box::new(SourceNode::<Vector3<f64>>::new(name, bridge)),
            ValueKind::Scalar => Box::new(SourceNode::<f64>::new(name, bridge)),
            ValueKind::Frame => Box::new(SourceNode::<Frame>::new(name, bridge)),
            ValueKind::Proximity => Box::new(SourceNode::<ProximityReading>::new(name, bridge)),
            ValueKind::Commands => Box::new(SourceNode::<MultirotorCommands>::new(name, bridge)),
        };
        Ok(node)
    }
}
