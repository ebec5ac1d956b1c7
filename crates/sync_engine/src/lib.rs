//! # Sync Engine
//!
//! Multi-rate stream synchronization and node execution engine.
//!
//! Responsibilities:
//! - Output stream buffers with monotonic sample indices
//! - `node/output` path resolution, retried on every rewire
//! - Sample accumulation: aligning inputs of differing rates into tuples
//! - Node lifecycle and dependency-ordered ticking
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::Graph;
//!
//! let mut graph = Graph::new("quad").with_tick_rate(100);
//! let imu = factory.create("imu", NodeType::Source, &imu_descriptor)?;
//! graph.add_node("imu", imu, &imu_descriptor)?;
//! let gravity = factory.create("gravity", NodeType::GravityFilter, &gravity_descriptor)?;
//! graph.add_node("gravity", gravity, &gravity_descriptor)?;
//! graph.set_input_stream_path("gravity", 1, "imu/acceleration")?;
//!
//! graph.start(Duration::ZERO)?;
//! loop {
//!     let report = graph.tick()?;
//! }
//! ```

mod accumulator;
mod graph;
mod lifecycle;
mod node;
mod registry;
mod stream;
mod topology;

pub use accumulator::{AlignedSample, ErasedInput, InputSlot, InputSlots, SampleAccumulator};
pub use graph::{Graph, NodeInfo, OutputDescription, TickReport};
pub use lifecycle::{NodeHost, NodeState, PathResolution};
pub use node::{parse_config, parse_descriptor, to_value, InputInfo, Node, OutputInfo};
pub use registry::StreamRegistry;
pub use stream::{AnyStream, OutputStream, StreamReader};
pub use topology::execution_order;

// Re-export contracts types
pub use contracts::{GraphError, Sample, StreamPath, StreamType, StreamValue};
