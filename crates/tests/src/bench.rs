//! Shared test bench: builds a graph from TOML and feeds its sources through the driver bridge

use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{GraphBlueprint, StreamType, StreamValue};
use ingestion::DriverBridge;
use processors::NodeFactory;
use sync_engine::{Graph, StreamReader};

pub const G: f64 = processors::STANDARD_GRAVITY;

/// `ahrs` frame at 50 Hz and `imu` acceleration at 200 Hz into a 50 Hz gravity filter
pub const GRAVITY_GRAPH: &str = r#"
[graph]
name = "gravity"
tick_rate_hz = 50

[[nodes]]
name = "gravity"
node_type = "gravity_filter"
inputs = ["ahrs/frame", "imu/acceleration"]
descriptor = { rate = 50 }

[[nodes]]
name = "imu"
node_type = "source"
descriptor = { stream_type = "acceleration", rate = 200 }

[[nodes]]
name = "ahrs"
node_type = "source"
descriptor = { stream_type = "frame", rate = 50 }
"#;

pub struct Bench {
    pub graph: Graph,
    pub bridge: DriverBridge,
}

impl Bench {
    pub fn from_toml(content: &str) -> Self {
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        Self::from_blueprint(&blueprint)
    }

    pub fn from_blueprint(blueprint: &GraphBlueprint) -> Self {
        let factory = NodeFactory::default();
        let mut graph = Graph::new(blueprint.graph.name.as_str())
            .with_tick_rate(blueprint.graph.tick_rate_hz);

        for node in &blueprint.nodes {
            let instance = factory
                .create(&node.name, node.node_type, &node.descriptor)
                .unwrap();
            graph.add_node(&node.name, instance, &node.descriptor).unwrap();
            if let Some(config) = &node.config {
                graph.set_config(&node.name, config).unwrap();
            }
        }
        for node in &blueprint.nodes {
            for (index, path) in node.wired_inputs() {
                graph.set_input_stream_path(&node.name, index, path).unwrap();
            }
        }

        Self {
            graph,
            bridge: factory.bridge().clone(),
        }
    }

    pub fn start(&mut self) {
        self.graph.start(Duration::ZERO).unwrap();
    }

    pub fn deliver<T: StreamValue>(&self, stream_id: &str, value: T, is_healthy: bool, time_point: Duration) {
        self.bridge
            .deliver_sample(stream_id, value, is_healthy, time_point)
            .unwrap();
    }

    pub fn reader<T: StreamValue>(&self, path: &str, stream_type: StreamType) -> StreamReader<T> {
        self.graph.reader(path, stream_type).unwrap()
    }
}

/// Instant of the `n`-th period at `rate_hz`
pub fn at(n: u64, rate_hz: u64) -> Duration {
    Duration::from_nanos(n * 1_000_000_000 / rate_hz)
}
