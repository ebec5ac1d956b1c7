//! Proximity aggregator: N distance sensors into one obstacle reading per tick

use contracts::{GraphError, ProximityReading, StreamPath, StreamType};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_engine::{
    parse_config, parse_descriptor, to_value, InputInfo, InputSlot, Node, OutputInfo,
    OutputStream, SampleAccumulator, StreamRegistry,
};
use validator::Validate;

const TYPE_NAME: &str = "proximity";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProximityDescriptor {
    #[validate(range(min = 1, message = "rate must be > 0"))]
    pub rate: u32,

    /// Number of distance inputs
    #[validate(range(min = 1, max = 16, message = "input_count must be within 1..=16"))]
    pub input_count: usize,
}

fn default_max_distance() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProximityConfig {
    /// Readings farther than this (m) are discarded as out of range
    #[serde(default = "default_max_distance")]
    #[validate(range(exclusive_min = 0.0, message = "max_distance must be > 0"))]
    pub max_distance: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
        }
    }
}

fn inputs(descriptor: &ProximityDescriptor) -> SampleAccumulator<Vec<InputSlot<Vector3<f64>>>> {
    SampleAccumulator::new(
        TYPE_NAME,
        (0..descriptor.input_count)
            .map(|_| InputSlot::new(StreamType::Distance, descriptor.rate))
            .collect(),
    )
}

/// Combines the latest distance vector of every sensor, held between sensor updates
pub struct Proximity {
    descriptor: ProximityDescriptor,
    config: ProximityConfig,
    inputs: SampleAccumulator<Vec<InputSlot<Vector3<f64>>>>,
    input_names: Vec<String>,
    output: OutputStream<ProximityReading>,
}

impl Proximity {
    pub fn new() -> Self {
        let descriptor = ProximityDescriptor::default();
        Self {
            inputs: inputs(&descriptor),
            descriptor,
            config: ProximityConfig::default(),
            input_names: Vec::new(),
            output: OutputStream::new(StreamType::Proximity, 0),
        }
    }
}

impl Default for Proximity {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Proximity {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        let descriptor: ProximityDescriptor = parse_descriptor(TYPE_NAME, descriptor)?;
        self.inputs = inputs(&descriptor);
        self.input_names = (0..descriptor.input_count)
            .map(|i| format!("distance_{i}"))
            .collect();
        self.output = OutputStream::new(StreamType::Proximity, descriptor.rate);
        self.descriptor = descriptor;
        Ok(())
    }

    fn get_descriptor(&self) -> Value {
        to_value(&self.descriptor)
    }

    fn set_config(&mut self, config: &Value) -> Result<(), GraphError> {
        self.config = parse_config(TYPE_NAME, config)?;
        Ok(())
    }

    fn get_config(&self) -> Value {
        to_value(&self.config)
    }

    fn set_input_stream_path(
        &mut self,
        index: usize,
        path: &StreamPath,
        registry: &StreamRegistry,
    ) -> Result<(), GraphError> {
        self.inputs.set_stream_path(index, path, registry)
    }

    fn rewire(&mut self, registry: &StreamRegistry) -> usize {
        self.inputs.rewire(registry)
    }

    fn get_inputs(&self) -> Vec<InputInfo> {
        let names: Vec<&str> = self.input_names.iter().map(String::as_str).collect();
        self.inputs.input_infos(&names)
    }

    fn get_outputs(&self) -> Vec<OutputInfo> {
        vec![OutputInfo::new("proximity", self.output.erase())]
    }

    fn process(&mut self) -> Result<(), GraphError> {
        self.output.clear();

        // Advance every slot to its newest sample; silent sensors keep their held one
        self.inputs.process_each(|_, _| {});

        let max_sq = self.config.max_distance * self.config.max_distance;
        let mut reading = ProximityReading::default();
        let mut any_healthy = false;
        for distance in self.inputs.slots().iter().map(InputSlot::current) {
            if !distance.is_healthy {
                continue;
            }
            any_healthy = true;
            if distance.value.norm_squared() <= max_sq {
                reading.distances.push(distance.value);
            }
        }

        self.output.push_sample(reading, any_healthy);
        Ok(())
    }
}
