//! Stability (rate) processor: attitude error to body angular rate

use contracts::{Frame, GraphError, StreamPath, StreamType};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_engine::{
    parse_config, parse_descriptor, to_value, InputInfo, InputSlot, Node, OutputInfo,
    OutputStream, SampleAccumulator, StreamRegistry,
};
use validator::Validate;

use crate::descriptor::RateDescriptor;

const TYPE_NAME: &str = "stability_processor";
const INPUT_NAMES: [&str; 2] = ["frame", "target"];

type Inputs = (InputSlot<Frame>, InputSlot<Frame>);

fn inputs(rate: u32) -> SampleAccumulator<Inputs> {
    SampleAccumulator::new(
        TYPE_NAME,
        (
            InputSlot::new(StreamType::Frame, rate),
            InputSlot::new(StreamType::Frame, rate),
        ),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StabilityProcessorConfig {
    /// Proportional gain (1/s)
    #[validate(range(exclusive_min = 0.0, message = "kp must be > 0"))]
    pub kp: f64,

    /// Per-axis rate limit (rad/s)
    #[validate(range(exclusive_min = 0.0, message = "max_rate must be > 0"))]
    pub max_rate: f64,
}

impl Default for StabilityProcessorConfig {
    fn default() -> Self {
        Self {
            kp: 4.0,
            max_rate: 3.0,
        }
    }
}

impl StabilityProcessorConfig {
    /// Body-frame rate that rotates `current` toward `target`
    fn rate_command(&self, current: &Frame, target: &Frame) -> Vector3<f64> {
        let error_world = (target.rotation * current.rotation.inverse()).scaled_axis();
        let error_body = current.rotation.inverse_transform_vector(&error_world);
        (error_body * self.kp).map(|r| r.clamp(-self.max_rate, self.max_rate))
    }
}

/// Proportional attitude controller
pub struct StabilityProcessor {
    descriptor: RateDescriptor,
    config: StabilityProcessorConfig,
    inputs: SampleAccumulator<Inputs>,
    output: OutputStream<Vector3<f64>>,
}

impl StabilityProcessor {
    pub fn new() -> Self {
        Self {
            descriptor: RateDescriptor::default(),
            config: StabilityProcessorConfig::default(),
            inputs: inputs(0),
            output: OutputStream::new(StreamType::AngularVelocity, 0),
        }
    }
}

impl Default for StabilityProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for StabilityProcessor {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        let descriptor: RateDescriptor = parse_descriptor(TYPE_NAME, descriptor)?;
        self.inputs = inputs(descriptor.rate);
        self.output = OutputStream::new(StreamType::AngularVelocity, descriptor.rate);
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
        self.inputs.input_infos(&INPUT_NAMES)
    }

    fn get_outputs(&self) -> Vec<OutputInfo> {
        vec![OutputInfo::new("angular_velocity", self.output.erase())]
    }

    fn process(&mut self) -> Result<(), GraphError> {
        self.output.clear();
        let config = &self.config;
        let output = &self.output;
        self.inputs.process(|_, (current, target)| {
            let rate = config.rate_command(&current.value, &target.value);
            output.push_sample(rate, current.is_healthy && target.is_healthy);
        });
        Ok(())
    }
}
