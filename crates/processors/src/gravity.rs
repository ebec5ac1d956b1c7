//! Gravity filter: body acceleration to world linear acceleration

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

/// Standard gravity (m/s²)
pub const STANDARD_GRAVITY: f64 = 9.80665;

const TYPE_NAME: &str = "gravity_filter";
const INPUT_NAMES: [&str; 2] = ["frame", "acceleration"];

type Inputs = (InputSlot<Frame>, InputSlot<Vector3<f64>>);

fn inputs(rate: u32) -> SampleAccumulator<Inputs> {
    SampleAccumulator::new(
        TYPE_NAME,
        (
            InputSlot::new(StreamType::Frame, rate),
            InputSlot::new(StreamType::Acceleration, rate),
        ),
    )
}

fn default_gravity() -> f64 {
    STANDARD_GRAVITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GravityFilterConfig {
    /// Local gravity magnitude (m/s²)
    #[serde(default = "default_gravity")]
    #[validate(range(min = 9.7, max = 9.9, message = "gravity must be within 9.7..=9.9"))]
    pub gravity: f64,
}

impl Default for GravityFilterConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
        }
    }
}

/// Rotates body acceleration into ENU and removes gravity
pub struct GravityFilter {
    descriptor: RateDescriptor,
    config: GravityFilterConfig,
    inputs: SampleAccumulator<Inputs>,
    output: OutputStream<Vector3<f64>>,
}

impl GravityFilter {
    pub fn new() -> Self {
        Self {
            descriptor: RateDescriptor::default(),
            config: GravityFilterConfig::default(),
            inputs: inputs(0),
            output: OutputStream::new(StreamType::LinearAcceleration, 0),
        }
    }
}

impl Default for GravityFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for GravityFilter {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        let descriptor: RateDescriptor = parse_descriptor(TYPE_NAME, descriptor)?;
        self.inputs = inputs(descriptor.rate);
        self.output = OutputStream::new(StreamType::LinearAcceleration, descriptor.rate);
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
        vec![OutputInfo::new("linear_acceleration", self.output.erase())]
    }

    fn process(&mut self) -> Result<(), GraphError> {
        self.output.clear();
        let gravity = Vector3::new(0.0, 0.0, self.config.gravity);
        let output = &self.output;
        self.inputs.process(|_, (frame, acceleration)| {
            let world = frame.value.rotation * acceleration.value - gravity;
            output.push_sample(world, frame.is_healthy && acceleration.is_healthy);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::f64::consts::FRAC_PI_2;
    use std::time::Duration;

    fn wired(rate: u32) -> (GravityFilter, OutputStream<Frame>, OutputStream<Vector3<f64>>) {
        let registry = StreamRegistry::new();
        let frame = OutputStream::new(StreamType::Frame, rate);
        let accel = OutputStream::new(StreamType::Acceleration, rate * 4);
        registry.register(StreamPath::parse("ahrs/frame").unwrap(), frame.erase());
        registry.register(StreamPath::parse("imu/acceleration").unwrap(), accel.erase());

        let mut node = GravityFilter::new();
        node.init(&json!({ "rate": rate })).unwrap();
        node.set_input_stream_path(0, &StreamPath::parse("ahrs/frame").unwrap(), &registry)
            .unwrap();
        node.set_input_stream_path(1, &StreamPath::parse("imu/acceleration").unwrap(), &registry)
            .unwrap();
        node.start(Duration::ZERO).unwrap();
        (node, frame, accel)
    }

    #[test]
    fn test_level_hover_is_zero() {
        let (mut node, frame, accel) = wired(50);
        frame.push_sample(Frame::default(), true);
        accel.push_sample(Vector3::new(0.0, 0.0, STANDARD_GRAVITY), true);
        node.process().unwrap();

        let out = node.output.get_last_sample();
        assert!(out.value.norm() < 1e-12);
        assert!(out.is_healthy);
    }

    #[test]
    fn test_rotated_body_acceleration() {
        let (mut node, frame, accel) = wired(50);
        // pitched 90°: body x points down
        frame.push_sample(Frame::from_euler_angles(0.0, FRAC_PI_2, 0.0), true);
        accel.push_sample(Vector3::new(-STANDARD_GRAVITY, 0.0, 0.0), true);
        node.process().unwrap();

        let out = node.output.get_last_sample();
        assert!(out.value.norm() < 1e-9, "{:?}", out.value);
    }

    #[test]
    fn test_uses_latest_fast_sample() {
        let (mut node, frame, accel) = wired(50);
        for i in 1..=4 {
            accel.push_sample(Vector3::new(i as f64, 0.0, STANDARD_GRAVITY), true);
        }
        frame.push_sample(Frame::default(), true);
        node.process().unwrap();

        let samples = node.output.get_samples();
        assert_eq!(samples.len(), 1);
        assert!((samples[0].value.x - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_unhealthy_propagates() {
        let (mut node, frame, accel) = wired(50);
        frame.push_sample(Frame::default(), true);
        accel.push_sample(Vector3::new(0.0, 0.0, STANDARD_GRAVITY), false);
        node.process().unwrap();
        assert!(!node.output.get_last_sample().is_healthy);
    }

    #[test]
    fn test_config_range() {
        let mut node = GravityFilter::new();
        node.init(&json!({ "rate": 50 })).unwrap();
        assert!(node.set_config(&json!({ "gravity": 9.81 })).is_ok());
        assert!(node.set_config(&json!({ "gravity": 0.0 })).is_err());
        assert_eq!(node.get_config()["gravity"], 9.81);
    }
}
