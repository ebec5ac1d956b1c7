//! Servo gimbal: vehicle attitude plus commanded gimbal attitude to three servo PWM streams.
//!
//! Commands usually arrive far slower than the attitude, so each input has its own
//! accumulator: the commands one only refreshes the held target, and every new attitude
//! sample produces one PWM triple.

use contracts::{Frame, GraphError, MultirotorCommands, Sample, StreamPath, StreamType};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_engine::{
    parse_config, parse_descriptor, to_value, InputInfo, InputSlot, Node, OutputInfo,
    OutputStream, SampleAccumulator, StreamRegistry,
};
use validator::{Validate, ValidationError};

use crate::descriptor::RateDescriptor;

const TYPE_NAME: &str = "servo_gimbal";
const INPUT_COUNT: usize = 2;

fn ordered(low: f64, high: f64) -> bool {
    low < high
}

fn validate_axis(axis: &ServoAxis) -> Result<(), ValidationError> {
    if !ordered(axis.min_angle, axis.max_angle) {
        return Err(ValidationError::new("angle_range")
            .with_message("min_angle must be < max_angle".into()));
    }
    if !ordered(axis.min_pwm, axis.max_pwm) {
        return Err(ValidationError::new("pwm_range")
            .with_message("min_pwm must be < max_pwm".into()));
    }
    Ok(())
}

/// Linear angle → PWM mapping of one servo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_axis"))]
pub struct ServoAxis {
    /// Radians
    pub min_angle: f64,
    pub max_angle: f64,
    /// Normalized duty
    pub min_pwm: f64,
    pub max_pwm: f64,
}

impl Default for ServoAxis {
    fn default() -> Self {
        Self {
            min_angle: -std::f64::consts::FRAC_PI_2,
            max_angle: std::f64::consts::FRAC_PI_2,
            min_pwm: 0.0,
            max_pwm: 1.0,
        }
    }
}

impl ServoAxis {
    fn pwm(&self, angle: f64) -> f64 {
        let angle = angle.clamp(self.min_angle, self.max_angle);
        let t = (angle - self.min_angle) / (self.max_angle - self.min_angle);
        self.min_pwm + t * (self.max_pwm - self.min_pwm)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServoGimbalConfig {
    #[serde(default)]
    #[validate(nested)]
    pub x_channel: ServoAxis,

    #[serde(default)]
    #[validate(nested)]
    pub y_channel: ServoAxis,

    #[serde(default)]
    #[validate(nested)]
    pub z_channel: ServoAxis,
}

impl ServoGimbalConfig {
    /// PWM per axis compensating `vehicle` so the gimbal holds `target` (roll/pitch/yaw)
    fn pwm(&self, vehicle: &Frame, target: &Vector3<f64>) -> [f64; 3] {
        let (roll, pitch, yaw) = vehicle.rotation.euler_angles();
        let compensation = target - Vector3::new(roll, pitch, yaw);
        [
            self.x_channel.pwm(compensation.x),
            self.y_channel.pwm(compensation.y),
            self.z_channel.pwm(compensation.z),
        ]
    }
}

/// Drives a three-axis servo gimbal
pub struct ServoGimbal {
    descriptor: RateDescriptor,
    config: ServoGimbalConfig,
    frame_input: SampleAccumulator<(InputSlot<Frame>,)>,
    commands_input: SampleAccumulator<(InputSlot<MultirotorCommands>,)>,
    commands: Sample<MultirotorCommands>,
    outputs: [OutputStream<f64>; 3],
}

fn frame_input(rate: u32) -> SampleAccumulator<(InputSlot<Frame>,)> {
    SampleAccumulator::new(TYPE_NAME, (InputSlot::new(StreamType::Frame, rate),))
}

fn commands_input(rate: u32) -> SampleAccumulator<(InputSlot<MultirotorCommands>,)> {
    SampleAccumulator::new(
        TYPE_NAME,
        (InputSlot::new(StreamType::MultirotorCommands, rate),),
    )
}

fn pwm_outputs(rate: u32) -> [OutputStream<f64>; 3] {
    [
        OutputStream::new(StreamType::Pwm, rate),
        OutputStream::new(StreamType::Pwm, rate),
        OutputStream::new(StreamType::Pwm, rate),
    ]
}

impl ServoGimbal {
    pub fn new() -> Self {
        Self {
            descriptor: RateDescriptor::default(),
            config: ServoGimbalConfig::default(),
            frame_input: frame_input(0),
            commands_input: commands_input(0),
            commands: Sample::default(),
            outputs: pwm_outputs(0),
        }
    }
}

impl Default for ServoGimbal {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for ServoGimbal {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        let descriptor: RateDescriptor = parse_descriptor(TYPE_NAME, descriptor)?;
        self.frame_input = frame_input(descriptor.rate);
        self.commands_input = commands_input(descriptor.rate);
        self.commands = Sample::default();
        self.outputs = pwm_outputs(descriptor.rate);
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
        match index {
            0 => self.frame_input.set_stream_path(0, path, registry),
            1 => self.commands_input.set_stream_path(0, path, registry),
            _ => Err(GraphError::InputIndexOutOfRange {
                node: TYPE_NAME.to_string(),
                index,
                count: INPUT_COUNT,
            }),
        }
    }

    fn rewire(&mut self, registry: &StreamRegistry) -> usize {
        self.frame_input.rewire(registry) + self.commands_input.rewire(registry)
    }

    fn get_inputs(&self) -> Vec<InputInfo> {
        let mut inputs = self.frame_input.input_infos(&["frame"]);
        inputs.extend(self.commands_input.input_infos(&["commands"]));
        inputs
    }

    fn get_outputs(&self) -> Vec<OutputInfo> {
        ["x_pwm", "y_pwm", "z_pwm"]
            .into_iter()
            .zip(&self.outputs)
            .map(|(name, stream)| OutputInfo::new(name, stream.erase()))
            .collect()
    }

    fn process(&mut self) -> Result<(), GraphError> {
        self.outputs.iter().for_each(OutputStream::clear);

        let commands = &mut self.commands;
        self.commands_input.process(|_, (latest,)| {
            *commands = latest.sample.clone();
        });

        let config = &self.config;
        let commands = &self.commands;
        let outputs = &self.outputs;
        self.frame_input.process(|_, (frame,)| {
            let healthy = frame.is_healthy && commands.is_healthy;
            let pwm = config.pwm(&frame.value, &commands.value.gimbal);
            for (output, value) in outputs.iter().zip(pwm) {
                output.push_sample(value, healthy);
            }
        });
        Ok(())
    }
}
