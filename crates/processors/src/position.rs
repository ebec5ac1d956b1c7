//! ECEF position estimator
//!
//! Complementary filter between GNSS fixes and world linear acceleration. A healthy fix
//! close to the last accepted one is blended in exponentially and the acceleration, rotated
//! from ENU into ECEF, is double-integrated over the tick. A fix farther than
//! `reset_distance` snaps the estimate and zeroes the velocity. Unhealthy fixes hold the
//! estimate untouched.

use contracts::{GraphError, StreamPath, StreamType};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_engine::{
    parse_config, parse_descriptor, to_value, AlignedSample, InputInfo, InputSlot, Node,
    OutputInfo, OutputStream, SampleAccumulator, StreamRegistry,
};
use tracing::debug;
use validator::Validate;

use crate::coordinates::{ecef_to_lla, enu_to_ecef_rotation};
use crate::descriptor::RateDescriptor;

const TYPE_NAME: &str = "position_estimator";
const INPUT_NAMES: [&str; 4] = ["position", "velocity", "linear_acceleration", "pressure"];

type Inputs = (
    InputSlot<Vector3<f64>>,
    InputSlot<Vector3<f64>>,
    InputSlot<Vector3<f64>>,
    InputSlot<f64>,
);

fn inputs(rate: u32) -> SampleAccumulator<Inputs> {
    SampleAccumulator::new(
        TYPE_NAME,
        (
            InputSlot::new(StreamType::EcefPosition, rate),
            InputSlot::new(StreamType::EcefVelocity, rate),
            InputSlot::new(StreamType::LinearAcceleration, rate),
            InputSlot::new(StreamType::Pressure, rate),
        ),
    )
}

fn default_reset_distance() -> f64 {
    10.0
}

fn default_blend_gain() -> f64 {
    3.0
}

/// Runtime tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PositionEstimatorConfig {
    /// Fix jump (m) beyond which the estimate snaps instead of blending
    #[serde(default = "default_reset_distance")]
    #[validate(range(exclusive_min = 0.0, message = "reset_distance must be > 0"))]
    pub reset_distance: f64,

    /// Blend factor per second; the per-tick factor is `blend_gain * dt`
    #[serde(default = "default_blend_gain")]
    #[validate(range(exclusive_min = 0.0, message = "blend_gain must be > 0"))]
    pub blend_gain: f64,
}

impl Default for PositionEstimatorConfig {
    fn default() -> Self {
        Self {
            reset_distance: default_reset_distance(),
            blend_gain: default_blend_gain(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Estimate {
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    last_fix: Vector3<f64>,
}

impl Estimate {
    /// Fuse one healthy fix; returns whether the estimate was snapped
    fn fuse(
        &mut self,
        config: &PositionEstimatorConfig,
        fix: &Vector3<f64>,
        gnss_velocity: &AlignedSample<Vector3<f64>>,
        linear_acceleration: &AlignedSample<Vector3<f64>>,
        dts: f64,
    ) -> bool {
        let reset_sq = config.reset_distance * config.reset_distance;
        if (fix - self.last_fix).norm_squared() > reset_sq {
            self.position = *fix;
            self.last_fix = *fix;
            self.velocity = Vector3::zeros();
            return true;
        }

        let ecef_acceleration = if linear_acceleration.is_healthy {
            enu_to_ecef_rotation(&ecef_to_lla(&self.position)) * linear_acceleration.value
        } else {
            Vector3::zeros()
        };
        let alpha = (config.blend_gain * dts).clamp(0.0, 1.0);

        self.position =
            self.position.lerp(fix, alpha) + ecef_acceleration * (0.5 * dts * dts);
        if gnss_velocity.is_healthy {
            self.velocity = self.velocity.lerp(&gnss_velocity.value, alpha);
        }
        self.velocity += ecef_acceleration * dts;
        self.last_fix = *fix;
        false
    }
}

/// Position/velocity estimator in ECEF
pub struct PositionEstimator {
    descriptor: RateDescriptor,
    config: PositionEstimatorConfig,
    inputs: SampleAccumulator<Inputs>,
    position: OutputStream<Vector3<f64>>,
    velocity: OutputStream<Vector3<f64>>,
    estimate: Estimate,
}

impl PositionEstimator {
    pub fn new() -> Self {
        Self {
            descriptor: RateDescriptor::default(),
            config: PositionEstimatorConfig::default(),
            inputs: inputs(0),
            position: OutputStream::new(StreamType::EcefPosition, 0),
            velocity: OutputStream::new(StreamType::EcefVelocity, 0),
            estimate: Estimate::default(),
        }
    }
}

impl Default for PositionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for PositionEstimator {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        let descriptor: RateDescriptor = parse_descriptor(TYPE_NAME, descriptor)?;
        self.inputs = inputs(descriptor.rate);
        self.position = OutputStream::new(StreamType::EcefPosition, descriptor.rate);
        self.velocity = OutputStream::new(StreamType::EcefVelocity, descriptor.rate);
        self.estimate = Estimate::default();
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
        vec![
            OutputInfo::new("position", self.position.erase()),
            OutputInfo::new("velocity", self.velocity.erase()),
        ]
    }

    fn process(&mut self) -> Result<(), GraphError> {
        self.position.clear();
        self.velocity.clear();

        let dts = self.position.dt().as_secs_f64();
        let config = &self.config;
        let estimate = &mut self.estimate;
        let position = &self.position;
        let velocity = &self.velocity;

        self.inputs.process(|_, (fix, gnss_velocity, linear_acceleration, _pressure)| {
            if fix.is_healthy
                && estimate.fuse(config, &fix.value, gnss_velocity, linear_acceleration, dts)
            {
                debug!(fix = ?fix.value, "Position fix jumped, estimate reset");
            }
            position.push_sample(estimate.position, fix.is_healthy);
            velocity.push_sample(estimate.velocity, fix.is_healthy);
        });
        Ok(())
    }
}
