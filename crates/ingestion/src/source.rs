//! Source nodes
//!
//! A source node owns one output stream fed by a driver through the [`DriverBridge`].
//! Delivered samples keep their capture instant and health flag; the runtime config is a
//! per-stream calibration applied as `(value - bias) * scale`.

use std::time::Duration;

use async_channel::Receiver;
use contracts::{
    Frame, GraphError, MultirotorCommands, ProximityReading, StreamType, StreamValue, ValueKind,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_engine::{parse_config, parse_descriptor, to_value, Node, OutputInfo, OutputStream};
use tracing::{debug, trace};
use validator::{Validate, ValidationError};

use crate::bridge::{DriverBridge, DriverSample};
use crate::config::{BackpressureConfig, DropPolicy};

const TYPE_NAME: &str = "source";

/// Value types a source node can publish
pub trait SourceValue: StreamValue {
    /// Representation this value backs
    const KIND: ValueKind;

    /// Apply calibration; types without a meaningful bias/scale pass through
    fn calibrate(self, _calibration: &Calibration) -> Self {
        self
    }
}

impl SourceValue for Vector3<f64> {
    const KIND: ValueKind = ValueKind::Vector;

    fn calibrate(self, calibration: &Calibration) -> Self {
        let bias = Vector3::from(calibration.bias);
        let scale = Vector3::from(calibration.scale);
        (self - bias).component_mul(&scale)
    }
}

impl SourceValue for f64 {
    const KIND: ValueKind = ValueKind::Scalar;

    fn calibrate(self, calibration: &Calibration) -> Self {
        (self - calibration.bias[0]) * calibration.scale[0]
    }
}

impl SourceValue for Frame {
    const KIND: ValueKind = ValueKind::Frame;
}

impl SourceValue for ProximityReading {
    const KIND: ValueKind = ValueKind::Proximity;
}

impl SourceValue for MultirotorCommands {
    const KIND: ValueKind = ValueKind::Commands;
}

fn default_channel_capacity() -> usize {
    64
}

/// Static declaration of a source node
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceDescriptor {
    pub stream_type: StreamType,

    /// Nominal driver rate (Hz)
    #[validate(range(min = 1, message = "rate must be > 0"))]
    pub rate: u32,

    /// Output name, defaults to the stream type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1, message = "channel_capacity must be > 0"))]
    pub channel_capacity: usize,

    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl SourceDescriptor {
    pub fn output_name(&self) -> &str {
        self.output.as_deref().unwrap_or(self.stream_type.as_str())
    }
}

fn validate_bias(bias: &[f64; 3]) -> Result<(), ValidationError> {
    if bias.iter().all(|b| b.is_finite()) {
        Ok(())
    } else {
        Err(ValidationError::new("finite").with_message("bias must be finite".into()))
    }
}

fn validate_scale(scale: &[f64; 3]) -> Result<(), ValidationError> {
    if scale.iter().all(|s| s.is_finite() && *s != 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("scale").with_message("scale must be finite and non-zero".into()))
    }
}

/// Per-stream calibration, the runtime config of a source node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Calibration {
    #[serde(default)]
    #[validate(custom(function = "validate_bias"))]
    pub bias: [f64; 3],

    #[serde(default = "unit_scale")]
    #[validate(custom(function = "validate_scale"))]
    pub scale: [f64; 3],
}

fn unit_scale() -> [f64; 3] {
    [1.0; 3]
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            bias: [0.0; 3],
            scale: unit_scale(),
        }
    }
}

struct Wired<T> {
    descriptor: SourceDescriptor,
    stream_id: String,
    receiver: Receiver<DriverSample<T>>,
    output: OutputStream<T>,
}

/// Publishes samples delivered by a driver
pub struct SourceNode<T> {
    name: String,
    bridge: DriverBridge,
    calibration: Calibration,
    wired: Option<Wired<T>>,
}

impl<T: SourceValue> SourceNode<T> {
    /// `name` is the graph instance name; the driver stream id is `name/output`
    pub fn new(name: impl Into<String>, bridge: DriverBridge) -> Self {
        Self {
            name: name.into(),
            bridge,
            calibration: Calibration::default(),
            wired: None,
        }
    }
}

impl<T> SourceNode<T> {
    /// Driver-facing stream id, once initialized
    pub fn stream_id(&self) -> Option<&str> {
        self.wired.as_ref().map(|w| w.stream_id.as_str())
    }

    fn release(&mut self) {
        if let Some(wired) = self.wired.take() {
            self.bridge.unregister(&wired.stream_id);
        }
    }
}

impl<T: SourceValue> Node for SourceNode<T> {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError> {
        let descriptor: SourceDescriptor = parse_descriptor(TYPE_NAME, descriptor)?;
        if descriptor.stream_type.value_kind() != T::KIND {
            return Err(GraphError::invalid_descriptor(
                TYPE_NAME,
                format!(
                    "stream type {} cannot be published by this source",
                    descriptor.stream_type
                ),
            ));
        }

        self.release();
        let stream_id = format!("{}/{}", self.name, descriptor.output_name());
        let receiver = self
            .bridge
            .register::<T>(
                &stream_id,
                descriptor.stream_type,
                &BackpressureConfig::new(descriptor.channel_capacity, descriptor.drop_policy),
            )
            .map_err(|e| GraphError::invalid_descriptor(TYPE_NAME, e.to_string()))?;

        debug!(%stream_id, rate = descriptor.rate, "Source wired to driver bridge");
        self.wired = Some(Wired {
            output: OutputStream::new(descriptor.stream_type, descriptor.rate),
            descriptor,
            stream_id,
            receiver,
        });
        Ok(())
    }

    fn get_descriptor(&self) -> Value {
        self.wired
            .as_ref()
            .map(|w| to_value(&w.descriptor))
            .unwrap_or(Value::Null)
    }

    fn set_config(&mut self, config: &Value) -> Result<(), GraphError> {
        self.calibration = parse_config(TYPE_NAME, config)?;
        Ok(())
    }

    fn get_config(&self) -> Value {
        to_value(&self.calibration)
    }

    fn get_outputs(&self) -> Vec<OutputInfo> {
        self.wired
            .iter()
            .map(|w| OutputInfo::new(w.descriptor.output_name(), w.output.erase()))
            .collect()
    }

    fn start(&mut self, time_point: Duration) -> Result<(), GraphError> {
        if let Some(wired) = &self.wired {
            // samples delivered before start belong to no tick
            while wired.receiver.try_recv().is_ok() {}
            wired.output.set_time_point(time_point);
        }
        Ok(())
    }

    fn process(&mut self) -> Result<(), GraphError> {
        let Some(wired) = &self.wired else {
            return Ok(());
        };
        wired.output.clear();
        let mut published = 0usize;
        while let Ok(sample) = wired.receiver.try_recv() {
            wired.output.push_sample_at(
                sample.value.calibrate(&self.calibration),
                sample.is_healthy,
                sample.time_point,
            );
            published += 1;
        }
        if published > 0 {
            trace!(stream_id = %wired.stream_id, published, "Source published");
        }
        Ok(())
    }
}

impl<T> Drop for SourceNode<T> {
    fn drop(&mut self) {
        self.release();
    }
}
