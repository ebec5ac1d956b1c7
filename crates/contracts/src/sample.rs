//! Sample - the unit of data flowing through every stream.

use std::fmt::Debug;
use std::time::Duration;

/// Marker for values that can travel through a stream.
///
/// Values must be cheap enough to clone once per consumer per tick and must have a
/// well-formed default, which is what consumers see before a stream produced anything.
pub trait StreamValue: Clone + Default + Debug + Send + Sync + 'static {}

impl<T> StreamValue for T where T: Clone + Default + Debug + Send + Sync + 'static {}

/// Timestamped, health-flagged data point.
///
/// `is_healthy == false` still carries a well-formed `value`; consumers must not use it
/// for control decisions but are expected to propagate the flag rather than zeroing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample<T> {
    /// Sample payload
    pub value: T,

    /// Whether the value can be trusted
    pub is_healthy: bool,

    /// Monotonic per-stream index, 0 means "nothing produced yet"
    pub sample_idx: u32,

    /// Capture instant, relative to the graph clock epoch
    pub time_point: Duration,

    /// Time elapsed since the previous sample of the same stream
    pub dt: Duration,
}

impl<T> Sample<T> {
    /// Create a sample with explicit metadata
    pub fn new(value: T, is_healthy: bool, sample_idx: u32, time_point: Duration, dt: Duration) -> Self {
        Self {
            value,
            is_healthy,
            sample_idx,
            time_point,
            dt,
        }
    }

    /// Seconds elapsed since the previous sample
    #[inline]
    pub fn dt_secs(&self) -> f64 {
        self.dt.as_secs_f64()
    }
}
