//! Mock drivers
//!
//! Synthetic hardware for simulation runs and tests without a flight controller.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{Frame, MultirotorCommands, ProximityReading, StreamType, ValueKind};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::bridge::DriverBridge;
use crate::error::{IngestionError, Result};

/// Standard gravity (m/s²)
const GRAVITY: f64 = 9.80665;

/// Hover point used for synthetic GNSS fixes, roughly 46.77°N 23.59°E at 400 m
const HOVER_ECEF: [f64; 3] = [4_015_030.0, 1_752_640.0, 4_623_330.0];

/// Mock driver configuration
#[derive(Debug, Clone)]
pub struct MockDriverConfig {
    /// Stream id the samples are delivered to, `node/output`
    pub stream_id: String,

    pub stream_type: StreamType,

    /// Delivery rate (Hz)
    pub rate_hz: f64,

    /// Uniform noise amplitude added to vector and scalar values
    pub noise: f64,

    /// Flag every n-th sample unhealthy
    pub unhealthy_every: Option<u64>,

    pub seed: u64,
}

impl Default for MockDriverConfig {
    fn default() -> Self {
        Self {
            stream_id: "mock/acceleration".to_string(),
            stream_type: StreamType::Acceleration,
            rate_hz: 100.0,
            noise: 0.0,
            unhealthy_every: None,
            seed: 7,
        }
    }
}

/// Delivers synthetic samples from a tokio task
pub struct MockDriver {
    config: MockDriverConfig,
    running: Arc<AtomicBool>,
}

impl MockDriver {
    pub fn new(config: MockDriverConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Driver for `stream_type` at `rate_hz`, with a little sensor noise
    pub fn for_stream(stream_id: &str, stream_type: StreamType, rate_hz: f64) -> Self {
        Self::new(MockDriverConfig {
            stream_id: stream_id.to_string(),
            stream_type,
            rate_hz,
            noise: 0.01,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &MockDriverConfig {
        &self.config
    }

    /// Start delivering; time points are measured from `epoch`.
    ///
    /// The task ends on [`MockDriver::stop`] or when the stream disappears from the bridge,
    /// and yields the number of delivered samples.
    pub fn start(&self, bridge: DriverBridge, epoch: Instant) -> JoinHandle<u64> {
        let config = self.config.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(1.0 / config.rate_hz.max(f64::EPSILON));
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut seq: u64 = 0;
            let mut delivered: u64 = 0;

            debug!(
                stream_id = %config.stream_id,
                stream_type = %config.stream_type,
                rate_hz = config.rate_hz,
                "mock driver started"
            );

            while running.load(Ordering::Relaxed) {
                seq += 1;
                let time_point = epoch.elapsed();
                let is_healthy = !matches!(config.unhealthy_every, Some(n) if n > 0 && seq % n == 0);

                match deliver(&bridge, &config, &mut rng, seq, is_healthy, time_point) {
                    Ok(()) => delivered += 1,
                    Err(IngestionError::QueueFull { .. }) => {}
                    Err(err) => {
                        debug!(stream_id = %config.stream_id, %err, "mock driver detached");
                        break;
                    }
                }
                trace!(stream_id = %config.stream_id, seq, ?time_point, "mock sample delivered");

                tokio::time::sleep(interval).await;
            }

            running.store(false, Ordering::SeqCst);
            debug!(stream_id = %config.stream_id, delivered, "mock driver stopped");
            delivered
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

fn deliver(
    bridge: &DriverBridge,
    config: &MockDriverConfig,
    rng: &mut StdRng,
    seq: u64,
    is_healthy: bool,
    time_point: Duration,
) -> Result<()> {
    let id = config.stream_id.as_str();
    let t = seq as f64 / config.rate_hz;
    let mut noise = || {
        if config.noise > 0.0 {
            rng.random_range(-config.noise..config.noise)
        } else {
            0.0
        }
    };

    match config.stream_type.value_kind() {
        ValueKind::Vector => {
            let base = synthetic_vector(config.stream_type, t);
            let value = base + Vector3::new(noise(), noise(), noise());
            bridge.deliver_sample(id, value, is_healthy, time_point)
        }
        ValueKind::Scalar => {
            let value = synthetic_scalar(config.stream_type) + noise();
            bridge.deliver_sample(id, value, is_healthy, time_point)
        }
        ValueKind::Frame => {
            // slow yaw sweep
            let frame = Frame::from_euler_angles(0.0, 0.0, (TAU * t / 60.0) % TAU);
            bridge.deliver_sample(id, frame, is_healthy, time_point)
        }
        ValueKind::Commands => {
            let commands = MultirotorCommands {
                throttle: 0.5,
                rates: Vector3::zeros(),
                gimbal: Vector3::new(0.0, -0.3, 0.0),
            };
            bridge.deliver_sample(id, commands, is_healthy, time_point)
        }
        ValueKind::Proximity => {
            let reading = ProximityReading {
                distances: vec![Vector3::new(4.0 + noise(), 0.0, 0.0)],
            };
            bridge.deliver_sample(id, reading, is_healthy, time_point)
        }
    }
}

/// Vehicle hovering on a 2 m circle above [`HOVER_ECEF`]
fn synthetic_vector(stream_type: StreamType, t: f64) -> Vector3<f64> {
    let omega = TAU / 20.0;
    match stream_type {
        StreamType::Acceleration => Vector3::new(0.0, 0.0, GRAVITY),
        StreamType::MagneticField => Vector3::new(0.22, 0.0, 0.42),
        StreamType::EcefPosition => {
            Vector3::from(HOVER_ECEF) + Vector3::new((omega * t).cos(), (omega * t).sin(), 0.0) * 2.0
        }
        StreamType::EcefVelocity => {
            Vector3::new(-(omega * t).sin(), (omega * t).cos(), 0.0) * 2.0 * omega
        }
        StreamType::Distance => Vector3::new(3.0, 0.0, 0.0),
        _ => Vector3::zeros(),
    }
}

fn synthetic_scalar(stream_type: StreamType) -> f64 {
    match stream_type {
        StreamType::Pressure => 96_600.0,
        StreamType::Temperature => 21.5,
        StreamType::Voltage => 11.1,
        StreamType::Current => 4.2,
        StreamType::Pwm => 0.5,
        _ => 0.0,
    }
}
