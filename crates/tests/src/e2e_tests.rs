//! End-to-end runs with simulated drivers and the remaining processors

use std::time::{Duration, Instant};

use contracts::{Frame, MultirotorCommands, ProximityReading, StreamType};
use ingestion::MockDriver;
use nalgebra::Vector3;

use crate::bench::{at, Bench, GRAVITY_GRAPH};

#[tokio::test]
async fn test_mock_drivers_feed_gravity_filter() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    let drivers = [
        MockDriver::for_stream("imu/acceleration", StreamType::Acceleration, 200.0),
        MockDriver::for_stream("ahrs/frame", StreamType::Frame, 50.0),
    ];
    let epoch = Instant::now();
    let handles: Vec<_> = drivers
        .iter()
        .map(|driver| driver.start(bench.bridge.clone(), epoch))
        .collect();

    let mut indices = Vec::new();
    let mut interval = tokio::time::interval(Duration::from_millis(20));
    for _ in 0..15 {
        interval.tick().await;
        bench.graph.tick().unwrap();
        indices.extend(out.get_samples().iter().map(|s| s.sample_idx));
    }

    for driver in &drivers {
        driver.stop();
    }
    for handle in handles {
        let delivered = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(delivered > 0);
    }

    assert!(!indices.is_empty());
    assert!(indices.windows(2).all(|w| w[1] > w[0]));
    // the simulated frame only yaws, so gravity cancels up to noise
    let last = out.get_last_sample();
    assert!(last.is_healthy);
    assert!(last.value.z.abs() < 0.1, "{:?}", last.value);
    assert!(bench.bridge.metrics().snapshot().samples_received > 0);
}

#[test]
fn test_gimbal_pwm_per_frame_sample() {
    let mut bench = Bench::from_toml(
        r#"
[graph]
name = "camera"
tick_rate_hz = 50

[[nodes]]
name = "ahrs"
node_type = "source"
descriptor = { stream_type = "frame", rate = 100 }

[[nodes]]
name = "rc"
node_type = "source"
descriptor = { stream_type = "multirotor_commands", rate = 5, output = "commands" }

[[nodes]]
name = "gimbal"
node_type = "servo_gimbal"
inputs = ["ahrs/frame", "rc/commands"]
descriptor = { rate = 100 }
"#,
    );
    bench.start();
    let x = bench.reader::<f64>("gimbal/x_pwm", StreamType::Pwm);
    let z = bench.reader::<f64>("gimbal/z_pwm", StreamType::Pwm);

    bench.deliver("rc/commands", MultirotorCommands::default(), true, at(1, 100));
    bench.deliver("ahrs/frame", Frame::default(), true, at(1, 100));
    bench.deliver("ahrs/frame", Frame::default(), true, at(2, 100));
    bench.graph.tick().unwrap();

    let samples = x.get_samples();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.is_healthy));
    assert!((samples[1].value - 0.5).abs() < 1e-12);

    // commands go quiet: the held target keeps the gimbal centred
    bench.deliver("ahrs/frame", Frame::default(), true, at(3, 100));
    bench.graph.tick().unwrap();
    let last = z.get_last_sample();
    assert!(last.is_healthy);
    assert!((last.value - 0.5).abs() < 1e-12);
}

#[test]
fn test_proximity_one_reading_per_tick() {
    let mut bench = Bench::from_toml(
        r#"
[graph]
name = "obstacles"
tick_rate_hz = 20

[[nodes]]
name = "front"
node_type = "source"
descriptor = { stream_type = "distance", rate = 20 }

[[nodes]]
name = "rear"
node_type = "source"
descriptor = { stream_type = "distance", rate = 20 }

[[nodes]]
name = "obstacles"
node_type = "proximity"
inputs = ["front/distance", "rear/distance"]
descriptor = { rate = 20, input_count = 2 }
config = { max_distance = 5.0 }
"#,
    );
    bench.start();
    let out = bench.reader::<ProximityReading>("obstacles/proximity", StreamType::Proximity);

    bench.deliver("front/distance", Vector3::new(2.0, 0.0, 0.0), true, at(1, 20));
    bench.deliver("rear/distance", Vector3::new(-9.0, 0.0, 0.0), true, at(1, 20));
    bench.graph.tick().unwrap();

    let samples = out.get_samples();
    assert_eq!(samples.len(), 1);
    assert!(samples[0].is_healthy);
    assert_eq!(samples[0].value.closest(), Some(2.0));
    assert_eq!(samples[0].value.distances.len(), 1);

    // Silent sensors: the previous obstacle picture is held
    bench.graph.tick().unwrap();
    let quiet = out.get_samples();
    assert_eq!(quiet.len(), 1);
    assert!(quiet[0].is_healthy);
    assert_eq!(quiet[0].value.closest(), Some(2.0));
}

#[test]
fn test_drop_oldest_keeps_latest_samples() {
    let mut bench = Bench::from_toml(
        r#"
[graph]
name = "burst"
tick_rate_hz = 10

[[nodes]]
name = "baro"
node_type = "source"
descriptor = { stream_type = "pressure", rate = 10, channel_capacity = 2, drop_policy = "drop_oldest" }
"#,
    );
    bench.start();
    let pressure = bench.reader::<f64>("baro/pressure", StreamType::Pressure);

    for n in 1..=5u64 {
        bench.deliver("baro/pressure", 100_000.0 + n as f64, true, at(n, 100));
    }
    bench.graph.tick().unwrap();

    let values: Vec<f64> = pressure.get_samples().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![100_004.0, 100_005.0]);
    assert_eq!(bench.bridge.metrics().snapshot().samples_dropped, 3);
}
