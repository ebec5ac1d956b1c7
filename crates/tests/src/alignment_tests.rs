//! Multi-rate alignment through source and processor nodes

use std::time::Duration;

use contracts::{Frame, StreamType};
use nalgebra::Vector3;

use crate::bench::{at, Bench, G, GRAVITY_GRAPH};

#[test]
fn test_downsample_observes_latest_of_four() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let imu = bench.reader::<Vector3<f64>>("imu/acceleration", StreamType::Acceleration);
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    for tick in 1..=3u64 {
        for sub in 1..=4u64 {
            let n = (tick - 1) * 4 + sub;
            bench.deliver("imu/acceleration", Vector3::new(n as f64, 0.0, G), true, at(n, 200));
        }
        bench.deliver("ahrs/frame", Frame::default(), true, at(tick, 50));
        bench.graph.tick().unwrap();

        assert_eq!(imu.get_samples().len(), 4);
        let samples = out.get_samples();
        assert_eq!(samples.len(), 1, "tick {tick}");
        assert!(samples[0].is_healthy);
        assert!((samples[0].value.x - (tick * 4) as f64).abs() < 1e-12);
        assert!(samples[0].value.z.abs() < 1e-12);
    }
}

#[test]
fn test_slow_input_held_without_interpolation() {
    let mut bench = Bench::from_toml(
        r#"
[graph]
name = "hold"
tick_rate_hz = 50

[[nodes]]
name = "ahrs"
node_type = "source"
descriptor = { stream_type = "frame", rate = 100 }

[[nodes]]
name = "imu"
node_type = "source"
descriptor = { stream_type = "acceleration", rate = 25 }

[[nodes]]
name = "gravity"
node_type = "gravity_filter"
inputs = ["ahrs/frame", "imu/acceleration"]
descriptor = { rate = 50 }
"#,
    );
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    let mut seen = Vec::new();
    for tick in 1..=4u64 {
        let first_reference = at(2 * tick - 1, 100);
        if tick % 2 == 1 {
            let x = tick.div_ceil(2) as f64;
            bench.deliver("imu/acceleration", Vector3::new(x, 0.0, G), true, first_reference);
        }
        bench.deliver("ahrs/frame", Frame::default(), true, first_reference);
        bench.deliver("ahrs/frame", Frame::default(), true, at(2 * tick, 100));
        bench.graph.tick().unwrap();

        let samples = out.get_samples();
        assert_eq!(samples.len(), 2, "one invocation per reference sample");
        seen.extend(samples.iter().map(|s| s.value.x));
    }

    assert_eq!(seen, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
}

#[test]
fn test_silent_reference_keeps_last_output() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    bench.deliver("imu/acceleration", Vector3::new(0.5, 0.0, G), true, at(4, 200));
    bench.deliver("ahrs/frame", Frame::default(), true, at(1, 50));
    bench.graph.tick().unwrap();
    let last = out.get_last_sample();

    // accelerometer only: the frame reference drives invocations
    bench.deliver("imu/acceleration", Vector3::new(9.0, 0.0, G), true, at(8, 200));
    let report = bench.graph.tick().unwrap();

    assert_eq!(report.nodes_processed, 3);
    assert!(out.get_samples().is_empty());
    assert_eq!(out.get_last_sample(), last);
    assert!((out.get_last_sample().value.x - 0.5).abs() < 1e-12);
}

#[test]
fn test_never_received_input_is_unhealthy_zero() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    bench.deliver("ahrs/frame", Frame::default(), true, at(1, 50));
    bench.graph.tick().unwrap();

    let sample = out.get_last_sample();
    assert!(!sample.is_healthy);
    assert_eq!(sample.value, Vector3::new(0.0, 0.0, -G));
}

#[test]
fn test_sample_idx_strictly_increasing() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    let mut indices = Vec::new();
    let mut imu_seq = 0;
    for tick in 1..=20u64 {
        // uneven upstream bursts, including ticks without a reference
        for _ in 0..(tick % 5) {
            imu_seq += 1;
            bench.deliver("imu/acceleration", Vector3::new(0.0, 0.0, G), true, at(imu_seq, 200));
        }
        if tick % 3 != 0 {
            bench.deliver("ahrs/frame", Frame::default(), tick % 4 != 0, at(tick, 50));
        }
        bench.graph.tick().unwrap();
        indices.extend(out.get_samples().iter().map(|s| s.sample_idx));
    }

    assert!(!indices.is_empty());
    assert_eq!(indices[0], 1);
    assert!(indices.windows(2).all(|w| w[1] == w[0] + 1), "{indices:?}");
}

#[test]
fn test_source_time_points_follow_driver() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let imu = bench.reader::<Vector3<f64>>("imu/acceleration", StreamType::Acceleration);

    bench.deliver("imu/acceleration", Vector3::<f64>::zeros(), true, Duration::from_millis(5));
    bench.deliver("imu/acceleration", Vector3::<f64>::zeros(), true, Duration::from_millis(12));
    bench.graph.tick().unwrap();

    let samples = imu.get_samples();
    assert_eq!(samples[0].time_point, Duration::from_millis(5));
    assert_eq!(samples[1].time_point, Duration::from_millis(12));
    assert_eq!(samples[1].dt, Duration::from_millis(7));
}
