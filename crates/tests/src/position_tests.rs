//! Position estimator fed from source nodes through the bridge

use contracts::StreamType;
use nalgebra::Vector3;
use sync_engine::StreamReader;

use crate::bench::{at, Bench};

const BASE: [f64; 3] = [4_015_030.0, 1_752_640.0, 4_623_330.0];

const POSITION_GRAPH: &str = r#"
[graph]
name = "navigation"
tick_rate_hz = 10

[[nodes]]
name = "gps"
node_type = "source"
descriptor = { stream_type = "ecef_position", rate = 10, output = "position" }

[[nodes]]
name = "gps_vel"
node_type = "source"
descriptor = { stream_type = "ecef_velocity", rate = 10 }

[[nodes]]
name = "accel"
node_type = "source"
descriptor = { stream_type = "linear_acceleration", rate = 10 }

[[nodes]]
name = "baro"
node_type = "source"
descriptor = { stream_type = "pressure", rate = 10 }

[[nodes]]
name = "pos"
node_type = "position_estimator"
inputs = ["gps/position", "gps_vel/ecef_velocity", "accel/linear_acceleration", "baro/pressure"]
descriptor = { rate = 10 }
config = { reset_distance = 10.0, blend_gain = 3.0 }
"#;

struct Nav {
    bench: Bench,
    position: StreamReader<Vector3<f64>>,
    velocity: StreamReader<Vector3<f64>>,
    tick: u64,
}

impl Nav {
    fn new() -> Self {
        let mut bench = Bench::from_toml(POSITION_GRAPH);
        bench.start();
        let position = bench.reader("pos/position", StreamType::EcefPosition);
        let velocity = bench.reader("pos/velocity", StreamType::EcefVelocity);
        Self {
            bench,
            position,
            velocity,
            tick: 0,
        }
    }

    /// One tick with a fix, a GNSS velocity and a level, still vehicle
    fn step(&mut self, fix: Vector3<f64>, fix_healthy: bool, gnss_velocity: Vector3<f64>) {
        self.tick += 1;
        let tp = at(self.tick, 10);
        self.bench.deliver("gps_vel/ecef_velocity", gnss_velocity, true, tp);
        self.bench.deliver("accel/linear_acceleration", Vector3::<f64>::zeros(), true, tp);
        self.bench.deliver("baro/pressure", 101_325.0_f64, true, tp);
        self.bench.deliver("gps/position", fix, fix_healthy, tp);
        self.bench.graph.tick().unwrap();
    }
}

fn base() -> Vector3<f64> {
    Vector3::from(BASE)
}

#[test]
fn test_unhealthy_fixes_hold_estimate() {
    let mut nav = Nav::new();
    nav.step(base(), true, Vector3::zeros());
    let held = nav.position.get_last_sample().value;
    assert_eq!(held, base());

    for i in 1..=5 {
        let bogus = base() + Vector3::new(1_000.0 * i as f64, 0.0, 0.0);
        nav.step(bogus, false, Vector3::new(5.0, 0.0, 0.0));

        let samples = nav.position.get_samples();
        assert_eq!(samples.len(), 1);
        assert!(!samples[0].is_healthy);
        assert_eq!(samples[0].value, held, "estimate moved on unhealthy fix {i}");
        assert_eq!(nav.velocity.get_last_sample().value, Vector3::zeros());
    }
}

#[test]
fn test_large_jump_snaps_and_zeroes_velocity() {
    let mut nav = Nav::new();
    nav.step(base(), true, Vector3::zeros());

    let drift = Vector3::new(1.0, 0.0, 0.0);
    nav.step(base() + drift, true, Vector3::new(2.0, 0.0, 0.0));
    let blended = nav.position.get_last_sample();
    assert!(blended.is_healthy);
    assert!(blended.value != base() && blended.value != base() + drift);
    assert!(nav.velocity.get_last_sample().value.norm() > 0.0);

    let jumped = base() + Vector3::new(50.0, 0.0, 0.0);
    nav.step(jumped, true, Vector3::new(2.0, 0.0, 0.0));
    let position = nav.position.get_last_sample();
    let velocity = nav.velocity.get_last_sample();
    assert!(position.is_healthy);
    assert_eq!(position.value, jumped);
    assert_eq!(velocity.value, Vector3::zeros());
}

#[test]
fn test_blend_converges_on_steady_fix() {
    let mut nav = Nav::new();
    nav.step(base(), true, Vector3::zeros());

    let target = base() + Vector3::new(0.0, 4.0, 0.0);
    for _ in 0..40 {
        nav.step(target, true, Vector3::zeros());
    }
    let error = (nav.position.get_last_sample().value - target).norm();
    assert!(error < 1e-3, "error {error}");
}

#[test]
fn test_fix_is_the_reference() {
    let mut nav = Nav::new();
    nav.step(base(), true, Vector3::zeros());

    // velocity and pressure keep arriving, the fix does not
    nav.tick += 1;
    let tp = at(nav.tick, 10);
    nav.bench
        .deliver("gps_vel/ecef_velocity", Vector3::new(1.0, 0.0, 0.0), true, tp);
    nav.bench.deliver("baro/pressure", 101_300.0_f64, true, tp);
    nav.bench.graph.tick().unwrap();

    assert!(nav.position.get_samples().is_empty());
    assert!(nav.velocity.get_samples().is_empty());
    assert_eq!(nav.position.get_last_sample().value, base());
}
