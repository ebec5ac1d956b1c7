//! Deferred wiring, node removal, cycles and lifecycle sequencing

use contracts::{Frame, GraphError, StreamType};
use nalgebra::Vector3;
use processors::NodeFactory;
use serde_json::json;
use sync_engine::{Graph, NodeState, PathResolution};

use crate::bench::{at, Bench, G, GRAVITY_GRAPH};

#[test]
fn test_deferred_path_resolves_when_producer_appears() {
    let factory = NodeFactory::default();
    let mut graph = Graph::new("deferred").with_tick_rate(50);
    let descriptor = json!({ "rate": 50 });
    let gravity = factory
        .create("gravity", contracts::NodeType::GravityFilter, &descriptor)
        .unwrap();
    graph.add_node("gravity", gravity, &descriptor).unwrap();

    let resolution = graph
        .set_input_stream_path("gravity", 1, "imu/acceleration")
        .unwrap();
    assert_eq!(resolution, PathResolution::Deferred);
    assert_eq!(graph.unresolved_inputs(), 1);

    let imu_descriptor = json!({ "stream_type": "acceleration", "rate": 200 });
    let imu = factory
        .create("imu", contracts::NodeType::Source, &imu_descriptor)
        .unwrap();
    graph.add_node("imu", imu, &imu_descriptor).unwrap();
    assert_eq!(graph.unresolved_inputs(), 0);
    let info = graph.node_info("gravity").unwrap();
    assert!(info.inputs[1].resolved);
    assert_eq!(info.inputs[1].path.as_ref().unwrap().as_str(), "imu/acceleration");

    let ahrs_descriptor = json!({ "stream_type": "frame", "rate": 50 });
    let ahrs = factory
        .create("ahrs", contracts::NodeType::Source, &ahrs_descriptor)
        .unwrap();
    graph.add_node("ahrs", ahrs, &ahrs_descriptor).unwrap();
    assert_eq!(
        graph.set_input_stream_path("gravity", 0, "ahrs/frame").unwrap(),
        PathResolution::Resolved
    );
    assert_eq!(graph.execution_order().last(), Some(&"gravity"));

    graph.start(std::time::Duration::ZERO).unwrap();
    let bridge = factory.bridge();
    bridge
        .deliver_sample("imu/acceleration", Vector3::new(0.0, 0.0, G), true, at(1, 200))
        .unwrap();
    bridge
        .deliver_sample("ahrs/frame", Frame::default(), true, at(1, 50))
        .unwrap();
    graph.tick().unwrap();

    let out = graph
        .reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration)
        .unwrap()
        .get_last_sample();
    assert!(out.is_healthy);
    assert!(out.value.norm() < 1e-12);
}

#[test]
fn test_removed_producer_leaves_held_sample() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    bench.deliver("imu/acceleration", Vector3::new(1.5, 0.0, G), true, at(4, 200));
    bench.deliver("ahrs/frame", Frame::default(), true, at(1, 50));
    bench.graph.tick().unwrap();

    bench.graph.remove_node("imu").unwrap();
    assert!(!bench.bridge.contains("imu/acceleration"));
    assert!(bench.graph.reader::<Vector3<f64>>("imu/acceleration", StreamType::Acceleration).is_err());
    assert_eq!(bench.graph.unresolved_inputs(), 1);

    for tick in 2..=4 {
        bench.deliver("ahrs/frame", Frame::default(), true, at(tick, 50));
        let report = bench.graph.tick().unwrap();
        assert_eq!(report.nodes_failed, 0);
        assert_eq!(report.unresolved_inputs, 1);

        let sample = out.get_last_sample();
        assert!(sample.is_healthy, "held sample keeps its health");
        assert!((sample.value.x - 1.5).abs() < 1e-12);
    }
}

#[test]
fn test_rewiring_same_path_does_not_replay_reference() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let out = bench.reader::<Vector3<f64>>("gravity/linear_acceleration", StreamType::LinearAcceleration);

    bench.deliver("imu/acceleration", Vector3::new(0.5, 0.0, G), true, at(4, 200));
    bench.deliver("ahrs/frame", Frame::default(), true, at(1, 50));
    bench.graph.tick().unwrap();
    assert_eq!(out.get_samples().len(), 1);
    let last_idx = out.get_last_sample().sample_idx;

    bench.graph.set_input_stream_path("gravity", 0, "ahrs/frame").unwrap();
    bench.graph.tick().unwrap();

    assert!(out.get_samples().is_empty(), "no new frame, no new output");
    assert_eq!(out.get_last_sample().sample_idx, last_idx);
}

#[test]
fn test_delivery_to_removed_source_is_rejected() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    bench.graph.remove_node("ahrs").unwrap();

    let err = bench
        .bridge
        .deliver_sample("ahrs/frame", Frame::default(), true, at(1, 50))
        .unwrap_err();
    assert!(!err.is_backpressure());
    assert_eq!(bench.bridge.metrics().snapshot().rejected, 1);
}

#[test]
fn test_cycle_is_rejected_and_graph_unchanged() {
    let factory = NodeFactory::default();
    let mut graph = Graph::new("loop");
    let descriptor = json!({ "rate": 50 });
    for name in ["a", "b"] {
        let node = factory
            .create(name, contracts::NodeType::StabilityProcessor, &descriptor)
            .unwrap();
        graph.add_node(name, node, &descriptor).unwrap();
    }

    assert_eq!(
        graph.set_input_stream_path("a", 1, "b/frame").unwrap(),
        PathResolution::Deferred
    );
    let err = graph.set_input_stream_path("b", 1, "a/frame").unwrap_err();
    match err {
        GraphError::Cycle { nodes } => {
            assert!(nodes.contains(&"a".to_string()));
            assert!(nodes.contains(&"b".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(graph.node_info("b").unwrap().inputs[1].path.is_none());
    assert_eq!(graph.execution_order(), vec!["b", "a"]);
}

#[test]
fn test_tick_before_start_is_fatal() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    let err = bench.graph.tick().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, GraphError::FatalSequence { .. }));
}

#[test]
fn test_operations_after_stop_are_fatal() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    bench.graph.stop();
    bench.graph.stop();

    assert!(bench.graph.tick().unwrap_err().is_fatal());
    assert!(bench
        .graph
        .set_config("gravity", &json!({ "gravity": 9.81 }))
        .unwrap_err()
        .is_fatal());
    assert_eq!(
        bench.graph.node_info("gravity").unwrap().state,
        NodeState::Stopped
    );
}

#[test]
fn test_reconfigure_while_running() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    let state = |bench: &Bench| bench.graph.node_info("gravity").unwrap().state;
    assert_eq!(state(&bench), NodeState::Started);

    bench.graph.tick().unwrap();
    assert_eq!(state(&bench), NodeState::Running);

    bench
        .graph
        .set_config("gravity", &json!({ "gravity": 9.81 }))
        .unwrap();
    assert_eq!(state(&bench), NodeState::Reconfigured);

    let err = bench
        .graph
        .set_config("gravity", &json!({ "gravity": 1.0 }))
        .unwrap_err();
    assert!(err.to_string().contains("gravity must be within"), "{err}");
    assert_eq!(
        bench.graph.node_info("gravity").unwrap().config["gravity"],
        9.81
    );

    bench.graph.tick().unwrap();
    assert_eq!(state(&bench), NodeState::Running);
}

#[test]
fn test_node_added_while_running_joins_next_tick() {
    let mut bench = Bench::from_toml(GRAVITY_GRAPH);
    bench.start();
    bench.graph.tick().unwrap();

    let factory = NodeFactory::new(bench.bridge.clone());
    let descriptor = json!({ "rate": 50 });
    let stability = factory
        .create("stability", contracts::NodeType::StabilityProcessor, &descriptor)
        .unwrap();
    bench.graph.add_node("stability", stability, &descriptor).unwrap();
    bench
        .graph
        .set_input_stream_path("stability", 0, "ahrs/frame")
        .unwrap();
    assert_eq!(
        bench.graph.node_info("stability").unwrap().state,
        NodeState::Started
    );

    bench.deliver("ahrs/frame", Frame::default(), true, at(2, 50));
    let report = bench.graph.tick().unwrap();
    assert_eq!(report.nodes_processed, 4);
    let rate = bench
        .reader::<Vector3<f64>>("stability/angular_velocity", StreamType::AngularVelocity)
        .get_samples();
    assert_eq!(rate.len(), 1);
}
