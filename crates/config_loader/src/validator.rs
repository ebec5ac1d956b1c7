//! Configuration validation
//!
//! Rules:
//! - graph name non-empty, tick_rate_hz > 0
//! - node names non-empty, free of '/', unique
//! - descriptor and config are tables
//! - source nodes declare a stream_type and take no inputs
//! - input paths are `node/output` and name a declared node
//! - proximity input_count matches the number of inputs
//!
//! Cycles are detected when the graph is wired, not here.

use std::collections::HashSet;

use contracts::{GraphBlueprint, GraphError, NodeBlueprint, NodeType, StreamPath};

/// Validate a GraphBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &GraphBlueprint) -> Result<(), GraphError> {
    validate_graph_settings(blueprint)?;
    validate_node_names(blueprint)?;
    for node in &blueprint.nodes {
        validate_node_records(node)?;
        validate_inputs(blueprint, node)?;
    }
    Ok(())
}

fn validate_graph_settings(blueprint: &GraphBlueprint) -> Result<(), GraphError> {
    if blueprint.graph.name.trim().is_empty() {
        return Err(GraphError::config_validation(
            "graph.name",
            "graph name cannot be empty",
        ));
    }
    if blueprint.graph.tick_rate_hz == 0 {
        return Err(GraphError::config_validation(
            "graph.tick_rate_hz",
            "tick_rate_hz must be > 0",
        ));
    }
    Ok(())
}

/// Node names are the first path component, so they must be unique and slash-free
fn validate_node_names(blueprint: &GraphBlueprint) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for (idx, node) in blueprint.nodes.iter().enumerate() {
        if node.name.trim().is_empty() {
            return Err(GraphError::config_validation(
                format!("nodes[{idx}].name"),
                "node name cannot be empty",
            ));
        }
        if node.name.contains('/') {
            return Err(GraphError::config_validation(
                format!("nodes[{idx}].name"),
                format!("node name '{}' must not contain '/'", node.name),
            ));
        }
        if !seen.insert(node.name.as_str()) {
            return Err(GraphError::config_validation(
                format!("nodes[name={}]", node.name),
                "duplicate node name",
            ));
        }
    }
    Ok(())
}

fn validate_node_records(node: &NodeBlueprint) -> Result<(), GraphError> {
    if !node.descriptor.is_object() {
        return Err(GraphError::config_validation(
            format!("nodes[{}].descriptor", node.name),
            "descriptor must be a table",
        ));
    }
    if let Some(config) = &node.config {
        if !config.is_object() {
            return Err(GraphError::config_validation(
                format!("nodes[{}].config", node.name),
                "config must be a table",
            ));
        }
    }

    match node.node_type {
        NodeType::Source => {
            if node.descriptor.get("stream_type").is_none() {
                return Err(GraphError::config_validation(
                    format!("nodes[{}].descriptor.stream_type", node.name),
                    "source nodes must declare a stream_type",
                ));
            }
            if node.wired_inputs().next().is_some() {
                return Err(GraphError::config_validation(
                    format!("nodes[{}].inputs", node.name),
                    "source nodes take no inputs",
                ));
            }
        }
        NodeType::Proximity => {
            let declared = node.descriptor.get("input_count").and_then(|v| v.as_u64());
            if let Some(declared) = declared {
                if declared as usize != node.inputs.len() {
                    return Err(GraphError::config_validation(
                        format!("nodes[{}].inputs", node.name),
                        format!(
                            "input_count is {declared} but {} inputs are listed",
                            node.inputs.len()
                        ),
                    ));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_inputs(blueprint: &GraphBlueprint, node: &NodeBlueprint) -> Result<(), GraphError> {
    for (idx, raw) in node.wired_inputs() {
        let field = format!("nodes[{}].inputs[{idx}]", node.name);
        let path =
            StreamPath::parse(raw).map_err(|e| GraphError::config_validation(&field, e.to_string()))?;

        if blueprint.node(path.node()).is_none() {
            return Err(GraphError::config_validation(
                field,
                format!("producer node '{}' not found", path.node()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, GraphSettings};
    use serde_json::json;

    fn node(name: &str, node_type: NodeType, inputs: &[&str], descriptor: serde_json::Value) -> NodeBlueprint {
        NodeBlueprint {
            name: name.into(),
            node_type,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            descriptor,
            config: None,
        }
    }

    fn minimal_blueprint() -> GraphBlueprint {
        GraphBlueprint {
            version: ConfigVersion::V1,
            graph: GraphSettings {
                name: "quad".into(),
                tick_rate_hz: 50,
            },
            nodes: vec![
                node(
                    "imu",
                    NodeType::Source,
                    &[],
                    json!({ "stream_type": "acceleration", "rate": 200 }),
                ),
                node(
                    "ahrs",
                    NodeType::Source,
                    &[],
                    json!({ "stream_type": "frame", "rate": 50 }),
                ),
                node(
                    "gravity",
                    NodeType::GravityFilter,
                    &["ahrs/frame", "imu/acceleration"],
                    json!({ "rate": 50 }),
                ),
            ],
        }
    }

    fn err_of(bp: &GraphBlueprint) -> String {
        let result = validate(bp);
        assert!(result.is_err());
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_zero_tick_rate() {
        let mut bp = minimal_blueprint();
        bp.graph.tick_rate_hz = 0;
        let err = err_of(&bp);
        assert!(err.contains("tick_rate_hz must be > 0"), "got: {err}");
    }

    #[test]
    fn test_duplicate_node_name() {
        let mut bp = minimal_blueprint();
        bp.nodes.push(bp.nodes[0].clone());
        let err = err_of(&bp);
        assert!(err.contains("duplicate node name"), "got: {err}");
    }

    #[test]
    fn test_slash_in_node_name() {
        let mut bp = minimal_blueprint();
        bp.nodes[0].name = "imu/0".into();
        let err = err_of(&bp);
        assert!(err.contains("must not contain '/'"), "got: {err}");
    }

    #[test]
    fn test_malformed_input_path() {
        let mut bp = minimal_blueprint();
        bp.nodes[2].inputs[1] = "imu".into();
        let err = err_of(&bp);
        assert!(err.contains("nodes[gravity].inputs[1]"), "got: {err}");
    }

    #[test]
    fn test_unknown_producer() {
        let mut bp = minimal_blueprint();
        bp.nodes[2].inputs[0] = "attitude/frame".into();
        let err = err_of(&bp);
        assert!(err.contains("producer node 'attitude' not found"), "got: {err}");
    }

    #[test]
    fn test_empty_input_left_unwired() {
        let mut bp = minimal_blueprint();
        bp.nodes[2].inputs[1] = String::new();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_source_requirements() {
        let mut bp = minimal_blueprint();
        bp.nodes[0].descriptor = json!({ "rate": 200 });
        let err = err_of(&bp);
        assert!(err.contains("stream_type"), "got: {err}");

        let mut bp = minimal_blueprint();
        bp.nodes[0].inputs = vec!["ahrs/frame".into()];
        let err = err_of(&bp);
        assert!(err.contains("take no inputs"), "got: {err}");
    }

    #[test]
    fn test_config_must_be_table() {
        let mut bp = minimal_blueprint();
        bp.nodes[2].config = Some(json!(9.81));
        let err = err_of(&bp);
        assert!(err.contains("config must be a table"), "got: {err}");
    }

    #[test]
    fn test_proximity_input_count() {
        let mut bp = minimal_blueprint();
        bp.nodes.push(node(
            "sonar",
            NodeType::Source,
            &[],
            json!({ "stream_type": "distance", "rate": 20 }),
        ));
        bp.nodes.push(node(
            "obstacles",
            NodeType::Proximity,
            &["sonar/distance"],
            json!({ "rate": 20, "input_count": 2 }),
        ));
        let err = err_of(&bp);
        assert!(err.contains("input_count is 2 but 1 inputs"), "got: {err}");

        bp.nodes[4].descriptor = json!({ "rate": 20, "input_count": 1 });
        assert!(validate(&bp).is_ok());
    }
}
