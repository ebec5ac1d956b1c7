//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted as well. Node types are checked
//! before the typed parse so an unknown type surfaces as `UnknownNodeType`
//! instead of a generic serde message.

use contracts::{GraphBlueprint, GraphError, NodeType};
use serde_json::Value;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (preferred)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<GraphBlueprint, GraphError> {
    let document: toml::Table = toml::from_str(content).map_err(|e| GraphError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })?;

    check_node_types(
        document
            .get("nodes")
            .and_then(toml::Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|node| node.get("node_type").and_then(toml::Value::as_str)),
    )?;

    toml::Value::Table(document)
        .try_into()
        .map_err(|e| GraphError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<GraphBlueprint, GraphError> {
    let document: Value = serde_json::from_str(content).map_err(|e| GraphError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })?;

    check_node_types(
        document
            .get("nodes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|node| node.get("node_type").and_then(Value::as_str)),
    )?;

    serde_json::from_value(document).map_err(|e| GraphError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<GraphBlueprint, GraphError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

fn check_node_types<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), GraphError> {
    for name in names {
        if serde_json::from_value::<NodeType>(Value::String(name.to_string())).is_err() {
            return Err(GraphError::UnknownNodeType(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[graph]
name = "quad"
tick_rate_hz = 50

[[nodes]]
name = "imu"
node_type = "source"
descriptor = { stream_type = "acceleration", rate = 200 }
config = { bias = [0.1, 0.0, 0.0] }
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.graph.name, "quad");
        assert_eq!(bp.nodes.len(), 1);
        assert_eq!(bp.nodes[0].descriptor["stream_type"], "acceleration");
        assert_eq!(bp.nodes[0].config.as_ref().unwrap()["bias"][0], 0.1);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "graph": { "name": "quad" },
            "nodes": [{
                "name": "gravity",
                "node_type": "gravity_filter",
                "inputs": ["ahrs/frame", "imu/acceleration"],
                "descriptor": { "rate": 50 }
            }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.graph.tick_rate_hz, 100);
        assert_eq!(bp.nodes[0].node_type, NodeType::GravityFilter);
        assert_eq!(bp.nodes[0].inputs.len(), 2);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, GraphError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_node_type() {
        let content = r#"
[graph]
name = "quad"

[[nodes]]
name = "cam"
node_type = "video_decoder"
"#;
        match parse_toml(content).unwrap_err() {
            GraphError::UnknownNodeType(name) => assert_eq!(name, "video_decoder"),
            other => panic!("unexpected error: {other}"),
        }

        let json = r#"{ "graph": { "name": "q" }, "nodes": [{ "name": "x", "node_type": "kalman" }] }"#;
        assert!(matches!(
            parse_json(json),
            Err(GraphError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_missing_graph_section() {
        let err = parse_toml("[[nodes]]\nname = \"imu\"\nnode_type = \"source\"\n").unwrap_err();
        assert!(err.to_string().contains("graph"), "got: {err}");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
