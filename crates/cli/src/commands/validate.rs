//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::GraphBlueprint;
use processors::NodeFactory;
use serde::Serialize;
use sync_engine::Graph;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::pipeline::build_graph;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<GraphSummary>,
}

#[derive(Serialize)]
struct GraphSummary {
    version: String,
    name: String,
    tick_rate_hz: u32,
    node_count: usize,
    source_count: usize,
    execution_order: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |config_path: String, error: String| ValidationResult {
        valid: false,
        config_path,
        error: Some(error),
        warnings: None,
        summary: None,
    };

    if !args.config.exists() {
        let error = format!("File not found: {}", args.config.display());
        return invalid(config_path, error);
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(config_path, e.to_string()),
    };

    // Building catches descriptor, config and cycle errors the file checks cannot see
    let graph = match build_graph(&blueprint, &NodeFactory::default()) {
        Ok(graph) => graph,
        Err(e) => return invalid(config_path, format!("{e:#}")),
    };

    let warnings = collect_warnings(&blueprint, &graph);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(GraphSummary {
            version: format!("{:?}", blueprint.version),
            name: blueprint.graph.name.clone(),
            tick_rate_hz: blueprint.graph.tick_rate_hz,
            node_count: blueprint.nodes.len(),
            source_count: blueprint
                .nodes_of_type(contracts::NodeType::Source)
                .count(),
            execution_order: graph
                .execution_order()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }),
    }
}

/// Non-fatal issues: unwired inputs and declared rates the tick rate cannot honour
fn collect_warnings(blueprint: &GraphBlueprint, graph: &Graph) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.nodes.is_empty() {
        warnings.push("Graph has no nodes".to_string());
    }

    for node in &blueprint.nodes {
        let Some(info) = graph.node_info(&node.name) else {
            continue;
        };
        for input in &info.inputs {
            if input.path.is_none() {
                warnings.push(format!(
                    "Input '{}' of node '{}' is not wired - it will stay unhealthy",
                    input.name, node.name
                ));
            }
        }
        for output in &info.outputs {
            if output.rate > blueprint.graph.tick_rate_hz && node.node_type != contracts::NodeType::Source {
                warnings.push(format!(
                    "Output '{}' declares {} Hz above the {} Hz tick rate",
                    output.path, output.rate, blueprint.graph.tick_rate_hz
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Graph: {} @ {} Hz", summary.name, summary.tick_rate_hz);
            println!("  Nodes: {} ({} sources)", summary.node_count, summary.source_count);
            println!("  Execution order: {}", summary.execution_order.join(" -> "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\nWarnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
