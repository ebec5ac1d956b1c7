//! `info` command implementation.

use anyhow::{Context, Result};
use processors::NodeFactory;
use sync_engine::NodeInfo;
use tracing::info;

use crate::cli::InfoArgs;
use crate::pipeline::build_graph;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading graph information");

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let graph = build_graph(&blueprint, &NodeFactory::default()).context("Failed to build graph")?;

    let nodes: Vec<NodeInfo> = graph
        .execution_order()
        .into_iter()
        .filter(|name| args.node.as_deref().map_or(true, |wanted| wanted == *name))
        .filter_map(|name| graph.node_info(name))
        .collect();

    if let Some(ref name) = args.node {
        if nodes.is_empty() {
            anyhow::bail!("Node '{}' not found in {}", name, args.config.display());
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&nodes).context("Failed to serialize graph info")?;
        println!("{}", json);
    } else {
        println!("\n=== Graph: {} @ {} Hz ===", blueprint.graph.name, blueprint.graph.tick_rate_hz);
        for node in &nodes {
            print_node(node);
        }
        println!();
    }

    Ok(())
}

fn print_node(node: &NodeInfo) {
    println!("\n{} ({}, {})", node.name, node.node_type, node.state);
    println!("  Descriptor: {}", node.descriptor);
    println!("  Config: {}", node.config);

    if !node.inputs.is_empty() {
        println!("  Inputs:");
        for (idx, input) in node.inputs.iter().enumerate() {
            let path = input
                .path
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<unwired>".to_string());
            let marker = if input.resolved { "" } else { " (unresolved)" };
            println!(
                "    [{idx}] {}: {} @ {} Hz <- {path}{marker}",
                input.name, input.stream_type, input.rate
            );
        }
    }

    println!("  Outputs:");
    for output in &node.outputs {
        println!(
            "    {}: {} @ {} Hz",
            output.path, output.stream_type, output.rate
        );
    }
}
