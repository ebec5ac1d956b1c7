//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{build_graph, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(tick_rate) = args.tick_rate {
        if tick_rate == 0 {
            anyhow::bail!("--tick-rate must be > 0");
        }
        info!(tick_rate, "Overriding tick rate from CLI");
        blueprint.graph.tick_rate_hz = tick_rate;
    }

    info!(
        graph = %blueprint.graph.name,
        tick_rate_hz = blueprint.graph.tick_rate_hz,
        nodes = blueprint.nodes.len(),
        "Configuration loaded"
    );

    // Dry run - build and wire, then exit
    if args.dry_run {
        let graph = build_graph(&blueprint, &processors::NodeFactory::default())
            .context("Failed to build graph")?;
        info!("Dry run mode - graph builds and wires, exiting");
        println!("Graph '{}' ({} nodes)", graph.name(), graph.len());
        println!("Execution order: {}", graph.execution_order().join(" -> "));
        println!("Unresolved inputs: {}", graph.unresolved_inputs());
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        simulate: args.simulate,
        seed: args.seed,
        max_ticks: (args.max_ticks != 0).then_some(args.max_ticks),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    info!("Starting graph...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Graph run failed")?;

    if stats.nodes_failed > 0 {
        warn!(failed = stats.nodes_failed, "Some node process calls failed");
    }
    stats.print_summary();

    info!("Flightgraph finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM; a handler that cannot be installed never fires
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
