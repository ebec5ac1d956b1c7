//! # Observability
//!
//! Log subscriber setup and Prometheus metrics for the flight graph.
//!
//! The graph engine records through the `metrics` facade unconditionally; nothing is
//! exported until a recorder is installed with [`init_metrics_only`] or
//! [`init_with_config`].
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     ..Default::default()
//! })?;
//!
//! let report = graph.tick()?;
//! observability::record_tick_metrics(&report.as_sample());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    record_node_processed, record_path_transition, record_sample_delivered,
    record_samples_dropped, record_tick_metrics, MetricsSummary, RunningStats, StatsSummary,
    TickMetricsAggregator, TickSample,
};

/// Log sink and metrics exporter settings
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus listener port; `None` or 0 leaves the exporter off
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON, one object per event
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Single line
    #[default]
    Compact,
}

impl LogFormat {
    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            Self::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            Self::Pretty => fmt::layer().pretty().boxed(),
            Self::Compact => fmt::layer().compact().with_target(false).boxed(),
        }
    }
}

/// Install the global subscriber and, when a port is set, the Prometheus exporter
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(config.log_format.layer())
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port.filter(|port| *port != 0) {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// Install only the Prometheus recorder, serving `/metrics` on `port`
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
