//! Graph orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{build_graph, Pipeline, PipelineConfig};
pub use stats::PipelineStats;
