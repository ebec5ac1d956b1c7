//! # Ingestion
//!
//! Upstream boundary of the flight graph.
//!
//! Driver collaborators push captured samples through [`DriverBridge::deliver_sample`];
//! each stream is owned by a [`SourceNode`] that drains its queue once per tick and
//! republishes the samples, calibrated, on its output stream.
//!
//! ## Backpressure
//! - Bounded queue per stream (async-channel)
//! - `DropOldest` evicts the stale sample, `DropNewest` rejects the new one
//! - Drops are counted in [`IngestionMetrics`] and the `flightgraph_samples_dropped_total` counter

mod bridge;
mod config;
mod error;
mod mock;
mod source;

pub use bridge::{DriverBridge, DriverSample};
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use mock::{MockDriver, MockDriverConfig};
pub use source::{Calibration, SourceDescriptor, SourceNode, SourceValue};
