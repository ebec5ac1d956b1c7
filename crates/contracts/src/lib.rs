//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the flight graph.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Time points are `Duration`s measured from the graph clock epoch
//! - `sample_idx` is the per-stream ordering key, `time_point` is used for alignment

mod blueprint;
mod error;
mod sample;
mod stream_path;
mod stream_type;
mod values;

pub use blueprint::*;
pub use error::*;
pub use sample::{Sample, StreamValue};
pub use stream_path::StreamPath;
pub use stream_type::{StreamType, ValueKind};
pub use values::*;
